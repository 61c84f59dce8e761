use serde_json::Value;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Output;
use tempfile::TempDir;

struct CliTestEnv {
    _temp_dir: TempDir,
    home: PathBuf,
    xdg_config: PathBuf,
    xdg_state: PathBuf,
    log_dir: PathBuf,
}

impl CliTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base = temp_dir.path().to_path_buf();
        let home = base.join("home");
        let xdg_config = base.join("xdg-config");
        let xdg_state = base.join("xdg-state");
        let log_dir = home.join(".claude/logs");

        fs::create_dir_all(&home).expect("failed to create HOME");
        fs::create_dir_all(&xdg_config).expect("failed to create XDG_CONFIG_HOME");
        fs::create_dir_all(&xdg_state).expect("failed to create XDG_STATE_HOME");

        seed_log_fixtures(&log_dir);

        Self {
            _temp_dir: temp_dir,
            home,
            xdg_config,
            xdg_state,
            log_dir,
        }
    }

    fn log_dir_arg(&self) -> String {
        self.log_dir.display().to_string()
    }
}

fn seed_log_fixtures(target: &Path) {
    let source = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../hooklens-core/tests/fixtures/logs");
    fs::create_dir_all(target).expect("failed to create log directory");
    for entry in fs::read_dir(&source).expect("missing log fixtures") {
        let entry = entry.expect("failed to read fixture entry");
        fs::copy(entry.path(), target.join(entry.file_name())).expect("failed to copy log fixture");
    }
}

fn run_bin(env: &CliTestEnv, bin_name: &str, args: &[&str], stdin: Option<&str>) -> Output {
    let bin_path = match bin_name {
        "hooklens-analyze" => PathBuf::from(assert_cmd::cargo::cargo_bin!("hooklens-analyze")),
        "hooklens-session" => PathBuf::from(assert_cmd::cargo::cargo_bin!("hooklens-session")),
        "hooklens-improvements" => {
            PathBuf::from(assert_cmd::cargo::cargo_bin!("hooklens-improvements"))
        }
        _ => panic!("unsupported binary in test harness: {bin_name}"),
    };

    let mut command = assert_cmd::Command::new(bin_path);
    command
        .args(args)
        .env("HOME", &env.home)
        .env("XDG_CONFIG_HOME", &env.xdg_config)
        .env("XDG_STATE_HOME", &env.xdg_state)
        .env_remove("RUST_LOG");
    if let Some(input) = stdin {
        command.write_stdin(input);
    }
    command
        .output()
        .unwrap_or_else(|e| panic!("failed to execute {bin_name}: {e}"))
}

fn assert_success(bin_name: &str, args: &[&str], output: &Output) {
    if output.status.success() {
        return;
    }

    let rendered_args = args
        .iter()
        .map(|arg| OsString::from(arg).to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    panic!(
        "{bin_name} {rendered_args} failed\nstatus: {}\nstdout:\n{}\nstderr:\n{}",
        output.status, stdout, stderr
    );
}

fn stdout_json(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|e| {
        panic!(
            "stdout is not JSON ({e}):\n{}",
            String::from_utf8_lossy(&output.stdout)
        )
    })
}

#[test]
fn analyze_log_dir_reports_sessions_as_json() {
    let env = CliTestEnv::new();
    let log_dir = env.log_dir_arg();
    let args = ["--log-dir", log_dir.as_str(), "--format", "json"];

    let output = run_bin(&env, "hooklens-analyze", &args, None);
    assert_success("hooklens-analyze", &args, &output);

    let report = stdout_json(&output);
    assert_eq!(report["files"].as_array().unwrap().len(), 5);
    assert_eq!(report["sessions"]["sessions"].as_object().unwrap().len(), 2);
    assert_eq!(
        report["sessions"]["merged"]["tool_sequences"][0]["suggested_name"],
        "read_bash_flow"
    );
    assert_eq!(report["recommendations"][0]["type"], "hook_creation");
    assert!(report.get("cross_project").is_none());
}

#[test]
fn analyze_log_file_prints_text_summary() {
    let env = CliTestEnv::new();
    let file = env.log_dir.join("post_tool_use.json").display().to_string();
    let args = ["--log-file", file.as_str(), "--recommend"];

    let output = run_bin(&env, "hooklens-analyze", &args, None);
    assert_success("hooklens-analyze", &args, &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("10 events, 0 findings"), "got:\n{stdout}");
    assert!(stdout.contains("Repeated sequences: 1"));
    assert!(stdout.contains("Error clusters:     1"));
    assert!(stdout.contains("Recommendations:"));
}

#[test]
fn analyze_writes_output_file_with_cross_project() {
    let env = CliTestEnv::new();
    let log_dir = env.log_dir_arg();
    let out_path = env.home.join("report.json");
    let out = out_path.display().to_string();
    let args = [
        "--log-dir",
        log_dir.as_str(),
        "--cross-project",
        "--format",
        "json",
        "--output",
        out.as_str(),
    ];

    let output = run_bin(&env, "hooklens-analyze", &args, None);
    assert_success("hooklens-analyze", &args, &output);

    let report: Value = serde_json::from_str(&fs::read_to_string(&out_path).unwrap()).unwrap();
    let cross = &report["cross_project"];
    assert_eq!(cross["log_dirs"].as_array().unwrap().len(), 1);
    assert_eq!(cross["successful_command_sequences"][0]["session_id"], "sess-a");
}

#[test]
fn analyze_missing_log_dir_fails() {
    let env = CliTestEnv::new();
    let missing = env.home.join("nope").display().to_string();
    let output = run_bin(&env, "hooklens-analyze", &["--log-dir", missing.as_str()], None);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to open log directory"), "got:\n{stderr}");
}

#[test]
fn session_hook_stores_analysis_and_improvements_summarize_it() {
    let env = CliTestEnv::new();
    let log_dir = env.log_dir_arg();
    let args = ["--log-dir", log_dir.as_str()];

    let output = run_bin(
        &env,
        "hooklens-session",
        &args,
        Some(r#"{"session_id": "sess-a", "hook_event_name": "Stop"}"#),
    );
    assert_success("hooklens-session", &args, &output);

    let result = stdout_json(&output);
    assert_eq!(result["analyzed"], true);
    assert_eq!(result["total_events"], 13);
    assert_eq!(result["patterns_found"], 3);
    assert_eq!(result["stored"], true);
    assert!(env.log_dir.join("pending_improvements.json").exists());

    let json_args = ["--log-dir", log_dir.as_str(), "--format", "json"];
    let summary = run_bin(&env, "hooklens-improvements", &json_args, None);
    assert_success("hooklens-improvements", &json_args, &summary);
    let summary = stdout_json(&summary);
    assert_eq!(summary["sessions_analyzed"], 1);
    assert_eq!(summary["top_sequences"][0]["occurrences"], 2);

    let text = run_bin(&env, "hooklens-improvements", &args, None);
    assert_success("hooklens-improvements", &args, &text);
    let stdout = String::from_utf8_lossy(&text.stdout);
    assert!(stdout.contains("Sessions analyzed: 1"), "got:\n{stdout}");
}

#[test]
fn session_hook_without_patterns_stores_nothing() {
    let env = CliTestEnv::new();
    let log_dir = env.log_dir_arg();
    let args = ["--log-dir", log_dir.as_str()];

    let output = run_bin(&env, "hooklens-session", &args, Some(r#"{"session_id": "sess-b"}"#));
    assert_success("hooklens-session", &args, &output);

    let result = stdout_json(&output);
    assert_eq!(result["analyzed"], true);
    assert_eq!(result["stored"], false);
    assert!(!env.log_dir.join("pending_improvements.json").exists());
}

#[test]
fn session_hook_with_unknown_session_reports_no_logs() {
    let env = CliTestEnv::new();
    let log_dir = env.log_dir_arg();
    let args = ["--log-dir", log_dir.as_str()];

    let output = run_bin(&env, "hooklens-session", &args, Some(r#"{"session_id": "sess-missing"}"#));
    assert_success("hooklens-session", &args, &output);

    let result = stdout_json(&output);
    assert_eq!(result["analyzed"], true);
    assert_eq!(result["session_id"], "sess-missing");
    assert_eq!(result["patterns_found"], 0);
    assert_eq!(result["message"], "No logs found for session");
    assert_eq!(result["stored"], false);
    assert!(!env.log_dir.join("pending_improvements.json").exists());
}

#[test]
fn session_hook_reports_bad_input_as_json() {
    let env = CliTestEnv::new();
    let log_dir = env.log_dir_arg();
    let args = ["--log-dir", log_dir.as_str()];

    let output = run_bin(&env, "hooklens-session", &args, Some("not json"));
    assert_eq!(output.status.code(), Some(1));
    let result = stdout_json(&output);
    assert_eq!(result["analyzed"], false);
    assert!(result["error"].as_str().unwrap().contains("not valid JSON"));
}

#[test]
fn improvements_with_empty_log() {
    let env = CliTestEnv::new();
    let log_dir = env.log_dir_arg();
    let args = ["--log-dir", log_dir.as_str()];

    let output = run_bin(&env, "hooklens-improvements", &args, None);
    assert_success("hooklens-improvements", &args, &output);
    assert!(String::from_utf8_lossy(&output.stdout).contains("No pending improvements"));
}
