//! Prompt optimizer
//!
//! Labels prompts as likely successful or not with a cheap heuristic, then
//! contrasts the two groups with TF-IDF to find the words successful
//! prompts use. Also flags a generally terse prompting style.

use super::Optimizer;
use crate::error::Result;
use crate::tfidf::{contrast_terms, DEFAULT_MAX_FEATURES};
use crate::types::{Event, EventType, Priority, Recommendation};
use chrono::{DateTime, Utc};

/// Prompt events needed before any analysis.
const MIN_PROMPTS: usize = 10;
/// Prompts shorter than this are not labeled.
const MIN_LABELED_CHARS: usize = 20;
/// Each group needs this many prompts for the TF-IDF contrast.
const MIN_GROUP_SIZE: usize = 5;
const SHORT_AVERAGE_CHARS: f64 = 50.0;
const TOP_WORDS: usize = 10;
const TARGET: &str = "general_prompts";

/// Two of three signals mark a prompt as likely successful: length over 50,
/// a word asking for specifics, or a question mark.
pub fn looks_successful(prompt: &str) -> bool {
    let lower = prompt.to_lowercase();
    let signals = [
        prompt.chars().count() > 50,
        ["specific", "example", "detailed"]
            .iter()
            .any(|w| lower.contains(w)),
        prompt.contains('?'),
    ];
    signals.iter().filter(|s| **s).count() >= 2
}

#[derive(Debug, Default)]
pub struct PromptOptimizer;

impl PromptOptimizer {
    pub fn new() -> Self {
        Self
    }
}

impl Optimizer for PromptOptimizer {
    fn name(&self) -> &str {
        "core.prompts"
    }

    fn analyze(&self, events: &[Event], at: DateTime<Utc>) -> Result<Vec<Recommendation>> {
        let prompts: Vec<&str> = events
            .iter()
            .filter(|e| e.event_type == EventType::PromptSubmit)
            .filter_map(Event::prompt)
            .collect();
        if prompts.len() < MIN_PROMPTS {
            tracing::debug!(prompts = prompts.len(), "Too few prompts to analyze");
            return Ok(vec![]);
        }

        let mut recommendations = Vec::new();

        let (successful, failed): (Vec<&str>, Vec<&str>) = prompts
            .iter()
            .copied()
            .filter(|p| p.chars().count() >= MIN_LABELED_CHARS)
            .partition(|p| looks_successful(p));

        if successful.len() >= MIN_GROUP_SIZE && failed.len() >= MIN_GROUP_SIZE {
            let top_words = contrast_terms(&successful, &failed, DEFAULT_MAX_FEATURES, TOP_WORDS);
            let lead: Vec<&str> = top_words.iter().take(5).map(String::as_str).collect();
            recommendations.push(
                Recommendation::new(
                    "prompt_enhancement",
                    TARGET,
                    Priority::Medium,
                    "Optimize prompt patterns for better success",
                    at,
                )
                .with_description("Identified words and patterns associated with successful prompts")
                .with_rationale("Successful prompts share common patterns that can be applied more broadly")
                .with_steps([
                    format!("Include words like: {}", lead.join(", ")),
                    "Use more specific and detailed language".to_string(),
                    "Structure prompts with clear questions".to_string(),
                    "Provide context and examples when possible".to_string(),
                ])
                .with_impact("Could improve prompt success rate by 15-25%")
                .with_confidence(0.6)
                .with_data("successful_prompt_count", successful.len())
                .with_data("failed_prompt_count", failed.len())
                .with_data("top_success_words", top_words)
                .with_data("analysis_method", "tf_idf_comparison"),
            );
        }

        let average = prompts.iter().map(|p| p.chars().count()).sum::<usize>() as f64
            / prompts.len() as f64;
        if average < SHORT_AVERAGE_CHARS {
            recommendations.push(
                Recommendation::new(
                    "prompt_enhancement",
                    TARGET,
                    Priority::Medium,
                    "Increase prompt detail and specificity",
                    at,
                )
                .with_description(format!(
                    "Average prompt length is {average:.1} characters, which is quite short"
                ))
                .with_rationale("More detailed prompts typically yield better results")
                .with_steps([
                    "Add more context and background information",
                    "Include specific requirements and constraints",
                    "Provide examples of desired outputs",
                    "Break down complex requests into steps",
                ])
                .with_impact("More detailed prompts lead to better responses")
                .with_confidence(0.7)
                .with_data("average_prompt_length", average)
                .with_data("sample_size", prompts.len()),
            );
        }

        Ok(recommendations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt(text: &str) -> Event {
        Event::new(EventType::PromptSubmit, "s1", "2025-01-10T10:00:00Z").with_data("prompt", text)
    }

    #[test]
    fn test_looks_successful() {
        assert!(looks_successful("Can you give a specific example?"));
        assert!(!looks_successful("fix it"));
        assert!(!looks_successful("why?"));
    }

    #[test]
    fn test_needs_ten_prompts() {
        let events: Vec<Event> = (0..9).map(|_| prompt("fix")).collect();
        assert!(PromptOptimizer::new().analyze(&events, Utc::now()).unwrap().is_empty());
    }

    #[test]
    fn test_short_prompts() {
        let events: Vec<Event> = (0..10).map(|_| prompt("fix the build")).collect();
        let recs = PromptOptimizer::new().analyze(&events, Utc::now()).unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].title, "Increase prompt detail and specificity");
        assert_eq!(recs[0].confidence_score, 0.7);
    }

    #[test]
    fn test_tf_idf_contrast() {
        let mut events = Vec::new();
        for i in 0..5 {
            events.push(prompt(&format!(
                "Could you show a detailed walkthrough of the parser module {i}?"
            )));
            events.push(prompt(&format!("refactor parser module quickly now {i}")));
        }
        let recs = PromptOptimizer::new().analyze(&events, Utc::now()).unwrap();
        let contrast = recs
            .iter()
            .find(|r| r.supporting_data.contains_key("top_success_words"))
            .unwrap();
        let words: Vec<&str> = contrast.supporting_data["top_success_words"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|w| w.as_str())
            .collect();
        // detailed, walkthrough, parser, module, refactor, quickly
        assert_eq!(words.len(), 6);
        assert_eq!(&words[..2], &["detailed", "walkthrough"]);
        assert_eq!(words.last(), Some(&"refactor"));
        assert_eq!(contrast.supporting_data["successful_prompt_count"], 5);
    }
}
