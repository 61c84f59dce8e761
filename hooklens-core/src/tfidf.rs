//! TF-IDF term weighting for short texts (prompts).
//!
//! Tokens are maximal runs of word characters, at least two long,
//! lowercased, with English stop words removed. The vocabulary keeps the
//! `max_features` most frequent terms across the corpus. Weights use a
//! smoothed idf, `ln((1 + n) / (1 + df)) + 1`, and each row is L2-normalized.

use std::collections::{BTreeMap, HashMap, HashSet};

/// Default vocabulary cap.
pub const DEFAULT_MAX_FEATURES: usize = 1000;

const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "across", "after", "afterwards", "again", "against", "all", "almost",
    "alone", "along", "already", "also", "although", "always", "am", "among", "amongst", "an",
    "and", "another", "any", "anyhow", "anyone", "anything", "anyway", "anywhere", "are",
    "around", "as", "at", "back", "be", "became", "because", "become", "becomes", "becoming",
    "been", "before", "beforehand", "behind", "being", "below", "beside", "besides", "between",
    "beyond", "both", "but", "by", "can", "cannot", "could", "did", "do", "does", "done", "down",
    "due", "during", "each", "eg", "either", "else", "elsewhere", "enough", "etc", "even",
    "ever", "every", "everyone", "everything", "everywhere", "except", "few", "for", "former",
    "formerly", "from", "further", "get", "give", "go", "had", "has", "have", "he", "hence",
    "her", "here", "hereafter", "hereby", "herein", "hereupon", "hers", "herself", "him",
    "himself", "his", "how", "however", "ie", "if", "in", "indeed", "into", "is", "it", "its",
    "itself", "just", "keep", "last", "latter", "latterly", "least", "less", "made", "many",
    "may", "me", "meanwhile", "might", "mine", "more", "moreover", "most", "mostly", "much",
    "must", "my", "myself", "namely", "neither", "never", "nevertheless", "next", "no",
    "nobody", "none", "noone", "nor", "not", "nothing", "now", "nowhere", "of", "off", "often",
    "on", "once", "one", "only", "onto", "or", "other", "others", "otherwise", "our", "ours",
    "ourselves", "out", "over", "own", "part", "per", "perhaps", "please", "put", "rather",
    "re", "same", "see", "seem", "seemed", "seeming", "seems", "several", "she", "should",
    "show", "since", "so", "some", "somehow", "someone", "something", "sometime", "sometimes",
    "somewhere", "still", "such", "take", "than", "that", "the", "their", "them", "themselves",
    "then", "thence", "there", "thereafter", "thereby", "therefore", "therein", "thereupon",
    "these", "they", "this", "those", "though", "through", "throughout", "thru", "thus", "to",
    "together", "too", "toward", "towards", "under", "until", "up", "upon", "us", "very", "via",
    "was", "we", "well", "were", "what", "whatever", "when", "whence", "whenever", "where",
    "whereafter", "whereas", "whereby", "wherein", "whereupon", "wherever", "whether", "which",
    "while", "whither", "who", "whoever", "whole", "whom", "whose", "why", "will", "with",
    "within", "without", "would", "yet", "you", "your", "yours", "yourself", "yourselves",
];

/// Lowercased word tokens of at least two characters, stop words removed.
pub fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    lower
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| t.chars().count() >= 2)
        .filter(|t| !STOP_WORDS.contains(t))
        .map(str::to_string)
        .collect()
}

/// A fitted TF-IDF model: vocabulary plus one weight row per document.
#[derive(Debug, Clone)]
pub struct TfIdf {
    /// Terms in column order (alphabetical)
    pub terms: Vec<String>,
    /// One L2-normalized row per input document
    pub rows: Vec<Vec<f64>>,
}

impl TfIdf {
    /// Fit on `documents` and transform them.
    pub fn fit_transform<S: AsRef<str>>(documents: &[S], max_features: usize) -> Self {
        let tokenized: Vec<Vec<String>> = documents.iter().map(|d| tokenize(d.as_ref())).collect();

        let mut corpus_counts: HashMap<&str, usize> = HashMap::new();
        let mut doc_freq: HashMap<&str, usize> = HashMap::new();
        for tokens in &tokenized {
            let mut seen = HashSet::new();
            for token in tokens {
                *corpus_counts.entry(token).or_default() += 1;
                if seen.insert(token.as_str()) {
                    *doc_freq.entry(token).or_default() += 1;
                }
            }
        }

        // Most frequent first, alphabetical among equals
        let mut ranked: Vec<(&str, usize)> = corpus_counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        ranked.truncate(max_features);
        let mut terms: Vec<String> = ranked.iter().map(|(t, _)| t.to_string()).collect();
        terms.sort();

        let n = documents.len() as f64;
        let columns: BTreeMap<&str, (usize, f64)> = terms
            .iter()
            .enumerate()
            .map(|(i, term)| {
                let df = doc_freq.get(term.as_str()).copied().unwrap_or_default() as f64;
                (term.as_str(), (i, ((1.0 + n) / (1.0 + df)).ln() + 1.0))
            })
            .collect();

        let rows = tokenized
            .iter()
            .map(|tokens| {
                let mut row = vec![0.0; terms.len()];
                for token in tokens {
                    if let Some((col, idf)) = columns.get(token.as_str()) {
                        row[*col] += idf;
                    }
                }
                let norm = row.iter().map(|v| v * v).sum::<f64>().sqrt();
                if norm > 0.0 {
                    row.iter_mut().for_each(|v| *v /= norm);
                }
                row
            })
            .collect();

        Self { terms, rows }
    }

    /// Column means over a range of rows.
    pub fn mean_of(&self, rows: std::ops::Range<usize>) -> Vec<f64> {
        let mut mean = vec![0.0; self.terms.len()];
        let selected = &self.rows[rows];
        if selected.is_empty() {
            return mean;
        }
        for row in selected {
            for (m, v) in mean.iter_mut().zip(row) {
                *m += v;
            }
        }
        mean.iter_mut().for_each(|m| *m /= selected.len() as f64);
        mean
    }
}

/// Terms most characteristic of `positive` relative to `negative`.
///
/// Returns up to `top` terms with the largest difference in mean weight,
/// largest first, alphabetical among equals.
pub fn contrast_terms<S: AsRef<str>>(
    positive: &[S],
    negative: &[S],
    max_features: usize,
    top: usize,
) -> Vec<String> {
    let documents: Vec<&str> = positive
        .iter()
        .chain(negative.iter())
        .map(AsRef::as_ref)
        .collect();
    let model = TfIdf::fit_transform(&documents, max_features);
    let split = positive.len();
    let pos_mean = model.mean_of(0..split);
    let neg_mean = model.mean_of(split..documents.len());

    let mut scored: Vec<(&String, f64)> = model
        .terms
        .iter()
        .zip(pos_mean.iter().zip(&neg_mean))
        .map(|(term, (p, n))| (term, p - n))
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(b.0)));
    scored.into_iter().take(top).map(|(t, _)| t.clone()).collect()
}
