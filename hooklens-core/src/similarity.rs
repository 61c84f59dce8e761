//! Token-set similarity between short texts (error messages).

use std::collections::HashSet;

fn tokens(text: &str) -> HashSet<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

/// Jaccard similarity of the case-folded whitespace-token sets, in `[0, 1]`.
///
/// Returns 0 when either side has no tokens.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = tokens(a);
    let b = tokens(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(&b).count();
    let union = a.union(&b).count();
    intersection as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_zero() {
        assert_eq!(similarity("", "x"), 0.0);
        assert_eq!(similarity("x", "   "), 0.0);
        assert_eq!(similarity("", ""), 0.0);
    }

    #[test]
    fn test_reflexive_and_symmetric() {
        let a = "File not found: /tmp/x";
        let b = "file NOT found: /tmp/y";
        assert_eq!(similarity(a, a), 1.0);
        assert_eq!(similarity(a, b), similarity(b, a));
    }

    #[test]
    fn test_case_folding_and_partial_overlap() {
        assert_eq!(similarity("Permission Denied", "permission denied"), 1.0);
        // {a, b, c} vs {b, c, d}: 2 shared of 4
        assert_eq!(similarity("a b c", "b c d"), 0.5);
    }
}
