use std::collections::BTreeSet;

use strsim::{normalized_levenshtein, sorensen_dice};

/// Lower-cases, folds punctuation to spaces and collapses whitespace.
pub fn normalize_text(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalized word tokens of a text.
pub fn word_tokens(text: &str) -> Vec<String> {
    normalize_text(text)
        .split(' ')
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Similarity of two free texts in `[0, 1]`.
///
/// Max of token Jaccard and bigram Dice over normalized text; an empty side
/// scores 0.
pub fn text_similarity(a: &str, b: &str) -> f64 {
    let a = normalize_text(a);
    let b = normalize_text(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }

    let tokens_a: BTreeSet<String> = a.split(' ').map(str::to_string).collect();
    let tokens_b: BTreeSet<String> = b.split(' ').map(str::to_string).collect();

    jaccard(&tokens_a, &tokens_b)
        .max(sorensen_dice(&a, &b))
        .clamp(0.0, 1.0)
}

/// Title similarity also considers edit distance, which catches small
/// rewordings that token sets miss.
pub fn title_similarity(a: &str, b: &str) -> f64 {
    let base = text_similarity(a, b);
    if base == 0.0 || base == 1.0 {
        return base;
    }
    let edit = normalized_levenshtein(&normalize_text(a), &normalize_text(b));
    base.max(edit).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_folds_case_and_punctuation() {
        assert_eq!(normalize_text("  Hello,   World!  "), "hello world");
        assert_eq!(normalize_text("Zürich—Ölpreis"), "zürich ölpreis");
    }

    #[test]
    fn identical_texts_score_one() {
        assert_eq!(text_similarity("Cyclone hits coast", "cyclone hits COAST!"), 1.0);
        assert_eq!(title_similarity("Same", "same"), 1.0);
    }

    #[test]
    fn empty_text_scores_zero() {
        assert_eq!(text_similarity("", "anything"), 0.0);
        assert_eq!(text_similarity("", ""), 0.0);
        assert_eq!(title_similarity("...", "..."), 0.0);
    }

    #[test]
    fn similarity_is_symmetric_and_bounded() {
        let pairs = [
            ("Cyclone Gezani hits Madagascar coast", "Cyclone Gezani strikes Madagascar coastline"),
            ("Fed raises rates", "Central bank holds rates steady"),
            ("a", "completely unrelated words here"),
        ];
        for (a, b) in pairs {
            let ab = title_similarity(a, b);
            let ba = title_similarity(b, a);
            assert!((ab - ba).abs() < 1e-12);
            assert!((0.0..=1.0).contains(&ab));
            let ab = text_similarity(a, b);
            assert!((ab - text_similarity(b, a)).abs() < 1e-12);
        }
    }

    #[test]
    fn rewording_scores_higher_than_unrelated() {
        let close = title_similarity(
            "Cyclone Gezani hits Madagascar coast",
            "Cyclone Gezani strikes Madagascar coast",
        );
        let far = title_similarity(
            "Cyclone Gezani hits Madagascar coast",
            "Parliament passes annual budget",
        );
        assert!(close > 0.7, "close = {close}");
        assert!(far < 0.4, "far = {far}");
    }
}
