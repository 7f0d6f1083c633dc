//! Venue name equivalence predicates.
//!
//! Both predicates are reflexive and symmetric. The lenient check needs no
//! abbreviation data and is what Stage 1 workers can afford; the strict check
//! also bridges wording differences through learned abbreviations.

use std::collections::HashSet;

use crate::constants::COMPARISON_STOPWORDS;
use crate::learning::tokenize;
use crate::normalize::series_key;
use crate::types::LearnedAbbreviations;

/// Content tokens of the series form of `name`, stopwords removed, with the
/// terminal abbreviation period kept. A single-letter stopword right after a
/// content word is a series letter ("Physics A") and stays.
fn content_tokens(name: &str) -> Vec<String> {
    let mut kept = Vec::new();
    let mut after_content = false;
    for token in tokenize(&series_key(name)) {
        let is_stopword = COMPARISON_STOPWORDS.contains(token.as_str());
        if !is_stopword || (after_content && token.chars().count() == 1) {
            kept.push(token);
        }
        after_content = !is_stopword;
    }
    kept
}

fn bare(token: &str) -> String {
    token.chars().filter(|c| c.is_alphanumeric()).collect()
}

/// Lenient check: equal once years, ordinals, a "proceedings of" prefix,
/// stopwords, case and punctuation are ignored.
pub fn are_conference_names_equivalent(a: &str, b: &str) -> bool {
    if a.trim().eq_ignore_ascii_case(b.trim()) {
        return true;
    }
    let key_a = series_key(a);
    let key_b = series_key(b);
    if key_a == key_b {
        return true;
    }
    let bare_tokens = |name: &str| -> Vec<String> {
        content_tokens(name)
            .iter()
            .map(|t| bare(t))
            .filter(|t| !t.is_empty())
            .collect()
    };
    let (tokens_a, tokens_b) = (bare_tokens(a), bare_tokens(b));
    !tokens_a.is_empty() && tokens_a == tokens_b
}

/// Strict check: the lenient check, or a token-by-token alignment where
/// each pair is equal or linked by a learned abbreviation in either
/// direction. A multi-word expansion may consume several tokens on the
/// other side.
pub fn are_variants_of_same_venue(a: &str, b: &str, learned: &LearnedAbbreviations) -> bool {
    if are_conference_names_equivalent(a, b) {
        return true;
    }
    if learned.is_empty() {
        return false;
    }
    let tokens_a = content_tokens(a);
    let tokens_b = content_tokens(b);
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return false;
    }
    TokenAligner {
        a: &tokens_a,
        b: &tokens_b,
        learned,
        failed: HashSet::new(),
    }
    .aligns(0, 0)
}

struct TokenAligner<'t> {
    a: &'t [String],
    b: &'t [String],
    learned: &'t LearnedAbbreviations,
    // (i, j) positions already known not to align
    failed: HashSet<(usize, usize)>,
}

impl TokenAligner<'_> {
    fn aligns(&mut self, i: usize, j: usize) -> bool {
        if i == self.a.len() && j == self.b.len() {
            return true;
        }
        if i == self.a.len() || j == self.b.len() || self.failed.contains(&(i, j)) {
            return false;
        }

        if self.tokens_equivalent(&self.a[i], &self.b[j]) && self.aligns(i + 1, j + 1) {
            return true;
        }
        for k in self.expansion_spans(&self.a[i], &self.b[j..]) {
            if self.aligns(i + 1, j + k) {
                return true;
            }
        }
        for k in self.expansion_spans(&self.b[j], &self.a[i..]) {
            if self.aligns(i + k, j + 1) {
                return true;
            }
        }

        self.failed.insert((i, j));
        false
    }

    fn tokens_equivalent(&self, x: &str, y: &str) -> bool {
        x.trim_end_matches('.') == y.trim_end_matches('.')
            || self.learned.maps_to(x, y)
            || self.learned.maps_to(y, x)
    }

    /// Lengths (> 1) of the prefixes of `rest` that spell out a multi-word
    /// expansion of `token`
    fn expansion_spans(&self, token: &str, rest: &[String]) -> Vec<usize> {
        self.learned
            .expansions(token)
            .iter()
            .filter_map(|(expanded, _)| {
                let words: Vec<String> = tokenize(expanded)
                    .into_iter()
                    .filter(|w| !COMPARISON_STOPWORDS.contains(w.as_str()))
                    .collect();
                let k = words.len();
                (k > 1 && rest.len() >= k && rest[..k] == words[..]).then_some(k)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn learned(pairs: &[(&str, &str)]) -> LearnedAbbreviations {
        let mut table = LearnedAbbreviations::new();
        for (abbrev, expanded) in pairs {
            table.insert(abbrev, expanded, 0.5);
        }
        table
    }

    #[test]
    fn test_lenient_tolerates_years_and_punctuation() {
        assert!(are_conference_names_equivalent("ICML 2023", "icml"));
        assert!(are_conference_names_equivalent(
            "Proceedings of the International Conference on Machine Learning",
            "international conference on machine learning 2022"
        ));
        assert!(are_conference_names_equivalent("Neural Networks, the", "neural networks"));
        assert!(!are_conference_names_equivalent("Journal of Physics", "Journal of Chemistry"));
    }

    #[test]
    fn test_series_letter_is_not_a_stopword() {
        assert!(!are_conference_names_equivalent("Journal of Physics A", "Journal of Physics"));
        assert!(!are_conference_names_equivalent("Journal of Physics A", "Journal of Physics B"));
        assert!(are_conference_names_equivalent("Journal of Physics A", "journal of physics a, 2021"));
        assert!(are_conference_names_equivalent("A Journal of Physics", "Journal of Physics"));
    }

    #[test]
    fn test_lenient_does_not_expand_abbreviations() {
        assert!(!are_conference_names_equivalent(
            "intl. conf. on machine learning",
            "international conference on machine learning"
        ));
    }

    #[test]
    fn test_predicates_are_reflexive_and_symmetric() {
        let table = learned(&[("intl.", "international"), ("conf.", "conference")]);
        let names = [
            "international conference on machine learning",
            "intl. conf. on machine learning",
            "ICML 2023",
            "journal of physics",
        ];
        for a in names {
            assert!(are_conference_names_equivalent(a, a));
            assert!(are_variants_of_same_venue(a, a, &table));
            for b in names {
                assert_eq!(are_conference_names_equivalent(a, b), are_conference_names_equivalent(b, a));
                assert_eq!(
                    are_variants_of_same_venue(a, b, &table),
                    are_variants_of_same_venue(b, a, &table)
                );
            }
        }
    }

    #[test]
    fn test_strict_uses_learned_abbreviations() {
        let a = "international conference on machine learning";
        let b = "intl. conf. on machine learning";
        assert!(!are_variants_of_same_venue(a, b, &LearnedAbbreviations::new()));
        let table = learned(&[("intl.", "international"), ("conf.", "conference")]);
        assert!(are_variants_of_same_venue(a, b, &table));
        assert!(!are_variants_of_same_venue(a, "intl. conf. on computer vision", &table));
    }

    #[test]
    fn test_strict_handles_multi_word_expansions() {
        let table = learned(&[("cv", "computer vision")]);
        assert!(are_variants_of_same_venue(
            "conference on computer vision and pattern recognition",
            "conference on cv and pattern recognition",
            &table
        ));
        assert!(are_variants_of_same_venue(
            "conference on cv and pattern recognition",
            "conference on computer vision and pattern recognition",
            &table
        ));
    }
}
