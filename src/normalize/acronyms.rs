use once_cell::sync::Lazy;
use regex::Regex;

use super::series::collapse_whitespace;
use crate::constants::METADATA_KEYWORDS;

static PAREN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(([^()]*)\)").unwrap());
static ACRONYM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z][A-Za-z0-9'\-]{1,19}$").unwrap());
static TRAILING_YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+(?:19|20)[0-9]{2}$").unwrap());

/// An acronym found in parentheses, with the full name written right before
/// it when that name is long enough to be an expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcronymCandidate {
    pub acronym: String,
    pub full_name: Option<String>,
}

/// Scan parenthetical runs of `raw` for acronyms like "(ICML)" or
/// "(NeurIPS 2023)".
pub fn extract_acronym_candidates(raw: &str) -> Vec<AcronymCandidate> {
    let mut candidates = Vec::new();
    let mut segment_start = 0;

    for caps in PAREN_RE.captures_iter(raw) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let preceding = &raw[segment_start..whole.start()];
        segment_start = whole.end();

        let content = inner.as_str().trim();
        let lowered = content.to_lowercase();
        if METADATA_KEYWORDS.iter().any(|k| lowered.contains(k)) {
            continue;
        }

        let acronym = TRAILING_YEAR_RE.replace(content, "");
        if !is_acronym_token(&acronym) {
            continue;
        }

        let full_name = clean_full_name(preceding)
            .filter(|name| name.chars().count() > 2 * acronym.chars().count());

        candidates.push(AcronymCandidate {
            acronym: acronym.into_owned(),
            full_name,
        });
    }

    candidates
}

/// A single token shaped like an acronym: starts upper-case, at most 20
/// characters, and at least half of its letters upper-case.
pub fn is_acronym_token(token: &str) -> bool {
    ACRONYM_RE.is_match(token) && uppercase_density(token) >= 0.5
}

/// Whether a whole raw input looks like a bare acronym ("JMLR", "IEEE-TPAMI")
pub fn is_standalone_acronym(raw: &str) -> bool {
    let trimmed = raw.trim();
    let len = trimmed.chars().count();
    (2..=10).contains(&len) && uppercase_density(trimmed) >= 0.5
}

/// Share of upper-case letters among alphabetic characters; separators and
/// digits are ignored.
fn uppercase_density(s: &str) -> f64 {
    let letters = s.chars().filter(|c| c.is_alphabetic()).count();
    if letters == 0 {
        return 0.0;
    }
    let upper = s.chars().filter(|c| c.is_uppercase()).count();
    upper as f64 / letters as f64
}

fn clean_full_name(preceding: &str) -> Option<String> {
    let without_braces: String = preceding.chars().filter(|c| !matches!(c, '{' | '}')).collect();
    let name = collapse_whitespace(&without_braces);
    let name = name
        .trim_matches(|c: char| matches!(c, ',' | ';' | ':' | '-' | '/') || c.is_whitespace())
        .to_string();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_acronym_with_full_name() {
        let found = extract_acronym_candidates("International Conference on Machine Learning (ICML)");
        assert_eq!(
            found,
            vec![AcronymCandidate {
                acronym: "ICML".to_string(),
                full_name: Some("International Conference on Machine Learning".to_string()),
            }]
        );
    }

    #[test]
    fn test_year_inside_parenthesis_is_dropped() {
        let found = extract_acronym_candidates("Advances in Neural Information Processing Systems (NeurIPS 2023)");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].acronym, "NeurIPS");
    }

    #[test]
    fn test_metadata_and_lowercase_parentheticals_are_ignored() {
        assert!(extract_acronym_candidates("Journal of Foo (Online)").is_empty());
        assert!(extract_acronym_candidates("Journal of Foo (ISSN 1234-5678)").is_empty());
        assert!(extract_acronym_candidates("Journal of Foo (Print ED)").is_empty());
        assert!(extract_acronym_candidates("Foo Letters (berlin)").is_empty());
        assert!(extract_acronym_candidates("Foo Letters (Berlin)").is_empty());
    }

    #[test]
    fn test_short_preceding_text_is_not_a_full_name() {
        let found = extract_acronym_candidates("Proc (ACMMM)");
        assert_eq!(found[0].acronym, "ACMMM");
        assert_eq!(found[0].full_name, None);
    }

    #[test]
    fn test_standalone_acronym_detection() {
        assert!(is_standalone_acronym("JMLR"));
        assert!(is_standalone_acronym("IEEE-TPAMI"));
        assert!(is_standalone_acronym("NeurIPS"));
        assert!(!is_standalone_acronym("Nature"));
        assert!(!is_standalone_acronym("X"));
        assert!(!is_standalone_acronym("ACM Transactions on Graphics"));
    }
}
