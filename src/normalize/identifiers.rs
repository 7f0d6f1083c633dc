use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::Identifiers;

// ASCII digits only: `\d` would also accept other scripts' digits
static ISSN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[0-9]{4}-?[0-9]{3}[0-9Xx]\b").unwrap());
static DOI_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"10\.[0-9]{4,}\S*").unwrap());
// A label directly in front of an extracted identifier
static TRAILING_LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:e-?issn|p-?issn|issn|doi)\s*:?\s*$").unwrap());

/// Identifiers found in `raw` plus the exact substrings they came from, so
/// the cleaning pass can cut them out of the name.
pub fn extract_identifiers(raw: &str) -> (Identifiers, Vec<String>) {
    let mut spans = Vec::new();

    // DOIs first: their digit runs would otherwise be mistaken for an ISSN
    let doi = DOI_RE.find(raw).map(|m| {
        let doi = m
            .as_str()
            .trim_end_matches(|c: char| matches!(c, '.' | ',' | ';' | ')' | ']' | '}'))
            .to_string();
        spans.push(doi.clone());
        doi
    });

    let issn = ISSN_RE
        .find_iter(raw)
        .map(|m| m.as_str())
        .find(|candidate| doi.as_deref().map_or(true, |d| !d.contains(candidate)))
        .map(|m| {
            spans.push(m.to_string());
            canonical_issn(m)
        });

    (Identifiers { issn, doi }, spans)
}

/// Remove identifier substrings together with an "ISSN:"/"doi:" label right
/// before them. Labels elsewhere are part of the name and stay.
pub fn strip_identifiers(text: &str, spans: &[String]) -> String {
    let mut out = text.to_string();
    for span in spans.iter().filter(|s| !s.is_empty()) {
        while let Some(pos) = out.find(span.as_str()) {
            let head = TRAILING_LABEL_RE.replace(&out[..pos], "");
            out = format!("{} {}", head, &out[pos + span.len()..]);
        }
    }
    out
}

/// ISSNs are stored hyphenated and upper-case ("12345678" -> "1234-5678")
fn canonical_issn(raw: &str) -> String {
    let compact: Vec<char> = raw
        .chars()
        .filter(|c| *c != '-')
        .map(|c| c.to_ascii_uppercase())
        .collect();
    let split = compact.len().min(4);
    let head: String = compact[..split].iter().collect();
    let tail: String = compact[split..].iter().collect();
    format!("{}-{}", head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_issn_and_doi() {
        let (ids, spans) = extract_identifiers("Journal of Foo (ISSN 1234-567x) doi:10.1016/j.foo.2020.01.001.");
        assert_eq!(ids.issn.as_deref(), Some("1234-567X"));
        assert_eq!(ids.doi.as_deref(), Some("10.1016/j.foo.2020.01.001"));
        assert_eq!(spans.len(), 2);
    }

    #[test]
    fn test_unhyphenated_issn_is_canonicalized() {
        let (ids, _) = extract_identifiers("Acta Foo 03781119");
        assert_eq!(ids.issn.as_deref(), Some("0378-1119"));
        assert!(ids.doi.is_none());
    }

    #[test]
    fn test_plain_name_has_no_identifiers() {
        let (ids, spans) = extract_identifiers("International Conference on Machine Learning");
        assert!(ids.is_empty());
        assert!(spans.is_empty());
    }

    #[test]
    fn test_strip_removes_spans_and_labels() {
        let (_, spans) = extract_identifiers("Foo Letters ISSN: 1234-5678");
        let cleaned = strip_identifiers("Foo Letters ISSN: 1234-5678", &spans);
        assert_eq!(cleaned.trim(), "Foo Letters");
    }

    #[test]
    fn test_non_ascii_digits_are_not_identifiers() {
        let (ids, spans) = extract_identifiers("Journal of Foo ०१२३-४५६७");
        assert!(ids.is_empty());
        assert!(spans.is_empty());

        let (ids, _) = extract_identifiers("Journal of Foo ०१२३-४५६७ ISSN 2049-3630");
        assert_eq!(ids.issn.as_deref(), Some("2049-3630"));
    }

    #[test]
    fn test_labels_without_identifier_are_kept() {
        assert_eq!(strip_identifiers("DOI Letters", &[]), "DOI Letters");
        let (_, spans) = extract_identifiers("ISSN Bulletin, ISSN: 1234-5678");
        let cleaned = strip_identifiers("ISSN Bulletin, ISSN: 1234-5678", &spans);
        assert_eq!(cleaned.trim(), "ISSN Bulletin,");
    }
}
