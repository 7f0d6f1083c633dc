use once_cell::sync::Lazy;
use regex::Regex;

static YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:19|20)[0-9]{2}(?:/[0-9]{2})?\b").unwrap());
static ORDINAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b[0-9]+(?:st|nd|rd|th)\b").unwrap());
static PROCEEDINGS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*proceedings\s+of\s+(?:the\s+)?").unwrap());
static EMPTY_PARENS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[(\[]\s*[)\]]").unwrap());
static WS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

pub fn collapse_whitespace(s: &str) -> String {
    WS_RE.replace_all(s.trim(), " ").into_owned()
}

/// Strip years, ordinals and a leading "proceedings of" to get the form a
/// recurring conference shares across editions.
///
/// Returns `None` when nothing was stripped; callers then fall back to the
/// lowercase original as their comparison key.
pub fn extract_conference_series(name: &str) -> Option<String> {
    let original = collapse_whitespace(name);

    let stripped = PROCEEDINGS_RE.replace(&original, "");
    let stripped = YEAR_RE.replace_all(&stripped, " ");
    let stripped = ORDINAL_RE.replace_all(&stripped, " ");
    let stripped = EMPTY_PARENS_RE.replace_all(&stripped, " ");
    let stripped = collapse_whitespace(&stripped);
    let stripped = stripped
        .trim_matches(|c: char| matches!(c, ',' | ';' | ':' | '-' | '\'' | '/') || c.is_whitespace())
        .to_string();

    if stripped.is_empty() || stripped == original {
        None
    } else {
        Some(stripped)
    }
}

/// Lowercase, whitespace-collapsed series form used as the stored
/// `normalized_name` of an acronym variant.
pub fn series_key(name: &str) -> String {
    let lower = collapse_whitespace(&name.to_lowercase());
    extract_conference_series(&lower).unwrap_or(lower)
}
