//! Venue name normalization.
//!
//! Turns a raw venue string as it appears in citation data ("Proc. of the
//! 40th Int. Conf. on Machine Learning (ICML 2023)") into a cleaned,
//! title-cased name plus everything useful that was found on the way:
//! ISSN/DOI identifiers, acronym candidates, acronym -> full-name pairs for
//! the caller to persist, and alias spellings.

pub mod acronyms;
pub mod casing;
pub mod identifiers;
pub mod series;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::{ALIAS_PREFIXES, MAX_INPUT_LENGTH};
use crate::error::{Result, VenueError};
use crate::metrics::NormalizeMetrics;
use crate::types::Identifiers;

pub use acronyms::{extract_acronym_candidates, is_standalone_acronym, AcronymCandidate};
pub use series::{collapse_whitespace, extract_conference_series, series_key};

static HTML_ENTITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[a-zA-Z]+);").unwrap());
static BRACKETED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[[^\[\]]*\]").unwrap());
static PARENTHETICAL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\([^()]*\)").unwrap());
static SPACE_BEFORE_PUNCT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+([,.;:!?])").unwrap());
static MISSING_SPACE_AFTER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([,;:])(\S)").unwrap());

/// Resolves a bare acronym to a full venue name, typically backed by the
/// acronym store.
pub type AcronymLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Output of [`TextNormalizer::normalize`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedVenue {
    pub raw_input: String,
    pub normalized_name: String,
    pub identifiers: Identifiers,
    pub aliases: Vec<String>,
    /// Set when the raw input was a bare acronym resolved through the lookup
    pub acronym_expanded_from: Option<String>,
    /// Every acronym seen in parentheses, with or without a full name
    pub acronym_candidates: Vec<String>,
    /// (acronym, full name) pairs found as "Full Name (ACRONYM)"
    pub extracted_acronym_mappings: Vec<(String, String)>,
}

impl NormalizedVenue {
    /// Lowercase series form of the normalized name, the key the acronym
    /// store compares on.
    pub fn series_key(&self) -> String {
        series_key(&self.normalized_name)
    }
}

/// Stateless normalization service. Construct once and pass it to whatever
/// needs it; it holds no caches or global state.
#[derive(Debug, Clone)]
pub struct TextNormalizer {
    max_input_length: usize,
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self {
            max_input_length: MAX_INPUT_LENGTH,
        }
    }
}

impl TextNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize a raw venue name.
    ///
    /// The only side effect is the optional `acronym_lookup` call, made when
    /// the whole input looks like a bare acronym.
    pub fn normalize(
        &self,
        raw: &str,
        acronym_lookup: Option<AcronymLookup<'_>>,
    ) -> Result<NormalizedVenue> {
        self.validate(raw)?;

        let (identifiers, identifier_spans) = identifiers::extract_identifiers(raw);
        let candidates = extract_acronym_candidates(raw);

        let cleaned = self.clean(raw, &identifier_spans);
        let expanded = casing::expand_abbreviations(&cleaned);
        let normalized_name = casing::title_case(&expanded);

        let mut aliases = self.generate_aliases(&normalized_name);

        let mut acronym_expanded_from = None;
        if let Some(lookup) = acronym_lookup {
            let trimmed = raw.trim();
            if is_standalone_acronym(trimmed) {
                if let Some(expansion) = lookup(trimmed) {
                    debug!("Expanded acronym '{}' to '{}'", trimmed, expansion);
                    push_alias(&mut aliases, &normalized_name, expansion.clone());
                    push_alias(&mut aliases, &normalized_name, casing::title_case(&expansion));
                    acronym_expanded_from = Some(trimmed.to_string());
                    NormalizeMetrics::record_acronym_expanded();
                }
            }
        }

        let extracted_acronym_mappings: Vec<(String, String)> = candidates
            .iter()
            .filter_map(|c| c.full_name.clone().map(|name| (c.acronym.clone(), name)))
            .collect();

        NormalizeMetrics::record_normalized(extracted_acronym_mappings.len());

        Ok(NormalizedVenue {
            raw_input: raw.to_string(),
            normalized_name,
            identifiers,
            aliases,
            acronym_expanded_from,
            acronym_candidates: candidates.into_iter().map(|c| c.acronym).collect(),
            extracted_acronym_mappings,
        })
    }

    fn validate(&self, raw: &str) -> Result<()> {
        if raw.trim().is_empty() {
            NormalizeMetrics::record_rejected();
            return Err(VenueError::Validation("venue name is empty".to_string()));
        }
        let len = raw.chars().count();
        if len > self.max_input_length {
            NormalizeMetrics::record_rejected();
            return Err(VenueError::Validation(format!(
                "venue name is {} characters, limit is {}",
                len, self.max_input_length
            )));
        }
        Ok(())
    }

    /// Strip markup, identifiers and bracketed content, then tidy whitespace
    /// and punctuation spacing.
    fn clean(&self, raw: &str, identifier_spans: &[String]) -> String {
        let text = decode_html_entities(raw);
        let text = identifiers::strip_identifiers(&text, identifier_spans);
        let text = text.replace("\\&", "&");

        let mut text = text;
        loop {
            let next = PARENTHETICAL_RE.replace_all(&text, " ");
            let next = BRACKETED_RE.replace_all(&next, " ").into_owned();
            if next == text {
                break;
            }
            text = next;
        }
        let text: String = text.chars().filter(|c| !matches!(c, '{' | '}')).collect();

        let text = collapse_whitespace(&text);
        let text = SPACE_BEFORE_PUNCT_RE.replace_all(&text, "$1");
        let text = MISSING_SPACE_AFTER_RE.replace_all(&text, "$1 $2");
        let text = text
            .trim_matches(|c: char| matches!(c, ',' | ';' | ':' | '-' | '(' | ')') || c.is_whitespace())
            .to_string();

        if text.is_empty() {
            // Nothing but bracketed content, e.g. "(ICML)": keep the inner text
            let fallback: String = raw.chars().filter(|c| !matches!(c, '(' | ')' | '[' | ']' | '{' | '}')).collect();
            return collapse_whitespace(&fallback);
        }
        text
    }

    /// Prefix-stripped form, series form and reverse-abbreviated form
    fn generate_aliases(&self, normalized_name: &str) -> Vec<String> {
        let mut aliases = Vec::new();

        let mut stripped = normalized_name.to_string();
        while let Some(rest) = strip_alias_prefix(&stripped) {
            stripped = rest;
        }
        push_alias(&mut aliases, normalized_name, stripped);

        if let Some(series) = extract_conference_series(normalized_name) {
            push_alias(&mut aliases, normalized_name, series);
        }

        push_alias(&mut aliases, normalized_name, casing::reverse_abbreviate(normalized_name));
        aliases
    }
}

fn strip_alias_prefix(name: &str) -> Option<String> {
    let lower = name.to_lowercase();
    ALIAS_PREFIXES.iter().find_map(|prefix| {
        if lower.starts_with(prefix) {
            name.get(prefix.len()..)
                .map(|rest| rest.trim().to_string())
                .filter(|rest| !rest.is_empty())
        } else {
            None
        }
    })
}

fn push_alias(aliases: &mut Vec<String>, normalized_name: &str, alias: String) {
    if !alias.is_empty() && alias != normalized_name && !aliases.contains(&alias) {
        aliases.push(alias);
    }
}

fn decode_html_entities(text: &str) -> String {
    HTML_ENTITY_RE
        .replace_all(text, |caps: &Captures| {
            let entity = &caps[1];
            match entity {
                "amp" => "&".to_string(),
                "quot" => "\"".to_string(),
                "apos" => "'".to_string(),
                "nbsp" => " ".to_string(),
                _ if entity.starts_with("#x") || entity.starts_with("#X") => {
                    u32::from_str_radix(&entity[2..], 16)
                        .ok()
                        .and_then(char::from_u32)
                        .map(|c| c.to_string())
                        .unwrap_or_default()
                }
                _ if entity.starts_with('#') => entity[1..]
                    .parse::<u32>()
                    .ok()
                    .and_then(char::from_u32)
                    .map(|c| c.to_string())
                    .unwrap_or_default(),
                _ => String::new(),
            }
        })
        .into_owned()
}
