//! Abbreviation discovery from pairs of venue-name variants.
//!
//! Given two spellings of the same venue ("ieee int. conf. image process."
//! and "ieee international conference on image processing") the learner
//! aligns them token by token and reports every replaced token pair that
//! looks like an abbreviation, with a first-observation confidence. Nothing
//! here touches the store; callers persist what they want to keep.

pub mod alignment;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::{
    COMPARISON_STOPWORDS, CONFIDENCE_DEFAULT, CONFIDENCE_INITIALISM, CONFIDENCE_LONG_PREFIX,
    CONFIDENCE_PREFIX, CONFIDENCE_SPELLING_VARIANT, INITIALISM_STOPWORDS, LONG_PREFIX_RATIO,
    SPELLING_VARIANT_RATIO,
};
use alignment::{similarity_ratio, OpTag, SequenceMatcher};

/// Which rule recognized an abbreviation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbbreviationPattern {
    /// "conf." -> "conference"
    Prefix,
    /// "cv" -> "computer vision"
    Initialism,
    /// "modelling" <-> "modeling"
    SpellingVariant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnedMapping {
    pub abbreviated: String,
    pub expanded: String,
    pub confidence: f64,
    pub pattern: AbbreviationPattern,
}

/// Lowercase whitespace tokenization. Trailing punctuation is dropped except
/// a terminal period, which marks an abbreviation and is kept.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(|token| {
            token
                .trim_start_matches(|c: char| c.is_ascii_punctuation())
                .trim_end_matches(|c: char| c.is_ascii_punctuation() && c != '.')
                .to_string()
        })
        .filter(|token| !token.is_empty())
        .collect()
}

/// Whether `short` abbreviates `long` under any of the known patterns
pub fn is_valid_abbreviation(short: &str, long: &str) -> bool {
    classify_abbreviation(short, long).is_some()
}

/// Try the prefix, initialism and spelling-variant rules in that order
pub fn classify_abbreviation(short: &str, long: &str) -> Option<AbbreviationPattern> {
    if is_prefix_abbreviation(short, long) {
        Some(AbbreviationPattern::Prefix)
    } else if is_initialism(short, long) {
        Some(AbbreviationPattern::Initialism)
    } else if is_spelling_variant(short, long) {
        Some(AbbreviationPattern::SpellingVariant)
    } else {
        None
    }
}

/// "int." abbreviates "international": the part before the period is a
/// prefix of the long token, and at least three characters were dropped.
fn is_prefix_abbreviation(short: &str, long: &str) -> bool {
    let Some(prefix) = short.strip_suffix('.') else {
        return false;
    };
    if prefix.is_empty() {
        return false;
    }
    let prefix = prefix.to_lowercase();
    let long = long.to_lowercase();
    long.starts_with(&prefix) && long.chars().count() >= prefix.chars().count() + 3
}

/// "cv" abbreviates "computer vision": the short token matches the initials
/// of the long form's content words.
fn is_initialism(short: &str, long: &str) -> bool {
    if short.chars().count() < 2 || !short.chars().all(|c| c.is_alphabetic()) {
        return false;
    }
    let initials: String = long
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .filter(|w| !INITIALISM_STOPWORDS.contains(w.as_str()))
        .filter_map(|w| w.chars().next())
        .collect();
    initials == short.to_lowercase()
}

/// "modelling" vs "modeling": two near-identical full words that are not a
/// singular/plural pair.
fn is_spelling_variant(a: &str, b: &str) -> bool {
    if a.ends_with('.') || b.ends_with('.') {
        return false;
    }
    if a.chars().count() <= 3 || b.chars().count() <= 3 {
        return false;
    }
    let strip = |s: &str| -> String {
        s.chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase()
    };
    let (a, b) = (strip(a), strip(b));
    if a == b || is_plural_pair(&a, &b) {
        return false;
    }
    similarity_ratio(&a, &b) > SPELLING_VARIANT_RATIO
}

fn is_plural_pair(a: &str, b: &str) -> bool {
    let plural_of = |singular: &str, plural: &str| {
        plural == format!("{}s", singular) || plural == format!("{}es", singular)
    };
    plural_of(a, b) || plural_of(b, a)
}

/// Confidence assigned the first time a mapping is observed
pub fn initial_confidence(short: &str, long: &str, pattern: Option<AbbreviationPattern>) -> f64 {
    match pattern {
        Some(AbbreviationPattern::Prefix) => {
            let prefix_len = short.trim_end_matches('.').chars().count() as f64;
            let long_len = long.chars().count() as f64;
            if prefix_len >= LONG_PREFIX_RATIO * long_len {
                CONFIDENCE_LONG_PREFIX
            } else {
                CONFIDENCE_PREFIX
            }
        }
        Some(AbbreviationPattern::SpellingVariant) => CONFIDENCE_SPELLING_VARIANT,
        Some(AbbreviationPattern::Initialism) => CONFIDENCE_INITIALISM,
        None => CONFIDENCE_DEFAULT,
    }
}

/// Confidence after `occurrence_count` observations:
/// `min(1, 0.1 + 0.3 * log10(occurrence_count + 1))`.
pub fn reinforced_confidence(occurrence_count: u32) -> f64 {
    (0.1 + 0.3 * (f64::from(occurrence_count) + 1.0).log10()).min(1.0)
}

/// Stateless abbreviation learner
#[derive(Debug, Clone, Default)]
pub struct AbbreviationLearner;

impl AbbreviationLearner {
    pub fn new() -> Self {
        Self
    }

    /// Align two variants of one venue name and return the abbreviation
    /// mappings found, in left-to-right order.
    pub fn learn_abbreviations_from_pair(&self, short: &str, long: &str) -> Vec<LearnedMapping> {
        let short_tokens = tokenize(short);
        let long_tokens = tokenize(long);
        let matcher = SequenceMatcher::new(&short_tokens, &long_tokens);

        let mut mappings: Vec<LearnedMapping> = Vec::new();
        for op in matcher.opcodes() {
            let a = &short_tokens[op.a_start..op.a_end];
            let b = &long_tokens[op.b_start..op.b_end];
            match op.tag {
                OpTag::Equal => {}
                OpTag::Delete | OpTag::Insert => {
                    debug!("Ignoring unaligned tokens {:?} / {:?}", a, b);
                }
                OpTag::Replace => {
                    for (s, l) in pair_chunks(a, b) {
                        for mapping in evaluate_pair(s, l) {
                            if !mappings
                                .iter()
                                .any(|m| m.abbreviated == mapping.abbreviated && m.expanded == mapping.expanded)
                            {
                                mappings.push(mapping);
                            }
                        }
                    }
                }
            }
        }
        mappings
    }
}

/// Pair replaced tokens 1:1. Chunks of different lengths are retried with
/// stopwords removed, since "int. conf. image" vs "international conference
/// on image" differ only by a function word.
fn pair_chunks<'t>(a: &'t [String], b: &'t [String]) -> Vec<(&'t str, &'t str)> {
    if a.len() == b.len() {
        return a.iter().zip(b).map(|(s, l)| (s.as_str(), l.as_str())).collect();
    }
    let content = |chunk: &'t [String]| -> Vec<&'t str> {
        chunk
            .iter()
            .map(|t| t.as_str())
            .filter(|t| !COMPARISON_STOPWORDS.contains(t))
            .collect()
    };
    let (a_content, b_content) = (content(a), content(b));
    if a_content.len() == b_content.len() {
        a_content.into_iter().zip(b_content).collect()
    } else {
        debug!("Skipping unequal replace chunks {:?} / {:?}", a, b);
        Vec::new()
    }
}

fn evaluate_pair(s: &str, l: &str) -> Vec<LearnedMapping> {
    if s == l {
        return Vec::new();
    }
    let mapping = |abbreviated: &str, expanded: &str, pattern: AbbreviationPattern| LearnedMapping {
        abbreviated: abbreviated.to_string(),
        expanded: expanded.to_string(),
        confidence: initial_confidence(abbreviated, expanded, Some(pattern)),
        pattern,
    };

    match classify_abbreviation(s, l) {
        Some(AbbreviationPattern::SpellingVariant) => vec![
            mapping(s, l, AbbreviationPattern::SpellingVariant),
            mapping(l, s, AbbreviationPattern::SpellingVariant),
        ],
        Some(pattern) => vec![mapping(s, l, pattern)],
        // The abbreviated token may sit on the "long" side of the pair
        None => match classify_abbreviation(l, s) {
            Some(pattern @ (AbbreviationPattern::Prefix | AbbreviationPattern::Initialism)) => {
                vec![mapping(l, s, pattern)]
            }
            _ => Vec::new(),
        },
    }
}
