use crate::constants::{ABBREVIATIONS, ACRONYM_ALLOWLIST, REVERSE_ABBREVIATIONS, TITLE_CASE_STOPWORDS};

/// Split a word into (core, trailing punctuation), keeping a terminal period
/// on the core so "Conf.," becomes ("Conf.", ",").
fn split_trailing(word: &str) -> (&str, &str) {
    let core = word.trim_end_matches(|c: char| c.is_ascii_punctuation() && c != '.');
    (core, &word[core.len()..])
}

/// Expand abbreviated citation forms ("Int. Conf." -> "International Conference")
pub fn expand_abbreviations(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let (core, tail) = split_trailing(word);
            match ABBREVIATIONS.get(core.to_lowercase().as_str()) {
                Some(expanded) => format!("{}{}", expanded, tail),
                None => word.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Inverse of [`expand_abbreviations`]: "International Conference" -> "Int. Conf."
pub fn reverse_abbreviate(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let (core, tail) = split_trailing(word);
            match REVERSE_ABBREVIATIONS.get(&core.to_lowercase()) {
                Some(abbrev) => format!("{}{}", capitalize(abbrev), tail),
                None => word.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Title-case a venue name. Allow-listed acronyms stay upper-case, words with
/// deliberate inner capitals ("NeurIPS") are left alone, and stopwords are
/// lower-cased except at the start.
pub fn title_case(text: &str) -> String {
    text.split_whitespace()
        .enumerate()
        .map(|(i, word)| {
            word.split('-')
                .enumerate()
                .map(|(j, part)| case_part(part, i == 0 && j == 0))
                .collect::<Vec<_>>()
                .join("-")
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn case_part(part: &str, is_first: bool) -> String {
    let letters: String = part.chars().filter(|c| c.is_alphanumeric()).collect();
    if letters.is_empty() {
        return part.to_string();
    }
    if ACRONYM_ALLOWLIST.contains(letters.to_uppercase().as_str()) {
        return part.to_uppercase();
    }
    if has_inner_capital(part) {
        return part.to_string();
    }
    let lower = part.to_lowercase();
    if !is_first && TITLE_CASE_STOPWORDS.contains(letters.to_lowercase().as_str()) {
        return lower;
    }
    capitalize(&lower)
}

/// Mixed case such as "NeurIPS" or "LaTeX": an upper-case letter that follows
/// a lower-case one.
fn has_inner_capital(word: &str) -> bool {
    let chars: Vec<char> = word.chars().collect();
    chars.windows(2).any(|w| w[0].is_lowercase() && w[1].is_uppercase())
}

fn capitalize(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    let mut done = false;
    for c in word.chars() {
        if !done && c.is_alphabetic() {
            out.extend(c.to_uppercase());
            done = true;
        } else {
            out.push(c);
        }
    }
    out
}
