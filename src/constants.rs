//! Static dictionaries and limits shared across the normalizer, learner and
//! batch processor.

use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

/// Raw venue strings longer than this are rejected before normalization
pub const MAX_INPUT_LENGTH: usize = 1000;

/// Hard ceiling for the Stage 1 worker pool
pub const MAX_WORKERS: usize = 8;

/// Default floor for learned abbreviations handed to the equivalence checker
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.05;

/// Similarity ratio a spelling variant must exceed
pub const SPELLING_VARIANT_RATIO: f64 = 0.85;

/// A prefix abbreviation covering at least this share of the expanded token
/// counts as an unusually long prefix
pub const LONG_PREFIX_RATIO: f64 = 0.75;

pub const CONFIDENCE_LONG_PREFIX: f64 = 0.7;
pub const CONFIDENCE_SPELLING_VARIANT: f64 = 0.7;
pub const CONFIDENCE_INITIALISM: f64 = 0.6;
pub const CONFIDENCE_PREFIX: f64 = 0.5;
pub const CONFIDENCE_DEFAULT: f64 = 0.3;

/// Abbreviated citation forms and their expansions. Keys are lowercase and
/// keep their terminal period.
pub const ABBREVIATION_TABLE: &[(&str, &str)] = &[
    ("int.", "International"),
    ("intl.", "International"),
    ("internat.", "International"),
    ("conf.", "Conference"),
    ("proc.", "Proceedings"),
    ("j.", "Journal"),
    ("jour.", "Journal"),
    ("trans.", "Transactions"),
    ("symp.", "Symposium"),
    ("natl.", "National"),
    ("nat.", "National"),
    ("res.", "Research"),
    ("sci.", "Science"),
    ("technol.", "Technology"),
    ("tech.", "Technology"),
    ("eng.", "Engineering"),
    ("comput.", "Computing"),
    ("rev.", "Review"),
    ("lett.", "Letters"),
    ("assoc.", "Association"),
    ("soc.", "Society"),
    ("manag.", "Management"),
    ("mgmt.", "Management"),
    ("appl.", "Applied"),
    ("adv.", "Advances"),
    ("ann.", "Annals"),
    ("bull.", "Bulletin"),
    ("inf.", "Information"),
    ("syst.", "Systems"),
    ("med.", "Medicine"),
    ("educ.", "Education"),
    ("environ.", "Environmental"),
    ("econ.", "Economics"),
    ("math.", "Mathematics"),
    ("phys.", "Physics"),
    ("chem.", "Chemistry"),
    ("biol.", "Biology"),
    ("am.", "American"),
    ("eur.", "European"),
    ("q.", "Quarterly"),
    ("annu.", "Annual"),
    ("commun.", "Communications"),
    ("process.", "Processing"),
    ("anal.", "Analysis"),
    ("stud.", "Studies"),
    ("dev.", "Development"),
];

pub static ABBREVIATIONS: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| ABBREVIATION_TABLE.iter().copied().collect());

/// Lowercase expansion -> preferred abbreviation (first entry in the table wins)
pub static REVERSE_ABBREVIATIONS: Lazy<HashMap<String, &'static str>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for (abbrev, expanded) in ABBREVIATION_TABLE {
        map.entry(expanded.to_lowercase()).or_insert(*abbrev);
    }
    map
});

/// Acronyms kept in all caps by title casing
pub static ACRONYM_ALLOWLIST: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "IEEE", "ACM", "AAAI", "IJCAI", "SIAM", "SPIE", "IFIP", "USENIX", "ACL", "NAACL",
        "EMNLP", "ICML", "ICLR", "NEURIPS", "NIPS", "CVPR", "ICCV", "ECCV", "KDD", "SIGMOD",
        "VLDB", "ICDE", "WWW", "CHI", "UIST", "IEICE", "IET", "AMS", "APS", "BMC", "PLOS",
        "MDPI", "ASME", "ASCE", "AIAA", "SIGIR", "SIGCOMM", "SIGGRAPH", "OSDI", "SOSP",
        "NSDI", "ISCA", "ICSE", "FSE", "PLDI", "POPL", "AI", "ML", "NLP",
        "IOT", "USA", "UK", "EU",
    ]
    .into_iter()
    .collect()
});

/// Words kept lowercase by title casing unless they open the name
pub static TITLE_CASE_STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "an", "and", "as", "at", "but", "by", "for", "from", "in", "into", "of", "on",
        "or", "the", "to", "with", "via", "und", "für", "de", "des", "du", "la", "le",
    ]
    .into_iter()
    .collect()
});

/// Words skipped when computing initialisms
pub static INITIALISM_STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    ["a", "an", "the", "of", "in", "on", "for"].into_iter().collect()
});

/// Function words ignored when comparing two venue names token by token
pub static COMPARISON_STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    ["a", "an", "the", "of", "in", "on", "for", "and", "&", "at", "to"]
        .into_iter()
        .collect()
});

/// Parenthetical content containing any of these is publication metadata,
/// never an acronym
pub const METADATA_KEYWORDS: &[&str] = &[
    "issn",
    "doi",
    "online",
    "print",
    "invited",
    "accepted",
    "to appear",
];

/// Leading phrases dropped when generating aliases
pub const ALIAS_PREFIXES: &[&str] = &["journal of ", "the ", "proceedings of "];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abbreviation_keys_are_lowercase_with_period() {
        for (abbrev, _) in ABBREVIATION_TABLE {
            assert_eq!(*abbrev, abbrev.to_lowercase());
            assert!(abbrev.ends_with('.'), "{} must end with a period", abbrev);
        }
    }

    #[test]
    fn test_reverse_table_prefers_first_entry() {
        assert_eq!(REVERSE_ABBREVIATIONS.get("international"), Some(&"int."));
        assert_eq!(REVERSE_ABBREVIATIONS.get("journal"), Some(&"j."));
    }
}
