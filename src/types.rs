use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::VenueError;

/// Kind of publication outlet an acronym belongs to. Acronyms are only
/// unique within one entity type ("JMLR" the journal vs a workshop).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Journal,
    Conference,
    Workshop,
    Symposium,
    Unknown,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Journal => "journal",
            EntityType::Conference => "conference",
            EntityType::Workshop => "workshop",
            EntityType::Symposium => "symposium",
            EntityType::Unknown => "unknown",
        }
    }

    /// Map a BibTeX entry type onto a venue kind, refined by the venue name
    /// for proceedings that are really workshops or symposia.
    pub fn from_entry_type(entry_type: &str, venue_name: &str) -> Self {
        let venue_lower = venue_name.to_lowercase();
        match entry_type.to_lowercase().as_str() {
            "article" | "periodical" => EntityType::Journal,
            "inproceedings" | "conference" | "proceedings" => {
                if venue_lower.contains("workshop") {
                    EntityType::Workshop
                } else if venue_lower.contains("symposium") {
                    EntityType::Symposium
                } else {
                    EntityType::Conference
                }
            }
            _ => EntityType::Unknown,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = VenueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "journal" => Ok(EntityType::Journal),
            "conference" => Ok(EntityType::Conference),
            "workshop" => Ok(EntityType::Workshop),
            "symposium" => Ok(EntityType::Symposium),
            "unknown" => Ok(EntityType::Unknown),
            other => Err(VenueError::Validation(format!("unknown entity type: {}", other))),
        }
    }
}

/// Identifiers pulled out of a raw venue string before any cleaning
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifiers {
    pub issn: Option<String>,
    pub doi: Option<String>,
}

impl Identifiers {
    pub fn is_empty(&self) -> bool {
        self.issn.is_none() && self.doi.is_none()
    }
}

/// One stored name variant of an acronym
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcronymVariant {
    pub id: i64,
    pub acronym: String,
    pub entity_type: EntityType,
    pub variant_name: String,
    pub normalized_name: String,
    pub usage_count: u32,
    pub is_canonical: bool,
    pub is_ambiguous: bool,
    pub source: Option<String>,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

/// A persisted abbreviation -> expansion pair with its trust score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnedAbbreviation {
    pub abbreviated_form: String,
    pub expanded_form: String,
    pub confidence_score: f64,
    pub occurrence_count: u32,
    pub context: Option<String>,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

/// In-memory view of the learned-abbreviation table:
/// abbreviation -> expansions sorted by confidence, highest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LearnedAbbreviations {
    entries: HashMap<String, Vec<(String, f64)>>,
}

impl LearnedAbbreviations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or raise an expansion. Keys and values are stored lowercase.
    pub fn insert(&mut self, abbreviated: &str, expanded: &str, confidence: f64) {
        let expanded = expanded.to_lowercase();
        let list = self.entries.entry(abbreviated.to_lowercase()).or_default();
        match list.iter_mut().find(|(e, _)| *e == expanded) {
            Some(existing) => existing.1 = existing.1.max(confidence),
            None => list.push((expanded, confidence)),
        }
        list.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    }

    pub fn expansions(&self, abbreviated: &str) -> &[(String, f64)] {
        self.entries
            .get(abbreviated)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// True when `expanded` is a known expansion of `abbreviated`
    pub fn maps_to(&self, abbreviated: &str, expanded: &str) -> bool {
        self.expansions(abbreviated).iter().any(|(e, _)| e == expanded)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<(String, f64)>)> {
        self.entries.iter()
    }
}

/// Outcome of comparing a candidate name against what the store holds.
/// `has_conflict` and `already_exists` are never both set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcronymConflictCheck {
    pub has_conflict: bool,
    pub already_exists: bool,
    pub existing_name: Option<String>,
}

/// A normalized name with how often it was observed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameCount {
    pub name: String,
    pub count: u32,
}

impl NameCount {
    pub fn new(name: impl Into<String>, count: u32) -> Self {
        Self {
            name: name.into(),
            count,
        }
    }
}
