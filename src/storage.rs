use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::equivalence::are_conference_names_equivalent;
use crate::error::{Result, VenueError};
use crate::learning::reinforced_confidence;
use crate::metrics::StoreMetrics;
use crate::normalize::series_key;
use crate::types::{
    AcronymConflictCheck, AcronymVariant, EntityType, LearnedAbbreviation, LearnedAbbreviations,
};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS venue_acronym_variants (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        acronym          TEXT NOT NULL COLLATE NOCASE,
        entity_type      TEXT NOT NULL,
        variant_name     TEXT NOT NULL,
        normalized_name  TEXT NOT NULL,
        usage_count      INTEGER NOT NULL DEFAULT 1,
        is_canonical     INTEGER NOT NULL DEFAULT 0,
        is_ambiguous     INTEGER NOT NULL DEFAULT 0,
        source           TEXT,
        first_seen_at    TEXT NOT NULL,
        last_seen_at     TEXT NOT NULL,
        UNIQUE (acronym, entity_type, normalized_name)
    );
    CREATE INDEX IF NOT EXISTS idx_acronym_variants_group
        ON venue_acronym_variants (acronym, entity_type);
    CREATE TABLE IF NOT EXISTS learned_abbreviations (
        abbreviated_form  TEXT NOT NULL,
        expanded_form     TEXT NOT NULL,
        confidence_score  REAL NOT NULL,
        occurrence_count  INTEGER NOT NULL DEFAULT 1,
        context           TEXT,
        first_seen_at     TEXT NOT NULL,
        last_seen_at      TEXT NOT NULL,
        PRIMARY KEY (abbreviated_form, expanded_form)
    );
    CREATE INDEX IF NOT EXISTS idx_learned_abbreviations_confidence
        ON learned_abbreviations (confidence_score);
"#;

const VARIANT_COLUMNS: &str = "id, acronym, entity_type, variant_name, normalized_name, usage_count, \
     is_canonical, is_ambiguous, source, first_seen_at, last_seen_at";

/// Row counts reported by `stats`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub variants: usize,
    pub acronyms: usize,
    pub ambiguous: usize,
    pub learned: usize,
}

/// SQLite-backed record of acronym variants and learned abbreviations.
///
/// Every mutating call runs in its own transaction. The store is meant for a
/// single writer; batch workers never receive a handle to it.
pub struct AcronymStore {
    conn: Connection,
}

impl AcronymStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;
        info!("Opened acronym store at {}", path.display());
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    // Acronym variants

    /// All variants of a group, most used first, then in insertion order
    pub fn get_variants(&self, acronym: &str, entity_type: EntityType) -> Result<Vec<AcronymVariant>> {
        Ok(select_variants(&self.conn, acronym, entity_type)?)
    }

    /// Legacy last-writer-wins path: variants not leniently equivalent to
    /// `full_name` are deleted before it is recorded. Prefer [`store_variant`].
    ///
    /// [`store_variant`]: AcronymStore::store_variant
    pub fn store_acronym_mapping(
        &self,
        acronym: &str,
        full_name: &str,
        entity_type: EntityType,
        source: Option<&str>,
    ) -> Result<()> {
        let acronym = validated_acronym(acronym)?;
        let normalized = series_key(full_name);
        let tx = self.conn.unchecked_transaction()?;
        let now = Utc::now().to_rfc3339();

        let existing = select_variants(&tx, acronym, entity_type)?;
        if let Some(same) = existing.iter().find(|v| v.normalized_name == normalized) {
            tx.execute(
                "UPDATE venue_acronym_variants SET usage_count = usage_count + 1, last_seen_at = ?2 WHERE id = ?1",
                params![same.id, now],
            )?;
        } else {
            for stale in existing
                .iter()
                .filter(|v| !are_conference_names_equivalent(&v.normalized_name, &normalized))
            {
                warn!(
                    "Replacing variant '{}' of {} ({}) with '{}'",
                    stale.normalized_name, acronym, entity_type, normalized
                );
                tx.execute("DELETE FROM venue_acronym_variants WHERE id = ?1", params![stale.id])?;
            }
            insert_or_bump(&tx, acronym, full_name, &normalized, entity_type, source, 1, &now)?;
        }
        update_canonical(&tx, acronym, entity_type)?;
        tx.commit()?;
        StoreMetrics::record_variant_write();
        Ok(())
    }

    /// Additive path: record `count` observations of `variant_name` without
    /// touching other variants of the group.
    pub fn store_variant(
        &self,
        acronym: &str,
        variant_name: &str,
        entity_type: EntityType,
        source: Option<&str>,
        count: u32,
    ) -> Result<()> {
        let acronym = validated_acronym(acronym)?;
        let normalized = series_key(variant_name);
        let tx = self.conn.unchecked_transaction()?;
        let now = Utc::now().to_rfc3339();
        insert_or_bump(&tx, acronym, variant_name, &normalized, entity_type, source, count.max(1), &now)?;
        update_canonical(&tx, acronym, entity_type)?;
        tx.commit()?;
        debug!("Stored variant {} ({}) -> '{}' x{}", acronym, entity_type, normalized, count);
        StoreMetrics::record_variant_write();
        Ok(())
    }

    /// Re-select the canonical variant: highest usage, earliest id on ties
    pub fn update_canonical_variant(&self, acronym: &str, entity_type: EntityType) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        update_canonical(&tx, acronym, entity_type)?;
        tx.commit()?;
        Ok(())
    }

    /// Flag every variant of the group as ambiguous. The flag is never
    /// cleared and is inherited by variants added later.
    pub fn mark_acronym_as_ambiguous(&self, acronym: &str, entity_type: EntityType) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let updated = tx.execute(
            "UPDATE venue_acronym_variants SET is_ambiguous = 1 WHERE acronym = ?1 AND entity_type = ?2",
            params![acronym, entity_type.as_str()],
        )?;
        tx.commit()?;
        if updated == 0 {
            warn!("No variants stored for {} ({}); nothing marked ambiguous", acronym, entity_type);
        } else {
            info!("Marked {} ({}) as ambiguous", acronym, entity_type);
            StoreMetrics::record_marked_ambiguous();
        }
        Ok(updated)
    }

    pub fn is_acronym_ambiguous(&self, acronym: &str, entity_type: EntityType) -> Result<bool> {
        Ok(group_is_ambiguous(&self.conn, acronym, entity_type)?)
    }

    /// Compare a candidate name against the stored variants of a group
    pub fn check_acronym_conflict(
        &self,
        acronym: &str,
        entity_type: EntityType,
        normalized_name: &str,
    ) -> Result<AcronymConflictCheck> {
        let variants = self.get_variants(acronym, entity_type)?;
        if variants.is_empty() {
            return Ok(AcronymConflictCheck::default());
        }
        let candidate = series_key(normalized_name);
        if let Some(matching) = variants.iter().find(|v| {
            v.normalized_name == candidate || are_conference_names_equivalent(&v.normalized_name, &candidate)
        }) {
            return Ok(AcronymConflictCheck {
                has_conflict: false,
                already_exists: true,
                existing_name: Some(matching.normalized_name.clone()),
            });
        }
        let reported = variants.iter().find(|v| v.is_canonical).unwrap_or(&variants[0]);
        Ok(AcronymConflictCheck {
            has_conflict: true,
            already_exists: false,
            existing_name: Some(reported.normalized_name.clone()),
        })
    }

    /// Canonical name for an acronym, or `None` when the group is absent or
    /// ambiguous. A hit refreshes `last_seen_at`.
    pub fn get_full_name_for_acronym(&self, acronym: &str, entity_type: EntityType) -> Result<Option<String>> {
        if group_is_ambiguous(&self.conn, acronym, entity_type)? {
            debug!("Lookup of ambiguous acronym {} ({}) withheld", acronym, entity_type);
            StoreMetrics::record_lookup(false);
            return Ok(None);
        }
        let canonical: Option<(i64, String)> = self
            .conn
            .query_row(
                "SELECT id, normalized_name FROM venue_acronym_variants
                 WHERE acronym = ?1 AND entity_type = ?2 AND is_canonical = 1
                 ORDER BY id LIMIT 1",
                params![acronym, entity_type.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        StoreMetrics::record_lookup(canonical.is_some());
        match canonical {
            Some((id, name)) => {
                self.conn.execute(
                    "UPDATE venue_acronym_variants SET last_seen_at = ?2 WHERE id = ?1",
                    params![id, Utc::now().to_rfc3339()],
                )?;
                Ok(Some(name))
            }
            None => Ok(None),
        }
    }

    /// Lookup callback for the normalizer. Store errors are logged and
    /// treated as a miss.
    pub fn acronym_lookup(&self, entity_type: EntityType) -> impl Fn(&str) -> Option<String> + '_ {
        move |acronym: &str| match self.get_full_name_for_acronym(acronym, entity_type) {
            Ok(found) => found,
            Err(e) => {
                warn!("Acronym lookup for {} failed: {}", acronym, e);
                None
            }
        }
    }

    /// Distinct (acronym, entity type) groups, alphabetically
    pub fn list_acronyms(&self) -> Result<Vec<(String, EntityType)>> {
        self.list_groups("SELECT acronym, entity_type FROM venue_acronym_variants GROUP BY acronym, entity_type ORDER BY acronym, entity_type")
    }

    pub fn list_ambiguous_acronyms(&self) -> Result<Vec<(String, EntityType)>> {
        self.list_groups(
            "SELECT acronym, entity_type FROM venue_acronym_variants GROUP BY acronym, entity_type
             HAVING MAX(is_ambiguous) = 1 ORDER BY acronym, entity_type",
        )
    }

    fn list_groups(&self, sql: &str) -> Result<Vec<(String, EntityType)>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| {
            let acronym: String = row.get(0)?;
            let entity_type: String = row.get(1)?;
            Ok((acronym, entity_type_from_column(&entity_type)))
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // Learned abbreviations

    /// Learned abbreviations at or above `min_confidence`, each expansion
    /// list sorted by confidence, highest first
    pub fn get_learned_abbreviations(&self, min_confidence: f64) -> Result<LearnedAbbreviations> {
        let mut stmt = self.conn.prepare(
            "SELECT abbreviated_form, expanded_form, confidence_score FROM learned_abbreviations
             WHERE confidence_score >= ?1 ORDER BY confidence_score DESC",
        )?;
        let rows = stmt.query_map(params![min_confidence], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, f64>(2)?))
        })?;
        let mut learned = LearnedAbbreviations::new();
        for row in rows {
            let (abbreviated, expanded, confidence) = row?;
            learned.insert(&abbreviated, &expanded, confidence);
        }
        Ok(learned)
    }

    /// Full learned rows for reporting, highest confidence first
    pub fn list_learned_abbreviations(&self, min_confidence: f64) -> Result<Vec<LearnedAbbreviation>> {
        let mut stmt = self.conn.prepare(
            "SELECT abbreviated_form, expanded_form, confidence_score, occurrence_count, context,
                    first_seen_at, last_seen_at
             FROM learned_abbreviations WHERE confidence_score >= ?1
             ORDER BY confidence_score DESC, abbreviated_form, expanded_form",
        )?;
        let rows = stmt.query_map(params![min_confidence], |row| {
            Ok(LearnedAbbreviation {
                abbreviated_form: row.get(0)?,
                expanded_form: row.get(1)?,
                confidence_score: row.get(2)?,
                occurrence_count: row.get(3)?,
                context: row.get(4)?,
                first_seen_at: timestamp_column(row, 5)?,
                last_seen_at: timestamp_column(row, 6)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Insert a mapping, or reinforce it: the occurrence count goes up by one
    /// and confidence follows `min(1, 0.1 + 0.3 * log10(count + 1))`, never
    /// dropping below what was already stored.
    pub fn store_learned_abbreviation(
        &self,
        abbreviated: &str,
        expanded: &str,
        confidence: f64,
        context: Option<&str>,
    ) -> Result<()> {
        let abbreviated = abbreviated.trim().to_lowercase();
        let expanded = expanded.trim().to_lowercase();
        if abbreviated.is_empty() || expanded.is_empty() {
            return Err(VenueError::Validation("abbreviation and expansion must be non-empty".to_string()));
        }
        if abbreviated == expanded {
            return Err(VenueError::Validation(format!("'{}' cannot abbreviate itself", abbreviated)));
        }
        let confidence = confidence.clamp(0.0, 1.0);
        let now = Utc::now().to_rfc3339();

        let tx = self.conn.unchecked_transaction()?;
        let existing: Option<(u32, f64)> = tx
            .query_row(
                "SELECT occurrence_count, confidence_score FROM learned_abbreviations
                 WHERE abbreviated_form = ?1 AND expanded_form = ?2",
                params![abbreviated, expanded],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match existing {
            Some((occurrences, previous)) => {
                let occurrences = occurrences + 1;
                let updated = previous.max(reinforced_confidence(occurrences));
                tx.execute(
                    "UPDATE learned_abbreviations
                     SET occurrence_count = ?3, confidence_score = ?4, last_seen_at = ?5,
                         context = COALESCE(?6, context)
                     WHERE abbreviated_form = ?1 AND expanded_form = ?2",
                    params![abbreviated, expanded, occurrences, updated, now, context],
                )?;
                debug!(
                    "Reinforced {} -> {} (seen {} times, confidence {:.3})",
                    abbreviated, expanded, occurrences, updated
                );
            }
            None => {
                tx.execute(
                    "INSERT INTO learned_abbreviations
                     (abbreviated_form, expanded_form, confidence_score, occurrence_count, context,
                      first_seen_at, last_seen_at)
                     VALUES (?1, ?2, ?3, 1, ?4, ?5, ?5)",
                    params![abbreviated, expanded, confidence, context, now],
                )?;
                info!("Learned {} -> {} (confidence {:.2})", abbreviated, expanded, confidence);
            }
        }
        tx.commit()?;
        StoreMetrics::record_learned_upsert();
        Ok(())
    }

    // Maintenance

    pub fn get_stats(&self) -> Result<StoreStats> {
        let count = |sql: &str| -> Result<usize> {
            let n: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
            Ok(n as usize)
        };
        Ok(StoreStats {
            variants: count("SELECT COUNT(*) FROM venue_acronym_variants")?,
            acronyms: count(
                "SELECT COUNT(*) FROM (SELECT 1 FROM venue_acronym_variants GROUP BY acronym, entity_type)",
            )?,
            ambiguous: count(
                "SELECT COUNT(*) FROM (SELECT 1 FROM venue_acronym_variants GROUP BY acronym, entity_type
                 HAVING MAX(is_ambiguous) = 1)",
            )?,
            learned: count("SELECT COUNT(*) FROM learned_abbreviations")?,
        })
    }

    pub fn clear_acronym_variants(&self) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let deleted = tx.execute("DELETE FROM venue_acronym_variants", [])?;
        tx.commit()?;
        info!("Cleared {} acronym variants", deleted);
        Ok(deleted)
    }

    pub fn clear_learned_abbreviations(&self) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let deleted = tx.execute("DELETE FROM learned_abbreviations", [])?;
        tx.commit()?;
        info!("Cleared {} learned abbreviations", deleted);
        Ok(deleted)
    }
}

fn validated_acronym(acronym: &str) -> Result<&str> {
    let acronym = acronym.trim();
    if acronym.is_empty() {
        return Err(VenueError::Validation("acronym must be non-empty".to_string()));
    }
    Ok(acronym)
}

fn select_variants(
    conn: &Connection,
    acronym: &str,
    entity_type: EntityType,
) -> rusqlite::Result<Vec<AcronymVariant>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM venue_acronym_variants WHERE acronym = ?1 AND entity_type = ?2
         ORDER BY usage_count DESC, id ASC",
        VARIANT_COLUMNS
    ))?;
    let rows = stmt.query_map(params![acronym, entity_type.as_str()], variant_from_row)?;
    rows.collect()
}

#[allow(clippy::too_many_arguments)]
fn insert_or_bump(
    conn: &Connection,
    acronym: &str,
    variant_name: &str,
    normalized_name: &str,
    entity_type: EntityType,
    source: Option<&str>,
    count: u32,
    now: &str,
) -> rusqlite::Result<()> {
    // New rows inherit the group's ambiguity flag
    let inherited_ambiguity = group_is_ambiguous(conn, acronym, entity_type)?;
    conn.execute(
        "INSERT INTO venue_acronym_variants
         (acronym, entity_type, variant_name, normalized_name, usage_count, is_canonical, is_ambiguous,
          source, first_seen_at, last_seen_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?7, ?8, ?8)
         ON CONFLICT (acronym, entity_type, normalized_name) DO UPDATE SET
             usage_count = usage_count + excluded.usage_count,
             last_seen_at = excluded.last_seen_at",
        params![
            acronym,
            entity_type.as_str(),
            variant_name,
            normalized_name,
            count,
            inherited_ambiguity,
            source,
            now
        ],
    )?;
    Ok(())
}

fn update_canonical(conn: &Connection, acronym: &str, entity_type: EntityType) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE venue_acronym_variants SET is_canonical = 0 WHERE acronym = ?1 AND entity_type = ?2",
        params![acronym, entity_type.as_str()],
    )?;
    conn.execute(
        "UPDATE venue_acronym_variants SET is_canonical = 1 WHERE id = (
             SELECT id FROM venue_acronym_variants WHERE acronym = ?1 AND entity_type = ?2
             ORDER BY usage_count DESC, id ASC LIMIT 1)",
        params![acronym, entity_type.as_str()],
    )?;
    Ok(())
}

fn group_is_ambiguous(conn: &Connection, acronym: &str, entity_type: EntityType) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM venue_acronym_variants
                        WHERE acronym = ?1 AND entity_type = ?2 AND is_ambiguous = 1)",
        params![acronym, entity_type.as_str()],
        |row| row.get(0),
    )
}

fn variant_from_row(row: &Row<'_>) -> rusqlite::Result<AcronymVariant> {
    let entity_type: String = row.get(2)?;
    Ok(AcronymVariant {
        id: row.get(0)?,
        acronym: row.get(1)?,
        entity_type: entity_type_from_column(&entity_type),
        variant_name: row.get(3)?,
        normalized_name: row.get(4)?,
        usage_count: row.get(5)?,
        is_canonical: row.get(6)?,
        is_ambiguous: row.get(7)?,
        source: row.get(8)?,
        first_seen_at: timestamp_column(row, 9)?,
        last_seen_at: timestamp_column(row, 10)?,
    })
}

fn entity_type_from_column(value: &str) -> EntityType {
    value.parse().unwrap_or(EntityType::Unknown)
}

fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
