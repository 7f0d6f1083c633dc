//! Stage 2: serial merge of Stage 1 results against the store.
//!
//! This is the only place batch processing reads learned abbreviations and
//! the only place it writes to the store. Callers must not run two merges
//! against one store at the same time.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info, info_span, warn};

use super::extract::{FileProcessingResult, GroupKey};
use super::union_find::fold_clusters;
use crate::equivalence::are_variants_of_same_venue;
use crate::error::Result;
use crate::learning::{AbbreviationLearner, LearnedMapping};
use crate::metrics::BatchMetrics;
use crate::storage::AcronymStore;
use crate::types::{AcronymVariant, EntityType, LearnedAbbreviations, NameCount};

/// A group resolved to one name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergedAcronym {
    pub acronym: String,
    pub entity_type: EntityType,
    pub normalized_name: String,
    /// Raw venue text for `normalized_name`, as first observed
    pub variant_name: String,
    /// Observations across all files, including folded equivalents
    pub count: u32,
    /// Stored variant the group matched, for "existing" entries
    pub existing_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// The files themselves disagree
    CrossFile,
    /// The files agree with each other but not with the store
    Store,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObservedName {
    pub normalized_name: String,
    pub variant_name: String,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AcronymConflict {
    pub acronym: String,
    pub entity_type: EntityType,
    pub kind: ConflictKind,
    /// Names seen in this batch
    pub observed: Vec<ObservedName>,
    /// Variants already in the store
    pub existing: Vec<NameCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileError {
    pub file_path: PathBuf,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AcronymGroup {
    pub acronym: String,
    pub entity_type: EntityType,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergedAcronymResult {
    pub new_acronyms: Vec<MergedAcronym>,
    pub existing_acronyms: Vec<MergedAcronym>,
    pub conflicts: Vec<AcronymConflict>,
    pub files_processed: usize,
    pub files_with_errors: usize,
    pub total_entries: usize,
    /// Groups left alone because the store already flags them ambiguous
    pub ambiguous_skipped: Vec<AcronymGroup>,
    pub errors: Vec<FileError>,
}

impl MergedAcronymResult {
    pub fn is_empty(&self) -> bool {
        self.new_acronyms.is_empty() && self.existing_acronyms.is_empty() && self.conflicts.is_empty()
    }
}

/// What [`apply_merged_result`] wrote
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplySummary {
    pub variants_written: usize,
    pub conflicts_recorded: usize,
    pub groups_marked_ambiguous: usize,
}

/// Names of one group across all files
struct GroupAggregate {
    acronym: String,
    names: Vec<ObservedName>,
}

/// Fold every file's counts into per-group totals. Files that failed are
/// counted and reported but contribute nothing.
fn aggregate(
    results: &[FileProcessingResult],
    merged: &mut MergedAcronymResult,
) -> BTreeMap<GroupKey, GroupAggregate> {
    let mut groups: BTreeMap<GroupKey, GroupAggregate> = BTreeMap::new();

    for result in results {
        merged.files_processed += 1;
        if let Some(message) = &result.error {
            merged.files_with_errors += 1;
            merged.errors.push(FileError {
                file_path: result.file_path.clone(),
                message: message.clone(),
            });
            continue;
        }
        merged.total_entries += result.entry_count;

        for (key, names) in &result.occurrence_counts {
            let group = groups.entry(key.clone()).or_insert_with(|| GroupAggregate {
                acronym: result
                    .acronym_spelling(key)
                    .unwrap_or(key.acronym.as_str())
                    .to_string(),
                names: Vec::new(),
            });
            for name in names {
                match group.names.iter_mut().find(|n| n.normalized_name == name.name) {
                    Some(existing) => existing.count += name.count,
                    None => group.names.push(ObservedName {
                        normalized_name: name.name.clone(),
                        variant_name: result
                            .variant_name(key, &name.name)
                            .unwrap_or(name.name.as_str())
                            .to_string(),
                        count: name.count,
                    }),
                }
            }
        }
    }
    groups
}

fn shorter_first<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a.chars().count() <= b.chars().count() {
        (a, b)
    } else {
        (b, a)
    }
}

fn persist_mappings(store: &AcronymStore, mappings: &[LearnedMapping], context: &str) -> Result<()> {
    for mapping in mappings {
        store.store_learned_abbreviation(
            &mapping.abbreviated,
            &mapping.expanded,
            mapping.confidence,
            Some(context),
        )?;
    }
    Ok(())
}

/// Classify every observed group as new, existing or conflicting.
///
/// Learned abbreviations discovered while matching against stored variants
/// are persisted as a side effect; variants themselves are not written here.
pub fn merge_file_results(
    store: &AcronymStore,
    results: &[FileProcessingResult],
    min_confidence: f64,
) -> Result<MergedAcronymResult> {
    let span = info_span!("stage2", files = results.len());
    let _enter = span.enter();
    let started = Instant::now();

    let mut merged = MergedAcronymResult::default();
    let groups = aggregate(results, &mut merged);
    let mut learned = store.get_learned_abbreviations(min_confidence)?;
    let learner = AbbreviationLearner::new();
    debug!("Merging {} groups with {} learned abbreviations", groups.len(), learned.len());

    for (key, group) in groups {
        let counts: Vec<NameCount> = group
            .names
            .iter()
            .map(|n| NameCount::new(n.normalized_name.clone(), n.count))
            .collect();
        let clusters = fold_clusters(&counts, |a, b| are_variants_of_same_venue(a, b, &learned));
        let existing = store.get_variants(&group.acronym, key.entity_type)?;

        if clusters.len() > 1 {
            warn!(
                "{} ({}) observed with {} unrelated names across files",
                group.acronym,
                key.entity_type,
                clusters.len()
            );
            merged.conflicts.push(AcronymConflict {
                acronym: group.acronym,
                entity_type: key.entity_type,
                kind: ConflictKind::CrossFile,
                observed: group.names,
                existing: existing_counts(&existing),
            });
            continue;
        }
        let Some(cluster) = clusters.into_iter().next() else {
            continue;
        };

        if store.is_acronym_ambiguous(&group.acronym, key.entity_type)? {
            debug!("{} ({}) is ambiguous in the store, skipped", group.acronym, key.entity_type);
            merged.ambiguous_skipped.push(AcronymGroup {
                acronym: group.acronym,
                entity_type: key.entity_type,
            });
            continue;
        }

        let representative = cluster.representative;
        let variant_name = group
            .names
            .iter()
            .find(|n| n.normalized_name == representative.name)
            .map(|n| n.variant_name.clone())
            .unwrap_or_else(|| representative.name.clone());
        let mut entry = MergedAcronym {
            acronym: group.acronym.clone(),
            entity_type: key.entity_type,
            normalized_name: representative.name.clone(),
            variant_name,
            count: representative.count,
            existing_name: None,
        };

        if existing.is_empty() {
            merged.new_acronyms.push(entry);
            continue;
        }

        if let Some(matched) = existing
            .iter()
            .find(|v| are_variants_of_same_venue(&representative.name, &v.normalized_name, &learned))
        {
            let (short, long) = shorter_first(&representative.name, &matched.normalized_name);
            let mappings = learner.learn_abbreviations_from_pair(short, long);
            persist_mappings(store, &mappings, &group.acronym)?;
            fold_into(&mut learned, &mappings);

            entry.existing_name = Some(matched.normalized_name.clone());
            merged.existing_acronyms.push(entry);
            continue;
        }

        // Second chance: learn from each stored variant and compare again
        let mut candidate_table = learned.clone();
        let mut discovered: Vec<LearnedMapping> = Vec::new();
        for variant in &existing {
            let (short, long) = shorter_first(&representative.name, &variant.normalized_name);
            let mappings = learner.learn_abbreviations_from_pair(short, long);
            fold_into(&mut candidate_table, &mappings);
            discovered.extend(mappings);
        }
        let retried = existing
            .iter()
            .find(|v| are_variants_of_same_venue(&representative.name, &v.normalized_name, &candidate_table));

        match retried {
            Some(matched) => {
                info!(
                    "{} ({}) matched '{}' after learning {} mappings",
                    group.acronym,
                    key.entity_type,
                    matched.normalized_name,
                    discovered.len()
                );
                persist_mappings(store, &discovered, &group.acronym)?;
                entry.existing_name = Some(matched.normalized_name.clone());
                learned = candidate_table;
                merged.existing_acronyms.push(entry);
            }
            None => {
                warn!(
                    "{} ({}) '{}' conflicts with stored variants",
                    group.acronym, key.entity_type, representative.name
                );
                merged.conflicts.push(AcronymConflict {
                    acronym: group.acronym,
                    entity_type: key.entity_type,
                    kind: ConflictKind::Store,
                    observed: group.names,
                    existing: existing_counts(&existing),
                });
            }
        }
    }

    BatchMetrics::record_merge(
        merged.new_acronyms.len(),
        merged.existing_acronyms.len(),
        merged.conflicts.len(),
        started.elapsed().as_secs_f64(),
    );
    info!(
        "Merge complete: {} new, {} existing, {} conflicts, {} ambiguous skipped",
        merged.new_acronyms.len(),
        merged.existing_acronyms.len(),
        merged.conflicts.len(),
        merged.ambiguous_skipped.len()
    );
    Ok(merged)
}

fn fold_into(table: &mut LearnedAbbreviations, mappings: &[LearnedMapping]) {
    for mapping in mappings {
        table.insert(&mapping.abbreviated, &mapping.expanded, mapping.confidence);
    }
}

fn existing_counts(existing: &[AcronymVariant]) -> Vec<NameCount> {
    existing
        .iter()
        .map(|v| NameCount::new(v.normalized_name.clone(), v.usage_count))
        .collect()
}

/// Commit a merge: new and existing groups are recorded additively with
/// their aggregate counts; conflicting names are recorded too and their
/// group is flagged ambiguous so lookups stop resolving it.
pub fn apply_merged_result(
    store: &AcronymStore,
    merged: &MergedAcronymResult,
    source: Option<&str>,
) -> Result<ApplySummary> {
    let mut summary = ApplySummary::default();

    for entry in merged.new_acronyms.iter().chain(&merged.existing_acronyms) {
        store.store_variant(&entry.acronym, &entry.variant_name, entry.entity_type, source, entry.count)?;
        summary.variants_written += 1;
    }

    for conflict in &merged.conflicts {
        for name in &conflict.observed {
            store.store_variant(&conflict.acronym, &name.variant_name, conflict.entity_type, source, name.count)?;
        }
        summary.conflicts_recorded += 1;
        if store.mark_acronym_as_ambiguous(&conflict.acronym, conflict.entity_type)? > 0 {
            summary.groups_marked_ambiguous += 1;
        }
    }

    info!(
        "Applied merge: {} variants written, {} conflicts recorded",
        summary.variants_written, summary.conflicts_recorded
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::extract::{process_file, AcronymMapping};
    use crate::normalize::TextNormalizer;
    use crate::parser::BibtexEntrySource;

    fn file_result(name: &str, acronym: &str, entity_type: EntityType, names: &[(&str, u32)]) -> FileProcessingResult {
        let key = GroupKey::new(acronym, entity_type);
        let mut result = FileProcessingResult {
            file_path: PathBuf::from(name),
            entry_count: names.iter().map(|(_, c)| *c as usize).sum(),
            ..Default::default()
        };
        for (normalized, count) in names {
            result.mappings.push(AcronymMapping {
                acronym: acronym.to_string(),
                venue_name: normalized.to_string(),
                normalized_name: normalized.to_string(),
                entity_type,
            });
            result
                .occurrence_counts
                .entry(key.clone())
                .or_default()
                .push(NameCount::new(*normalized, *count));
        }
        result
    }

    #[test]
    fn test_new_group_aggregates_counts() {
        let store = AcronymStore::open_in_memory().unwrap();
        let results = vec![
            file_result("a.bib", "NAACL", EntityType::Conference, &[("north american chapter of the acl", 2)]),
            file_result("b.bib", "naacl", EntityType::Conference, &[("north american chapter of the acl 2021", 3)]),
        ];
        let merged = merge_file_results(&store, &results, 0.05).unwrap();
        assert_eq!(merged.new_acronyms.len(), 1);
        assert_eq!(merged.new_acronyms[0].acronym, "NAACL");
        assert_eq!(merged.new_acronyms[0].count, 5);
        assert_eq!(merged.files_processed, 2);
        assert_eq!(merged.total_entries, 5);
    }

    #[test]
    fn test_cross_file_conflict_is_not_written() {
        let store = AcronymStore::open_in_memory().unwrap();
        let results = vec![
            file_result("a.bib", "ACL", EntityType::Conference, &[("association for computational linguistics", 4)]),
            file_result("b.bib", "ACL", EntityType::Conference, &[("australasian computing lectures", 1)]),
        ];
        let merged = merge_file_results(&store, &results, 0.05).unwrap();
        assert!(merged.new_acronyms.is_empty());
        assert_eq!(merged.conflicts.len(), 1);
        assert_eq!(merged.conflicts[0].kind, ConflictKind::CrossFile);
        assert_eq!(merged.conflicts[0].observed.len(), 2);
        assert!(store.get_variants("ACL", EntityType::Conference).unwrap().is_empty());
    }

    #[test]
    fn test_store_conflict_and_apply_marks_ambiguous() {
        let store = AcronymStore::open_in_memory().unwrap();
        store
            .store_variant("ACL", "association for computational linguistics", EntityType::Conference, None, 10)
            .unwrap();
        let results = vec![file_result("a.bib", "ACL", EntityType::Conference, &[("australasian computing lectures", 2)])];

        let merged = merge_file_results(&store, &results, 0.05).unwrap();
        assert_eq!(merged.conflicts.len(), 1);
        assert_eq!(merged.conflicts[0].kind, ConflictKind::Store);
        assert_eq!(
            merged.conflicts[0].existing,
            vec![NameCount::new("association for computational linguistics", 10)]
        );

        let summary = apply_merged_result(&store, &merged, Some("bibtex")).unwrap();
        assert_eq!(summary.groups_marked_ambiguous, 1);
        assert_eq!(store.get_full_name_for_acronym("ACL", EntityType::Conference).unwrap(), None);

        // Ambiguous groups are skipped on later merges
        let again = merge_file_results(&store, &results, 0.05).unwrap();
        assert_eq!(again.ambiguous_skipped.len(), 1);
        assert!(again.conflicts.is_empty());
    }

    #[test]
    fn test_existing_match_learns_abbreviations() {
        let store = AcronymStore::open_in_memory().unwrap();
        store
            .store_variant("ICIP", "ieee international conference on image processing", EntityType::Conference, None, 3)
            .unwrap();
        store.store_learned_abbreviation("int.", "international", 0.5, None).unwrap();
        store.store_learned_abbreviation("conf.", "conference", 0.5, None).unwrap();
        store.store_learned_abbreviation("process.", "processing", 0.5, None).unwrap();

        let results = vec![file_result("a.bib", "ICIP", EntityType::Conference, &[("ieee int. conf. on image process.", 1)])];
        let merged = merge_file_results(&store, &results, 0.05).unwrap();
        assert_eq!(merged.existing_acronyms.len(), 1);
        assert_eq!(
            merged.existing_acronyms[0].existing_name.as_deref(),
            Some("ieee international conference on image processing")
        );

        // The pair was run through the learner, reinforcing what it found
        let rows = store.list_learned_abbreviations(0.0).unwrap();
        let conf = rows.iter().find(|r| r.abbreviated_form == "conf.").unwrap();
        assert_eq!(conf.occurrence_count, 2);
    }

    #[test]
    fn test_second_chance_learning_resolves_store_match() {
        let store = AcronymStore::open_in_memory().unwrap();
        store
            .store_variant("TPAMI", "transactions on pattern analysis and machine intelligence", EntityType::Journal, None, 4)
            .unwrap();
        let results = vec![file_result(
            "a.bib",
            "TPAMI",
            EntityType::Journal,
            &[("trans. on pattern analysis and machine intelligence", 2)],
        )];

        let merged = merge_file_results(&store, &results, 0.05).unwrap();
        assert!(merged.conflicts.is_empty());
        assert_eq!(merged.existing_acronyms.len(), 1);
        let learned = store.get_learned_abbreviations(0.05).unwrap();
        assert!(learned.maps_to("trans.", "transactions"));
    }

    #[test]
    fn test_failed_files_are_reported_not_aggregated() {
        let store = AcronymStore::open_in_memory().unwrap();
        let failed = FileProcessingResult {
            file_path: PathBuf::from("broken.bib"),
            error: Some("unterminated entry".to_string()),
            ..Default::default()
        };
        let merged = merge_file_results(&store, &[failed], 0.05).unwrap();
        assert_eq!(merged.files_with_errors, 1);
        assert_eq!(merged.errors[0].file_path, PathBuf::from("broken.bib"));
        assert!(merged.is_empty());
    }

    #[test]
    fn test_in_file_conflict_is_folded_into_the_aggregate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mixed.bib");
        let content: String = [
            "Intl. Conf. on Machine Learning (ICML)",
            "International Conference on Machine Learning (ICML)",
            "Intl. Conf. on Machine Learning (ICML)",
            "International Conference on Machine Learning (ICML)",
            "International Conference on Machine Learning (ICML)",
        ]
        .iter()
        .enumerate()
        .map(|(i, booktitle)| format!("@inproceedings{{m{}, booktitle = {{{}}}}}\n", i, booktitle))
        .collect();
        std::fs::write(&path, content).unwrap();

        let result = process_file(&path, &BibtexEntrySource::new(), &TextNormalizer::new());
        assert_eq!(result.in_file_conflicts.len(), 1);
        assert_eq!(result.in_file_conflicts[0].names.len(), 2);

        let store = AcronymStore::open_in_memory().unwrap();
        store.store_learned_abbreviation("intl.", "international", 0.5, None).unwrap();
        store.store_learned_abbreviation("conf.", "conference", 0.5, None).unwrap();
        let merged = merge_file_results(&store, &[result], 0.05).unwrap();

        assert!(merged.conflicts.is_empty(), "unexpected conflicts: {:?}", merged.conflicts);
        assert_eq!(merged.new_acronyms.len(), 1);
        assert_eq!(merged.new_acronyms[0].normalized_name, "international conference on machine learning");
        assert_eq!(merged.new_acronyms[0].count, 5);
    }
}
