//! Stage 1: stateless per-file extraction, run on a bounded worker pool.
//!
//! Workers see only their file, the entry source and a normalizer. They
//! never touch the store; everything they learn travels back in an
//! immutable [`FileProcessingResult`].

use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn};

use super::union_find::fold_clusters;
use crate::constants::MAX_WORKERS;
use crate::equivalence::are_conference_names_equivalent;
use crate::metrics::BatchMetrics;
use crate::normalize::{series_key, TextNormalizer};
use crate::parser::EntrySource;
use crate::types::{EntityType, NameCount};

/// An acronym together with the venue kind it was observed under
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct GroupKey {
    /// Uppercased, since acronyms match case-insensitively
    pub acronym: String,
    pub entity_type: EntityType,
}

impl GroupKey {
    pub fn new(acronym: &str, entity_type: EntityType) -> Self {
        Self {
            acronym: acronym.to_uppercase(),
            entity_type,
        }
    }
}

/// One `(acronym -> full name)` observation from a citation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AcronymMapping {
    /// As written in the source
    pub acronym: String,
    pub venue_name: String,
    pub normalized_name: String,
    pub entity_type: EntityType,
}

/// Names of one group that a file used and that could not be folded together
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InFileConflict {
    pub acronym: String,
    pub entity_type: EntityType,
    pub names: Vec<NameCount>,
}

#[derive(Debug, Clone, Default)]
pub struct FileProcessingResult {
    pub file_path: PathBuf,
    pub mappings: Vec<AcronymMapping>,
    pub in_file_conflicts: Vec<InFileConflict>,
    /// Per group, normalized names with counts in first-seen order. Names a
    /// lenient comparison found equivalent are already folded together.
    pub occurrence_counts: BTreeMap<GroupKey, Vec<NameCount>>,
    pub entry_count: usize,
    pub error: Option<String>,
}

impl FileProcessingResult {
    /// Raw venue text first seen for `normalized_name` under `key`
    pub fn variant_name(&self, key: &GroupKey, normalized_name: &str) -> Option<&str> {
        self.mappings
            .iter()
            .find(|m| {
                m.normalized_name == normalized_name
                    && m.entity_type == key.entity_type
                    && m.acronym.eq_ignore_ascii_case(&key.acronym)
            })
            .map(|m| m.venue_name.as_str())
    }

    /// Acronym spelling first seen for `key`
    pub fn acronym_spelling(&self, key: &GroupKey) -> Option<&str> {
        self.mappings
            .iter()
            .find(|m| m.entity_type == key.entity_type && m.acronym.eq_ignore_ascii_case(&key.acronym))
            .map(|m| m.acronym.as_str())
    }
}

/// Extract and group the acronym mappings of one file
pub fn process_file(
    path: &Path,
    source: &dyn EntrySource,
    normalizer: &TextNormalizer,
) -> FileProcessingResult {
    let started = Instant::now();
    let mut result = FileProcessingResult {
        file_path: path.to_path_buf(),
        ..Default::default()
    };

    let entries = match source.read_entries(path) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Skipping {}: {}", path.display(), e);
            BatchMetrics::record_file_error();
            result.error = Some(e.to_string());
            return result;
        }
    };
    result.entry_count = entries.len();

    let mut grouped: BTreeMap<GroupKey, Vec<NameCount>> = BTreeMap::new();
    for entry in &entries {
        let Some(name) = entry.journal_name.as_deref() else {
            continue;
        };
        let normalized = match normalizer.normalize(name, None) {
            Ok(normalized) => normalized,
            Err(e) => {
                debug!("Entry '{}' in {} skipped: {}", entry.key, path.display(), e);
                continue;
            }
        };
        for (acronym, full_name) in normalized.extracted_acronym_mappings {
            let normalized_name = series_key(&full_name);
            let names = grouped
                .entry(GroupKey::new(&acronym, entry.venue_type))
                .or_default();
            match names.iter_mut().find(|n| n.name == normalized_name) {
                Some(existing) => existing.count += 1,
                None => names.push(NameCount::new(normalized_name.clone(), 1)),
            }
            result.mappings.push(AcronymMapping {
                acronym,
                venue_name: full_name,
                normalized_name,
                entity_type: entry.venue_type,
            });
        }
    }

    // No learned abbreviations are available here, so only the lenient check
    // can fold names
    for (key, names) in grouped.iter_mut() {
        if names.len() < 2 {
            continue;
        }
        let folded: Vec<NameCount> = fold_clusters(names, are_conference_names_equivalent)
            .into_iter()
            .map(|cluster| cluster.representative)
            .collect();
        if folded.len() > 1 {
            debug!(
                "{}: {} ({}) has {} distinct names",
                path.display(),
                key.acronym,
                key.entity_type,
                folded.len()
            );
            result.in_file_conflicts.push(InFileConflict {
                acronym: key.acronym.clone(),
                entity_type: key.entity_type,
                names: folded.clone(),
            });
        }
        *names = folded;
    }
    result.occurrence_counts = grouped;

    BatchMetrics::record_file_processed(entries.len(), started.elapsed().as_secs_f64());
    debug!(
        "{}: {} entries, {} acronym mappings",
        path.display(),
        result.entry_count,
        result.mappings.len()
    );
    result
}

/// [`process_file`] with a panic confined to the file it happened on
fn process_file_isolated(
    path: &Path,
    source: &dyn EntrySource,
    normalizer: &TextNormalizer,
) -> FileProcessingResult {
    match catch_unwind(AssertUnwindSafe(|| process_file(path, source, normalizer))) {
        Ok(result) => result,
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!("Processing {} panicked: {}", path.display(), reason);
            BatchMetrics::record_file_error();
            FileProcessingResult {
                file_path: path.to_path_buf(),
                error: Some(format!("processing panicked: {}", reason)),
                ..Default::default()
            }
        }
    }
}

/// Pool size for `file_count` files: bounded by the host, `max_workers` and
/// the hard cap
pub fn worker_count(max_workers: usize, file_count: usize) -> usize {
    let host = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    host.min(max_workers).min(MAX_WORKERS).min(file_count).max(1)
}

/// Run [`process_file`] over every file. Results keep the input order. A
/// single file is processed inline without building a pool.
pub fn process_files_parallel(
    files: &[PathBuf],
    source: &dyn EntrySource,
    normalizer: &TextNormalizer,
    max_workers: usize,
) -> Vec<FileProcessingResult> {
    let span = info_span!("stage1", files = files.len());
    let _enter = span.enter();

    if files.len() <= 1 {
        return files
            .iter()
            .map(|file| process_file_isolated(file, source, normalizer))
            .collect();
    }

    let workers = worker_count(max_workers, files.len());
    BatchMetrics::record_pool_size(workers);
    info!("Processing {} files with {} workers", files.len(), workers);

    match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
        Ok(pool) => pool.install(|| {
            files
                .par_iter()
                .map(|file| process_file_isolated(file, source, normalizer))
                .collect()
        }),
        Err(e) => {
            warn!("Failed to build worker pool ({}), processing sequentially", e);
            files
                .iter()
                .map(|file| process_file_isolated(file, source, normalizer))
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, VenueError};
    use crate::parser::{BibtexEntrySource, VenueEntry};

    struct FailingSource;

    impl EntrySource for FailingSource {
        fn parse(&self, _content: &str, origin: &Path) -> Result<Vec<VenueEntry>> {
            Err(VenueError::Parse {
                path: origin.to_path_buf(),
                message: "boom".to_string(),
            })
        }
    }

    struct PanickingSource;

    impl EntrySource for PanickingSource {
        fn parse(&self, content: &str, origin: &Path) -> Result<Vec<VenueEntry>> {
            if content.contains("explode") {
                panic!("entry source blew up");
            }
            BibtexEntrySource::new().parse(content, origin)
        }
    }

    fn write_bib(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_extracts_and_counts_mappings() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_bib(
            dir.path(),
            "a.bib",
            "@inproceedings{a1, booktitle = {International Conference on Machine Learning (ICML)}}\n\
             @inproceedings{a2, booktitle = {International Conference on Machine Learning (ICML)}}\n\
             @article{j1, journal = {Nature}}",
        );
        let result = process_file(&path, &BibtexEntrySource::new(), &TextNormalizer::new());

        assert!(result.error.is_none());
        assert_eq!(result.entry_count, 3);
        assert_eq!(result.mappings.len(), 2);
        let key = GroupKey::new("icml", EntityType::Conference);
        assert_eq!(
            result.occurrence_counts[&key],
            vec![NameCount::new("international conference on machine learning", 2)]
        );
        assert!(result.in_file_conflicts.is_empty());
        assert_eq!(
            result.variant_name(&key, "international conference on machine learning"),
            Some("International Conference on Machine Learning")
        );
    }

    #[test]
    fn test_lenient_duplicates_fold_and_real_conflicts_remain() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_bib(
            dir.path(),
            "b.bib",
            "@inproceedings{b1, booktitle = {Annual Meeting of the Association for Computational Linguistics (ACL)}}\n\
             @inproceedings{b2, booktitle = {Annual Meeting of the Association for Computational Linguistics 2019 (ACL)}}\n\
             @inproceedings{b3, booktitle = {Australasian Computing Lectures (ACL)}}",
        );
        let result = process_file(&path, &BibtexEntrySource::new(), &TextNormalizer::new());

        let key = GroupKey::new("ACL", EntityType::Conference);
        let names = &result.occurrence_counts[&key];
        assert_eq!(names.len(), 2);
        assert_eq!(names[0].count, 2);
        assert_eq!(result.in_file_conflicts.len(), 1);
        assert_eq!(result.in_file_conflicts[0].names.len(), 2);
    }

    #[test]
    fn test_parse_failure_is_captured() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_bib(dir.path(), "bad.bib", "@article{x}");
        let result = process_file(&path, &FailingSource, &TextNormalizer::new());
        assert!(result.error.as_deref().is_some_and(|e| e.contains("boom")));
        assert!(result.mappings.is_empty());
    }

    #[test]
    fn test_parallel_results_keep_input_order() {
        let dir = tempfile::tempdir().unwrap();
        let files: Vec<PathBuf> = (0..5)
            .map(|i| {
                write_bib(
                    dir.path(),
                    &format!("f{}.bib", i),
                    &format!("@article{{k{}, journal = {{Journal Number {} (JN{})}}}}", i, i, i),
                )
            })
            .collect();
        let results = process_files_parallel(&files, &BibtexEntrySource::new(), &TextNormalizer::new(), 4);
        let paths: Vec<&PathBuf> = results.iter().map(|r| &r.file_path).collect();
        assert_eq!(paths, files.iter().collect::<Vec<_>>());
        assert!(results.iter().all(|r| r.error.is_none() && r.entry_count == 1));
    }

    #[test]
    fn test_worker_count_bounds() {
        assert_eq!(worker_count(8, 1), 1);
        assert!(worker_count(64, 100) <= MAX_WORKERS);
        assert_eq!(worker_count(0, 5), 1);
    }

    #[test]
    fn test_panicking_file_does_not_abort_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let files = vec![
            write_bib(dir.path(), "ok.bib", "@article{k1, journal = {Journal of Foo (JF)}}"),
            write_bib(dir.path(), "bad.bib", "@article{k2, journal = {explode}}"),
            write_bib(dir.path(), "ok2.bib", "@article{k3, journal = {Journal of Bar (JB)}}"),
        ];
        let results = process_files_parallel(&files, &PanickingSource, &TextNormalizer::new(), 2);

        assert_eq!(results.len(), 3);
        assert!(results[0].error.is_none());
        assert!(results[1].error.as_deref().is_some_and(|e| e.contains("blew up")));
        assert!(results[2].error.is_none());
        assert_eq!(results[2].mappings.len(), 1);
    }

    #[test]
    fn test_non_ascii_digits_in_venue_are_processed() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_bib(
            dir.path(),
            "deva.bib",
            "@article{d1, journal = {Journal of Foo ०१२३-४५६७ (JOF)}}",
        );
        let result = process_file(&path, &BibtexEntrySource::new(), &TextNormalizer::new());
        assert!(result.error.is_none());
        assert_eq!(result.entry_count, 1);
    }
}
