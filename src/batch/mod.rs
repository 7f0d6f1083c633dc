//! Batch acronym reconciliation.
//!
//! Stage 1 ([`extract`]) fans files out to a worker pool with no store
//! access. Stage 2 ([`merge`]) folds the results together serially,
//! classifies each acronym group and, on [`apply_merged_result`], writes
//! them to the store.

pub mod discovery;
pub mod extract;
pub mod merge;
pub mod union_find;

pub use discovery::discover_bibtex_files;
pub use extract::{
    process_file, process_files_parallel, AcronymMapping, FileProcessingResult, GroupKey, InFileConflict,
};
pub use merge::{
    apply_merged_result, merge_file_results, AcronymConflict, AcronymGroup, ApplySummary, ConflictKind,
    FileError, MergedAcronym, MergedAcronymResult, ObservedName,
};

use std::path::PathBuf;

use crate::constants::{DEFAULT_MIN_CONFIDENCE, MAX_WORKERS};
use crate::error::Result;
use crate::normalize::TextNormalizer;
use crate::parser::EntrySource;
use crate::storage::AcronymStore;

/// Runs both stages against one store
pub struct BatchAcronymProcessor<'s> {
    store: &'s AcronymStore,
    entry_source: Box<dyn EntrySource>,
    normalizer: TextNormalizer,
    max_workers: usize,
    min_confidence: f64,
}

impl<'s> BatchAcronymProcessor<'s> {
    pub fn new(store: &'s AcronymStore, entry_source: Box<dyn EntrySource>) -> Self {
        Self {
            store,
            entry_source,
            normalizer: TextNormalizer::new(),
            max_workers: MAX_WORKERS,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
        }
    }

    /// Upper bound on Stage 1 workers; never above the hard cap
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.clamp(1, MAX_WORKERS);
        self
    }

    /// Lowest learned-abbreviation confidence Stage 2 consults
    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    pub fn process_files_parallel(&self, files: &[PathBuf]) -> Vec<FileProcessingResult> {
        process_files_parallel(files, self.entry_source.as_ref(), &self.normalizer, self.max_workers)
    }

    pub fn merge_file_results(&self, results: &[FileProcessingResult]) -> Result<MergedAcronymResult> {
        merge_file_results(self.store, results, self.min_confidence)
    }

    pub fn apply_merged_result(&self, merged: &MergedAcronymResult, source: Option<&str>) -> Result<ApplySummary> {
        apply_merged_result(self.store, merged, source)
    }

    /// Both stages followed by apply
    pub fn sync(&self, files: &[PathBuf], source: Option<&str>) -> Result<(MergedAcronymResult, ApplySummary)> {
        let results = self.process_files_parallel(files);
        let merged = self.merge_file_results(&results)?;
        let summary = self.apply_merged_result(&merged, source)?;
        Ok((merged, summary))
    }
}
