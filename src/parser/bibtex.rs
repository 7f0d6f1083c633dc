//! BibTeX entry source backed by the `biblatex` crate.
//!
//! `biblatex` expands `@string` macros, decodes LaTeX accents and drops
//! protective braces. A file that fails to parse as a whole is split at each
//! `@` entry and the entries are parsed one by one, so a single malformed
//! entry does not hide the rest of the file.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use tracing::{debug, warn};

use super::{EntrySource, VenueEntry};
use crate::error::{Result, VenueError};
use crate::normalize::collapse_whitespace;
use crate::types::EntityType;

/// Fields consulted for the venue name, in priority order
const VENUE_FIELDS: &[&str] = &["journal", "booktitle", "series"];

static ENTRY_START_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[ \t]*@[a-zA-Z]").unwrap());
static STRING_BLOCK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\s*@string\s*[{(]").unwrap());

#[derive(Debug, Clone, Default)]
pub struct BibtexEntrySource;

impl BibtexEntrySource {
    pub fn new() -> Self {
        Self
    }
}

impl EntrySource for BibtexEntrySource {
    fn parse(&self, content: &str, origin: &Path) -> Result<Vec<VenueEntry>> {
        let entries = match biblatex::Bibliography::parse(content) {
            Ok(bibliography) => bibliography.iter().map(venue_entry).collect(),
            Err(e) => {
                debug!("{} did not parse as a whole ({}), reading entries one by one", origin.display(), e);
                parse_entries_individually(content, origin, &e.to_string())?
            }
        };
        debug!("Parsed {} entries from {}", entries.len(), origin.display());
        Ok(entries)
    }
}

/// Parse each `@` block on its own, with every well-formed `@string` block
/// prepended so macros still resolve. Fails only when nothing is readable.
fn parse_entries_individually(content: &str, origin: &Path, whole_file_error: &str) -> Result<Vec<VenueEntry>> {
    let starts: Vec<usize> = ENTRY_START_RE.find_iter(content).map(|m| m.start()).collect();
    let blocks: Vec<&str> = starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = starts.get(i + 1).copied().unwrap_or(content.len());
            &content[start..end]
        })
        .collect();

    let (string_blocks, entry_blocks): (Vec<&str>, Vec<&str>) =
        blocks.into_iter().partition(|block| STRING_BLOCK_RE.is_match(block));
    let macros: String = string_blocks
        .into_iter()
        .filter(|block| biblatex::Bibliography::parse(block).is_ok())
        .collect();

    let mut entries = Vec::new();
    let mut skipped = 0usize;
    for block in &entry_blocks {
        let source = format!("{}{}", macros, block);
        match biblatex::Bibliography::parse(&source) {
            Ok(bibliography) => entries.extend(bibliography.iter().map(venue_entry)),
            Err(e) => {
                skipped += 1;
                warn!("Skipping malformed entry in {}: {}", origin.display(), e);
            }
        }
    }

    if skipped > 0 {
        debug!("{}: {} entries read, {} skipped", origin.display(), entries.len(), skipped);
    }
    if entries.is_empty() {
        return Err(VenueError::Parse {
            path: origin.to_path_buf(),
            message: whole_file_error.to_string(),
        });
    }
    Ok(entries)
}

fn venue_entry(entry: &biblatex::Entry) -> VenueEntry {
    let entry_type = entry.entry_type.to_string().to_lowercase();
    let journal_name = VENUE_FIELDS
        .iter()
        .filter_map(|field| entry.get(field))
        .map(|chunks| collapse_whitespace(&chunks_to_string(chunks)))
        .find(|value| !value.is_empty());
    let venue_type = EntityType::from_entry_type(&entry_type, journal_name.as_deref().unwrap_or(""));
    VenueEntry {
        key: entry.key.clone(),
        entry_type,
        journal_name,
        venue_type,
    }
}

fn chunks_to_string(chunks: &[biblatex::Spanned<biblatex::Chunk>]) -> String {
    chunks
        .iter()
        .map(|chunk| match &chunk.v {
            biblatex::Chunk::Normal(s) => s.as_str(),
            biblatex::Chunk::Verbatim(s) => s.as_str(),
            biblatex::Chunk::Math(s) => s.as_str(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> Result<Vec<VenueEntry>> {
        BibtexEntrySource::new().parse(content, Path::new("test.bib"))
    }

    #[test]
    fn test_parses_articles_and_proceedings() {
        let entries = parse(
            r#"
@article{smith2020,
  title = {A {Study} of Things},
  journal = {Journal of {Machine} Learning Research},
  year = 2020,
}
@InProceedings{doe2021,
  booktitle = "International Conference on Machine Learning (ICML)",
  pages = {1--10}
}
"#,
        )
        .unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].key, "smith2020");
        assert_eq!(entries[0].journal_name.as_deref(), Some("Journal of Machine Learning Research"));
        assert_eq!(entries[0].venue_type, EntityType::Journal);
        assert_eq!(entries[1].entry_type, "inproceedings");
        assert_eq!(
            entries[1].journal_name.as_deref(),
            Some("International Conference on Machine Learning (ICML)")
        );
        assert_eq!(entries[1].venue_type, EntityType::Conference);
    }

    #[test]
    fn test_workshop_and_series_fallback() {
        let entries = parse(
            "@inproceedings{w1, booktitle = {Workshop on Deep Learning (DLW)}}\n\
             @proceedings{p1, series = {Lecture Notes}}\n\
             @misc{m1, title = {no venue}}",
        )
        .unwrap();
        assert_eq!(entries[0].venue_type, EntityType::Workshop);
        assert_eq!(entries[1].journal_name.as_deref(), Some("Lecture Notes"));
        assert_eq!(entries[2].journal_name, None);
        assert_eq!(entries[2].venue_type, EntityType::Unknown);
    }

    #[test]
    fn test_skips_comment_and_preamble_and_concatenates() {
        let entries = parse(
            "@comment{ignore this entirely}\n\
             @preamble{\"plain preamble\"}\n\
             @article{k1, journal = \"Nature\" # { Physics}}",
        )
        .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].journal_name.as_deref(), Some("Nature Physics"));
    }

    #[test]
    fn test_string_macros_are_expanded() {
        let entries = parse(
            "@string{jmlr = \"Journal of ML Research (JMLR)\"}\n\
             @article{k1, journal = jmlr}",
        )
        .unwrap();
        assert_eq!(entries[0].journal_name.as_deref(), Some("Journal of ML Research (JMLR)"));
    }

    #[test]
    fn test_latex_accents_are_decoded() {
        let entries = parse(r"@article{k1, journal = {Revue d'{\'E}conomie Politique}}").unwrap();
        let venue = entries[0].journal_name.as_deref().unwrap();
        assert!(!venue.contains('\\'), "{}", venue);
        assert!(venue.contains("conomie Politique"));
    }

    #[test]
    fn test_malformed_entry_does_not_hide_the_rest() {
        let entries = parse(
            "@string{acm = \"ACM Computing Surveys (CSUR)\"}\n\
             @article{good1, journal = acm}\n\
             @article{bad, journal = {Unclosed}\n\
             @article{good2, journal = {Nature}}\n",
        )
        .unwrap();
        let keys: Vec<&str> = entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["good1", "good2"]);
        assert_eq!(entries[0].journal_name.as_deref(), Some("ACM Computing Surveys (CSUR)"));
    }

    #[test]
    fn test_unterminated_entry_is_an_error() {
        let err = parse("@article{broken, journal = {Nature").unwrap_err();
        match err {
            VenueError::Parse { path, .. } => assert_eq!(path, Path::new("test.bib")),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_empty_file_has_no_entries() {
        assert!(parse("").unwrap().is_empty());
    }

    #[test]
    fn test_read_entries_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("refs.bib");
        std::fs::write(&path, "@article{a, journal = {Cell}}").unwrap();
        let entries = BibtexEntrySource::new().read_entries(&path).unwrap();
        assert_eq!(entries[0].journal_name.as_deref(), Some("Cell"));
    }
}
