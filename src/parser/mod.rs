pub mod bibtex;

pub use bibtex::BibtexEntrySource;

use serde::Serialize;
use std::path::Path;

use crate::error::Result;
use crate::types::EntityType;

/// One bibliography entry reduced to what venue resolution needs
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct VenueEntry {
    pub key: String,
    pub entry_type: String,
    /// Journal or proceedings title as written in the source
    pub journal_name: Option<String>,
    pub venue_type: EntityType,
}

/// Source of structured entries for Stage 1 workers. Implementations are
/// shared read-only across worker threads.
pub trait EntrySource: Send + Sync {
    /// Parse entries out of `content`; `origin` is only used in errors
    fn parse(&self, content: &str, origin: &Path) -> Result<Vec<VenueEntry>>;

    fn read_entries(&self, path: &Path) -> Result<Vec<VenueEntry>> {
        let bytes = std::fs::read(path)?;
        let content = String::from_utf8_lossy(&bytes);
        self.parse(&content, path)
    }
}
