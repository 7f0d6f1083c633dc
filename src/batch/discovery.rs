use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{Result, VenueError};

fn is_bibtex(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case("bib"))
        .unwrap_or(false)
}

/// Collect BibTeX files from an explicit file and/or a directory.
///
/// Paths come back canonicalized, sorted and de-duplicated. A directory is
/// scanned one level deep unless `recursive` is set.
pub fn discover_bibtex_files(
    file: Option<&Path>,
    directory: Option<&Path>,
    recursive: bool,
) -> Result<Vec<PathBuf>> {
    if file.is_none() && directory.is_none() {
        return Err(VenueError::Discovery(
            "either a file or a directory must be given".to_string(),
        ));
    }

    let mut found = BTreeSet::new();

    if let Some(file) = file {
        if !file.is_file() {
            return Err(VenueError::Discovery(format!("not a file: {}", file.display())));
        }
        found.insert(file.canonicalize()?);
    }

    if let Some(directory) = directory {
        if !directory.is_dir() {
            return Err(VenueError::Discovery(format!(
                "not a directory: {}",
                directory.display()
            )));
        }
        let walker = WalkDir::new(directory)
            .follow_links(true)
            .max_depth(if recursive { usize::MAX } else { 1 });
        for entry in walker {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_file() && is_bibtex(entry.path()) {
                        found.insert(entry.path().canonicalize()?);
                    }
                }
                Err(e) => {
                    // Unreadable entries are skipped, not fatal
                    warn!("Error accessing entry: {}", e);
                }
            }
        }
    }

    debug!("Discovered {} BibTeX files", found.len());
    Ok(found.into_iter().collect())
}
