use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

use venue_identity::batch::{discover_bibtex_files, BatchAcronymProcessor, ConflictKind};
use venue_identity::parser::BibtexEntrySource;
use venue_identity::types::EntityType;
use venue_identity::AcronymStore;

fn write_entries(dir: &Path, name: &str, booktitle: &str, count: usize) -> Result<PathBuf> {
    let content: String = (0..count)
        .map(|i| format!("@inproceedings{{{}{},\n  title = {{Paper {}}},\n  booktitle = {{{}}},\n}}\n", name, i, i, booktitle))
        .collect();
    let path = dir.join(format!("{}.bib", name));
    fs::write(&path, content)?;
    Ok(path)
}

fn processor(store: &AcronymStore) -> BatchAcronymProcessor<'_> {
    BatchAcronymProcessor::new(store, Box::new(BibtexEntrySource::new())).with_max_workers(4)
}

#[test]
fn test_abbreviated_and_full_citations_merge_into_one_acronym() -> Result<()> {
    let temp_dir = tempdir()?;
    let store = AcronymStore::open(temp_dir.path().join("venues.db"))?;
    store.store_learned_abbreviation("intl.", "international", 0.5, None)?;
    store.store_learned_abbreviation("conf.", "conference", 0.5, None)?;

    write_entries(temp_dir.path(), "a", "International Conference on Machine Learning (ICML)", 5)?;
    write_entries(temp_dir.path(), "b", "Intl. Conf. on Machine Learning (ICML)", 3)?;
    let files = discover_bibtex_files(None, Some(temp_dir.path()), false)?;
    assert_eq!(files.len(), 2);

    let processor = processor(&store);
    let results = processor.process_files_parallel(&files);
    let merged = processor.merge_file_results(&results)?;

    assert!(merged.conflicts.is_empty(), "unexpected conflicts: {:?}", merged.conflicts);
    assert_eq!(merged.new_acronyms.len(), 1);
    let icml = &merged.new_acronyms[0];
    assert_eq!(icml.acronym, "ICML");
    assert_eq!(icml.entity_type, EntityType::Conference);
    assert_eq!(icml.normalized_name, "international conference on machine learning");
    assert_eq!(icml.count, 8);
    assert_eq!(merged.total_entries, 8);

    processor.apply_merged_result(&merged, Some("bibtex"))?;
    assert_eq!(
        store.get_full_name_for_acronym("icml", EntityType::Conference)?.as_deref(),
        Some("international conference on machine learning")
    );
    Ok(())
}

#[test]
fn test_unbridged_wording_is_a_cross_file_conflict() -> Result<()> {
    let temp_dir = tempdir()?;
    let store = AcronymStore::open(temp_dir.path().join("venues.db"))?;

    write_entries(temp_dir.path(), "a", "International Conference on Machine Learning (ICML)", 5)?;
    write_entries(temp_dir.path(), "b", "Intl. Conf. on Machine Learning (ICML)", 3)?;
    let files = discover_bibtex_files(None, Some(temp_dir.path()), false)?;

    let processor = processor(&store);
    let (merged, summary) = processor.sync(&files, Some("bibtex"))?;

    assert!(merged.new_acronyms.is_empty());
    assert_eq!(merged.conflicts.len(), 1);
    assert_eq!(merged.conflicts[0].kind, ConflictKind::CrossFile);
    assert_eq!(summary.groups_marked_ambiguous, 1);
    // Resolution is withheld rather than guessed
    assert_eq!(store.get_full_name_for_acronym("ICML", EntityType::Conference)?, None);
    Ok(())
}

#[test]
fn test_reprocessing_a_file_is_idempotent() -> Result<()> {
    let temp_dir = tempdir()?;
    let store = AcronymStore::open(temp_dir.path().join("venues.db"))?;
    let file = write_entries(
        temp_dir.path(),
        "neurips",
        "Advances in Neural Information Processing Systems (NeurIPS)",
        4,
    )?;
    let files = discover_bibtex_files(Some(&file), None, false)?;
    let processor = processor(&store);

    let (first, _) = processor.sync(&files, Some("bibtex"))?;
    assert_eq!(first.new_acronyms.len(), 1);
    assert!(first.existing_acronyms.is_empty());

    let (second, _) = processor.sync(&files, Some("bibtex"))?;
    assert!(second.new_acronyms.is_empty());
    assert_eq!(second.existing_acronyms.len(), 1);
    assert_eq!(
        second.existing_acronyms[0].existing_name.as_deref(),
        Some("advances in neural information processing systems")
    );

    let variants = store.get_variants("NeurIPS", EntityType::Conference)?;
    assert_eq!(variants.len(), 1);
    assert_eq!(variants[0].usage_count, 8);
    assert!(variants[0].is_canonical);
    Ok(())
}

#[test]
fn test_broken_file_does_not_abort_the_batch() -> Result<()> {
    let temp_dir = tempdir()?;
    let store = AcronymStore::open(temp_dir.path().join("venues.db"))?;
    write_entries(temp_dir.path(), "good", "Computer Vision and Pattern Recognition (CVPR)", 2)?;
    fs::write(temp_dir.path().join("broken.bib"), "@inproceedings{x, booktitle = {Unclosed")?;

    let files = discover_bibtex_files(None, Some(temp_dir.path()), false)?;
    let processor = processor(&store);
    let results = processor.process_files_parallel(&files);
    assert_eq!(results.iter().filter(|r| r.error.is_some()).count(), 1);

    let merged = processor.merge_file_results(&results)?;
    assert_eq!(merged.files_processed, 2);
    assert_eq!(merged.files_with_errors, 1);
    assert!(merged.errors[0].file_path.ends_with("broken.bib"));
    assert_eq!(merged.new_acronyms.len(), 1);
    assert_eq!(merged.new_acronyms[0].count, 2);
    Ok(())
}

#[test]
fn test_recursive_discovery_feeds_the_batch() -> Result<()> {
    let temp_dir = tempdir()?;
    let nested = temp_dir.path().join("2023").join("refs");
    fs::create_dir_all(&nested)?;
    write_entries(temp_dir.path(), "top", "European Conference on Computer Vision (ECCV)", 1)?;
    write_entries(&nested, "deep", "European Conference on Computer Vision 2022 (ECCV)", 2)?;

    let flat = discover_bibtex_files(None, Some(temp_dir.path()), false)?;
    assert_eq!(flat.len(), 1);
    let all = discover_bibtex_files(None, Some(temp_dir.path()), true)?;
    assert_eq!(all.len(), 2);

    let store = AcronymStore::open_in_memory()?;
    let (merged, _) = processor(&store).sync(&all, None)?;
    assert_eq!(merged.new_acronyms.len(), 1);
    assert_eq!(merged.new_acronyms[0].normalized_name, "european conference on computer vision");
    assert_eq!(merged.new_acronyms[0].count, 3);
    Ok(())
}
