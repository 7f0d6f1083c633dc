use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};

use venue_identity::batch::{discover_bibtex_files, BatchAcronymProcessor, MergedAcronymResult};
use venue_identity::config::Config;
use venue_identity::learning::AbbreviationLearner;
use venue_identity::parser::BibtexEntrySource;
use venue_identity::types::EntityType;
use venue_identity::{logging, metrics, AcronymStore, TextNormalizer};

#[derive(Parser)]
#[command(name = "venue-identity")]
#[command(about = "Venue name normalization, abbreviation learning and acronym reconciliation")]
#[command(version = "0.1.0")]
struct Cli {
    /// Configuration file (defaults to venue_identity.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// SQLite database, overriding the configuration
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Print Prometheus metrics after the command
    #[arg(long, global = true)]
    metrics: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract acronyms from BibTeX files and reconcile them with the store
    Sync {
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long)]
        dir: Option<PathBuf>,
        /// Scan subdirectories of --dir
        #[arg(long)]
        recursive: bool,
        /// Classify only; write nothing
        #[arg(long)]
        dry_run: bool,
        /// Print the merge result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Normalize a venue name
    Normalize {
        name: String,
        #[arg(long, default_value = "conference")]
        entity_type: EntityType,
    },
    /// Resolve an acronym to its canonical name
    Lookup {
        acronym: String,
        #[arg(long, default_value = "conference")]
        entity_type: EntityType,
    },
    /// List stored variants of an acronym
    Variants {
        acronym: String,
        #[arg(long, default_value = "conference")]
        entity_type: EntityType,
    },
    /// List learned abbreviations
    Learned {
        #[arg(long)]
        min_confidence: Option<f64>,
    },
    /// Align two forms of a venue name and show the abbreviations found
    Learn {
        short: String,
        long: String,
        /// Persist what was found
        #[arg(long)]
        save: bool,
    },
    /// Withhold resolution of an acronym until resolved by hand
    MarkAmbiguous {
        acronym: String,
        #[arg(long, default_value = "conference")]
        entity_type: EntityType,
    },
    /// Show store statistics
    Stats,
    /// Delete all acronym variants (and learned abbreviations with --learned)
    Clear {
        #[arg(long)]
        learned: bool,
    },
}

fn print_merge_summary(merged: &MergedAcronymResult) {
    println!("\n📊 Merge results:");
    println!("   Files processed: {}", merged.files_processed);
    println!("   Files with errors: {}", merged.files_with_errors);
    println!("   Entries: {}", merged.total_entries);
    println!("   New acronyms: {}", merged.new_acronyms.len());
    for entry in &merged.new_acronyms {
        println!("     + {} ({}) -> {} [{}]", entry.acronym, entry.entity_type, entry.normalized_name, entry.count);
    }
    println!("   Existing acronyms: {}", merged.existing_acronyms.len());
    println!("   Conflicts: {}", merged.conflicts.len());
    for conflict in &merged.conflicts {
        println!("     ! {} ({}, {:?})", conflict.acronym, conflict.entity_type, conflict.kind);
        for name in &conflict.observed {
            println!("         observed: {} [{}]", name.normalized_name, name.count);
        }
        for name in &conflict.existing {
            println!("         stored:   {} [{}]", name.name, name.count);
        }
    }
    if !merged.ambiguous_skipped.is_empty() {
        println!("   Skipped as ambiguous: {}", merged.ambiguous_skipped.len());
    }
    if !merged.errors.is_empty() {
        println!("\n⚠️  Errors encountered:");
        for e in &merged.errors {
            println!("   - {}: {}", e.file_path.display(), e.message);
        }
    }
}

fn run(cli: Cli, config: Config) -> anyhow::Result<()> {
    let store = AcronymStore::open(&config.database_path)
        .with_context(|| format!("opening {}", config.database_path.display()))?;

    match cli.command {
        Commands::Sync {
            file,
            dir,
            recursive,
            dry_run,
            json,
        } => {
            let files = discover_bibtex_files(file.as_deref(), dir.as_deref(), recursive || config.recursive)?;
            if files.is_empty() {
                bail!("no BibTeX files found");
            }
            info!("Discovered {} BibTeX files", files.len());

            let processor = BatchAcronymProcessor::new(&store, Box::new(BibtexEntrySource::new()))
                .with_max_workers(config.max_workers)
                .with_min_confidence(config.min_confidence);
            let results = processor.process_files_parallel(&files);
            let merged = processor.merge_file_results(&results)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&merged)?);
            } else {
                print_merge_summary(&merged);
            }
            if dry_run {
                println!("\nDry run: nothing written");
            } else {
                let summary = processor.apply_merged_result(&merged, Some(&config.source_label))?;
                println!(
                    "\n✅ Wrote {} variants, recorded {} conflicts",
                    summary.variants_written, summary.conflicts_recorded
                );
            }
        }
        Commands::Normalize { name, entity_type } => {
            let lookup = store.acronym_lookup(entity_type);
            let normalized = TextNormalizer::new().normalize(&name, Some(&lookup))?;
            println!("{}", serde_json::to_string_pretty(&normalized)?);
        }
        Commands::Lookup { acronym, entity_type } => {
            match store.get_full_name_for_acronym(&acronym, entity_type)? {
                Some(name) => println!("{}", name),
                None if store.is_acronym_ambiguous(&acronym, entity_type)? => {
                    println!("{} ({}) is ambiguous", acronym, entity_type)
                }
                None => println!("{} ({}) is unknown", acronym, entity_type),
            }
        }
        Commands::Variants { acronym, entity_type } => {
            let variants = store.get_variants(&acronym, entity_type)?;
            println!("{}", serde_json::to_string_pretty(&variants)?);
        }
        Commands::Learned { min_confidence } => {
            let rows = store.list_learned_abbreviations(min_confidence.unwrap_or(config.min_confidence))?;
            for row in rows {
                println!(
                    "{:<16} -> {:<24} confidence {:.3}  seen {}",
                    row.abbreviated_form, row.expanded_form, row.confidence_score, row.occurrence_count
                );
            }
        }
        Commands::Learn { short, long, save } => {
            let mappings = AbbreviationLearner::new().learn_abbreviations_from_pair(&short, &long);
            for m in &mappings {
                println!("{} -> {} ({:.2}, {:?})", m.abbreviated, m.expanded, m.confidence, m.pattern);
                if save {
                    store.store_learned_abbreviation(&m.abbreviated, &m.expanded, m.confidence, None)?;
                }
            }
            if mappings.is_empty() {
                println!("No abbreviations found");
            }
        }
        Commands::MarkAmbiguous { acronym, entity_type } => {
            let updated = store.mark_acronym_as_ambiguous(&acronym, entity_type)?;
            println!("Marked {} variants of {} ({}) as ambiguous", updated, acronym, entity_type);
        }
        Commands::Stats => {
            println!("{}", serde_json::to_string_pretty(&store.get_stats()?)?);
        }
        Commands::Clear { learned } => {
            let variants = store.clear_acronym_variants()?;
            println!("Deleted {} acronym variants", variants);
            if learned {
                let rows = store.clear_learned_abbreviations()?;
                println!("Deleted {} learned abbreviations", rows);
            }
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(db) = &cli.db {
        config.database_path = db.clone();
    }

    // Initialize logging; the guard flushes the file writer on exit
    let _guard = logging::init_logging(&config.log_dir);

    let print_metrics = cli.metrics;
    if print_metrics {
        metrics::init_metrics();
    }

    let outcome = run(cli, config);
    if let Err(e) = &outcome {
        error!("Command failed: {:#}", e);
    }
    if print_metrics {
        if let Some(rendered) = metrics::render() {
            println!("{}", rendered);
        }
    }
    outcome
}
