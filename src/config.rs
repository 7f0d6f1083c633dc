use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::{DEFAULT_MIN_CONFIDENCE, MAX_WORKERS};
use crate::error::{Result, VenueError};

pub const DEFAULT_CONFIG_PATH: &str = "venue_identity.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite file holding acronym variants and learned abbreviations
    pub database_path: PathBuf,
    /// Upper bound for the Stage 1 worker pool (never above 8)
    pub max_workers: usize,
    /// Learned abbreviations below this confidence are ignored by the merge
    pub min_confidence: f64,
    pub log_dir: PathBuf,
    /// Default for directory discovery when the CLI flag is not given
    pub recursive: bool,
    /// Value recorded in `venue_acronym_variants.source`
    pub source_label: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("venue_identity.db"),
            max_workers: MAX_WORKERS,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            log_dir: PathBuf::from("logs"),
            recursive: false,
            source_label: "bibtex".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from `path` (or `venue_identity.toml` when present),
    /// then apply `VENUE_IDENTITY_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv::dotenv().ok();

        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_PATH))?
            }
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            VenueError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(db) = env::var("VENUE_IDENTITY_DB") {
            self.database_path = PathBuf::from(db);
        }
        if let Ok(workers) = env::var("VENUE_IDENTITY_MAX_WORKERS") {
            self.max_workers = workers.parse().map_err(|_| {
                VenueError::Config(format!("VENUE_IDENTITY_MAX_WORKERS is not a number: {}", workers))
            })?;
        }
        if let Ok(conf) = env::var("VENUE_IDENTITY_MIN_CONFIDENCE") {
            self.min_confidence = conf.parse().map_err(|_| {
                VenueError::Config(format!("VENUE_IDENTITY_MIN_CONFIDENCE is not a number: {}", conf))
            })?;
        }
        if let Ok(dir) = env::var("VENUE_IDENTITY_LOG_DIR") {
            self.log_dir = PathBuf::from(dir);
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(VenueError::Config(format!(
                "min_confidence must be within [0, 1], got {}",
                self.min_confidence
            )));
        }
        if self.max_workers == 0 {
            return Err(VenueError::Config("max_workers must be at least 1".to_string()));
        }
        self.max_workers = self.max_workers.min(MAX_WORKERS);
        Ok(())
    }
}
