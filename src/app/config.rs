//! Application configuration
//!
//! Settings are layered: built-in defaults, then `SCRAPEFLOW_*` environment
//! variables, then a TOML file, then command-line flags.

use crate::error::ConfigError;
use anyhow::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Config file picked up from the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "scrapeflow.toml";

const DEFAULT_MAX_PARALLEL: usize = 4;

/// Contents of a `scrapeflow.toml` file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub output_dir: Option<PathBuf>,
    pub max_parallel: Option<usize>,
    pub log_level: Option<String>,
}

/// Application configuration structure
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Verbosity level for logging
    pub verbose: u8,
    /// Base directory for `saveToFile` output
    pub output_dir: PathBuf,
    /// Upper bound on concurrently running batch jobs
    pub max_parallel: usize,
    /// Log filter used when no `-v` flag is given
    pub log_level: Option<String>,
}

impl AppConfig {
    pub fn new(verbose: u8) -> Self {
        Self {
            verbose,
            ..Self::default()
        }
    }

    /// Build the configuration from environment and an optional config file
    ///
    /// An explicit `config_path` must exist; the default file is optional.
    pub fn load(verbose: u8, config_path: Option<&Path>) -> Result<Self> {
        let mut config = Self::new(verbose);
        config.merge_env_vars();
        match config_path {
            Some(path) => config.merge_file(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    config.merge_file(default_path)?;
                }
            }
        }
        Ok(config)
    }

    fn merge_env_vars(&mut self) {
        if let Ok(dir) = std::env::var("SCRAPEFLOW_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
        if let Ok(level) = std::env::var("SCRAPEFLOW_LOG") {
            self.log_level = Some(level);
        }
        if let Some(parallel) = std::env::var("SCRAPEFLOW_MAX_PARALLEL")
            .ok()
            .and_then(|value| value.parse().ok())
        {
            self.max_parallel = parallel;
        }
    }

    /// Overlay settings from a TOML file
    pub fn merge_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::NotFound {
            path: path.to_path_buf(),
            source,
        })?;
        self.merge_toml(&content)
            .map_err(|source| ConfigError::InvalidToml {
                path: path.to_path_buf(),
                source,
            })?;
        debug!("Loaded configuration from {}", path.display());
        Ok(())
    }

    /// Overlay settings from TOML text
    pub fn merge_toml(&mut self, content: &str) -> Result<(), toml::de::Error> {
        let file: FileConfig = toml::from_str(content)?;
        if let Some(dir) = file.output_dir {
            self.output_dir = dir;
        }
        if let Some(parallel) = file.max_parallel {
            self.max_parallel = parallel;
        }
        if let Some(level) = file.log_level {
            self.log_level = Some(level);
        }
        Ok(())
    }

    pub fn with_output_dir(mut self, dir: PathBuf) -> Self {
        self.output_dir = dir;
        self
    }

    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel;
        self
    }

    /// Get the log filter based on verbosity, falling back to the configured level
    pub fn log_level(&self) -> String {
        match self.verbose {
            0 => self.log_level.clone().unwrap_or_else(|| "info".to_string()),
            1 => "debug".to_string(),
            _ => "trace".to_string(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            verbose: 0,
            output_dir: PathBuf::from("."),
            max_parallel: DEFAULT_MAX_PARALLEL,
            log_level: None,
        }
    }
}
