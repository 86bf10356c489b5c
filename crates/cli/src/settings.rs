//! Run configuration and the file locations derived from it.

use std::path::{Path, PathBuf};

use sanctrack_recon::{CountryNormalizer, ReconConfig};

use crate::exit_codes::EXIT_CONFIG_INVALID;
use crate::CliError;

pub struct Settings {
    pub config: ReconConfig,
    /// Relative `[sources]` paths resolve against this directory
    /// (the config file's directory, or the working directory without one).
    base_dir: PathBuf,
    data_dir_override: Option<PathBuf>,
}

pub fn read_config(path: &Path) -> Result<ReconConfig, CliError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        CliError::new(EXIT_CONFIG_INVALID, format!("cannot read config {}: {e}", path.display()))
    })?;
    Ok(ReconConfig::from_toml(&text)?)
}

impl Settings {
    pub fn load(config_path: Option<&Path>) -> Result<Self, CliError> {
        let (config, base_dir) = match config_path {
            Some(path) => {
                let config = read_config(path)?;
                let base = path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
                tracing::debug!(config = %path.display(), name = ?config.name, "config loaded");
                (config, base)
            }
            None => (ReconConfig::default(), PathBuf::from(".")),
        };
        Ok(Self {
            config,
            base_dir,
            data_dir_override: None,
        })
    }

    pub fn with_data_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.data_dir_override = dir;
        self
    }

    pub fn data_dir(&self) -> PathBuf {
        match &self.data_dir_override {
            Some(dir) => dir.clone(),
            None => self.base_dir.join(&self.config.sources.data_dir),
        }
    }

    pub fn tracked_path(&self, explicit: Option<PathBuf>) -> PathBuf {
        explicit.unwrap_or_else(|| self.data_dir().join(&self.config.sources.tracked_list))
    }

    pub fn panel_path(&self, explicit: Option<PathBuf>) -> PathBuf {
        explicit.unwrap_or_else(|| self.data_dir().join(&self.config.sources.panel))
    }

    pub fn normalizer(&self) -> CountryNormalizer {
        CountryNormalizer::new(&self.config.normalize)
    }
}
