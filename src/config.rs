use std::env;
use std::path::{Path, PathBuf};

pub const DEFAULT_RAW_DATA_DIR: &str = "england_data";
pub const DEFAULT_PROCESSED_DATA_DIR: &str = "processed_data";
pub const DEFAULT_MASTER_NAME: &str = "England";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Master name must be a bare file stem, got: {0}")]
    InvalidMasterName(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub raw_data_dir: PathBuf,
    pub processed_data_dir: PathBuf,
    pub master_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            raw_data_dir: PathBuf::from(DEFAULT_RAW_DATA_DIR),
            processed_data_dir: PathBuf::from(DEFAULT_PROCESSED_DATA_DIR),
            master_name: DEFAULT_MASTER_NAME.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Config {
            raw_data_dir: env::var("RAW_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_RAW_DATA_DIR)),
            processed_data_dir: env::var("PROCESSED_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_PROCESSED_DATA_DIR)),
            master_name: env::var("MASTER_NAME")
                .unwrap_or_else(|_| DEFAULT_MASTER_NAME.to_string()),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn new(
        raw_data_dir: impl Into<PathBuf>,
        processed_data_dir: impl Into<PathBuf>,
        master_name: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let config = Config {
            raw_data_dir: raw_data_dir.into(),
            processed_data_dir: processed_data_dir.into(),
            master_name: master_name.into(),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let name = self.master_name.trim();
        let is_bare = !name.is_empty()
            && !name.contains(['/', '\\', '.'])
            && Path::new(name).components().count() == 1;
        if is_bare {
            Ok(())
        } else {
            Err(ConfigError::InvalidMasterName(self.master_name.clone()))
        }
    }

    /// Path of the master table, e.g. `processed_data/England.csv`
    pub fn master_path(&self) -> PathBuf {
        self.processed_data_dir
            .join(format!("{}.csv", self.master_name.trim()))
    }

    pub fn region_dir(&self, region_slug: &str) -> PathBuf {
        self.processed_data_dir.join(region_slug)
    }
}
