use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::error::MpcError;

/// Configuration of SPDZ protocol suite.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpdzConfig {
    /// Maximum number of gates evaluated in one batch.
    pub max_batch_size: usize,
    /// Number of gates after which a MAC check is forced.
    pub mac_check_threshold: usize,
    pub preprocessing: PreprocessingConfig,
}

impl Default for SpdzConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 4096,
            mac_check_threshold: 100_000,
            preprocessing: PreprocessingConfig::default(),
        }
    }
}

/// Source of preprocessing material.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum PreprocessingConfig {
    /// Insecure material derived from a seed shared by all parties.
    Fake { seed: u8 },
    /// Material produced by a trusted dealer and stored in a file.
    Precomputed { path: PathBuf },
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        PreprocessingConfig::Fake { seed: 0 }
    }
}

impl SpdzConfig {
    /// Load configuration from JSON file. Relative preprocessing paths are resolved against
    /// the directory of the configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, MpcError> {
        let path = path.as_ref();
        let parent_dir = path
            .parent()
            .ok_or_else(|| MpcError::config("Invalid configuration path"))?;

        let file = File::open(path).map_err(|err| {
            MpcError::config(format!("Cannot open {}: {err}", path.display()))
        })?;
        let mut config: SpdzConfig = serde_json::from_reader(BufReader::new(file))
            .map_err(|err| MpcError::config(format!("Invalid configuration: {err}")))?;

        if let PreprocessingConfig::Precomputed { path } = &mut config.preprocessing {
            if path.is_relative() {
                *path = parent_dir.join(&*path);
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the evaluator cannot run with.
    pub fn validate(&self) -> Result<(), MpcError> {
        if self.max_batch_size == 0 {
            return Err(MpcError::config("max_batch_size must be positive"));
        }
        if self.mac_check_threshold == 0 {
            return Err(MpcError::config("mac_check_threshold must be positive"));
        }
        Ok(())
    }
}
