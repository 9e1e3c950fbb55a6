//! Versioned checkpoint metadata.
//!
//! A checkpoint `id` in directory `dir` is two files:
//! `rl_model_{id}.json` (this metadata) and `rl_model_{id}.mpk` (scorer
//! parameters written by the burn recorder).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::model::ScorerDescriptor;

pub const SCHEMA_VERSION: u32 = 1;

/// Errors raised while validating a checkpoint before its parameters load.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("checkpoint configuration mismatch: {0}")]
    ConfigMismatch(String),

    #[error("unsupported checkpoint schema version {found} (expected {expected})")]
    UnsupportedSchema { found: u32, expected: u32 },
}

/// Everything needed to rebuild a prefilter except the scorer weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMeta {
    pub schema_version: u32,
    pub subjects: Vec<String>,
    pub words: Vec<String>,
    pub num_subjects: usize,
    pub num_words: usize,
    pub batch_size: usize,
    pub numeric_bits: u32,
    pub scorer: ScorerDescriptor,
    pub input_dim: usize,
}

/// Path of the metadata file for checkpoint `id`.
pub fn meta_path(dir: &Path, id: &str) -> PathBuf {
    dir.join(format!("rl_model_{id}.json"))
}

/// Parameter file stem for checkpoint `id`; the recorder appends `.mpk`.
pub fn params_stem(dir: &Path, id: &str) -> PathBuf {
    dir.join(format!("rl_model_{id}"))
}

impl CheckpointMeta {
    /// Check internal consistency.
    pub fn validate(&self) -> Result<(), CheckpointError> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(CheckpointError::UnsupportedSchema {
                found: self.schema_version,
                expected: SCHEMA_VERSION,
            });
        }
        if self.num_subjects != self.subjects.len() {
            return Err(CheckpointError::ConfigMismatch(format!(
                "num_subjects is {} but {} subjects are listed",
                self.num_subjects,
                self.subjects.len()
            )));
        }
        if self.num_words != self.words.len() {
            return Err(CheckpointError::ConfigMismatch(format!(
                "num_words is {} but {} words are listed",
                self.num_words,
                self.words.len()
            )));
        }
        let expected_dim = 2 * (self.num_subjects + 1);
        if self.input_dim != expected_dim {
            return Err(CheckpointError::ConfigMismatch(format!(
                "input_dim is {} but {} subjects need {expected_dim}",
                self.input_dim, self.num_subjects
            )));
        }
        if self.batch_size == 0 {
            return Err(CheckpointError::ConfigMismatch("batch_size is 0".into()));
        }
        Ok(())
    }

    pub fn write(&self, dir: &Path, id: &str) -> anyhow::Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = meta_path(dir, id);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)
            .map_err(|e| anyhow::anyhow!("Failed to write {}: {e}", path.display()))?;
        Ok(path)
    }

    /// Read and validate the metadata of checkpoint `id`.
    pub fn read(dir: &Path, id: &str) -> anyhow::Result<Self> {
        let path = meta_path(dir, id);
        let meta: CheckpointMeta = serde_json::from_reader(
            std::fs::File::open(&path)
                .map_err(|e| anyhow::anyhow!("Failed to open {}: {e}", path.display()))?,
        )
        .map_err(|e| anyhow::anyhow!("Failed to parse {}: {e}", path.display()))?;
        meta.validate()?;
        Ok(meta)
    }
}
