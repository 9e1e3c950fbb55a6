//! Scoring functions: the trainable half of the prefilter.
//!
//! The prefilter and the driver only talk to [`ScoringFunction`]; which
//! architecture sits behind it is recorded in the checkpoint descriptor.

pub mod bridge;
pub mod classifier;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::training::metrics::{ClassWeights, StepMetrics};

/// Architecture tag persisted with every checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScorerDescriptor {
    /// tanh MLP over bag-of-subjects features.
    Dense {
        hidden1: usize,
        hidden2: usize,
        learning_rate: f64,
    },
}

impl ScorerDescriptor {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Dense { .. } => "dense",
        }
    }
}

/// A trainable map from feature rows to unify probabilities in `[0, 1]`.
pub trait ScoringFunction {
    fn descriptor(&self) -> ScorerDescriptor;

    /// Expected feature row length.
    fn input_dim(&self) -> usize;

    /// One optimization step over a batch. `targets` are 0/1 labels; with
    /// `weights` each class is scaled by its weight, otherwise all
    /// examples count equally. Metrics are measured before the update.
    fn fit(
        &mut self,
        features: &[Vec<f32>],
        targets: &[f32],
        weights: Option<ClassWeights>,
    ) -> anyhow::Result<StepMetrics>;

    /// Unify probabilities. Must not change any state.
    fn predict(&self, features: &[Vec<f32>]) -> anyhow::Result<Vec<f64>>;

    /// Persist parameters. `path` has no extension; the recorder adds its own.
    fn save_params(&self, path: &Path) -> anyhow::Result<()>;

    fn load_params(&mut self, path: &Path) -> anyhow::Result<()>;
}
