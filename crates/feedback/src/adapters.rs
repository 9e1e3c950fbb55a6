//! [`TaskScorer`] implementations: the trained prefilter and a random baseline.

use prefilter::ResPrefilter;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use reasoner::ResolutionTask;

use crate::driver::TaskScorer;

// ---------------------------------------------------------------------------
// ResPrefilter: learned priorities
// ---------------------------------------------------------------------------

impl TaskScorer for ResPrefilter {
    fn name(&self) -> &'static str {
        "prefilter"
    }

    fn priorities(&mut self, tasks: &[ResolutionTask]) -> anyhow::Result<Vec<f64>> {
        ResPrefilter::priorities(self, tasks)
    }
}

// ---------------------------------------------------------------------------
// UniformScorer: baseline with no model
// ---------------------------------------------------------------------------

/// Assigns every task an independent uniform priority in `[0, 1)`.
///
/// This is the baseline a guided run is compared against.
pub struct UniformScorer {
    rng: StdRng,
}

impl UniformScorer {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }
}

impl TaskScorer for UniformScorer {
    fn name(&self) -> &'static str {
        "uniform"
    }

    fn priorities(&mut self, tasks: &[ResolutionTask]) -> anyhow::Result<Vec<f64>> {
        Ok(tasks.iter().map(|_| self.rng.gen::<f64>()).collect())
    }
}
