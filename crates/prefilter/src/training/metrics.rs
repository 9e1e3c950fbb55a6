/// Loss and accuracy of one training step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepMetrics {
    pub loss: f64,
    pub accuracy: f64,
    /// Number of examples the step was computed on.
    pub examples: usize,
}

impl StepMetrics {
    /// Early-stopping criterion: accuracy strictly above `min_accuracy`
    /// and loss strictly below `max_loss`.
    pub fn is_converged(&self, min_accuracy: f64, max_loss: f64) -> bool {
        self.accuracy > min_accuracy && self.loss < max_loss
    }

    /// Example-weighted average over several steps.
    pub fn combine(steps: &[StepMetrics]) -> Option<StepMetrics> {
        let examples: usize = steps.iter().map(|m| m.examples).sum();
        if examples == 0 {
            return None;
        }
        let n = examples as f64;
        Some(StepMetrics {
            loss: steps.iter().map(|m| m.loss * m.examples as f64).sum::<f64>() / n,
            accuracy: steps.iter().map(|m| m.accuracy * m.examples as f64).sum::<f64>() / n,
            examples,
        })
    }
}

/// Per-class loss weights for an imbalanced batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassWeights {
    pub negative: f32,
    pub positive: f32,
}

impl ClassWeights {
    /// Inverse-frequency weights `n / (2 * n_class)`.
    ///
    /// `None` for an empty or single-class batch, which trains unweighted.
    pub fn from_targets(targets: &[f32]) -> Option<Self> {
        let n = targets.len();
        let pos = targets.iter().filter(|&&t| t >= 0.5).count();
        let neg = n - pos;
        if pos == 0 || neg == 0 {
            return None;
        }
        Some(Self {
            negative: n as f32 / (2 * neg) as f32,
            positive: n as f32 / (2 * pos) as f32,
        })
    }

    /// Per-example weights aligned with `targets`.
    pub fn per_example(&self, targets: &[f32]) -> Vec<f32> {
        targets
            .iter()
            .map(|&t| if t >= 0.5 { self.positive } else { self.negative })
            .collect()
    }
}

/// Fraction of predictions on the correct side of 0.5.
pub fn binary_accuracy(probs: &[f64], targets: &[f32]) -> f64 {
    if probs.is_empty() {
        return 0.0;
    }
    let correct = probs
        .iter()
        .zip(targets)
        .filter(|(&p, &t)| (p >= 0.5) == (t >= 0.5))
        .count();
    correct as f64 / probs.len() as f64
}
