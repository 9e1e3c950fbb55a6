//! Result types for guided evaluation runs.

use feedback::{EvalConfig, GuidedReport, KbReport};
use serde::{Deserialize, Serialize};

/// One guided evaluation, as written by `eval --output`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalResult {
    /// `"prefilter"` or `"uniform"`.
    pub scorer: String,
    /// Checkpoint id when the trained prefilter was used.
    pub model_name: Option<String>,
    pub explosion_steps: usize,
    pub steps: usize,
    pub priority_threshold: f64,
    pub target_predicate: String,
    /// Pending tasks scored over the run.
    pub scored: usize,
    /// Number of distinct target facts derived.
    pub distinct_target_facts: usize,
    /// Knowledge-base scans in step order.
    pub reports: Vec<KbReport>,
    pub target_facts: Vec<String>,
}

impl EvalResult {
    pub fn new(report: GuidedReport, config: &EvalConfig, model_name: Option<String>) -> Self {
        Self {
            scorer: report.scorer,
            model_name,
            explosion_steps: config.explosion_steps,
            steps: report.steps,
            priority_threshold: config.priority_threshold,
            target_predicate: config.target_predicate.clone(),
            scored: report.scored,
            distinct_target_facts: report.target_facts.len(),
            reports: report.reports,
            target_facts: report.target_facts,
        }
    }

    /// First scan step at which at least `n` target facts were present.
    pub fn steps_to_reach(&self, n: usize) -> Option<usize> {
        self.reports
            .iter()
            .find(|r| r.target_facts >= n)
            .map(|r| r.step)
    }
}
