//! Training pieces for the dense scorer: weighted BCE loss, step metrics
//! and the Adam-driven classifier.

pub mod loss;
pub mod metrics;
pub mod trainer;
