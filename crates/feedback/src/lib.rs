//! Priority-feedback training and guided evaluation.
//!
//! [`TrainingDriver`] runs the loop that teaches a [`prefilter::ResPrefilter`]
//! from engine ground truth while feeding its priorities back into the same
//! engine. [`run_guided`] measures how well any [`TaskScorer`] steers an
//! engine toward target facts.
//!
//! # Key types
//!
//! - [`TrainingDriver`]: rounds of explosion + feedback steps + periodic training
//! - [`TaskScorer`]: the priority seam; see [`adapters`] for implementations
//! - [`DriverConfig`] / [`EvalConfig`]: TOML-loadable run settings
//! - [`mocks::MockEngine`]: scripted engine for tests

pub mod adapters;
pub mod config;
pub mod driver;
pub mod mocks;

pub use adapters::UniformScorer;
pub use config::{DriverConfig, EvalConfig};
pub use driver::{
    run_guided, target_fact, DriverError, GuidedReport, KbReport, RoundSummary, StopReason,
    TaskScorer, TrainingDriver, TrainingOutcome,
};
