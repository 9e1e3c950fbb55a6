//! Learned relevance prefilter for resolution tasks.
//!
//! Buffers `(expression pair, unifies)` observations, trains a binary
//! classifier on class-balanced samples of the buffer, and scores pending
//! resolution tasks so the engine can push likely failures to the back of
//! its queue.
//!
//! # Key types
//!
//! - [`ResPrefilter`]: buffer + vectorizer + scorer, the handle the driver uses
//! - [`ExampleBuffer`]: example store and the balanced batch sampler
//! - [`ScoringFunction`]: the trainable scorer seam; [`DenseClassifier`] implements it
//! - [`CheckpointMeta`]: versioned checkpoint metadata

pub mod buffer;
pub mod checkpoint;
pub mod model;
pub mod prefilter;
pub mod training;
pub mod vectorize;

pub use buffer::{BalancedBatch, DebugPayload, Example, ExampleBuffer};
pub use checkpoint::{CheckpointError, CheckpointMeta};
pub use model::{ScorerDescriptor, ScoringFunction};
pub use prefilter::{DefaultBackend, PrefilterConfig, ResPrefilter};
pub use training::metrics::{ClassWeights, StepMetrics};
pub use training::trainer::{dense_classifier, DenseClassifier, DenseTrainingConfig};
pub use vectorize::{SymbolTable, Vectorizer};
