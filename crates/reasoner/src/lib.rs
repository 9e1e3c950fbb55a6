//! Client side of the external resolution engine.
//!
//! The engine owns the clause database, unification and resolution
//! stepping. This crate only fixes the call contract the prefilter needs
//! against it: fetch the pending resolution tasks, ask for their
//! ground-truth verdicts, push priorities back, promote, and step.
//!
//! # Key types
//!
//! - [`ReasoningEngine`]: the call contract, implemented by sessions and mocks
//! - [`EngineSession`]: JSON-lines subprocess session (one engine per session)
//! - [`ResolutionTask`] / [`Expression`]: the unit the prefilter scores
//! - [`workload`]: synthetic fact generator used to drive training episodes

pub mod engine;
pub mod protocol;
pub mod session;
pub mod types;
pub mod workload;

pub use engine::ReasoningEngine;
pub use protocol::{EngineRequest, EngineResponse};
pub use session::EngineSession;
pub use types::{parse_verdict, EngineConfig, EngineError, Expression, ResolutionTask};
