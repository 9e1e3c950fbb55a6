//! The call contract between the prefilter and the resolution engine.

use crate::types::{EngineError, ResolutionTask};

/// A stateful reasoning session.
///
/// All calls take `&mut self`: the engine is a single mutable session and
/// callers hold exclusive, serialized access to it. Positional
/// correspondence matters: `set_priorities` assigns the i-th weight to the
/// i-th task of the most recent `pending_tasks` call.
pub trait ReasoningEngine {
    /// Tasks currently awaiting a priority decision.
    fn pending_tasks(&mut self) -> Result<Vec<ResolutionTask>, EngineError>;

    /// One ground-truth record per task, in task order. See
    /// [`parse_verdict`](crate::types::parse_verdict) for the record format.
    fn ground_truth_labels(&mut self, tasks: &[ResolutionTask]) -> Result<Vec<String>, EngineError>;

    /// Assign priority weights to the current pending set. Higher = more urgent.
    fn set_priorities(&mut self, priorities: &[f64]) -> Result<(), EngineError>;

    /// Move pending tasks whose priority exceeds `threshold` into the
    /// active work queue.
    fn promote(&mut self, threshold: f64) -> Result<(), EngineError>;

    /// Advance the engine by one unit of reasoning work.
    fn step(&mut self) -> Result<(), EngineError>;

    /// Inject a new ground fact, e.g. `distanceAt(a, 3, 0).`
    fn assert_fact(&mut self, formula: &str) -> Result<(), EngineError>;

    /// Printed clauses of the current knowledge base.
    fn knowledge_base(&mut self) -> Result<Vec<String>, EngineError>;

    /// Reinitialize the session from its original knowledge base.
    fn reset(&mut self) -> Result<(), EngineError>;
}

impl<E: ReasoningEngine + ?Sized> ReasoningEngine for &mut E {
    fn pending_tasks(&mut self) -> Result<Vec<ResolutionTask>, EngineError> {
        (**self).pending_tasks()
    }

    fn ground_truth_labels(&mut self, tasks: &[ResolutionTask]) -> Result<Vec<String>, EngineError> {
        (**self).ground_truth_labels(tasks)
    }

    fn set_priorities(&mut self, priorities: &[f64]) -> Result<(), EngineError> {
        (**self).set_priorities(priorities)
    }

    fn promote(&mut self, threshold: f64) -> Result<(), EngineError> {
        (**self).promote(threshold)
    }

    fn step(&mut self) -> Result<(), EngineError> {
        (**self).step()
    }

    fn assert_fact(&mut self, formula: &str) -> Result<(), EngineError> {
        (**self).assert_fact(formula)
    }

    fn knowledge_base(&mut self) -> Result<Vec<String>, EngineError> {
        (**self).knowledge_base()
    }

    fn reset(&mut self) -> Result<(), EngineError> {
        (**self).reset()
    }
}
