//! Synthetic workload that floods the engine with observations.
//!
//! The knowledge base holds one rule,
//! `if(and(distanceAt(Item1, D1, T), distanceAt(Item2, D2, T)), distanceBetweenBoundedBy(D1, Item1, Item2, T))`,
//! and each explosion step adds a fresh `distanceAt` observation for both
//! items at the next time index. Every new pair of facts makes the rule
//! produce another batch of candidate resolutions, most of which fail to unify.

use rand::Rng;

use crate::engine::ReasoningEngine;
use crate::types::{EngineError, ResolutionTask};

/// Symbols of the distance knowledge base, used as the default vocabulary.
pub fn default_subjects() -> Vec<String> {
    ["a", "b", "distanceAt", "distanceBetweenBoundedBy"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// The two observations asserted at time index `t`.
pub fn observations<R: Rng + ?Sized>(t: usize, max_distance: u32, rng: &mut R) -> [String; 2] {
    [
        format!("distanceAt(a, {}, {t}).", rng.gen_range(0..=max_distance)),
        format!("distanceAt(b, {}, {t}).", rng.gen_range(0..=max_distance)),
    ]
}

/// Run `steps` explosion steps: assert both observations, then advance the
/// engine once.
///
/// Returns the pending set observed just before the final step (empty when
/// `steps` is zero).
pub fn explosion<E, R>(
    engine: &mut E,
    steps: usize,
    max_distance: u32,
    rng: &mut R,
) -> Result<Vec<ResolutionTask>, EngineError>
where
    E: ReasoningEngine + ?Sized,
    R: Rng + ?Sized,
{
    let mut pending = Vec::new();
    for t in 0..steps {
        for fact in observations(t, max_distance, rng) {
            engine.assert_fact(&fact)?;
        }
        pending = engine.pending_tasks()?;
        engine.step()?;
    }
    tracing::debug!(steps, pending = pending.len(), "Explosion done");
    Ok(pending)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[derive(Default)]
    struct Recorder {
        facts: Vec<String>,
        steps: usize,
    }

    impl ReasoningEngine for Recorder {
        fn pending_tasks(&mut self) -> Result<Vec<ResolutionTask>, EngineError> {
            Ok(vec![ResolutionTask::new(self.steps as u64, "p(a)", "p(X)")])
        }
        fn ground_truth_labels(&mut self, _: &[ResolutionTask]) -> Result<Vec<String>, EngineError> {
            Ok(vec![])
        }
        fn set_priorities(&mut self, _: &[f64]) -> Result<(), EngineError> {
            Ok(())
        }
        fn promote(&mut self, _: f64) -> Result<(), EngineError> {
            Ok(())
        }
        fn step(&mut self) -> Result<(), EngineError> {
            self.steps += 1;
            Ok(())
        }
        fn assert_fact(&mut self, formula: &str) -> Result<(), EngineError> {
            self.facts.push(formula.to_string());
            Ok(())
        }
        fn knowledge_base(&mut self) -> Result<Vec<String>, EngineError> {
            Ok(self.facts.clone())
        }
        fn reset(&mut self) -> Result<(), EngineError> {
            *self = Self::default();
            Ok(())
        }
    }

    #[test]
    fn test_explosion_asserts_two_facts_per_step() {
        let mut engine = Recorder::default();
        let mut rng = StdRng::seed_from_u64(7);
        let pending = explosion(&mut engine, 3, 10, &mut rng).unwrap();

        assert_eq!(engine.steps, 3);
        assert_eq!(engine.facts.len(), 6);
        assert!(engine.facts[0].starts_with("distanceAt(a, "));
        assert!(engine.facts[1].starts_with("distanceAt(b, "));
        assert!(engine.facts[4].ends_with(", 2)."));
        // Pending set is captured before the final step.
        assert_eq!(pending[0].id, 2);
    }

    #[test]
    fn test_observation_distances_in_range() {
        let mut rng = StdRng::seed_from_u64(0);
        for t in 0..50 {
            for fact in observations(t, 3, &mut rng) {
                let d: u32 = fact
                    .split(", ")
                    .nth(1)
                    .and_then(|s| s.parse().ok())
                    .unwrap();
                assert!(d <= 3, "distance {d} out of range in {fact}");
            }
        }
    }

    #[test]
    fn test_zero_steps_is_noop() {
        let mut engine = Recorder::default();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(explosion(&mut engine, 0, 10, &mut rng).unwrap().is_empty());
        assert!(engine.facts.is_empty());
    }

    #[test]
    fn test_default_subjects() {
        assert_eq!(
            default_subjects(),
            vec!["a", "b", "distanceAt", "distanceBetweenBoundedBy"]
        );
    }
}
