//! Mock engine for testing the driver without an engine process.

use std::collections::{HashMap, VecDeque};

use reasoner::{EngineError, ReasoningEngine, ResolutionTask};

/// Convenience constructor for a task whose right side is the rule premise.
pub fn make_task(id: u64, left: &str) -> ResolutionTask {
    ResolutionTask::new(id, left, "distanceAt(Item1, D1, T)")
}

// ---------------------------------------------------------------------------
// MockEngine
// ---------------------------------------------------------------------------

/// In-memory engine with canned pending sets and labels that records every
/// call made against it.
///
/// `pending_tasks` returns the next scripted set if any remain, otherwise
/// the default set. The i-th `step` call appends the i-th step fact (if
/// any) to the knowledge base; `reset` clears asserted and derived facts.
pub struct MockEngine {
    default_pending: Vec<ResolutionTask>,
    scripted_pending: VecDeque<Vec<ResolutionTask>>,
    labels: HashMap<u64, bool>,
    base_clauses: Vec<String>,
    step_facts: Vec<String>,
    failure: Option<(&'static str, usize)>,
    counts: HashMap<&'static str, usize>,

    /// Every call, in order.
    pub calls: Vec<&'static str>,
    /// Each priority vector sent.
    pub priorities: Vec<Vec<f64>>,
    /// Each promotion threshold.
    pub promotions: Vec<f64>,
    /// Facts asserted since the last reset.
    pub facts: Vec<String>,
    /// Facts derived by steps since the last reset.
    pub derived: Vec<String>,
    pub steps: usize,
    pub resets: usize,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngine {
    /// An engine whose pending set is always empty.
    pub fn new() -> Self {
        Self {
            default_pending: Vec::new(),
            scripted_pending: VecDeque::new(),
            labels: HashMap::new(),
            base_clauses: Vec::new(),
            step_facts: Vec::new(),
            failure: None,
            counts: HashMap::new(),
            calls: Vec::new(),
            priorities: Vec::new(),
            promotions: Vec::new(),
            facts: Vec::new(),
            derived: Vec::new(),
            steps: 0,
            resets: 0,
        }
    }

    /// Return `tasks` from every `pending_tasks` call, labeled as given.
    pub fn with_pending(mut self, tasks: Vec<(ResolutionTask, bool)>) -> Self {
        self.default_pending = self.label_all(tasks);
        self
    }

    /// Queue a pending set returned once, before the default set.
    pub fn push_pending(&mut self, tasks: Vec<(ResolutionTask, bool)>) {
        let tasks = self.label_all(tasks);
        self.scripted_pending.push_back(tasks);
    }

    /// Knowledge-base clauses that survive `reset`.
    pub fn with_clauses(mut self, clauses: &[&str]) -> Self {
        self.base_clauses = clauses.iter().map(|c| c.to_string()).collect();
        self
    }

    /// The i-th `step` call since the last reset derives `facts[i]`.
    pub fn with_step_facts(mut self, facts: Vec<String>) -> Self {
        self.step_facts = facts;
        self
    }

    /// Fail the `nth` (0-based) invocation of `call` with `ProcessDied`.
    pub fn fail_on(mut self, call: &'static str, nth: usize) -> Self {
        self.failure = Some((call, nth));
        self
    }

    /// Number of times `call` was invoked.
    pub fn count(&self, call: &str) -> usize {
        self.counts.get(call).copied().unwrap_or(0)
    }

    fn label_all(&mut self, tasks: Vec<(ResolutionTask, bool)>) -> Vec<ResolutionTask> {
        tasks
            .into_iter()
            .map(|(task, unifies)| {
                self.labels.insert(task.id, unifies);
                task
            })
            .collect()
    }

    fn record(&mut self, call: &'static str) -> Result<(), EngineError> {
        self.calls.push(call);
        let n = self.counts.entry(call).or_insert(0);
        let nth = *n;
        *n += 1;
        match self.failure {
            Some((name, at)) if name == call && at == nth => Err(EngineError::ProcessDied),
            _ => Ok(()),
        }
    }
}

impl ReasoningEngine for MockEngine {
    fn pending_tasks(&mut self) -> Result<Vec<ResolutionTask>, EngineError> {
        self.record("pending_tasks")?;
        Ok(self
            .scripted_pending
            .pop_front()
            .unwrap_or_else(|| self.default_pending.clone()))
    }

    fn ground_truth_labels(&mut self, tasks: &[ResolutionTask]) -> Result<Vec<String>, EngineError> {
        self.record("ground_truth_labels")?;
        tasks
            .iter()
            .map(|t| match self.labels.get(&t.id) {
                Some(&unifies) => Ok(format!("{}\t{}\t{}", t.left, t.right, unifies as u8)),
                None => Err(EngineError::MalformedResponse(format!("no label for task {}", t.id))),
            })
            .collect()
    }

    fn set_priorities(&mut self, priorities: &[f64]) -> Result<(), EngineError> {
        self.record("set_priorities")?;
        self.priorities.push(priorities.to_vec());
        Ok(())
    }

    fn promote(&mut self, threshold: f64) -> Result<(), EngineError> {
        self.record("promote")?;
        self.promotions.push(threshold);
        Ok(())
    }

    fn step(&mut self) -> Result<(), EngineError> {
        self.record("step")?;
        if let Some(fact) = self.step_facts.get(self.derived.len()) {
            self.derived.push(fact.clone());
        }
        self.steps += 1;
        Ok(())
    }

    fn assert_fact(&mut self, formula: &str) -> Result<(), EngineError> {
        self.record("assert_fact")?;
        self.facts.push(formula.to_string());
        Ok(())
    }

    fn knowledge_base(&mut self) -> Result<Vec<String>, EngineError> {
        self.record("knowledge_base")?;
        Ok(self
            .base_clauses
            .iter()
            .chain(&self.facts)
            .chain(&self.derived)
            .enumerate()
            .map(|(i, c)| format!("{i}: {c}"))
            .collect())
    }

    fn reset(&mut self) -> Result<(), EngineError> {
        self.record("reset")?;
        self.facts.clear();
        self.derived.clear();
        self.resets += 1;
        Ok(())
    }
}
