//! The priority-feedback training loop and the guided evaluation run.

use std::collections::BTreeSet;
use std::path::PathBuf;

use prefilter::{ResPrefilter, StepMetrics};
use rand::rngs::StdRng;
use rand::SeedableRng;
use reasoner::workload::explosion;
use reasoner::{EngineError, ReasoningEngine, ResolutionTask};
use serde::{Deserialize, Serialize};

use crate::config::{DriverConfig, EvalConfig};

/// Errors that end a training or evaluation run.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// An engine call failed. Engine failures are never retried.
    #[error("engine call `{call}` failed at round {round}, step {step}: {source}")]
    Engine {
        call: &'static str,
        round: usize,
        step: usize,
        #[source]
        source: EngineError,
    },
    /// Inference or training failed.
    #[error("scorer failed at round {round}, step {step}: {source}")]
    Scorer {
        round: usize,
        step: usize,
        #[source]
        source: anyhow::Error,
    },
    /// The checkpoint could not be written.
    #[error("checkpoint save failed: {0}")]
    Checkpoint(#[source] anyhow::Error),
}

fn engine_err(call: &'static str, round: usize, step: usize) -> impl FnOnce(EngineError) -> DriverError {
    move |source| DriverError::Engine {
        call,
        round,
        step,
        source,
    }
}

fn scorer_err(round: usize, step: usize) -> impl FnOnce(anyhow::Error) -> DriverError {
    move |source| DriverError::Scorer { round, step, source }
}

// ---------------------------------------------------------------------------
// TaskScorer
// ---------------------------------------------------------------------------

/// Anything that can assign engine priorities to a pending set.
///
/// Higher priority means more urgent. Implementations must return exactly
/// one priority per task.
pub trait TaskScorer {
    /// Short label used in logs and reports.
    fn name(&self) -> &'static str;

    fn priorities(&mut self, tasks: &[ResolutionTask]) -> anyhow::Result<Vec<f64>>;
}

// ---------------------------------------------------------------------------
// Training
// ---------------------------------------------------------------------------

/// Why a training run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// A training step met both convergence thresholds.
    Converged,
    /// Every configured round ran to completion.
    RoundsExhausted,
    /// The buffer held too few positives when a training step was due.
    InsufficientPositives,
}

/// Per-round progress, passed to the observer of [`TrainingDriver::run_with_progress`].
#[derive(Debug, Clone)]
pub struct RoundSummary {
    pub round: usize,
    /// Feedback steps executed this round.
    pub steps: usize,
    /// Total pending tasks observed this round.
    pub observed: usize,
    /// Training steps taken this round.
    pub training_steps: usize,
    pub last_metrics: Option<StepMetrics>,
    /// Set when this round ended the run.
    pub stop: Option<StopReason>,
}

/// Result of a complete training run.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub reason: StopReason,
    /// Rounds that ran, including the one that stopped the run.
    pub rounds: usize,
    /// Feedback steps over all rounds.
    pub steps: usize,
    pub training_steps: usize,
    pub last_metrics: Option<StepMetrics>,
    /// Metadata file of the saved checkpoint.
    pub checkpoint: PathBuf,
}

enum TrainDecision {
    Trained(Option<StepMetrics>),
    InsufficientPositives,
}

/// Runs the priority-feedback loop against one engine session.
///
/// Each round resets the engine, floods it with the explosion workload and
/// then runs `steps_per_round` feedback steps: observe and buffer the
/// pending set, score it with the current model, push the priorities back,
/// train every `train_interval` steps, and advance the engine. The
/// checkpoint is saved whenever the run stops.
pub struct TrainingDriver {
    config: DriverConfig,
    rng: StdRng,
}

impl TrainingDriver {
    pub fn new(config: DriverConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { config, rng }
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn run<E>(
        &mut self,
        engine: &mut E,
        prefilter: &mut ResPrefilter,
    ) -> Result<TrainingOutcome, DriverError>
    where
        E: ReasoningEngine + ?Sized,
    {
        self.run_with_progress(engine, prefilter, |_| {})
    }

    /// Like [`run`](Self::run), calling `on_round` after every round.
    pub fn run_with_progress<E, F>(
        &mut self,
        engine: &mut E,
        prefilter: &mut ResPrefilter,
        mut on_round: F,
    ) -> Result<TrainingOutcome, DriverError>
    where
        E: ReasoningEngine + ?Sized,
        F: FnMut(&RoundSummary),
    {
        self.config.validate();
        tracing::info!(
            rounds = self.config.rounds,
            steps_per_round = self.config.steps_per_round,
            train_interval = self.config.train_interval,
            batch_size = prefilter.batch_size(),
            "Starting training run"
        );

        let mut reason = StopReason::RoundsExhausted;
        let mut rounds = 0;
        let mut steps = 0;
        let mut training_steps = 0;
        let mut last_metrics = None;

        for round in 0..self.config.rounds {
            let summary = self.run_round(engine, prefilter, round)?;
            rounds += 1;
            steps += summary.steps;
            training_steps += summary.training_steps;
            if summary.last_metrics.is_some() {
                last_metrics = summary.last_metrics;
            }
            on_round(&summary);
            if let Some(stop) = summary.stop {
                reason = stop;
                break;
            }
        }

        prefilter
            .save(&self.config.checkpoint_dir, &self.config.model_name)
            .map_err(DriverError::Checkpoint)?;
        let checkpoint =
            prefilter::checkpoint::meta_path(&self.config.checkpoint_dir, &self.config.model_name);

        tracing::info!(
            ?reason,
            rounds,
            steps,
            training_steps,
            checkpoint = %checkpoint.display(),
            "Training run finished"
        );
        Ok(TrainingOutcome {
            reason,
            rounds,
            steps,
            training_steps,
            last_metrics,
            checkpoint,
        })
    }

    fn run_round<E>(
        &mut self,
        engine: &mut E,
        prefilter: &mut ResPrefilter,
        round: usize,
    ) -> Result<RoundSummary, DriverError>
    where
        E: ReasoningEngine + ?Sized,
    {
        let cfg = &self.config;
        engine.reset().map_err(engine_err("reset", round, 0))?;
        explosion(engine, cfg.explosion_steps, cfg.max_distance, &mut self.rng)
            .map_err(engine_err("explosion", round, 0))?;
        tracing::info!(round, buffered = prefilter.buffer().len(), "Round started");

        let mut summary = RoundSummary {
            round,
            steps: 0,
            observed: 0,
            training_steps: 0,
            last_metrics: None,
            stop: None,
        };

        for step in 0..cfg.steps_per_round {
            summary.observed += observe_and_push(engine, prefilter, cfg.priority_threshold, round, step)?;
            summary.steps += 1;

            if step > 0 && cfg.train_interval > 0 && step % cfg.train_interval == 0 {
                match periodic_train(prefilter, cfg.sample_ratio).map_err(scorer_err(round, step))? {
                    TrainDecision::InsufficientPositives => {
                        tracing::warn!(
                            round,
                            step,
                            positives = prefilter.buffer().pos_count(),
                            batch_size = prefilter.batch_size(),
                            "Not enough positive examples; stopping training"
                        );
                        summary.stop = Some(StopReason::InsufficientPositives);
                        return Ok(summary);
                    }
                    TrainDecision::Trained(None) => {}
                    TrainDecision::Trained(Some(metrics)) => {
                        summary.training_steps += 1;
                        summary.last_metrics = Some(metrics);
                        if metrics.is_converged(cfg.convergence_accuracy, cfg.convergence_loss) {
                            tracing::info!(
                                round,
                                step,
                                loss = metrics.loss,
                                accuracy = metrics.accuracy,
                                "Converged"
                            );
                            summary.stop = Some(StopReason::Converged);
                            return Ok(summary);
                        }
                    }
                }
            }

            engine.step().map_err(engine_err("step", round, step))?;
        }
        Ok(summary)
    }
}

/// The training-time feedback step: the prefilter both observes the pending
/// set and scores it.
fn observe_and_push<E>(
    engine: &mut E,
    prefilter: &mut ResPrefilter,
    threshold: f64,
    round: usize,
    step: usize,
) -> Result<usize, DriverError>
where
    E: ReasoningEngine + ?Sized,
{
    let tasks = engine
        .pending_tasks()
        .map_err(engine_err("pending_tasks", round, step))?;
    if tasks.is_empty() {
        tracing::debug!(round, step, "Empty pending set");
        return Ok(0);
    }
    let records = engine
        .ground_truth_labels(&tasks)
        .map_err(engine_err("ground_truth_labels", round, step))?;
    prefilter
        .save_batch(&tasks, &records)
        .map_err(engine_err("ground_truth_labels", round, step))?;
    push_back(engine, prefilter, &tasks, threshold, round, step)?;
    Ok(tasks.len())
}

/// Score `tasks` and send the priorities to the engine, then promote.
fn push_back<E, S>(
    engine: &mut E,
    scorer: &mut S,
    tasks: &[ResolutionTask],
    threshold: f64,
    round: usize,
    step: usize,
) -> Result<(), DriverError>
where
    E: ReasoningEngine + ?Sized,
    S: TaskScorer + ?Sized,
{
    let priorities = scorer.priorities(tasks).map_err(scorer_err(round, step))?;
    if priorities.len() != tasks.len() {
        return Err(DriverError::Scorer {
            round,
            step,
            source: anyhow::anyhow!(
                "{} returned {} priorities for {} tasks",
                scorer.name(),
                priorities.len(),
                tasks.len()
            ),
        });
    }
    engine
        .set_priorities(&priorities)
        .map_err(engine_err("set_priorities", round, step))?;
    engine
        .promote(threshold)
        .map_err(engine_err("promote", round, step))?;
    tracing::debug!(round, step, pending = tasks.len(), scorer = scorer.name(), "Pushed back priorities");
    Ok(())
}

/// Train once if the buffer holds more positives than half a batch.
fn periodic_train(prefilter: &mut ResPrefilter, sample_ratio: f64) -> anyhow::Result<TrainDecision> {
    if 2 * prefilter.buffer().pos_count() <= prefilter.batch_size() {
        return Ok(TrainDecision::InsufficientPositives);
    }
    Ok(TrainDecision::Trained(prefilter.train_buffered_batch(sample_ratio)?))
}

// ---------------------------------------------------------------------------
// Guided evaluation
// ---------------------------------------------------------------------------

/// Target facts present in the knowledge base at one point of a guided run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KbReport {
    /// Guided steps completed when the scan ran.
    pub step: usize,
    pub target_facts: usize,
}

/// Outcome of [`run_guided`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuidedReport {
    pub scorer: String,
    pub steps: usize,
    /// Total pending tasks scored over the run.
    pub scored: usize,
    pub reports: Vec<KbReport>,
    /// Distinct target facts derived, sorted.
    pub target_facts: Vec<String>,
}

/// The fact text of a knowledge-base line if it is a fact of `predicate`.
///
/// Lines may carry a numeric `N: ` prefix. Clauses that merely mention the
/// predicate, such as the rule that derives it, do not count.
pub fn target_fact<'a>(line: &'a str, predicate: &str) -> Option<&'a str> {
    let line = line.trim();
    let clause = match line.split_once(':') {
        Some((index, rest)) if is_clause_index(index) => rest.trim(),
        _ => line,
    };
    let clause = clause.strip_suffix('.').unwrap_or(clause);
    let args = clause.strip_prefix(predicate)?;
    args.starts_with('(').then_some(clause)
}

fn is_clause_index(s: &str) -> bool {
    let s = s.trim();
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

fn scan_target_facts<E>(
    engine: &mut E,
    predicate: &str,
    found: &mut BTreeSet<String>,
    step: usize,
) -> Result<usize, DriverError>
where
    E: ReasoningEngine + ?Sized,
{
    let clauses = engine
        .knowledge_base()
        .map_err(engine_err("knowledge_base", 0, step))?;
    let mut count = 0;
    for line in &clauses {
        if let Some(fact) = target_fact(line, predicate) {
            count += 1;
            found.insert(fact.to_string());
        }
    }
    Ok(count)
}

/// Run the explosion workload, then `config.steps` guided reasoning steps
/// with priorities from `scorer`, scanning the knowledge base for target
/// facts every `report_interval` steps and once at the end.
///
/// Errors carry round 0; the guided run is a single episode.
pub fn run_guided<E, S, F>(
    engine: &mut E,
    scorer: &mut S,
    config: &EvalConfig,
    mut on_step: F,
) -> Result<GuidedReport, DriverError>
where
    E: ReasoningEngine + ?Sized,
    S: TaskScorer + ?Sized,
    F: FnMut(usize),
{
    config.validate();
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    explosion(engine, config.explosion_steps, config.max_distance, &mut rng)
        .map_err(engine_err("explosion", 0, 0))?;
    tracing::info!(scorer = scorer.name(), steps = config.steps, "Starting guided run");

    let mut found = BTreeSet::new();
    let mut reports = Vec::new();
    let mut scored = 0;

    for step in 0..config.steps {
        let tasks = engine
            .pending_tasks()
            .map_err(engine_err("pending_tasks", 0, step))?;
        if !tasks.is_empty() {
            push_back(engine, scorer, &tasks, config.priority_threshold, 0, step)?;
            scored += tasks.len();
        }
        engine.step().map_err(engine_err("step", 0, step))?;
        on_step(step);

        let done = step + 1;
        if config.report_interval > 0 && done % config.report_interval == 0 {
            let target_facts = scan_target_facts(engine, &config.target_predicate, &mut found, step)?;
            tracing::info!(step = done, target_facts, "Knowledge base scan");
            reports.push(KbReport { step: done, target_facts });
        }
    }

    if reports.last().map(|r| r.step) != Some(config.steps) {
        let target_facts = scan_target_facts(engine, &config.target_predicate, &mut found, config.steps)?;
        reports.push(KbReport {
            step: config.steps,
            target_facts,
        });
    }

    tracing::info!(
        scorer = scorer.name(),
        distinct = found.len(),
        scored,
        "Guided run finished"
    );
    Ok(GuidedReport {
        scorer: scorer.name().to_string(),
        steps: config.steps,
        scored,
        reports,
        target_facts: found.into_iter().collect(),
    })
}
