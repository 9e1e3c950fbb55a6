//! The prefilter: vectorizer, example buffer and scorer behind one handle.

use std::path::Path;

use burn::backend::ndarray::NdArray;
use burn::backend::Autodiff;
use burn::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use reasoner::{parse_verdict, EngineError, ResolutionTask};

use crate::buffer::{DebugPayload, Example, ExampleBuffer};
use crate::checkpoint::{params_stem, CheckpointError, CheckpointMeta, SCHEMA_VERSION};
use crate::model::classifier::UnifyMlpConfig;
use crate::model::{ScorerDescriptor, ScoringFunction};
use crate::training::metrics::{ClassWeights, StepMetrics};
use crate::training::trainer::{dense_classifier, DenseTrainingConfig};
use crate::vectorize::{SymbolTable, Vectorizer};

/// Backend used by [`ResPrefilter::new`] and [`ResPrefilter::load`].
pub type DefaultBackend = Autodiff<NdArray<f32>>;

/// Construction parameters for a [`ResPrefilter`].
#[derive(Config, Debug)]
pub struct PrefilterConfig {
    /// Feature vocabulary; see [`SymbolTable`].
    pub subjects: Vec<String>,
    #[config(default = "Vec::new()")]
    pub words: Vec<String>,
    /// Examples per buffered training batch.
    #[config(default = 32)]
    pub batch_size: usize,
    /// Width of numeric constants, recorded in checkpoints.
    #[config(default = 3)]
    pub numeric_bits: u32,
    /// Keep the original strings of every buffered example.
    #[config(default = true)]
    pub debug: bool,
    #[config(default = 8)]
    pub hidden1: usize,
    #[config(default = 8)]
    pub hidden2: usize,
    #[config(default = 1e-3)]
    pub learning_rate: f64,
    /// Seed for buffer shuffling and weight init; entropy when unset.
    pub seed: Option<u64>,
}

/// Learned relevance filter for resolution tasks.
///
/// Buffers labeled task observations, trains its scorer on class-balanced
/// samples of that buffer, and turns unify probabilities into task
/// priorities (`1 - p`).
pub struct ResPrefilter {
    vectorizer: Vectorizer,
    buffer: ExampleBuffer,
    scorer: Box<dyn ScoringFunction>,
    batch_size: usize,
    numeric_bits: u32,
    rng: StdRng,
}

impl ResPrefilter {
    /// Build a prefilter with a freshly initialized dense scorer.
    pub fn new(config: &PrefilterConfig) -> Self {
        if let Some(seed) = config.seed {
            DefaultBackend::seed(seed);
        }
        let vectorizer = Vectorizer::new(SymbolTable::new(
            config.subjects.clone(),
            config.words.clone(),
        ));
        let device = Default::default();
        let scorer = dense_classifier::<DefaultBackend>(
            UnifyMlpConfig::new(vectorizer.input_dim())
                .with_hidden1(config.hidden1)
                .with_hidden2(config.hidden2),
            DenseTrainingConfig::new().with_lr(config.learning_rate),
            &device,
        );
        tracing::info!(
            scorer = scorer.descriptor().name(),
            subjects = config.subjects.len(),
            input_dim = vectorizer.input_dim(),
            batch_size = config.batch_size,
            "Created prefilter"
        );
        Self::assemble(config, vectorizer, Box::new(scorer))
    }

    /// Build a prefilter around an existing scorer.
    pub fn with_scorer(
        config: &PrefilterConfig,
        scorer: Box<dyn ScoringFunction>,
    ) -> Result<Self, CheckpointError> {
        let vectorizer = Vectorizer::new(SymbolTable::new(
            config.subjects.clone(),
            config.words.clone(),
        ));
        if scorer.input_dim() != vectorizer.input_dim() {
            return Err(CheckpointError::ConfigMismatch(format!(
                "scorer expects {} features but {} subjects produce {}",
                scorer.input_dim(),
                config.subjects.len(),
                vectorizer.input_dim()
            )));
        }
        Ok(Self::assemble(config, vectorizer, scorer))
    }

    fn assemble(
        config: &PrefilterConfig,
        vectorizer: Vectorizer,
        scorer: Box<dyn ScoringFunction>,
    ) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            vectorizer,
            buffer: ExampleBuffer::new(config.debug),
            scorer,
            batch_size: config.batch_size,
            numeric_bits: config.numeric_bits,
            rng,
        }
    }

    pub fn vectorizer(&self) -> &Vectorizer {
        &self.vectorizer
    }

    pub fn buffer(&self) -> &ExampleBuffer {
        &self.buffer
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn numeric_bits(&self) -> u32 {
        self.numeric_bits
    }

    pub fn descriptor(&self) -> ScorerDescriptor {
        self.scorer.descriptor()
    }

    fn vectorize_tasks(&self, tasks: &[ResolutionTask]) -> Vec<Vec<f32>> {
        self.vectorizer.vectorize_all(tasks.iter().map(ResolutionTask::pair))
    }

    fn labeled(
        &self,
        tasks: &[ResolutionTask],
        records: &[String],
    ) -> Result<Vec<Example>, EngineError> {
        if tasks.len() != records.len() {
            return Err(EngineError::MalformedResponse(format!(
                "{} ground-truth records for {} tasks",
                records.len(),
                tasks.len()
            )));
        }
        tasks
            .iter()
            .zip(records)
            .map(|(task, record)| -> Result<Example, EngineError> {
                let mut example =
                    Example::new(self.vectorizer.vectorize(task.pair()), parse_verdict(record)?);
                if self.buffer.debug() {
                    example.debug = Some(DebugPayload {
                        left: task.left.to_string(),
                        right: task.right.to_string(),
                        record: record.clone(),
                    });
                }
                Ok(example)
            })
            .collect()
    }

    /// Vectorize and buffer a pending set with its ground-truth records.
    ///
    /// All records are parsed before anything is buffered, so a malformed
    /// record leaves the buffer untouched. Returns the number of examples added.
    pub fn save_batch(
        &mut self,
        tasks: &[ResolutionTask],
        records: &[String],
    ) -> Result<usize, EngineError> {
        let examples = self.labeled(tasks, records)?;
        let added = examples.len();
        for example in examples {
            self.buffer.append(example);
        }
        tracing::debug!(
            added,
            buffered = self.buffer.len(),
            positives = self.buffer.pos_count(),
            "Saved batch"
        );
        Ok(added)
    }

    /// Shuffle the buffer, draw one balanced batch of `batch_size` with
    /// `floor(batch_size * sample_ratio)` target positives, and fit on it.
    ///
    /// Returns `None` when the buffer yields no examples at all.
    pub fn train_buffered_batch(&mut self, sample_ratio: f64) -> anyhow::Result<Option<StepMetrics>> {
        if !(sample_ratio > 0.0 && sample_ratio <= 1.0) {
            tracing::warn!(sample_ratio, "sample_ratio outside (0, 1]; clamping");
        }
        let target_pos = (self.batch_size as f64 * sample_ratio.clamp(0.0, 1.0)) as usize;

        self.buffer.shuffle_all(&mut self.rng);
        let batch = self.buffer.sample_balanced(self.batch_size, target_pos);
        if batch.is_empty() {
            tracing::warn!(buffered = self.buffer.len(), "Balanced batch is empty; skipping fit");
            return Ok(None);
        }

        let targets = batch.targets();
        let weights = ClassWeights::from_targets(&targets);
        if weights.is_none() {
            tracing::warn!(size = batch.len(), "Single-class batch; training unweighted");
        }
        let metrics = self.scorer.fit(&batch.features(), &targets, weights)?;

        tracing::info!(
            size = batch.len(),
            positives = batch.positives(),
            discarded = batch.discarded,
            remaining = self.buffer.len(),
            loss = format!("{:.6}", metrics.loss),
            accuracy = format!("{:.4}", metrics.accuracy),
            "Trained on buffered batch"
        );
        Ok(Some(metrics))
    }

    /// Fit directly on a labeled task set, bypassing the buffer.
    ///
    /// Runs one step per `batch_size` chunk with class weights computed over
    /// the whole set. Returns `None` for an empty set.
    pub fn train_batch(
        &mut self,
        tasks: &[ResolutionTask],
        records: &[String],
    ) -> anyhow::Result<Option<StepMetrics>> {
        let examples = self.labeled(tasks, records)?;
        if examples.is_empty() {
            return Ok(None);
        }
        let targets: Vec<f32> = examples.iter().map(Example::target).collect();
        let weights = ClassWeights::from_targets(&targets);

        let mut steps = Vec::new();
        let chunk = self.batch_size.max(1);
        for (rows, ys) in examples.chunks(chunk).zip(targets.chunks(chunk)) {
            let features: Vec<Vec<f32>> = rows.iter().map(|e| e.features.clone()).collect();
            steps.push(self.scorer.fit(&features, ys, weights)?);
        }
        Ok(StepMetrics::combine(&steps))
    }

    /// Predicted unify probability for each task.
    pub fn unify_likelihood(&self, tasks: &[ResolutionTask]) -> anyhow::Result<Vec<f64>> {
        if tasks.is_empty() {
            return Ok(vec![]);
        }
        self.scorer.predict(&self.vectorize_tasks(tasks))
    }

    /// Engine priorities, `1 - p(unify)` per task.
    pub fn priorities(&self, tasks: &[ResolutionTask]) -> anyhow::Result<Vec<f64>> {
        Ok(self
            .unify_likelihood(tasks)?
            .into_iter()
            .map(|p| 1.0 - p)
            .collect())
    }

    pub fn metadata(&self) -> CheckpointMeta {
        let table = self.vectorizer.table();
        CheckpointMeta {
            schema_version: SCHEMA_VERSION,
            subjects: table.subjects().to_vec(),
            words: table.words().to_vec(),
            num_subjects: table.num_subjects(),
            num_words: table.num_words(),
            batch_size: self.batch_size,
            numeric_bits: self.numeric_bits,
            scorer: self.scorer.descriptor(),
            input_dim: self.vectorizer.input_dim(),
        }
    }

    /// Write checkpoint `id` (metadata and scorer parameters) under `dir`.
    pub fn save(&self, dir: &Path, id: &str) -> anyhow::Result<()> {
        let meta_path = self.metadata().write(dir, id)?;
        self.scorer.save_params(&params_stem(dir, id))?;
        tracing::info!(path = %meta_path.display(), "Saved prefilter checkpoint");
        Ok(())
    }

    /// Rebuild a prefilter from checkpoint `id` for inference or further training.
    ///
    /// The vocabulary and batch size are restored from the metadata before
    /// the scorer parameters are loaded. The buffer starts empty.
    pub fn load(dir: &Path, id: &str) -> anyhow::Result<Self> {
        let meta = CheckpointMeta::read(dir, id)?;
        let ScorerDescriptor::Dense {
            hidden1,
            hidden2,
            learning_rate,
        } = meta.scorer.clone();

        let config = PrefilterConfig::new(meta.subjects.clone())
            .with_words(meta.words.clone())
            .with_batch_size(meta.batch_size)
            .with_numeric_bits(meta.numeric_bits)
            .with_hidden1(hidden1)
            .with_hidden2(hidden2)
            .with_learning_rate(learning_rate);
        let mut prefilter = Self::new(&config);
        if prefilter.scorer.input_dim() != meta.input_dim {
            return Err(CheckpointError::ConfigMismatch(format!(
                "checkpoint input_dim {} but rebuilt scorer expects {}",
                meta.input_dim,
                prefilter.scorer.input_dim()
            ))
            .into());
        }
        prefilter.scorer.load_params(&params_stem(dir, id))?;
        tracing::info!(
            id,
            scorer = meta.scorer.name(),
            subjects = meta.num_subjects,
            "Loaded prefilter checkpoint"
        );
        Ok(prefilter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PrefilterConfig {
        PrefilterConfig::new(reasoner::workload::default_subjects())
            .with_batch_size(4)
            .with_seed(Some(17))
    }

    fn task(id: u64, left: &str) -> ResolutionTask {
        ResolutionTask::new(id, left, "distanceAt(Item1, D1, T)")
    }

    fn record(unifies: bool) -> String {
        format!("x\ty\t{}", if unifies { 1 } else { 0 })
    }

    #[test]
    fn test_save_batch_buffers_and_counts() {
        let mut rpf = ResPrefilter::new(&config());
        let tasks = vec![task(1, "distanceAt(a, 1, 0)"), task(2, "distanceBetweenBoundedBy(1, a, b, 0)")];
        let added = rpf.save_batch(&tasks, &[record(true), record(false)]).unwrap();

        assert_eq!(added, 2);
        assert_eq!(rpf.buffer().len(), 2);
        assert_eq!(rpf.buffer().pos_count(), 1);
        assert_eq!(rpf.buffer().neg_count(), 1);
        let debug = rpf.buffer().examples()[0].debug.as_ref().unwrap();
        assert_eq!(debug.left, "distanceAt(a, 1, 0)");
    }

    #[test]
    fn test_save_batch_malformed_record_buffers_nothing() {
        let mut rpf = ResPrefilter::new(&config());
        let tasks = vec![task(1, "p(a)"), task(2, "p(b)")];
        let err = rpf
            .save_batch(&tasks, &[record(true), "x\ty\tperhaps".to_string()])
            .unwrap_err();
        assert!(matches!(err, EngineError::MalformedResponse(_)));
        assert!(rpf.buffer().is_empty());

        assert!(rpf.save_batch(&tasks, &[record(true)]).is_err());
    }

    #[test]
    fn test_priorities_are_one_minus_likelihood() {
        let rpf = ResPrefilter::new(&config());
        let tasks = vec![task(1, "distanceAt(a, 1, 0)"), task(2, "distanceAt(b, 9, 3)")];
        let p = rpf.unify_likelihood(&tasks).unwrap();
        let prio = rpf.priorities(&tasks).unwrap();
        assert_eq!(p.len(), 2);
        for (p, q) in p.iter().zip(&prio) {
            assert!((p + q - 1.0).abs() < 1e-9);
        }
        assert!(rpf.priorities(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_train_buffered_batch_consumes_buffer() {
        let mut rpf = ResPrefilter::new(&config());
        let tasks: Vec<ResolutionTask> = (0..8).map(|i| task(i, "distanceAt(a, 1, 0)")).collect();
        let records: Vec<String> = (0..8).map(|i| record(i % 2 == 0)).collect();
        rpf.save_batch(&tasks, &records).unwrap();

        let metrics = rpf.train_buffered_batch(0.5).unwrap().unwrap();
        assert_eq!(metrics.examples, 4);
        assert!(metrics.loss.is_finite());
        assert!(rpf.buffer().len() <= 4);
    }

    #[test]
    fn test_train_buffered_batch_on_empty_buffer() {
        let mut rpf = ResPrefilter::new(&config());
        assert!(rpf.train_buffered_batch(0.5).unwrap().is_none());
    }

    #[test]
    fn test_train_batch_chunks_by_batch_size() {
        let mut rpf = ResPrefilter::new(&config());
        let tasks: Vec<ResolutionTask> = (0..10).map(|i| task(i, "distanceAt(b, 2, 0)")).collect();
        let records: Vec<String> = (0..10).map(|i| record(i < 3)).collect();

        let metrics = rpf.train_batch(&tasks, &records).unwrap().unwrap();
        assert_eq!(metrics.examples, 10);
        // direct training never touches the buffer
        assert!(rpf.buffer().is_empty());
        assert!(rpf.train_batch(&[], &[]).unwrap().is_none());
    }

    #[test]
    fn test_with_scorer_checks_input_dim() {
        let device = Default::default();
        let scorer = dense_classifier::<DefaultBackend>(
            UnifyMlpConfig::new(3),
            DenseTrainingConfig::new(),
            &device,
        );
        let err = ResPrefilter::with_scorer(&config(), Box::new(scorer)).err().unwrap();
        assert!(matches!(err, CheckpointError::ConfigMismatch(_)));
    }
}
