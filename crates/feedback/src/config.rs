use std::path::PathBuf;

use prefilter::PrefilterConfig;
use reasoner::workload::default_subjects;

/// Training-run configuration loaded from the `[driver]` TOML section.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct DriverConfig {
    /// Number of episodes; each one resets the engine.
    #[serde(default = "default_rounds")]
    pub rounds: usize,

    /// Observation pairs asserted at the start of each round.
    #[serde(default = "default_explosion_steps")]
    pub explosion_steps: usize,

    /// Feedback steps per round after the explosion.
    #[serde(default = "default_steps_per_round")]
    pub steps_per_round: usize,

    /// Train every this many steps (step 0 never trains). Zero disables training.
    #[serde(default = "default_train_interval")]
    pub train_interval: usize,

    /// Tasks with priority above this are promoted to the active queue.
    #[serde(default = "default_priority_threshold")]
    pub priority_threshold: f64,

    /// Fraction of each balanced batch drawn from positives.
    #[serde(default = "default_sample_ratio")]
    pub sample_ratio: f64,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_numeric_bits")]
    pub numeric_bits: u32,

    /// Largest random distance in explosion observations.
    #[serde(default = "default_max_distance")]
    pub max_distance: u32,

    /// Stop once a training step has accuracy strictly above this...
    #[serde(default = "default_convergence_accuracy")]
    pub convergence_accuracy: f64,

    /// ...and loss strictly below this.
    #[serde(default = "default_convergence_loss")]
    pub convergence_loss: f64,

    /// Checkpoint id.
    #[serde(default = "default_model_name")]
    pub model_name: String,

    #[serde(default = "default_checkpoint_dir")]
    pub checkpoint_dir: PathBuf,

    /// Keep original task strings alongside buffered examples.
    #[serde(default = "default_debug")]
    pub debug: bool,

    #[serde(default = "default_subjects")]
    pub subjects: Vec<String>,

    #[serde(default)]
    pub words: Vec<String>,

    /// Seed for the workload generator and the prefilter.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_rounds() -> usize {
    1000
}
fn default_explosion_steps() -> usize {
    50
}
fn default_steps_per_round() -> usize {
    500
}
fn default_train_interval() -> usize {
    500
}
fn default_priority_threshold() -> f64 {
    1.0
}
fn default_sample_ratio() -> f64 {
    0.5
}
fn default_batch_size() -> usize {
    32
}
fn default_numeric_bits() -> u32 {
    3
}
fn default_max_distance() -> u32 {
    10
}
fn default_convergence_accuracy() -> f64 {
    0.999
}
fn default_convergence_loss() -> f64 {
    1e-5
}
fn default_model_name() -> String {
    "test1".to_string()
}
fn default_checkpoint_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_debug() -> bool {
    true
}

impl DriverConfig {
    /// Log warnings for values that make a run degenerate.
    pub fn validate(&self) {
        if !(self.sample_ratio > 0.0 && self.sample_ratio <= 1.0) {
            tracing::warn!(
                sample_ratio = self.sample_ratio,
                "sample_ratio outside (0, 1]; batches will be one-sided"
            );
        }
        if self.train_interval == 0 {
            tracing::warn!("train_interval is 0; the model will never be trained");
        } else if !self.trains() {
            tracing::warn!(
                train_interval = self.train_interval,
                steps_per_round = self.steps_per_round,
                "train_interval is not below steps_per_round; no training step will run"
            );
        }
        if self.batch_size == 0 {
            tracing::warn!("batch_size is 0; balanced batches will be empty");
        }
        if self.subjects.is_empty() {
            tracing::warn!("No subjects configured; every symbol maps to the unknown bucket");
        }
    }

    /// Whether any step of a round reaches a training step.
    ///
    /// Steps run `0..steps_per_round` and step 0 never trains, so the first
    /// training step is `train_interval` itself.
    pub fn trains(&self) -> bool {
        self.train_interval > 0 && self.train_interval < self.steps_per_round
    }

    /// Prefilter settings implied by this run configuration.
    pub fn prefilter_config(&self) -> PrefilterConfig {
        PrefilterConfig::new(self.subjects.clone())
            .with_words(self.words.clone())
            .with_batch_size(self.batch_size)
            .with_numeric_bits(self.numeric_bits)
            .with_debug(self.debug)
            .with_seed(self.seed)
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            rounds: default_rounds(),
            explosion_steps: default_explosion_steps(),
            steps_per_round: default_steps_per_round(),
            train_interval: default_train_interval(),
            priority_threshold: default_priority_threshold(),
            sample_ratio: default_sample_ratio(),
            batch_size: default_batch_size(),
            numeric_bits: default_numeric_bits(),
            max_distance: default_max_distance(),
            convergence_accuracy: default_convergence_accuracy(),
            convergence_loss: default_convergence_loss(),
            model_name: default_model_name(),
            checkpoint_dir: default_checkpoint_dir(),
            debug: default_debug(),
            subjects: default_subjects(),
            words: Vec::new(),
            seed: None,
        }
    }
}

/// Guided evaluation configuration loaded from the `[eval]` TOML section.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct EvalConfig {
    #[serde(default = "default_explosion_steps")]
    pub explosion_steps: usize,

    /// Guided reasoning steps after the explosion.
    #[serde(default = "default_steps_per_round")]
    pub steps: usize,

    #[serde(default = "default_priority_threshold")]
    pub priority_threshold: f64,

    /// Scan the knowledge base every this many steps. Zero scans only at the end.
    #[serde(default = "default_report_interval")]
    pub report_interval: usize,

    /// Predicate whose derived facts measure progress.
    #[serde(default = "default_target_predicate")]
    pub target_predicate: String,

    #[serde(default = "default_max_distance")]
    pub max_distance: u32,

    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_report_interval() -> usize {
    10
}
fn default_target_predicate() -> String {
    "distanceBetweenBoundedBy".to_string()
}

impl EvalConfig {
    pub fn validate(&self) {
        if self.report_interval == 0 {
            tracing::warn!("report_interval is 0; the knowledge base is scanned once at the end");
        }
        if self.target_predicate.is_empty() {
            tracing::warn!("Empty target_predicate; every clause will count");
        }
    }
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            explosion_steps: default_explosion_steps(),
            steps: default_steps_per_round(),
            priority_threshold: default_priority_threshold(),
            report_interval: default_report_interval(),
            target_predicate: default_target_predicate(),
            max_distance: default_max_distance(),
            seed: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let cfg = DriverConfig::default();
        assert_eq!(cfg.rounds, 1000);
        assert_eq!(cfg.explosion_steps, 50);
        assert_eq!(cfg.steps_per_round, 500);
        assert_eq!(cfg.train_interval, 500);
        assert!((cfg.priority_threshold - 1.0).abs() < 1e-9);
        assert!((cfg.sample_ratio - 0.5).abs() < 1e-9);
        assert_eq!(cfg.batch_size, 32);
        assert_eq!(cfg.numeric_bits, 3);
        assert_eq!(cfg.max_distance, 10);
        assert!((cfg.convergence_accuracy - 0.999).abs() < 1e-12);
        assert!((cfg.convergence_loss - 1e-5).abs() < 1e-12);
        assert_eq!(cfg.model_name, "test1");
        assert_eq!(cfg.checkpoint_dir, PathBuf::from("."));
        assert!(cfg.debug);
        assert_eq!(cfg.subjects, default_subjects());
        assert!(cfg.words.is_empty());
        assert!(cfg.seed.is_none());
    }

    #[test]
    fn test_partial_toml_override() {
        let toml_str = r#"
            rounds = 3
            sample_ratio = 0.25
            model_name = "dist"
        "#;
        let cfg: DriverConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.rounds, 3);
        assert!((cfg.sample_ratio - 0.25).abs() < 1e-9);
        assert_eq!(cfg.model_name, "dist");
        // Defaults for unspecified fields
        assert_eq!(cfg.batch_size, 32);
        assert_eq!(cfg.subjects.len(), 4);
    }

    #[test]
    fn test_full_toml() {
        let toml_str = r#"
            rounds = 10
            explosion_steps = 20
            steps_per_round = 100
            train_interval = 25
            priority_threshold = 0.5
            sample_ratio = 0.4
            batch_size = 64
            numeric_bits = 4
            max_distance = 5
            convergence_accuracy = 0.99
            convergence_loss = 0.001
            model_name = "full"
            checkpoint_dir = "/tmp/ckpt"
            debug = false
            subjects = ["x", "y"]
            words = ["near"]
            seed = 7
        "#;
        let cfg: DriverConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.rounds, 10);
        assert_eq!(cfg.explosion_steps, 20);
        assert_eq!(cfg.steps_per_round, 100);
        assert_eq!(cfg.train_interval, 25);
        assert!((cfg.priority_threshold - 0.5).abs() < 1e-9);
        assert_eq!(cfg.batch_size, 64);
        assert_eq!(cfg.numeric_bits, 4);
        assert_eq!(cfg.max_distance, 5);
        assert_eq!(cfg.checkpoint_dir, PathBuf::from("/tmp/ckpt"));
        assert!(!cfg.debug);
        assert_eq!(cfg.subjects, vec!["x".to_string(), "y".to_string()]);
        assert_eq!(cfg.words, vec!["near".to_string()]);
        assert_eq!(cfg.seed, Some(7));
    }

    #[test]
    fn test_prefilter_config_carries_fields() {
        let cfg = DriverConfig {
            batch_size: 8,
            numeric_bits: 5,
            debug: false,
            seed: Some(3),
            ..Default::default()
        };
        let pc = cfg.prefilter_config();
        assert_eq!(pc.batch_size, 8);
        assert_eq!(pc.numeric_bits, 5);
        assert!(!pc.debug);
        assert_eq!(pc.seed, Some(3));
        assert_eq!(pc.subjects, default_subjects());
    }

    #[test]
    fn test_validate_degenerate_values() {
        // Only logs warnings
        let cfg = DriverConfig {
            sample_ratio: 1.5,
            train_interval: 0,
            batch_size: 0,
            ..Default::default()
        };
        cfg.validate();
        let cfg = DriverConfig {
            train_interval: 500,
            steps_per_round: 500,
            ..Default::default()
        };
        assert!(!cfg.trains());
        cfg.validate();
        DriverConfig::default().validate();
    }

    #[test]
    fn test_trains_needs_interval_below_round_length() {
        let cfg = |train_interval, steps_per_round| DriverConfig {
            train_interval,
            steps_per_round,
            ..Default::default()
        };
        assert!(cfg(2, 3).trains());
        assert!(!cfg(4, 4).trains());
        assert!(!cfg(5, 4).trains());
        assert!(!cfg(0, 4).trains());
        // validate only warns for an interval equal to the round length
        cfg(4, 4).validate();
    }

    #[test]
    fn test_eval_defaults_and_override() {
        let cfg = EvalConfig::default();
        assert_eq!(cfg.report_interval, 10);
        assert_eq!(cfg.target_predicate, "distanceBetweenBoundedBy");
        assert!((cfg.priority_threshold - 1.0).abs() < 1e-9);

        let cfg: EvalConfig = toml::from_str("steps = 40\nreport_interval = 5").unwrap();
        assert_eq!(cfg.steps, 40);
        assert_eq!(cfg.report_interval, 5);
        assert_eq!(cfg.explosion_steps, 50);
        cfg.validate();
    }
}
