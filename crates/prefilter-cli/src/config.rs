//! TOML config loading for the prefilter CLI.
//!
//! Deserializes `configs/prefilter.toml`, which has `[driver]`, `[eval]` and
//! `[engine]` sections, then merges with CLI overrides.

use std::path::{Path, PathBuf};

use feedback::{DriverConfig, EvalConfig};
use prefilter::CheckpointMeta;
use reasoner::EngineConfig;
use serde::Deserialize;

/// Top-level structure matching `configs/prefilter.toml`.
#[derive(Debug, Default, Deserialize)]
pub struct PrefilterToml {
    /// Training-run parameters.
    #[serde(default)]
    pub driver: DriverConfig,
    /// Guided evaluation parameters.
    #[serde(default)]
    pub eval: EvalConfig,
    /// How to launch the engine process.
    #[serde(default)]
    pub engine: EngineOverrides,
}

/// Engine launch settings; the program can also come from `--engine`.
#[derive(Debug, Default, Deserialize)]
pub struct EngineOverrides {
    pub program: Option<PathBuf>,
    #[serde(default)]
    pub args: Vec<String>,
    pub kb_path: Option<PathBuf>,
    pub working_dir: Option<PathBuf>,
}

/// Load a `PrefilterToml`, or all defaults when no path is given.
pub fn load_prefilter_toml(path: Option<&Path>) -> anyhow::Result<PrefilterToml> {
    let Some(path) = path else {
        return Ok(PrefilterToml::default());
    };
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {e}", path.display()))?;
    let config: PrefilterToml = toml::from_str(&contents)?;
    tracing::info!(path = %path.display(), "Loaded prefilter config");
    Ok(config)
}

/// CLI flags that override `[driver]` values.
#[derive(Debug, Default)]
pub struct DriverOverrides {
    pub explosion_steps: Option<usize>,
    pub steps_per_round: Option<usize>,
    pub rounds: Option<usize>,
    pub train_interval: Option<usize>,
    pub numeric_bits: Option<u32>,
    pub priority_threshold: Option<f64>,
    pub model_name: Option<String>,
    pub checkpoint_dir: Option<PathBuf>,
    pub seed: Option<u64>,
}

/// Priority chain: `DriverConfig` defaults < TOML values < CLI flags.
pub fn build_driver_config(mut config: DriverConfig, cli: &DriverOverrides) -> DriverConfig {
    if let Some(n) = cli.explosion_steps {
        config.explosion_steps = n;
    }
    if let Some(n) = cli.steps_per_round {
        config.steps_per_round = n;
    }
    if let Some(n) = cli.rounds {
        config.rounds = n;
    }
    if let Some(n) = cli.train_interval {
        config.train_interval = n;
    }
    if let Some(n) = cli.numeric_bits {
        config.numeric_bits = n;
    }
    if let Some(t) = cli.priority_threshold {
        config.priority_threshold = t;
    }
    if let Some(name) = &cli.model_name {
        config.model_name = name.clone();
    }
    if let Some(dir) = &cli.checkpoint_dir {
        config.checkpoint_dir = dir.clone();
    }
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }
    config
}

/// CLI flags that override `[eval]` values.
#[derive(Debug, Default)]
pub struct EvalOverrides {
    pub explosion_steps: Option<usize>,
    pub steps: Option<usize>,
    pub priority_threshold: Option<f64>,
    pub report_interval: Option<usize>,
    pub seed: Option<u64>,
}

/// Priority chain: `EvalConfig` defaults < TOML values < CLI flags.
pub fn build_eval_config(mut config: EvalConfig, cli: &EvalOverrides) -> EvalConfig {
    if let Some(n) = cli.explosion_steps {
        config.explosion_steps = n;
    }
    if let Some(n) = cli.steps {
        config.steps = n;
    }
    if let Some(t) = cli.priority_threshold {
        config.priority_threshold = t;
    }
    if let Some(n) = cli.report_interval {
        config.report_interval = n;
    }
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }
    config
}

/// Resolve the engine launch command; `--engine` and `--kb` win over TOML.
pub fn build_engine_config(
    overrides: &EngineOverrides,
    program_cli: Option<PathBuf>,
    kb_cli: Option<PathBuf>,
) -> anyhow::Result<EngineConfig> {
    let program = program_cli
        .or_else(|| overrides.program.clone())
        .ok_or_else(|| anyhow::anyhow!("No engine program: pass --engine or set [engine].program"))?;
    Ok(EngineConfig {
        program,
        args: overrides.args.clone(),
        kb_path: kb_cli.or_else(|| overrides.kb_path.clone()),
        working_dir: overrides.working_dir.clone(),
    })
}

/// Driver settings that a reloaded checkpoint does not honor.
///
/// Vocabulary, batch size and numeric bits come from the checkpoint
/// metadata; `debug` and the prefilter seed are not persisted at all, so a
/// reloaded prefilter keeps task strings and draws batches unseeded.
pub fn reload_mismatches(meta: &CheckpointMeta, config: &DriverConfig) -> Vec<String> {
    let mut mismatches = Vec::new();
    if meta.batch_size != config.batch_size {
        mismatches.push(format!(
            "batch_size {} ignored; checkpoint uses {}",
            config.batch_size, meta.batch_size
        ));
    }
    if meta.numeric_bits != config.numeric_bits {
        mismatches.push(format!(
            "numeric_bits {} ignored; checkpoint uses {}",
            config.numeric_bits, meta.numeric_bits
        ));
    }
    if meta.subjects != config.subjects {
        mismatches.push(format!(
            "subjects {:?} ignored; checkpoint uses {:?}",
            config.subjects, meta.subjects
        ));
    }
    if meta.words != config.words {
        mismatches.push(format!(
            "words {:?} ignored; checkpoint uses {:?}",
            config.words, meta.words
        ));
    }
    if !config.debug {
        mismatches.push("debug = false ignored; reloaded buffer keeps task strings".to_string());
    }
    if let Some(seed) = config.seed {
        mismatches.push(format!(
            "seed {seed} only seeds the workload; reloaded prefilter batches are unseeded"
        ));
    }
    mismatches
}
