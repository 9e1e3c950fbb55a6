//! Training, evaluation and comparison pipelines behind the CLI subcommands.

use std::path::PathBuf;
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};

use feedback::{run_guided, TaskScorer, TrainingDriver, UniformScorer};
use prefilter::ResPrefilter;
use reasoner::EngineSession;

use crate::config::{
    build_driver_config, build_engine_config, build_eval_config, load_prefilter_toml,
    reload_mismatches, DriverOverrides, EvalOverrides,
};
use crate::results::EvalResult;

/// Arguments for the `train` subcommand.
#[derive(Debug)]
pub struct TrainArgs {
    /// Optional TOML config file.
    pub config: Option<PathBuf>,
    /// Engine executable, overriding `[engine].program`.
    pub engine: Option<PathBuf>,
    /// Knowledge-base file, overriding `[engine].kb_path`.
    pub kb: Option<PathBuf>,
    /// Continue training from the existing checkpoint instead of a fresh model.
    pub reload: bool,
    pub overrides: DriverOverrides,
}

/// Arguments for the `eval` subcommand.
#[derive(Debug)]
pub struct EvalArgs {
    pub config: Option<PathBuf>,
    pub engine: Option<PathBuf>,
    pub kb: Option<PathBuf>,
    /// Score with the trained checkpoint instead of uniform random priorities.
    pub use_network: bool,
    /// Checkpoint id and directory (used with `use_network`).
    pub model_name: Option<String>,
    pub checkpoint_dir: Option<PathBuf>,
    /// Path to write JSON evaluation results.
    pub output: Option<PathBuf>,
    pub overrides: EvalOverrides,
}

/// Arguments for the `compare` subcommand.
#[derive(Debug)]
pub struct CompareArgs {
    pub results: Vec<PathBuf>,
}

fn progress_bar(len: u64) -> anyhow::Result<ProgressBar> {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")?
            .progress_chars("=> "),
    );
    Ok(pb)
}

/// Train the prefilter against a live engine and save its checkpoint.
pub fn run_train(args: TrainArgs) -> anyhow::Result<()> {
    let start = Instant::now();

    // 1. Load config
    let toml = load_prefilter_toml(args.config.as_deref())?;
    let driver_config = build_driver_config(toml.driver, &args.overrides);
    let engine_config = build_engine_config(&toml.engine, args.engine, args.kb)?;

    // 2. Build or reload the prefilter
    let mut prefilter = if args.reload {
        tracing::info!(
            model = %driver_config.model_name,
            dir = %driver_config.checkpoint_dir.display(),
            "Reloading prefilter checkpoint"
        );
        let prefilter = ResPrefilter::load(&driver_config.checkpoint_dir, &driver_config.model_name)?;
        for mismatch in reload_mismatches(&prefilter.metadata(), &driver_config) {
            tracing::warn!(model = %driver_config.model_name, "Reload: {mismatch}");
        }
        prefilter
    } else {
        ResPrefilter::new(&driver_config.prefilter_config())
    };

    // 3. Start the engine
    tracing::info!(program = %engine_config.program.display(), "Starting engine");
    let mut session = EngineSession::spawn(&engine_config)?;

    // 4. Run the feedback loop with progress bar
    let pb = progress_bar(driver_config.rounds as u64)?;
    let mut driver = TrainingDriver::new(driver_config);
    let outcome = driver.run_with_progress(&mut session, &mut prefilter, |summary| {
        if let Some(m) = summary.last_metrics {
            pb.set_message(format!("loss {:.5} acc {:.3}", m.loss, m.accuracy));
        }
        pb.inc(1);
    })?;
    pb.finish_with_message("done");

    let requests = session.requests_handled();
    session.shutdown();

    // 5. Print summary
    let elapsed = start.elapsed();
    println!("\n--- Training Summary ---");
    println!("Scorer: {}", prefilter.descriptor().name());
    println!("Stop reason: {:?}", outcome.reason);
    println!("Rounds: {}", outcome.rounds);
    println!("Feedback steps: {}", outcome.steps);
    println!("Training steps: {}", outcome.training_steps);
    if let Some(m) = outcome.last_metrics {
        println!("Last loss: {:.6}", m.loss);
        println!("Last accuracy: {:.4}", m.accuracy);
    }
    println!("Buffered examples: {}", prefilter.buffer().len());
    println!("Engine requests: {requests}");
    println!("Checkpoint: {}", outcome.checkpoint.display());
    println!("Elapsed: {:.1}s", elapsed.as_secs_f64());

    Ok(())
}

/// Run one guided evaluation and optionally write its JSON result.
pub fn run_eval(args: EvalArgs) -> anyhow::Result<()> {
    let start = Instant::now();

    let toml = load_prefilter_toml(args.config.as_deref())?;
    let eval_config = build_eval_config(toml.eval, &args.overrides);
    let engine_config = build_engine_config(&toml.engine, args.engine, args.kb)?;

    let model_name = args.model_name.unwrap_or(toml.driver.model_name);
    let checkpoint_dir = args.checkpoint_dir.unwrap_or(toml.driver.checkpoint_dir);
    let (mut scorer, model_name): (Box<dyn TaskScorer>, Option<String>) = if args.use_network {
        let prefilter = ResPrefilter::load(&checkpoint_dir, &model_name)?;
        (Box::new(prefilter), Some(model_name))
    } else {
        (Box::new(UniformScorer::new(eval_config.seed)), None)
    };

    tracing::info!(program = %engine_config.program.display(), "Starting engine");
    let mut session = EngineSession::spawn(&engine_config)?;

    let pb = progress_bar(eval_config.steps as u64)?;
    let report = run_guided(&mut session, scorer.as_mut(), &eval_config, |_| pb.inc(1))?;
    pb.finish_with_message("done");
    session.shutdown();

    let result = EvalResult::new(report, &eval_config, model_name);

    println!("\n--- Evaluation Summary ---");
    println!("Scorer: {}", result.scorer);
    println!("Steps: {}", result.steps);
    println!("Tasks scored: {}", result.scored);
    for r in &result.reports {
        println!("  step {:>6}: {} {} facts", r.step, r.target_facts, result.target_predicate);
    }
    println!("Distinct target facts: {}", result.distinct_target_facts);
    println!("Elapsed: {:.1}s", start.elapsed().as_secs_f64());

    if let Some(path) = args.output {
        let json = serde_json::to_string_pretty(&result)?;
        std::fs::write(&path, json)
            .map_err(|e| anyhow::anyhow!("Failed to write {}: {e}", path.display()))?;
        println!("Results: {}", path.display());
    }
    Ok(())
}

/// Print evaluation results side by side.
pub fn run_compare(args: CompareArgs) -> anyhow::Result<()> {
    let mut results = Vec::with_capacity(args.results.len());
    for path in &args.results {
        let file = std::fs::File::open(path)
            .map_err(|e| anyhow::anyhow!("Failed to open {}: {e}", path.display()))?;
        let result: EvalResult = serde_json::from_reader(file)
            .map_err(|e| anyhow::anyhow!("Failed to parse {}: {e}", path.display()))?;
        results.push((path, result));
    }

    println!("--- Evaluation Comparison ---");
    println!(
        "{:<40} {:>10} {:>8} {:>10} {:>10}",
        "file", "scorer", "steps", "distinct", "first@1"
    );
    for (path, r) in &results {
        let first = r
            .steps_to_reach(1)
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<40} {:>10} {:>8} {:>10} {:>10}",
            path.display(),
            r.scorer,
            r.steps,
            r.distinct_target_facts,
            first
        );
    }
    Ok(())
}
