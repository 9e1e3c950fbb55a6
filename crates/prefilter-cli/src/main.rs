mod config;
mod pipeline;
pub mod results;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use config::{DriverOverrides, EvalOverrides};
use pipeline::{CompareArgs, EvalArgs, TrainArgs};

/// res-prefilter: learned relevance filter for resolution engine task queues.
#[derive(Parser)]
#[command(name = "res-prefilter", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// CLI subcommands for training, guided evaluation, and comparison.
#[derive(Subcommand)]
enum Command {
    /// Train the prefilter with the priority-feedback loop against a live engine.
    Train {
        /// Observation pairs asserted at the start of each round.
        explosion_steps: Option<usize>,
        /// Feedback steps per round.
        reasoning_steps: Option<usize>,
        /// Path to a TOML config file with [driver] and [engine] sections.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Engine executable (overrides [engine].program).
        #[arg(long)]
        engine: Option<PathBuf>,
        /// Knowledge-base file loaded by the engine (overrides [engine].kb_path).
        #[arg(long)]
        kb: Option<PathBuf>,
        /// Checkpoint id.
        #[arg(long)]
        model_name: Option<String>,
        /// Directory for checkpoint files.
        #[arg(long)]
        checkpoint_dir: Option<PathBuf>,
        /// Train every this many steps.
        #[arg(long)]
        train_interval: Option<usize>,
        /// Number of training rounds.
        #[arg(long)]
        num_trainings: Option<usize>,
        /// Width of numeric constants recorded in the checkpoint.
        #[arg(long)]
        numeric_bits: Option<u32>,
        /// Promote tasks whose priority exceeds this threshold.
        #[arg(long)]
        prb_threshold: Option<f64>,
        /// Continue from the existing checkpoint instead of a fresh model.
        #[arg(long)]
        reload: bool,
        /// Seed for the workload generator, buffer shuffling and weight init.
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Run a guided reasoning session and count derived target facts.
    Eval {
        /// Observation pairs asserted before guided reasoning starts.
        explosion_steps: Option<usize>,
        /// Guided reasoning steps.
        reasoning_steps: Option<usize>,
        /// Path to a TOML config file with [eval], [driver] and [engine] sections.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Engine executable (overrides [engine].program).
        #[arg(long)]
        engine: Option<PathBuf>,
        /// Knowledge-base file loaded by the engine (overrides [engine].kb_path).
        #[arg(long)]
        kb: Option<PathBuf>,
        /// Score tasks with the trained checkpoint; uniform random priorities otherwise.
        #[arg(long)]
        use_network: bool,
        /// Checkpoint id to load with --use-network.
        #[arg(long)]
        model_name: Option<String>,
        /// Directory holding the checkpoint.
        #[arg(long)]
        checkpoint_dir: Option<PathBuf>,
        /// Promote tasks whose priority exceeds this threshold.
        #[arg(long)]
        prb_threshold: Option<f64>,
        /// Scan the knowledge base every this many steps.
        #[arg(long)]
        report_interval: Option<usize>,
        /// Seed for the workload generator and the baseline scorer.
        #[arg(long)]
        seed: Option<u64>,
        /// Path to write JSON evaluation results.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Compare evaluation results (e.g. trained prefilter vs. uniform baseline).
    Compare {
        /// Paths to evaluation result JSON files.
        #[arg(long, required = true, num_args = 1..)]
        results: Vec<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Train {
            explosion_steps,
            reasoning_steps,
            config,
            engine,
            kb,
            model_name,
            checkpoint_dir,
            train_interval,
            num_trainings,
            numeric_bits,
            prb_threshold,
            reload,
            seed,
        } => pipeline::run_train(TrainArgs {
            config,
            engine,
            kb,
            reload,
            overrides: DriverOverrides {
                explosion_steps,
                steps_per_round: reasoning_steps,
                rounds: num_trainings,
                train_interval,
                numeric_bits,
                priority_threshold: prb_threshold,
                model_name,
                checkpoint_dir,
                seed,
            },
        }),
        Command::Eval {
            explosion_steps,
            reasoning_steps,
            config,
            engine,
            kb,
            use_network,
            model_name,
            checkpoint_dir,
            prb_threshold,
            report_interval,
            seed,
            output,
        } => pipeline::run_eval(EvalArgs {
            config,
            engine,
            kb,
            use_network,
            model_name,
            checkpoint_dir,
            output,
            overrides: EvalOverrides {
                explosion_steps,
                steps: reasoning_steps,
                priority_threshold: prb_threshold,
                report_interval,
                seed,
            },
        }),
        Command::Compare { results } => pipeline::run_compare(CompareArgs { results }),
    }
}
