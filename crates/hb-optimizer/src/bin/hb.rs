use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use hb_bridge::{BridgeConfig, EvaluatorWorker, ObjectiveBridge, PollConfig};
use hb_optimizer::{CommandObjective, OptimizationDriver, RunConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hb", version, about = "File-based bridge between an optimizer and its evaluator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct PollArgs {
    /// Directory holding the `vars/` and `eval/` storage areas.
    #[arg(long)]
    work_dir: Option<PathBuf>,
    #[arg(long)]
    poll_interval_ms: Option<u64>,
    /// Give up waiting after this long. Waits forever when omitted.
    #[arg(long)]
    timeout_ms: Option<u64>,
}

impl PollArgs {
    fn apply(&self, bridge: &mut BridgeConfig) {
        if let Some(dir) = &self.work_dir {
            bridge.work_dir = dir.clone();
        }
        if let Some(ms) = self.poll_interval_ms {
            bridge.poll = bridge.poll.clone().with_interval(Duration::from_millis(ms));
        }
        if let Some(ms) = self.timeout_ms {
            bridge.poll = bridge.poll.clone().with_timeout(Duration::from_millis(ms));
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the optimization loop, proposing parameters through the bridge.
    Optimize {
        /// JSON run configuration (seed, max_iters, constraints, ...).
        #[arg(long)]
        config: PathBuf,
        #[command(flatten)]
        poll: PollArgs,
        /// Write the run summary as JSON to this file.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Serve jobs by running a command for each parameter record.
    Evaluate {
        #[command(flatten)]
        poll: PollArgs,
        #[arg(long, default_value_t = 1)]
        start_at: u64,
        #[arg(long)]
        max_jobs: Option<u64>,
        /// Command to run per job; it reads the parameters on stdin and
        /// prints the objective value.
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Commands::Optimize {
            config,
            poll,
            output,
        } => optimize(config, poll, output),
        Commands::Evaluate {
            poll,
            start_at,
            max_jobs,
            command,
        } => evaluate(poll, start_at, max_jobs, command),
    }
}

fn optimize(path: PathBuf, poll: PollArgs, output: Option<PathBuf>) -> Result<()> {
    let mut config = RunConfig::from_file(&path)
        .with_context(|| format!("loading run config {}", path.display()))?;
    config.apply_env_overrides()?;
    poll.apply(&mut config.bridge);

    let mut bridge = ObjectiveBridge::new(&config.bridge)?;
    let mut driver = OptimizationDriver::from_config(&config)?;
    let outcome = driver.run(&mut bridge).map(|_| ());

    let status = driver.into_status();
    let summary = serde_json::to_string_pretty(&status)?;
    match &output {
        Some(out) => std::fs::write(out, format!("{summary}\n"))
            .with_context(|| format!("writing run summary {}", out.display()))?,
        None => println!("{summary}"),
    }

    outcome.with_context(|| format!("optimization run '{}' aborted", status.name))
}

fn evaluate(
    poll: PollArgs,
    start_at: u64,
    max_jobs: Option<u64>,
    command: Vec<String>,
) -> Result<()> {
    let mut bridge = BridgeConfig::default().with_poll(PollConfig::default());
    if let Ok(dir) = std::env::var(hb_optimizer::ENV_WORK_DIR) {
        bridge.work_dir = PathBuf::from(dir);
    }
    poll.apply(&mut bridge);

    let objective = CommandObjective::new(&command, bridge.params_path())?;
    let mut worker = EvaluatorWorker::new(&bridge, objective)?.starting_at(start_at);
    let processed = worker
        .serve(max_jobs, None)
        .with_context(|| format!("evaluator stopped at job {}", worker.next_job()))?;
    tracing::info!(processed, "evaluator finished");
    Ok(())
}
