//! RagLens CLI: evaluate recorded RAG interactions from the terminal.
//!
//! Runs the scoring pipeline on a results file, prints the summary and
//! writes the JSON and CSV reports.

mod commands;

use clap::Parser;
use raglens_core::{ConfigOverrides, EvaluationPipeline, RecordStore};
use std::path::{Path, PathBuf};
use tracing::warn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// RagLens: quality metrics for retrieval-augmented generation
#[derive(Parser, Debug)]
#[command(name = "raglens", version, about, long_about = None)]
struct Cli {
    /// Results file with a top-level `results` array
    input: Option<PathBuf>,

    /// Path of the JSON report
    #[arg(long = "json", value_name = "PATH")]
    json_path: Option<PathBuf>,

    /// Path of the CSV report
    #[arg(long = "csv", value_name = "PATH")]
    csv_path: Option<PathBuf>,

    /// Evaluate at most N records
    #[arg(long, value_name = "N")]
    limit: Option<usize>,

    /// Skip the external Ragas scorer and use heuristics only
    #[arg(long)]
    no_external: bool,

    /// Python interpreter for the external scorer
    #[arg(long, value_name = "PATH")]
    python: Option<PathBuf>,

    /// Abort the external scorer after SECS seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Workspace directory
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    quiet: bool,

    /// Subcommand
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Create default configuration file
    Init,
    /// Show current configuration
    Show,
}

impl Cli {
    /// Collect the flags that were given. Paths typed on the command line
    /// are taken relative to `cwd`, not to the workspace.
    fn overrides(&self, cwd: &Path) -> ConfigOverrides {
        let from_cwd = |path: &PathBuf| cwd.join(path);
        let mut overrides = ConfigOverrides::default();
        overrides.input.path = self.input.as_ref().map(from_cwd);
        overrides.input.limit = self.limit;
        overrides.output.json_path = self.json_path.as_ref().map(from_cwd);
        overrides.output.csv_path = self.csv_path.as_ref().map(from_cwd);
        overrides.external.enabled = self.no_external.then_some(false);
        overrides.external.python_path = self.python.clone();
        overrides.external.timeout_secs = self.timeout;
        overrides
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let mut cli = Cli::parse();
    let cwd = std::env::current_dir()?;

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "raglens", "raglens")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "raglens.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| cwd.clone());

    if let Some(command) = cli.command.take() {
        return commands::handle_command(command, &workspace).await;
    }

    let overrides = cli.overrides(&cwd);
    let mut config = raglens_core::config::load_config(Some(&workspace), Some(&overrides))
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
    config.resolve_paths(&workspace);
    for warning in config.validate() {
        warn!("{warning}");
    }

    let store = RecordStore::load_with_limit(&config.input.path, config.input.limit).await?;
    let pipeline = EvaluationPipeline::from_config(&config, workspace);
    let output = pipeline.run(&store).await;

    print!("{}", output.summary());
    for path in output.write_exports(&config.output).await? {
        println!("Report written: {}", path.display());
    }
    Ok(())
}
