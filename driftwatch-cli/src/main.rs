//! Driftwatch CLI: drift reports for tabular model inputs.
//!
//! Fits a calculator on a reference dataset and reports per-chunk drift for
//! an analysis dataset, as a table or JSON.

mod commands;
mod output;

use clap::Parser;
use driftwatch_core::ChunkPeriod;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Driftwatch: label-free data drift detection
#[derive(Parser, Debug)]
#[command(name = "driftwatch", version, about, long_about = None)]
struct Cli {
    /// Workspace directory (holds `.driftwatch/config.toml`)
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub(crate) enum Commands {
    /// Multivariate drift from the PCA reconstruction error
    Reconstruction {
        #[command(flatten)]
        data: DataArgs,

        /// Components to keep: a count (3), a variance fraction (0.65) or "mle"
        #[arg(long)]
        n_components: Option<String>,

        /// Write the drift plot specification as JSON to this path
        #[arg(long)]
        plot: Option<PathBuf>,

        /// Include reference chunks in the plot
        #[arg(long, requires = "plot")]
        plot_reference: bool,
    },
    /// Per-feature statistical tests (Kolmogorov-Smirnov, chi-squared)
    Univariate {
        #[command(flatten)]
        data: DataArgs,

        /// Also rank features by number of alerts
        #[arg(long)]
        rank: bool,
    },
    /// Drift in the distribution of the target column
    Target {
        #[command(flatten)]
        data: DataArgs,

        /// Target column (defaults to `columns.target` from the config)
        #[arg(short, long)]
        target: Option<String>,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Inputs shared by every calculator subcommand.
#[derive(clap::Args, Debug)]
pub(crate) struct DataArgs {
    /// Reference dataset (.csv, .tsv, .json, .jsonl)
    #[arg(short, long)]
    reference: PathBuf,

    /// Analysis dataset (.csv, .tsv, .json, .jsonl)
    #[arg(short, long)]
    analysis: PathBuf,

    /// Feature columns, comma separated
    #[arg(short, long, value_delimiter = ',')]
    features: Vec<String>,

    /// Timestamp column
    #[arg(long)]
    timestamp: Option<String>,

    /// Rows per chunk
    #[arg(long, conflicts_with_all = ["chunk_number", "chunk_period"])]
    chunk_size: Option<usize>,

    /// Number of chunks
    #[arg(long, conflicts_with = "chunk_period")]
    chunk_number: Option<usize>,

    /// Calendar chunks: D, W, M, Q or Y
    #[arg(long)]
    chunk_period: Option<ChunkPeriod>,

    /// Output format
    #[arg(long, value_enum)]
    format: Option<FormatArg>,

    /// Load at most this many rows from each dataset
    #[arg(long)]
    limit: Option<usize>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FormatArg {
    Table,
    Json,
}

#[derive(clap::Subcommand, Debug)]
pub(crate) enum ConfigAction {
    /// Create a default configuration file in the workspace
    Init,
    /// Show the resolved configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "driftwatch", "driftwatch")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "driftwatch.log");
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
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    commands::handle_command(cli.command, &workspace).await
}
