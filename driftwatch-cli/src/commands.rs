//! CLI subcommand handlers.

use crate::output::{Table, format_alert, format_float};
use crate::{Commands, ConfigAction, DataArgs, FormatArg};
use anyhow::Context;
use driftwatch_core::algorithms::NComponents;
use driftwatch_core::chunk::PERIOD_COLUMN_NAME;
use driftwatch_core::config::{ChunkingConfig, workspace_config_path};
use driftwatch_core::drift::ChunkSummary;
use driftwatch_core::{
    AlertCountRanking, Calculator, CalculatorResult, DataBatch, DataReconstructionDriftCalculator,
    DataSourceType, DriftwatchConfig, OutputFormat, PlotKind, ReconstructionDriftResult,
    TargetDistributionCalculator, TargetDistributionResult, UnivariateDriftResult,
    UnivariateStatisticalDriftCalculator,
};
use std::path::{Path, PathBuf};

/// Handle a CLI subcommand.
pub async fn handle_command(command: Commands, workspace: &Path) -> anyhow::Result<()> {
    match command {
        Commands::Reconstruction {
            data,
            n_components,
            plot,
            plot_reference,
        } => {
            handle_reconstruction(&data, n_components.as_deref(), plot, plot_reference, workspace)
                .await
        }
        Commands::Univariate { data, rank } => handle_univariate(&data, rank, workspace).await,
        Commands::Target { data, target } => handle_target(&data, target, workspace).await,
        Commands::Config { action } => handle_config(action, workspace).await,
    }
}

async fn handle_config(action: ConfigAction, workspace: &Path) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_path = workspace_config_path(workspace);
            if let Some(config_dir) = config_path.parent() {
                std::fs::create_dir_all(config_dir)?;
            }

            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }

            let default_config = DriftwatchConfig::default();
            let toml_str = toml::to_string_pretty(&default_config)?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            let config = driftwatch_core::load_config(Some(workspace), None)
                .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
            let toml_str = toml::to_string_pretty(&config)?;
            println!("{}", toml_str);
            Ok(())
        }
    }
}

// --- Calculators ---

/// Resolved configuration plus both datasets.
struct Inputs {
    config: DriftwatchConfig,
    reference: DataBatch,
    analysis: DataBatch,
}

async fn prepare(args: &DataArgs, workspace: &Path) -> anyhow::Result<Inputs> {
    let mut config = driftwatch_core::load_config(Some(workspace), None)
        .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
    apply_overrides(args, &mut config);

    let (reference, analysis) = tokio::try_join!(
        load_batch(&args.reference, args.limit),
        load_batch(&args.analysis, args.limit),
    )?;
    Ok(Inputs {
        config,
        reference,
        analysis,
    })
}

/// Command-line flags win over every config layer. Any chunking flag replaces
/// the configured chunking policy as a whole.
fn apply_overrides(args: &DataArgs, config: &mut DriftwatchConfig) {
    if !args.features.is_empty() {
        config.columns.features = args.features.clone();
    }
    if let Some(timestamp) = &args.timestamp {
        config.columns.timestamp = timestamp.clone();
    }
    if args.chunk_size.is_some() || args.chunk_number.is_some() || args.chunk_period.is_some() {
        config.chunking = ChunkingConfig {
            chunk_size: args.chunk_size,
            chunk_number: args.chunk_number,
            chunk_period: args.chunk_period,
        };
    }
    if let Some(format) = args.format {
        config.output.format = match format {
            FormatArg::Table => OutputFormat::Table,
            FormatArg::Json => OutputFormat::Json,
        };
    }
}

async fn load_batch(path: &Path, limit: Option<usize>) -> anyhow::Result<DataBatch> {
    let source = DataSourceType::from_path(path)?.into_source();
    let batch = source
        .load(limit)
        .await
        .with_context(|| format!("Failed to load {}", path.display()))?;
    tracing::debug!(
        path = %path.display(),
        rows = batch.row_count(),
        columns = batch.column_count(),
        "loaded dataset"
    );
    Ok(batch)
}

/// Configured features, or every column that is not the timestamp, the
/// target or the period marker.
fn resolve_features(config: &DriftwatchConfig, data: &DataBatch) -> Vec<String> {
    if !config.columns.features.is_empty() {
        return config.columns.features.clone();
    }
    data.columns
        .iter()
        .filter(|c| {
            **c != config.columns.timestamp
                && c.as_str() != PERIOD_COLUMN_NAME
                && config.columns.target.as_deref() != Some(c.as_str())
        })
        .cloned()
        .collect()
}

/// Parse `3`, `0.65` or `mle` the same way the config file does.
fn parse_n_components(raw: &str) -> anyhow::Result<NComponents> {
    let raw = raw.trim();
    let value = match raw.parse::<serde_json::Value>() {
        Ok(number @ serde_json::Value::Number(_)) => number,
        _ => serde_json::Value::String(raw.to_ascii_lowercase()),
    };
    let n_components: NComponents = serde_json::from_value(value)
        .map_err(|_| anyhow::anyhow!("invalid n_components '{raw}', expected a count, a fraction or 'mle'"))?;
    n_components.validate()?;
    Ok(n_components)
}

async fn handle_reconstruction(
    args: &DataArgs,
    n_components: Option<&str>,
    plot: Option<PathBuf>,
    plot_reference: bool,
    workspace: &Path,
) -> anyhow::Result<()> {
    let Inputs {
        mut config,
        reference,
        analysis,
    } = prepare(args, workspace).await?;
    if let Some(raw) = n_components {
        config.reconstruction.n_components = parse_n_components(raw)?;
    }

    let features = resolve_features(&config, &reference);
    let mut calculator = DataReconstructionDriftCalculator::new(config.calculator_config(features))?;
    calculator.fit(&reference)?;
    let result = calculator.calculate(&analysis)?;

    if let Some(path) = plot {
        let figure = result.plot(PlotKind::Drift, plot_reference)?;
        tokio::fs::write(&path, figure.to_json_pretty()?)
            .await
            .with_context(|| format!("Failed to write plot to {}", path.display()))?;
        tracing::info!(path = %path.display(), "wrote drift plot");
    }

    match config.output.format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => {
            let table = reconstruction_table(&result);
            print!("{}", table.render());
            println!(
                "\n{} of {} chunks alerting",
                result.alerts().count(),
                table.len()
            );
        }
    }
    Ok(())
}

async fn handle_univariate(args: &DataArgs, rank: bool, workspace: &Path) -> anyhow::Result<()> {
    let Inputs {
        config,
        reference,
        analysis,
    } = prepare(args, workspace).await?;

    let features = resolve_features(&config, &reference);
    let mut calculator =
        UnivariateStatisticalDriftCalculator::new(config.univariate_config(features))?;
    calculator.fit(&reference)?;
    let result = calculator.calculate(&analysis)?;
    let ranking = if rank {
        Some(AlertCountRanking.rank(&result)?)
    } else {
        None
    };

    match config.output.format {
        OutputFormat::Json => {
            let mut report = serde_json::json!({ "results": result.to_json()? });
            if let Some(ranking) = &ranking {
                report["ranking"] = serde_json::to_value(ranking)?;
            }
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Table => {
            print!("{}", univariate_table(&result).render());
            if let Some(ranking) = ranking {
                let mut table = Table::new(["rank", "feature", "alerts"]);
                for entry in ranking {
                    table.push_row(vec![
                        entry.rank.to_string(),
                        entry.feature,
                        entry.number_of_alerts.to_string(),
                    ]);
                }
                println!();
                print!("{}", table.render());
            }
        }
    }
    Ok(())
}

async fn handle_target(
    args: &DataArgs,
    target: Option<String>,
    workspace: &Path,
) -> anyhow::Result<()> {
    let Inputs {
        config,
        reference,
        analysis,
    } = prepare(args, workspace).await?;

    let target = target
        .or_else(|| config.columns.target.clone())
        .context("No target column given. Pass --target or set columns.target in the config")?;
    let mut calculator = TargetDistributionCalculator::new(config.target_config(target))?;
    calculator.fit(&reference)?;
    let result = calculator.calculate(&analysis)?;

    match config.output.format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => print!("{}", target_table(&result).render()),
    }
    Ok(())
}

fn print_json(result: &impl CalculatorResult) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(&result.to_json()?)?);
    Ok(())
}

// --- Tables ---

fn chunk_cells(chunk: &ChunkSummary) -> Vec<String> {
    vec![
        chunk.key.clone(),
        chunk.period.to_string(),
        chunk.start_date.format("%Y-%m-%d %H:%M").to_string(),
        chunk.end_date.format("%Y-%m-%d %H:%M").to_string(),
    ]
}

fn reconstruction_table(result: &ReconstructionDriftResult) -> Table {
    let mut table = Table::new([
        "chunk", "period", "start", "end", "error", "lower", "upper", "alert",
    ]);
    for row in result.rows() {
        let mut cells = chunk_cells(&row.chunk);
        cells.extend([
            format_float(row.reconstruction_error),
            format_float(row.lower_threshold),
            format_float(row.upper_threshold),
            format_alert(row.alert),
        ]);
        table.push_row(cells);
    }
    table
}

fn univariate_table(result: &UnivariateDriftResult) -> Table {
    let mut table = Table::new([
        "chunk", "period", "start", "end", "feature", "test", "statistic", "p_value", "alert",
    ]);
    for row in result.rows() {
        let chunk = chunk_cells(&row.chunk);
        for drift in &row.features {
            let mut cells = chunk.clone();
            cells.extend([
                drift.feature.clone(),
                drift.test.statistic_name().to_string(),
                format_float(drift.statistic),
                format_float(drift.p_value),
                format_alert(drift.alert),
            ]);
            table.push_row(cells);
        }
    }
    table
}

fn target_table(result: &TargetDistributionResult) -> Table {
    let mut table = Table::new([
        "chunk",
        "period",
        "start",
        "end",
        "missing_rate",
        "target_mean",
        "chi2",
        "p_value",
        "alert",
    ]);
    for row in result.rows() {
        let mut cells = chunk_cells(&row.chunk);
        cells.extend([
            format_float(row.targets_missing_rate),
            format_float(row.metric_target_drift),
            format_float(row.statistical_target_drift),
            format_float(row.p_value),
            format_alert(row.alert),
        ]);
        table.push_row(cells);
    }
    table
}
