//! Medalboard - filter and aggregate Olympic medal tables
//!
//! Loads a medal CSV, applies the requested filters and grouping, and
//! prints a chart-ready table as Markdown, JSON or CSV.
//!
//! Exit codes:
//!   0 - Success (an empty result is still a success)
//!   1 - Error (bad arguments, unreadable data, unknown measure, etc.)

use anyhow::{Context, Result};
use chrono::Utc;
use medalboard::analysis::{self, MedalSummary};
use medalboard::cli::{Args, OutputFormat};
use medalboard::config::{Config, CONFIG_FILE_NAME};
use medalboard::data::{self, DataSource};
use medalboard::models::{Dataset, Dimension, Report, ReportMetadata};
use medalboard::report;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Config is read first so `[general] verbose` can raise the log level.
    let (mut config, config_origin) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    init_logging(&args, &config);

    info!("Medalboard v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    match config_origin {
        ConfigOrigin::File(ref path) => info!("Loaded config from: {}", path),
        ConfigOrigin::Defaults => debug!("No config file found, using defaults"),
        ConfigOrigin::Fallback(ref e) => warn!("Failed to load config: {}", e),
    }

    if let Err(e) = run(args, config).await {
        error!("Run failed: {:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle --init-config: generate a default .medalboard.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "{} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("Created {} with default settings.", CONFIG_FILE_NAME);
    println!("Edit it to change the data source, default grouping and views.");
    Ok(())
}

/// Initialize logging. `RUST_LOG` wins over the verbosity flags.
fn init_logging(args: &Args, config: &Config) {
    let level = args.log_level(config.general.verbose);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Load, filter, aggregate and render one query.
async fn run(args: Args, config: Config) -> Result<()> {
    let start_time = Instant::now();

    if args.list.as_deref() == Some("views") {
        list_views(&config);
        return Ok(());
    }

    let source = DataSource::parse(&config.data.source);
    let loaded = data::load_source(&source, &config.load_options(!args.quiet)).await?;
    let dataset = loaded.dataset;

    if let Some(ref list) = args.list {
        return list_dimension(list, &dataset);
    }

    let query = args.build_query(&config)?;
    debug!("Query: {:?}", query);

    let view = analysis::apply_filters(&dataset, &query.filters);
    let chart = analysis::chart_for_view(&view, &query)?;

    if chart.is_empty() {
        warn!("{}", report::NO_DATA_MESSAGE);
    }

    let report = Report {
        metadata: ReportMetadata {
            source: source.to_string(),
            generated_at: Utc::now(),
            view: args.view.clone(),
            filters: query.filters.describe(),
            group_by: query.group.dimensions().to_vec(),
            aggregation: query.aggregation.to_string(),
            records_loaded: dataset.len(),
            rows_skipped: loaded.rows_skipped,
            records_matched: view.len(),
        },
        summary: MedalSummary::from_view(&view),
        chart,
    };

    let output = match config.report.format {
        OutputFormat::Markdown => report::generate_markdown_report(&report),
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Csv => report::generate_csv_report(&report.chart)?,
    };

    match args.output {
        Some(ref path) => {
            report::write_report(&output, path)?;
            info!("Report saved to: {}", path.display());
        }
        None => print!("{}", output),
    }

    info!(
        "Matched {} of {} records in {:.2}s",
        report.metadata.records_matched,
        report.metadata.records_loaded,
        start_time.elapsed().as_secs_f64()
    );

    Ok(())
}

/// Handle --list views: print configured view names. Needs no data.
fn list_views(config: &Config) {
    for line in config.view_listing() {
        println!("{}", line);
    }
}

/// Handle --list <dim>: print the dropdown options for a dimension.
fn list_dimension(list: &str, dataset: &Dataset) -> Result<()> {
    let dimension: Dimension = list.parse()?;
    println!("{}", analysis::ALL_SELECTION);
    for value in analysis::distinct_values(dataset, dimension) {
        println!("{}", value);
    }
    Ok(())
}

/// Where the active configuration came from.
enum ConfigOrigin {
    File(String),
    Defaults,
    Fallback(String),
}

/// Load configuration from file or use defaults.
///
/// Runs before logging is set up, so it reports its origin instead of logging.
fn load_config(args: &Args) -> Result<(Config, ConfigOrigin)> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        let config = Config::load(config_path)?;
        return Ok((config, ConfigOrigin::File(config_path.display().to_string())));
    }

    match Config::load_default() {
        Ok(Some(config)) => Ok((config, ConfigOrigin::File(CONFIG_FILE_NAME.to_string()))),
        Ok(None) => Ok((Config::default(), ConfigOrigin::Defaults)),
        Err(e) => Ok((Config::default(), ConfigOrigin::Fallback(format!("{:#}", e)))),
    }
}
