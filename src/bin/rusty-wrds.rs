//! rusty-wrds CLI - Build CRSP and Compustat research tables
//!
//! ## Example Usage
//!
//! ```bash
//! # Monthly CRSP table, then link it to Compustat
//! rusty-wrds monthly
//! rusty-wrds compustat
//! rusty-wrds links
//!
//! # Daily returns, continuing an interrupted run
//! rusty-wrds daily --resume
//!
//! # Everything, with a JSON run summary
//! rusty-wrds all --summary run.json
//!
//! # Tables in the local store
//! rusty-wrds info
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use rusty_wrds::batch::{BatchReport, ProgressSink};
use rusty_wrds::config::PipelineConfig;
use rusty_wrds::data::{FileSource, RemoteSource};
use rusty_wrds::pipeline::{Pipeline, PipelineContext, References, RunSummary, StageSummary};
use rusty_wrds::store::{SqliteStore, TableStore};
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Instant;

/// rusty-wrds: CRSP and Compustat preparation pipeline
#[derive(Parser)]
#[command(name = "rusty-wrds")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "Robert Fall")]
#[command(about = "CRSP and Compustat preparation pipeline", long_about = None)]
struct Cli {
    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Local SQLite database (overrides the configuration file)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Write the run summary as JSON to this file
    #[arg(short, long, global = true)]
    summary: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the monthly CRSP table
    Monthly,

    /// Build the Compustat firm-year table
    Compustat,

    /// Attach gvkeys to the monthly CRSP table
    Links,

    /// Fetch daily excess returns, one security at a time
    Daily {
        /// Skip securities completed by an earlier run
        #[arg(short, long)]
        resume: bool,
    },

    /// Run every stage
    All {
        /// Skip securities completed by an earlier daily run
        #[arg(short, long)]
        resume: bool,
    },

    /// Show tables in the local store
    Info,
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    let path = match path {
        Some(path) => Some(path.to_path_buf()),
        None => dirs::home_dir()
            .map(|home| home.join(".rusty-wrds").join("config.toml"))
            .filter(|p| p.exists()),
    };

    let mut config = match path {
        Some(path) => {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config {}", path.display()))?
        }
        None => PipelineConfig::default(),
    };
    config.apply_env();
    Ok(config)
}

/// Batch progress on an indicatif bar
struct BarProgress {
    bar: Option<ProgressBar>,
}

impl ProgressSink for BarProgress {
    fn start(&mut self, total: usize) {
        let bar = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
        {
            bar.set_style(style.progress_chars("#>-"));
        }
        self.bar = Some(bar);
    }

    fn advance(&mut self, index: usize, _total: usize, identifier: i64) {
        if let Some(bar) = &self.bar {
            bar.set_position(index as u64);
            bar.set_message(format!("permno {}", identifier));
        }
    }

    fn finish(&mut self, report: &BatchReport) {
        if let Some(bar) = self.bar.take() {
            bar.finish_with_message(format!("{} rows", report.rows_written));
        }
    }
}

#[cfg(feature = "async")]
fn fetch_cpi(ctx: &PipelineContext) -> Result<rusty_wrds::data::ReferenceSeries> {
    use rusty_wrds::data::sources::{fred::CPI_SERIES, FredSource};

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let fred = FredSource::new()?;
    let series =
        runtime.block_on(fred.fetch_monthly(CPI_SERIES, ctx.range.start, ctx.range.end))?;
    Ok(series.normalized_to_last())
}

fn load_references(ctx: &PipelineContext) -> Result<References> {
    #[allow(unused_mut)]
    let mut refs =
        References::load(&ctx.config.reference).context("Failed to load reference series")?;

    if refs.cpi.is_none() && ctx.config.reference.cpi_from_fred {
        #[cfg(feature = "async")]
        {
            refs.cpi = Some(fetch_cpi(ctx).context("Failed to download CPI")?);
        }
        #[cfg(not(feature = "async"))]
        log::warn!("reference.cpi_from_fred needs the `async` feature; real market cap left empty");
    }
    Ok(refs)
}

fn print_stage(stage: &StageSummary) {
    println!(
        "  {} {} ({} fetched, {} written to {})",
        "✓".green(),
        stage.stage.bold(),
        stage.rows_fetched,
        stage.rows_written,
        stage.table.cyan()
    );
    if let Some(drops) = &stage.drops {
        println!(
            "    {}",
            format!(
                "dropped {}: missing ret_excess {}, mktcap {}, mktcap_lag {}",
                drops.dropped(),
                drops.missing_ret_excess,
                drops.missing_mktcap,
                drops.missing_mktcap_lag
            )
            .dimmed()
        );
    }
}

fn print_batch(report: &BatchReport) {
    println!(
        "  {} {} ({} securities: {} appended, {} empty, {} skipped, {} rows)",
        "✓".green(),
        "daily".bold(),
        report.total,
        report.appended,
        report.empty,
        report.skipped,
        report.rows_written
    );
    if !report.failed.is_empty() {
        println!(
            "  {} {} securities failed",
            "!".yellow().bold(),
            report.failed.len()
        );
        for failure in report.failed.iter().take(10) {
            println!("    {} {}", failure.identifier, failure.message.dimmed());
        }
    }
}

fn write_summary(summary: &RunSummary, path: &Path) -> Result<()> {
    fs::write(path, summary.to_json()?)
        .with_context(|| format!("Failed to write summary {}", path.display()))?;
    println!("Summary written to {}", path.display().to_string().cyan());
    Ok(())
}

fn show_info(store: &SqliteStore, database: &Path) -> Result<()> {
    println!(
        "{} {}",
        "rusty-wrds".cyan().bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  {} {}", "Database:".bold(), database.display());
    println!();

    let tables = store.tables()?;
    if tables.is_empty() {
        println!("  {}", "No tables yet".dimmed());
    }
    for table in tables {
        println!("  {:<24} {:>12}", table, store.count(&table)?);
    }
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let mut config = load_config(cli.config.as_deref())?;
    if let Some(database) = cli.database {
        config.database_path = database;
    }
    if let Commands::Daily { resume: true } | Commands::All { resume: true } = cli.command {
        config.batch.resume = true;
    }

    if let Some(parent) = config.database_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    let mut store = SqliteStore::open(&config.database_path)
        .with_context(|| format!("Failed to open {}", config.database_path.display()))?;

    if let Commands::Info = cli.command {
        return show_info(&store, &config.database_path);
    }

    config.validate().context("Invalid configuration")?;
    let root = config.source.root.clone().unwrap_or_default();
    let source = FileSource::new(&root, config.source.format);
    source.check().context("Remote source unavailable")?;

    let ctx = PipelineContext::new(config)?;
    if cli.verbose {
        println!(
            "{} run {} ({} to {}, links closed at {})",
            "rusty-wrds".cyan().bold(),
            ctx.run_id.to_string().dimmed(),
            ctx.range.start,
            ctx.range.end,
            ctx.run_date
        );
        println!("Source: {}", source.root().display().to_string().dimmed());
    }
    let refs = load_references(&ctx)?;

    let started = Instant::now();
    let mut pipeline = Pipeline::new(ctx, &source, &mut store);
    let mut progress = BarProgress { bar: None };

    match cli.command {
        Commands::Monthly => print_stage(pipeline.run_monthly(&refs).context("monthly stage")?),
        Commands::Compustat => print_stage(pipeline.run_compustat().context("compustat stage")?),
        Commands::Links => print_stage(pipeline.run_links().context("links stage")?),
        Commands::Daily { .. } => {
            print_batch(pipeline.run_daily(&refs, &mut progress).context("daily stage")?)
        }
        Commands::All { .. } => {
            print_stage(pipeline.run_monthly(&refs).context("monthly stage")?);
            print_stage(pipeline.run_compustat().context("compustat stage")?);
            print_stage(pipeline.run_links().context("links stage")?);
            print_batch(pipeline.run_daily(&refs, &mut progress).context("daily stage")?);
        }
        Commands::Info => {}
    }

    let summary = pipeline.finish();
    println!(
        "{} in {:.1}s",
        "Done".green().bold(),
        started.elapsed().as_secs_f64()
    );
    if let Some(path) = cli.summary {
        write_summary(&summary, &path)?;
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Err(e) = run(cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        process::exit(1);
    }
}
