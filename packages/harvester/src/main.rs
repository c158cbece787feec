//! Beer label harvester CLI
//!
//! Scrapes the catalog batch by batch, describes each label with a local
//! LLaVA model, and writes CSV artifacts. Re-running resumes after the last
//! completed batch.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use harvester::config::AppConfig;
use harvester::{
    BatchPersistor, CatalogExt, CsvStore, HttpCatalog, HttpImageSource, LlavaAnalyzer,
    PipelineDriver, RunReport,
};
use ollama_client::OllamaClient;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "harvest")]
#[command(about = "Batch-resumable beer catalog harvester with label analysis")]
struct Cli {
    /// Output directory (overrides HARVEST_OUTPUT_DIR)
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline, skipping batches that already have an artifact
    Run(RunArgs),

    /// List completed batches and the master row count
    Status,

    /// Rewrite the master artifact from every batch artifact
    RebuildMaster,
}

#[derive(Args)]
struct RunArgs {
    /// First catalog page
    #[arg(long)]
    start_page: Option<u32>,

    /// Pages per batch
    #[arg(long)]
    batch_size: Option<u32>,

    /// Last page to fetch
    #[arg(long)]
    max_page: Option<u32>,

    /// Ollama vision model
    #[arg(long)]
    model: Option<String>,

    /// Catalog request rate
    #[arg(long)]
    requests_per_second: Option<u32>,

    /// Print the run report as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,harvester=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_line_number(true),
        )
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env().context("Failed to load configuration")?;
    if let Some(dir) = &cli.output_dir {
        config.harvest = config.harvest.with_output_dir(dir);
    }

    match cli.command {
        Commands::Run(args) => run(config, args).await,
        Commands::Status => status(&config),
        Commands::RebuildMaster => rebuild_master(&config),
    }
}

async fn run(mut config: AppConfig, args: RunArgs) -> Result<()> {
    if let Some(page) = args.start_page {
        config.harvest.start_page = page;
    }
    if let Some(size) = args.batch_size {
        config.harvest.batch_size = size;
    }
    if let Some(page) = args.max_page {
        config.harvest.max_page = Some(page);
    }
    if let Some(model) = args.model {
        config.model = model;
    }
    if let Some(rps) = args.requests_per_second {
        config.requests_per_second = rps;
    }

    tracing::info!(
        start_page = config.harvest.start_page,
        batch_size = config.harvest.batch_size,
        max_page = ?config.harvest.max_page,
        output = %config.harvest.paginated_dir.display(),
        "Starting harvest"
    );

    let ollama = OllamaClient::new(&config.ollama_base_url)
        .with_timeout(config.harvest.analyzer_timeout)
        .context("Failed to create Ollama client")?;
    let analyzer = LlavaAnalyzer::new(ollama, &config.model)
        .ensure_model()
        .await
        .context("No LLaVA model available; install one with `ollama pull llava`")?;

    let catalog = HttpCatalog::new()
        .context("Failed to create HTTP client")?
        .with_base_url(&config.catalog_url)
        .rate_limited(config.requests_per_second);
    let images = HttpImageSource::new().context("Failed to create HTTP client")?;

    let driver = PipelineDriver::from_config(
        &config.harvest,
        catalog,
        images,
        analyzer,
        CsvStore::new(),
    )?;
    let report = driver.run().await.context("Harvest halted")?;

    print_report(&report, args.json)
}

fn print_report(report: &RunReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        println!("{}", report.summary());
        if !report.pages_skipped.is_empty() {
            println!("Skipped pages: {:?}", report.pages_skipped);
        }
    }
    Ok(())
}

fn status(config: &AppConfig) -> Result<()> {
    let persistor = BatchPersistor::from_config(CsvStore::new(), &config.harvest);

    let batches = persistor
        .completed_batches()
        .context("Failed to list batch artifacts")?;
    for range in &batches {
        println!("{}", persistor.artifact_path(*range).display());
    }

    let rows = persistor
        .master_rows()
        .context("Failed to read master artifact")?;
    println!(
        "{} completed batches; {} rows in {}",
        batches.len(),
        rows,
        persistor.master_path().display()
    );
    Ok(())
}

fn rebuild_master(config: &AppConfig) -> Result<()> {
    let persistor = BatchPersistor::from_config(CsvStore::new(), &config.harvest);
    let rows = persistor
        .rebuild_master()
        .context("Failed to rebuild master artifact")?;
    println!("Rebuilt {} with {} rows", persistor.master_path().display(), rows);
    Ok(())
}
