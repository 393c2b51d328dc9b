use anyhow::Result;
use clap::Parser;
use lakeloader::config::AppConfig;
use lakeloader::datafetch::NativeExecutor;
use lakeloader::ExtractionEngine;
use std::sync::Arc;
use std::time::Instant;

#[derive(Parser)]
#[command(
    name = "lakeloader",
    about = "Extract relational tables into an object-storage landing zone"
)]
struct Cli {
    /// Path to config file. Environment variables (LAKELOADER_*) override it.
    #[arg(short, long)]
    config: Option<String>,

    /// Print the load plans and exit without extracting anything
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let now = Instant::now();
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    tracing::info!("Starting lakeloader");

    let config = AppConfig::load(cli.config.as_deref())?;
    config.validate()?;
    tracing::info!("Configuration loaded");

    let source = config.database.to_source()?;
    let options = config.extract_options()?;
    let storage = config.storage.build_gateway()?;
    let executor = Arc::new(NativeExecutor::connect(&source).await?);

    let engine = ExtractionEngine::new(executor.clone(), storage)
        .with_chunk_size(config.extract.chunk_size);

    let outcome = if cli.dry_run {
        engine.plan(&options).await.and_then(|plans| {
            println!("{}", serde_json::to_string_pretty(&plans)?);
            Ok(())
        })
    } else {
        engine.extract(&options).await.map(|report| {
            for table in &report.tables {
                tracing::info!(
                    table = %table.table_query,
                    kind = %table.kind,
                    rows = table.rows,
                    objects = table.objects.len(),
                    "Loaded"
                );
            }
        })
    };

    // The pool is released whether or not the run succeeded
    executor.close().await;

    if let Err(e) = &outcome {
        tracing::error!("Run failed: {:#}", e);
    } else {
        tracing::info!("Finished in {}ms", now.elapsed().as_millis());
    }

    outcome
}
