//! Command-line grid search runner
//!
//! Plans a grid over the requested area, runs the search against the Google
//! Places API, logs per-cell progress as it streams in, and prints the final
//! run summary as JSON on stdout.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use placegrid::{
    Coordinate, EngineConfig, GooglePlacesProvider, ProgressEvent, SearchArea, SearchFilters,
    SearchOrchestrator,
};

/// Grid search over a places provider
#[derive(Parser)]
#[command(name = "placegrid")]
#[command(about = "Splits a search area into a grid and runs rate-limited place searches")]
pub struct Args {
    /// Text query to search for (e.g. "clothing stores")
    pub query: String,

    /// Latitude of the search area center, decimal degrees
    #[arg(long)]
    pub lat: f64,

    /// Longitude of the search area center, decimal degrees
    #[arg(long)]
    pub lng: f64,

    /// Search radius in kilometers
    #[arg(long, default_value = "5.0")]
    pub radius_km: f64,

    /// Upper bound on grid cells for this run
    #[arg(long, default_value = "25")]
    pub max_cells: usize,

    /// Override the configured requests-per-second limit
    #[arg(long)]
    pub rps: Option<u32>,

    /// Result pages fetched per grid cell
    #[arg(long, default_value = "3")]
    pub max_pages: u32,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(args.log_level.clone())),
        )
        .init();

    let api_key = std::env::var("GOOGLE_PLACES_API_KEY")
        .context("GOOGLE_PLACES_API_KEY must be set (a .env file works too)")?;

    let mut config = EngineConfig::from_env();
    if let Some(rps) = args.rps {
        config.max_requests_per_second = rps;
    }

    let provider = GooglePlacesProvider::new(api_key, config.page_size)?;
    let orchestrator = SearchOrchestrator::new(Arc::new(provider), config)?;

    let area = SearchArea::new(
        Coordinate::new(args.lat, args.lng),
        args.radius_km * 1_000.0,
    );
    let filters = SearchFilters {
        max_pages: args.max_pages,
    };
    let handle = orchestrator.start(area, &args.query, filters, args.max_cells)?;
    tracing::info!(run_id = %handle.id(), "run started");

    let mut progress = handle.subscribe().await;
    while let Some(event) = progress.recv().await {
        match event {
            ProgressEvent::CellStarted { index } => {
                tracing::info!(cell = index, "cell started");
            }
            ProgressEvent::CellCompleted { index, new_records } => {
                tracing::info!(cell = index, new_records, "cell completed");
            }
            ProgressEvent::CellFailed { index, reason } => {
                tracing::warn!(cell = index, %reason, "cell failed");
            }
            ProgressEvent::RunCompleted {
                total_records,
                failed_cells,
            } => {
                tracing::info!(total_records, failed_cells, "run completed");
            }
        }
    }

    let run = handle.result().await;
    tracing::info!(
        run_id = %run.id,
        status = %run.status,
        records = run.records.len(),
        succeeded = run.succeeded_cells(),
        failed = run.failed_cells(),
        skipped = run.skipped_cells(),
        "final result"
    );
    println!("{}", serde_json::to_string_pretty(&run)?);
    Ok(())
}
