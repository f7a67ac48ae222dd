//! RFM Report: customer segmentation report for e-commerce orders
//!
//! This is the main entrypoint that orchestrates data loading, the RFM
//! pipeline, the text summary, JSON export and chart rendering.

use std::io;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use rfm_report::{generate_visualization_report, load_orders, write_summary, Args, RfmPipeline};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing from `RFM_LOG`, falling back to `info` (or `debug` when verbose).
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env("RFM_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let start_time = Instant::now();
    let config = args.load_config().context("loading configuration")?;
    debug!(?config, "configuration");

    // Step 1: load orders
    let data_start = Instant::now();
    let orders = load_orders(&args.input)
        .with_context(|| format!("loading orders from {}", args.input.display()))?;
    info!(
        rows = orders.len(),
        elapsed_ms = data_start.elapsed().as_millis() as u64,
        "orders loaded"
    );

    // Step 2: run the pipeline
    let pipeline = RfmPipeline::new(config)?;
    let report = pipeline.run(&orders).context("computing RFM report")?;

    // Step 3: summary and exports
    write_summary(&report, args.top, &mut io::stdout().lock())?;

    if let Some(path) = &args.json {
        std::fs::write(path, report.to_json()?)
            .with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "JSON report written");
    }

    // Step 4: charts
    if !args.no_charts {
        let written = generate_visualization_report(&report, &args.output_dir, args.top)
            .context("rendering charts")?;
        info!(charts = written.len(), dir = %args.output_dir.display(), "charts rendered");
    }

    info!(
        elapsed_ms = start_time.elapsed().as_millis() as u64,
        "pipeline complete"
    );
    Ok(())
}
