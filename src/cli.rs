//! Command-line interface definitions and argument parsing

use std::path::PathBuf;

use clap::Parser;

use crate::config::{QuantilePolicy, RfmConfig};
use crate::monthly::YearMonth;

/// RFM segmentation report for e-commerce order history
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the orders CSV file
    #[arg(short, long, default_value = "main.csv")]
    pub input: PathBuf,

    /// Directory the chart PNGs are written to
    #[arg(short, long, default_value = "rfm_report")]
    pub output_dir: PathBuf,

    /// TOML file with scoring thresholds
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// First month that is only partially observed (YYYY-MM); it and later
    /// months are left out of the monthly series
    #[arg(long, value_name = "YYYY-MM")]
    pub incomplete_from: Option<YearMonth>,

    /// Fail instead of collapsing bins when the monetary quantiles are degenerate
    #[arg(long)]
    pub strict_quantiles: bool,

    /// Number of best customers listed per RFM axis
    #[arg(long, default_value = "5")]
    pub top: usize,

    /// Also write the full report as JSON to this path
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Skip chart rendering
    #[arg(long)]
    pub no_charts: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Build the scoring configuration: file values first, then CLI overrides
    pub fn load_config(&self) -> crate::Result<RfmConfig> {
        let mut config = match &self.config {
            Some(path) => RfmConfig::from_toml_file(path)?,
            None => RfmConfig::default(),
        };

        if let Some(month) = self.incomplete_from {
            config.incomplete_from = Some(month);
        }
        if self.strict_quantiles {
            config.monetary.policy = QuantilePolicy::Strict;
        }

        config.validate()?;
        Ok(config)
    }
}
