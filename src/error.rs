//! Error kinds surfaced by the RFM pipeline and its loader

use std::path::PathBuf;

use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RfmError {
    /// The input table is missing a column, a value, or holds an unparseable cell.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// The monetary quantile cut produced fewer than three usable bins.
    #[error(
        "degenerate monetary quantiles: {distinct} distinct values, cut points {low} and {high}"
    )]
    DegenerateQuantile {
        distinct: usize,
        low: Decimal,
        high: Decimal,
    },

    /// A scalar metric was requested over zero customers.
    #[error("dataset is empty")]
    EmptyDataset,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("could not read `{path}`: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Csv(#[from] polars::prelude::PolarsError),
}

impl RfmError {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedInput(message.into())
    }
}
