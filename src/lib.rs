//! RFM Report: customer segmentation from e-commerce order history
//!
//! This library turns raw order rows into per-customer Recency, Frequency and
//! Monetary values, scores and segments them, and aggregates the segments into
//! revenue shares and a value × recency cross-tab ready for charting.

pub mod cli;
pub mod config;
pub mod customer;
pub mod data;
pub mod error;
pub mod monthly;
pub mod pipeline;
pub mod report;
pub mod scoring;
pub mod viz;

// Re-export public items for easier access
pub use cli::Args;
pub use config::{QuantilePolicy, RfmConfig};
pub use data::{load_orders, OrderFrame, OrderRecord};
pub use error::RfmError;
pub use monthly::{monthly_summary, MonthlySummary, YearMonth};
pub use pipeline::RfmPipeline;
pub use report::{write_summary, CrossTab, RankBy, RfmReport};
pub use scoring::{RecencySegment, ScoredCustomer, ValueSegment};
pub use viz::generate_visualization_report;

/// Result type used by the binary and the chart layer
pub type Result<T> = anyhow::Result<T>;
