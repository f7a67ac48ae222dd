//! Scoring thresholds and reporting policy
//!
//! Every business threshold the scorer uses lives here as a named default, so a
//! report can be re-tuned from a TOML file or CLI flags without code changes.
//!
//! ```toml
//! incomplete_from = "2018-09"
//!
//! [recency]
//! active_days = 30
//! warm_days = 90
//! cold_days = 180
//!
//! [frequency]
//! mid_orders = 7
//! high_orders = 15
//!
//! [monetary]
//! low_quantile = 0.4
//! high_quantile = 0.8
//! policy = "collapse"
//! ```

use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::RfmError;
use crate::monthly::YearMonth;

pub const ACTIVE_DAYS: i64 = 30;
pub const WARM_DAYS: i64 = 90;
pub const COLD_DAYS: i64 = 180;
pub const MID_FREQUENCY_ORDERS: u32 = 7;
pub const HIGH_FREQUENCY_ORDERS: u32 = 15;

/// 40th percentile
pub const LOW_QUANTILE: Decimal = Decimal::from_parts(4, 0, 0, false, 1);
/// 80th percentile
pub const HIGH_QUANTILE: Decimal = Decimal::from_parts(8, 0, 0, false, 1);

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RfmConfig {
    pub recency: RecencyThresholds,
    pub frequency: FrequencyThresholds,
    pub monetary: MonetaryQuantiles,
    /// First calendar month that is not fully observed; it and later months
    /// are left out of the monthly summary.
    pub incomplete_from: Option<YearMonth>,
}

/// Day limits (inclusive) for the recency score and recency segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecencyThresholds {
    pub active_days: i64,
    pub warm_days: i64,
    pub cold_days: i64,
}

impl Default for RecencyThresholds {
    fn default() -> Self {
        Self {
            active_days: ACTIVE_DAYS,
            warm_days: WARM_DAYS,
            cold_days: COLD_DAYS,
        }
    }
}

/// Minimum order counts (inclusive) for frequency scores 2 and 3
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FrequencyThresholds {
    pub mid_orders: u32,
    pub high_orders: u32,
}

impl Default for FrequencyThresholds {
    fn default() -> Self {
        Self {
            mid_orders: MID_FREQUENCY_ORDERS,
            high_orders: HIGH_FREQUENCY_ORDERS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MonetaryQuantiles {
    pub low_quantile: Decimal,
    pub high_quantile: Decimal,
    pub policy: QuantilePolicy,
}

impl Default for MonetaryQuantiles {
    fn default() -> Self {
        Self {
            low_quantile: LOW_QUANTILE,
            high_quantile: HIGH_QUANTILE,
            policy: QuantilePolicy::default(),
        }
    }
}

/// What the scorer does when the monetary cut cannot yield three distinct bins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuantilePolicy {
    /// Keep the right-closed assignment and leave the collapsed bins empty.
    #[default]
    Collapse,
    /// Fail with `RfmError::DegenerateQuantile`.
    Strict,
}

impl RfmConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, RfmError> {
        let config: Self =
            toml::from_str(source).map_err(|e| RfmError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, RfmError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| RfmError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Check that thresholds are ordered the way the scorer assumes.
    pub fn validate(&self) -> Result<(), RfmError> {
        let r = &self.recency;
        if r.active_days < 0 || r.active_days >= r.warm_days || r.warm_days >= r.cold_days {
            return Err(RfmError::InvalidConfig(format!(
                "recency thresholds must satisfy 0 <= active < warm < cold, got {}/{}/{}",
                r.active_days, r.warm_days, r.cold_days
            )));
        }

        let f = &self.frequency;
        if f.mid_orders == 0 || f.mid_orders >= f.high_orders {
            return Err(RfmError::InvalidConfig(format!(
                "frequency thresholds must satisfy 0 < mid < high, got {}/{}",
                f.mid_orders, f.high_orders
            )));
        }

        let m = &self.monetary;
        if m.low_quantile <= Decimal::ZERO
            || m.low_quantile >= m.high_quantile
            || m.high_quantile >= Decimal::ONE
        {
            return Err(RfmError::InvalidConfig(format!(
                "monetary quantiles must satisfy 0 < low < high < 1, got {}/{}",
                m.low_quantile, m.high_quantile
            )));
        }

        Ok(())
    }
}
