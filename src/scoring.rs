//! R/F/M scores and customer segments
//!
//! Recency and frequency scores use fixed thresholds from [`RfmConfig`]. The
//! monetary score is data-relative: the population's monetary values are cut at
//! two quantiles, and the value segment is read off the same cut so the two can
//! never disagree.

use std::fmt;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::{
    FrequencyThresholds, MonetaryQuantiles, QuantilePolicy, RecencyThresholds, RfmConfig,
};
use crate::customer::CustomerRfm;
use crate::error::RfmError;

/// Spend tier from the monetary quantile cut
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ValueSegment {
    #[serde(rename = "Low Value")]
    Low,
    #[serde(rename = "High Value")]
    High,
    #[serde(rename = "Special Value")]
    Special,
}

impl ValueSegment {
    pub const ALL: [ValueSegment; 3] = [Self::Low, Self::High, Self::Special];

    /// Numeric M score of the tier: 1, 2 or 3
    pub fn score(self) -> u8 {
        match self {
            Self::Low => 1,
            Self::High => 2,
            Self::Special => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Low => "Low Value",
            Self::High => "High Value",
            Self::Special => "Special Value",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Activity tier from days since the last order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum RecencySegment {
    Active,
    Warm,
    Cold,
    Inactive,
}

impl RecencySegment {
    pub const ALL: [RecencySegment; 4] = [Self::Active, Self::Warm, Self::Cold, Self::Inactive];

    pub fn label(self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Warm => "Warm",
            Self::Cold => "Cold",
            Self::Inactive => "Inactive",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ValueSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl fmt::Display for RecencySegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Cut points of the monetary distribution
///
/// Bins are right-closed: `monetary <= low` scores 1, `monetary <= high`
/// scores 2, anything above scores 3. A value sitting exactly on a cut point
/// goes to the lower bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonetaryCut {
    pub min: Decimal,
    pub low: Decimal,
    pub high: Decimal,
    pub max: Decimal,
    pub distinct_values: usize,
}

impl MonetaryCut {
    /// Compute the cut over a population of monetary values
    pub fn from_values(values: &[Decimal], quantiles: &MonetaryQuantiles) -> Result<Self, RfmError> {
        let mut sorted = values.to_vec();
        sorted.sort_unstable();

        let (Some(&min), Some(&max)) = (sorted.first(), sorted.last()) else {
            return Err(RfmError::EmptyDataset);
        };

        let mut distinct = sorted.clone();
        distinct.dedup();

        Ok(Self {
            min,
            low: quantile(&sorted, quantiles.low_quantile),
            high: quantile(&sorted, quantiles.high_quantile),
            max,
            distinct_values: distinct.len(),
        })
    }

    /// True when the cut cannot yield three populated bins
    pub fn is_degenerate(&self) -> bool {
        self.distinct_values < 3
            || self.min == self.low
            || self.low == self.high
            || self.high == self.max
    }

    pub fn segment(&self, monetary: Decimal) -> ValueSegment {
        if monetary <= self.low {
            ValueSegment::Low
        } else if monetary <= self.high {
            ValueSegment::High
        } else {
            ValueSegment::Special
        }
    }

    pub fn score(&self, monetary: Decimal) -> u8 {
        self.segment(monetary).score()
    }
}

/// Quantile of sorted values with linear interpolation between neighbours
pub fn quantile(sorted: &[Decimal], q: Decimal) -> Decimal {
    match sorted.len() {
        0 => Decimal::ZERO,
        1 => sorted[0],
        n => {
            let position = q * Decimal::from(n - 1);
            let lower = position.floor();
            let index = lower.to_usize().unwrap_or(0).min(n - 1);
            let fraction = position - lower;
            match sorted.get(index + 1) {
                Some(&next) if !fraction.is_zero() => {
                    sorted[index] + (next - sorted[index]) * fraction
                }
                _ => sorted[index],
            }
        }
    }
}

pub fn recency_score(recency: i64, thresholds: &RecencyThresholds) -> u8 {
    if recency <= thresholds.active_days {
        3
    } else if recency <= thresholds.warm_days {
        2
    } else {
        1
    }
}

pub fn frequency_score(frequency: u32, thresholds: &FrequencyThresholds) -> u8 {
    if frequency >= thresholds.high_orders {
        3
    } else if frequency >= thresholds.mid_orders {
        2
    } else {
        1
    }
}

pub fn recency_segment(recency: i64, thresholds: &RecencyThresholds) -> RecencySegment {
    if recency <= thresholds.active_days {
        RecencySegment::Active
    } else if recency <= thresholds.warm_days {
        RecencySegment::Warm
    } else if recency <= thresholds.cold_days {
        RecencySegment::Cold
    } else {
        RecencySegment::Inactive
    }
}

/// Customer RFM values with their scores and segments
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoredCustomer {
    #[serde(flatten)]
    pub rfm: CustomerRfm,
    pub r_score: u8,
    pub f_score: u8,
    pub m_score: u8,
    pub value_segment: ValueSegment,
    pub recency_segment: RecencySegment,
}

/// Scored customers together with the monetary cut that produced their M scores
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScoredTable {
    pub customers: Vec<ScoredCustomer>,
    /// Absent when there are no customers
    pub monetary_cut: Option<MonetaryCut>,
}

/// Score every customer against the configured thresholds
///
/// # Errors
/// * `RfmError::DegenerateQuantile` when the cut is degenerate and the policy
///   is `QuantilePolicy::Strict`
pub fn score_customers(customers: Vec<CustomerRfm>, config: &RfmConfig) -> Result<ScoredTable, RfmError> {
    if customers.is_empty() {
        warn!("no customers to score");
        return Ok(ScoredTable::default());
    }

    let monetary: Vec<Decimal> = customers.iter().map(|c| c.monetary).collect();
    let cut = MonetaryCut::from_values(&monetary, &config.monetary)?;

    if cut.is_degenerate() {
        match config.monetary.policy {
            QuantilePolicy::Strict => {
                return Err(RfmError::DegenerateQuantile {
                    distinct: cut.distinct_values,
                    low: cut.low,
                    high: cut.high,
                });
            }
            QuantilePolicy::Collapse => warn!(
                distinct = cut.distinct_values,
                low = %cut.low,
                high = %cut.high,
                "monetary quantile cut is degenerate, some value segments will be empty"
            ),
        }
    }
    debug!(low = %cut.low, high = %cut.high, customers = customers.len(), "monetary cut");

    let scored = customers
        .into_iter()
        .map(|rfm| {
            let value_segment = cut.segment(rfm.monetary);
            ScoredCustomer {
                r_score: recency_score(rfm.recency, &config.recency),
                f_score: frequency_score(rfm.frequency, &config.frequency),
                m_score: value_segment.score(),
                value_segment,
                recency_segment: recency_segment(rfm.recency, &config.recency),
                rfm,
            }
        })
        .collect();

    Ok(ScoredTable {
        customers: scored,
        monetary_cut: Some(cut),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn customer(id: &str, frequency: u32, monetary: Decimal, recency: i64) -> CustomerRfm {
        CustomerRfm {
            customer_id: id.to_string(),
            frequency,
            monetary,
            recency,
        }
    }

    #[test]
    fn test_quantile_linear_interpolation() {
        let sorted = [dec!(100), dec!(500), dec!(900)];
        assert_eq!(quantile(&sorted, dec!(0.4)), dec!(420));
        assert_eq!(quantile(&sorted, dec!(0.8)), dec!(740));
        assert_eq!(quantile(&sorted, dec!(0)), dec!(100));
        assert_eq!(quantile(&sorted, dec!(1)), dec!(900));
        assert_eq!(quantile(&[dec!(7)], dec!(0.4)), dec!(7));
        assert_eq!(quantile(&[], dec!(0.4)), Decimal::ZERO);
    }

    #[test]
    fn test_quantile_on_many_values() {
        let sorted: Vec<Decimal> = (1..=11).map(Decimal::from).collect();
        // position 0.4 * 10 = 4 lands exactly on the fifth value
        assert_eq!(quantile(&sorted, dec!(0.4)), dec!(5));
        assert_eq!(quantile(&sorted, dec!(0.8)), dec!(9));
        assert_eq!(quantile(&sorted, dec!(0.45)), dec!(5.5));
    }

    #[test]
    fn test_recency_and_frequency_scores() {
        let r = RecencyThresholds::default();
        assert_eq!(recency_score(0, &r), 3);
        assert_eq!(recency_score(30, &r), 3);
        assert_eq!(recency_score(31, &r), 2);
        assert_eq!(recency_score(90, &r), 2);
        assert_eq!(recency_score(91, &r), 1);

        let f = FrequencyThresholds::default();
        assert_eq!(frequency_score(1, &f), 1);
        assert_eq!(frequency_score(6, &f), 1);
        assert_eq!(frequency_score(7, &f), 2);
        assert_eq!(frequency_score(14, &f), 2);
        assert_eq!(frequency_score(15, &f), 3);
    }

    #[test]
    fn test_recency_segments() {
        let r = RecencyThresholds::default();
        assert_eq!(recency_segment(30, &r), RecencySegment::Active);
        assert_eq!(recency_segment(90, &r), RecencySegment::Warm);
        assert_eq!(recency_segment(180, &r), RecencySegment::Cold);
        assert_eq!(recency_segment(181, &r), RecencySegment::Inactive);
    }

    #[test]
    fn test_three_customer_scenario() {
        let customers = vec![
            customer("c1", 20, dec!(100), 10),
            customer("c2", 5, dec!(500), 100),
            customer("c3", 1, dec!(900), 200),
        ];

        let table = score_customers(customers, &RfmConfig::default()).unwrap();
        let c1 = &table.customers[0];
        assert_eq!((c1.r_score, c1.f_score, c1.m_score), (3, 3, 1));
        assert_eq!(c1.value_segment, ValueSegment::Low);
        assert_eq!(c1.recency_segment, RecencySegment::Active);

        let c2 = &table.customers[1];
        assert_eq!((c2.r_score, c2.f_score, c2.m_score), (1, 1, 2));
        assert_eq!(c2.recency_segment, RecencySegment::Cold);

        let c3 = &table.customers[2];
        assert_eq!((c3.r_score, c3.f_score, c3.m_score), (1, 1, 3));
        assert_eq!(c3.value_segment, ValueSegment::Special);
        assert_eq!(c3.recency_segment, RecencySegment::Inactive);

        assert!(!table.monetary_cut.unwrap().is_degenerate());
    }

    #[test]
    fn test_value_on_cut_point_goes_to_lower_bin() {
        // eleven values 1..=11: cut points land exactly on 5 and 9
        let customers: Vec<CustomerRfm> = (1..=11)
            .map(|i| customer(&format!("c{i:02}"), 1, Decimal::from(i), 0))
            .collect();

        let table = score_customers(customers, &RfmConfig::default()).unwrap();
        let by_value = |v: i64| {
            table
                .customers
                .iter()
                .find(|c| c.rfm.monetary == Decimal::from(v))
                .unwrap()
        };

        assert_eq!(by_value(5).m_score, 1);
        assert_eq!(by_value(5).value_segment, ValueSegment::Low);
        assert_eq!(by_value(6).m_score, 2);
        assert_eq!(by_value(9).m_score, 2);
        assert_eq!(by_value(9).value_segment, ValueSegment::High);
        assert_eq!(by_value(10).m_score, 3);
    }

    #[test]
    fn test_single_customer_collapses_to_low_value() {
        let table =
            score_customers(vec![customer("solo", 1, dec!(80), 0)], &RfmConfig::default()).unwrap();
        let solo = &table.customers[0];
        assert_eq!(solo.m_score, 1);
        assert_eq!(solo.value_segment, ValueSegment::Low);
        assert!(table.monetary_cut.unwrap().is_degenerate());
    }

    #[test]
    fn test_strict_policy_rejects_degenerate_cut() {
        let mut config = RfmConfig::default();
        config.monetary.policy = QuantilePolicy::Strict;
        let customers = vec![
            customer("a", 1, dec!(10), 0),
            customer("b", 1, dec!(10), 5),
            customer("c", 1, dec!(20), 9),
        ];

        let err = score_customers(customers, &config).unwrap_err();
        assert!(matches!(err, RfmError::DegenerateQuantile { distinct: 2, .. }));
    }

    #[test]
    fn test_repeated_values_at_bottom_are_degenerate() {
        let values = [dec!(1), dec!(1), dec!(1), dec!(1), dec!(1), dec!(2), dec!(3)];
        let cut = MonetaryCut::from_values(&values, &MonetaryQuantiles::default()).unwrap();
        assert_eq!(cut.distinct_values, 3);
        assert_eq!(cut.low, dec!(1));
        assert!(cut.is_degenerate());
    }

    #[test]
    fn test_empty_population_has_no_cut() {
        let err = MonetaryCut::from_values(&[], &MonetaryQuantiles::default()).unwrap_err();
        assert!(matches!(err, RfmError::EmptyDataset));

        let table = score_customers(Vec::new(), &RfmConfig::default()).unwrap();
        assert!(table.customers.is_empty());
        assert!(table.monetary_cut.is_none());
    }

    #[test]
    fn test_segment_labels() {
        assert_eq!(ValueSegment::Special.to_string(), "Special Value");
        assert_eq!(RecencySegment::Warm.label(), "Warm");
    }

    #[test]
    fn test_value_segment_scores() {
        let scores: Vec<u8> = ValueSegment::ALL.iter().map(|s| s.score()).collect();
        assert_eq!(scores, [1, 2, 3]);

        let cut = MonetaryCut {
            min: Decimal::ZERO,
            low: Decimal::from(10),
            high: Decimal::from(20),
            max: Decimal::from(30),
            distinct_values: 4,
        };
        for value in [0, 10, 11, 20, 21, 30] {
            let value = Decimal::from(value);
            assert_eq!(cut.score(value), cut.segment(value).score());
        }
        assert_eq!(cut.segment(Decimal::from(10)), ValueSegment::Low);
        assert_eq!(cut.segment(Decimal::from(21)), ValueSegment::Special);
    }
}
