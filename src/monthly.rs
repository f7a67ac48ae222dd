//! Calendar-month order and revenue series

use std::fmt;
use std::str::FromStr;

use chrono::Datelike;
use polars::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;

use crate::data::{i64_values, OrderFrame, ORDER_ID, ORDER_MONTH, PRICE_MINOR};
use crate::error::RfmError;

const ORDER_COUNT: &str = "order_count";
const REVENUE_MINOR: &str = "revenue_minor";

/// A calendar month, displayed and parsed as `YYYY-MM`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn of(date: &impl Datelike) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Months since year 0, the key used in the order frame
    pub fn index(self) -> i32 {
        self.year * 12 + self.month as i32 - 1
    }

    pub fn from_index(index: i32) -> Self {
        Self {
            year: index.div_euclid(12),
            month: index.rem_euclid(12) as u32 + 1,
        }
    }

    pub fn succ(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = RfmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RfmError::InvalidConfig(format!("`{s}` is not a YYYY-MM month"));
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }
        let year = year.parse().map_err(|_| invalid())?;
        let month = month.parse().map_err(|_| invalid())?;
        Self::new(year, month).ok_or_else(invalid)
    }
}

impl Serialize for YearMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for YearMonth {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Orders and revenue for one calendar month
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlySummary {
    pub order_date: YearMonth,
    pub order_count: u64,
    pub revenue: Decimal,
}

/// Bucket orders by calendar month
///
/// # Arguments
/// * `orders` - The packed order frame, rows in any order
/// * `incomplete_from` - First month known to be only partially observed; rows
///   in that month or later are left out
///
/// # Returns
/// * One row per month from the first to the last observed month, in
///   chronological order. Months without orders inside that span are kept
///   with zero count and zero revenue.
pub fn monthly_summary(
    orders: &OrderFrame,
    incomplete_from: Option<YearMonth>,
) -> Result<Vec<MonthlySummary>, RfmError> {
    if orders.is_empty() {
        return Ok(Vec::new());
    }

    let mut kept = orders.frame().clone().lazy();
    if let Some(cutoff) = incomplete_from {
        kept = kept.filter(col(ORDER_MONTH).lt(lit(cutoff.index())));
    }

    let grouped = kept
        .group_by([col(ORDER_MONTH)])
        .agg([
            col(ORDER_ID).count().alias(ORDER_COUNT),
            col(PRICE_MINOR).sum().alias(REVENUE_MINOR),
        ])
        .sort([ORDER_MONTH], SortMultipleOptions::default())
        .collect()?;

    let months = i64_values(&grouped, ORDER_MONTH)?;
    let counts = i64_values(&grouped, ORDER_COUNT)?;
    let revenue = i64_values(&grouped, REVENUE_MINOR)?;

    let mut summary: Vec<MonthlySummary> = Vec::new();
    for ((month, count), revenue) in months.into_iter().zip(counts).zip(revenue) {
        let month = i32::try_from(month)
            .map(YearMonth::from_index)
            .map_err(|_| RfmError::malformed(format!("month key {month} out of range")))?;

        // zero-fill the gap since the previous observed month
        if let Some(previous) = summary.last().map(|row| row.order_date) {
            let mut gap = previous.succ();
            while gap < month {
                summary.push(MonthlySummary {
                    order_date: gap,
                    order_count: 0,
                    revenue: Decimal::ZERO,
                });
                gap = gap.succ();
            }
        }

        summary.push(MonthlySummary {
            order_date: month,
            order_count: u64::try_from(count).unwrap_or_default(),
            revenue: orders.amount(revenue),
        });
    }

    let counted: u64 = summary.iter().map(|row| row.order_count).sum();
    debug!(
        months = summary.len(),
        excluded_rows = orders.len() as u64 - counted,
        "built monthly summary"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::OrderRecord;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn order(id: &str, date: (i32, u32, u32), price: Decimal) -> OrderRecord {
        OrderRecord {
            order_id: id.to_string(),
            customer_id: format!("cust-{id}"),
            price,
            purchased_at: NaiveDate::from_ymd_opt(date.0, date.1, date.2)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn test_year_month_parse_and_display() {
        let month: YearMonth = "2018-09".parse().unwrap();
        assert_eq!(month, YearMonth::new(2018, 9).unwrap());
        assert_eq!(month.to_string(), "2018-09");
        assert_eq!(YearMonth::new(2017, 12).unwrap().succ().to_string(), "2018-01");

        assert!("2018-13".parse::<YearMonth>().is_err());
        assert!("2018/09".parse::<YearMonth>().is_err());
        assert!("18-09".parse::<YearMonth>().is_err());
    }

    fn summarize(orders: &[OrderRecord], cutoff: Option<YearMonth>) -> Vec<MonthlySummary> {
        monthly_summary(&OrderFrame::from_records(orders).unwrap(), cutoff).unwrap()
    }

    #[test]
    fn test_month_index_round_trips() {
        let month = YearMonth::new(2018, 1).unwrap();
        assert_eq!(month.index(), 2018 * 12);
        assert_eq!(YearMonth::from_index(month.index() - 1).to_string(), "2017-12");
        assert_eq!(
            YearMonth::from_index(crate::data::month_index(NaiveDate::from_ymd_opt(2016, 10, 4).unwrap())),
            YearMonth::new(2016, 10).unwrap()
        );
    }

    #[test]
    fn test_groups_by_month_in_order() {
        let orders = vec![
            order("b", (2018, 2, 14), dec!(20.00)),
            order("a", (2018, 1, 3), dec!(10.50)),
            order("c", (2018, 1, 31), dec!(4.50)),
        ];

        let summary = summarize(&orders, None);
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].order_date.to_string(), "2018-01");
        assert_eq!(summary[0].order_count, 2);
        assert_eq!(summary[0].revenue, dec!(15.00));
        assert_eq!(summary[1].order_date.to_string(), "2018-02");
        assert_eq!(summary[1].order_count, 1);
    }

    #[test]
    fn test_gap_months_are_zero_filled() {
        let orders = vec![
            order("a", (2017, 11, 1), dec!(1)),
            order("b", (2018, 2, 1), dec!(2)),
        ];

        let labels: Vec<String> = summarize(&orders, None)
            .iter()
            .map(|row| row.order_date.to_string())
            .collect();
        assert_eq!(labels, ["2017-11", "2017-12", "2018-01", "2018-02"]);
        let summary = summarize(&orders, None);
        assert_eq!(summary[1].order_count, 0);
        assert_eq!(summary[1].revenue, Decimal::ZERO);
    }

    #[test]
    fn test_incomplete_trailing_month_is_excluded() {
        let orders = vec![
            order("a", (2018, 8, 30), dec!(10)),
            order("b", (2018, 9, 3), dec!(99)),
        ];

        let cutoff = YearMonth::new(2018, 9);
        let summary = summarize(&orders, cutoff);
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].order_date.to_string(), "2018-08");
        assert_eq!(summary.iter().map(|r| r.order_count).sum::<u64>(), 1);
    }

    #[test]
    fn test_empty_input_gives_empty_summary() {
        assert!(summarize(&[], None).is_empty());
        assert!(summarize(&[], YearMonth::new(2018, 1)).is_empty());
    }
}
