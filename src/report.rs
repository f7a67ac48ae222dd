//! Segment revenue shares, the value × recency cross-tab and headline metrics

use std::cmp::Reverse;
use std::io::{self, Write};

use ndarray::Array2;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Serialize, Serializer};

use crate::customer::CustomerRfm;
use crate::error::RfmError;
use crate::monthly::MonthlySummary;
use crate::scoring::{MonetaryCut, RecencySegment, ScoredCustomer, ValueSegment};

/// Round a currency amount to cents, ties to even
pub fn round_currency(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
}

/// Total spend divided by the number of customers, rounded to cents
///
/// # Errors
/// * `RfmError::EmptyDataset` when there are no customers
pub fn average_transaction(customers: &[CustomerRfm]) -> Result<Decimal, RfmError> {
    if customers.is_empty() {
        return Err(RfmError::EmptyDataset);
    }
    let total: Decimal = customers.iter().map(|c| c.monetary).sum();
    Ok(round_currency(total / Decimal::from(customers.len())))
}

/// Revenue of one segment and its share of the axis total
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentShare<S> {
    pub segment: S,
    pub revenue: Decimal,
    pub percent: f64,
}

/// Revenue per segment as a share of the axis total
///
/// Every category is listed in `categories` order, empty ones with 0%.
/// Returns `None` when the axis total is zero, since no share is defined.
pub fn revenue_shares<S: Copy + PartialEq>(
    customers: &[ScoredCustomer],
    categories: &[S],
    segment_of: impl Fn(&ScoredCustomer) -> S,
) -> Option<Vec<SegmentShare<S>>> {
    let total: Decimal = customers.iter().map(|c| c.rfm.monetary).sum();
    if total.is_zero() {
        return None;
    }

    let shares = categories
        .iter()
        .map(|&segment| {
            let revenue: Decimal = customers
                .iter()
                .filter(|c| segment_of(c) == segment)
                .map(|c| c.rfm.monetary)
                .sum();
            SegmentShare {
                segment,
                revenue,
                percent: (revenue / total * Decimal::ONE_HUNDRED)
                    .to_f64()
                    .unwrap_or_default(),
            }
        })
        .collect();
    Some(shares)
}

pub fn revenue_by_value_segment(
    customers: &[ScoredCustomer],
) -> Option<Vec<SegmentShare<ValueSegment>>> {
    revenue_shares(customers, &ValueSegment::ALL, |c| c.value_segment)
}

pub fn revenue_by_recency_segment(
    customers: &[ScoredCustomer],
) -> Option<Vec<SegmentShare<RecencySegment>>> {
    revenue_shares(customers, &RecencySegment::ALL, |c| c.recency_segment)
}

/// Customer counts over value segment (rows) × recency segment (columns)
///
/// Rows follow `ValueSegment::ALL`, columns follow `RecencySegment::ALL`.
/// Every cell is present, empty pairs hold zero.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossTab {
    counts: Array2<u64>,
    percent: Array2<f64>,
}

impl CrossTab {
    /// Returns `None` when there are no customers to normalize over.
    pub fn from_customers(customers: &[ScoredCustomer]) -> Option<Self> {
        if customers.is_empty() {
            return None;
        }

        let mut counts = Array2::<u64>::zeros((ValueSegment::ALL.len(), RecencySegment::ALL.len()));
        for customer in customers {
            counts[[customer.value_segment.index(), customer.recency_segment.index()]] += 1;
        }

        let total = customers.len() as f64;
        let percent = counts.mapv(|count| count as f64 / total * 100.0);
        Some(Self { counts, percent })
    }

    pub fn count(&self, value: ValueSegment, recency: RecencySegment) -> u64 {
        self.counts[[value.index(), recency.index()]]
    }

    pub fn percent(&self, value: ValueSegment, recency: RecencySegment) -> f64 {
        self.percent[[value.index(), recency.index()]]
    }

    pub fn counts(&self) -> &Array2<u64> {
        &self.counts
    }

    pub fn percentages(&self) -> &Array2<f64> {
        &self.percent
    }

    /// The most populated cell; ties go to the first in row-major order
    pub fn largest_cell(&self) -> (ValueSegment, RecencySegment, f64) {
        let mut best = (ValueSegment::Low, RecencySegment::Active, f64::NEG_INFINITY);
        for value in ValueSegment::ALL {
            for recency in RecencySegment::ALL {
                let pct = self.percent(value, recency);
                if pct > best.2 {
                    best = (value, recency, pct);
                }
            }
        }
        best
    }
}

#[derive(Serialize)]
struct CrossTabView {
    rows: [ValueSegment; 3],
    columns: [RecencySegment; 4],
    counts: Vec<Vec<u64>>,
    percent: Vec<Vec<f64>>,
}

impl Serialize for CrossTab {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        CrossTabView {
            rows: ValueSegment::ALL,
            columns: RecencySegment::ALL,
            counts: self.counts.outer_iter().map(|row| row.to_vec()).collect(),
            percent: self.percent.outer_iter().map(|row| row.to_vec()).collect(),
        }
        .serialize(serializer)
    }
}

/// Ranking used to pick best customers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankBy {
    /// Fewest days since the last order first
    Recency,
    /// Most orders first
    Frequency,
    /// Highest spend first
    Monetary,
}

/// Top `n` customers by one RFM axis, ties broken by customer id
pub fn top_customers(customers: &[ScoredCustomer], by: RankBy, n: usize) -> Vec<&ScoredCustomer> {
    let mut ranked: Vec<&ScoredCustomer> = customers.iter().collect();
    match by {
        RankBy::Recency => {
            ranked.sort_by(|a, b| (a.rfm.recency, &a.rfm.customer_id).cmp(&(b.rfm.recency, &b.rfm.customer_id)))
        }
        RankBy::Frequency => ranked.sort_by_key(|c| (Reverse(c.rfm.frequency), c.rfm.customer_id.clone())),
        RankBy::Monetary => ranked.sort_by_key(|c| (Reverse(c.rfm.monetary), c.rfm.customer_id.clone())),
    }
    ranked.truncate(n);
    ranked
}

/// Headline numbers shown above the charts
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportMetrics {
    /// Every input row, including rows of excluded months
    pub total_orders: u64,
    pub total_revenue: Decimal,
    /// Absent for an empty dataset
    pub average_transaction: Option<Decimal>,
    pub customer_count: usize,
}

/// Everything one report generation produces
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RfmReport {
    pub metrics: ReportMetrics,
    pub monthly: Vec<MonthlySummary>,
    pub customers: Vec<ScoredCustomer>,
    pub monetary_cut: Option<MonetaryCut>,
    pub value_revenue: Option<Vec<SegmentShare<ValueSegment>>>,
    pub recency_revenue: Option<Vec<SegmentShare<RecencySegment>>>,
    pub cross_tab: Option<CrossTab>,
}

impl RfmReport {
    pub fn top_customers(&self, by: RankBy, n: usize) -> Vec<&ScoredCustomer> {
        top_customers(&self.customers, by, n)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Write a plain-text summary of the report
pub fn write_summary<W: Write>(report: &RfmReport, top_n: usize, out: &mut W) -> io::Result<()> {
    let metrics = &report.metrics;
    writeln!(out, "=== RFM Analysis ===")?;
    writeln!(out, "Total orders: {}", metrics.total_orders)?;
    writeln!(out, "Customers: {}", metrics.customer_count)?;
    writeln!(out, "Revenue based on monetary: {}", metrics.total_revenue)?;
    match metrics.average_transaction {
        Some(avg) => writeln!(out, "Avg transaction per customer: {avg}")?,
        None => writeln!(out, "Avg transaction per customer: n/a (no customers)")?,
    }

    if let Some(cut) = &report.monetary_cut {
        writeln!(
            out,
            "\nMonetary cut points: {} / {}{}",
            cut.low,
            cut.high,
            if cut.is_degenerate() { " (degenerate)" } else { "" }
        )?;
    }

    if let Some(shares) = &report.value_revenue {
        writeln!(out, "\n--- Revenue by value segment ---")?;
        for share in shares {
            writeln!(out, "  {:<14} {:>7.2}%", share.segment.label(), share.percent)?;
        }
    }
    if let Some(shares) = &report.recency_revenue {
        writeln!(out, "\n--- Revenue by recency segment ---")?;
        for share in shares {
            writeln!(out, "  {:<14} {:>7.2}%", share.segment.label(), share.percent)?;
        }
    }

    if let Some(tab) = &report.cross_tab {
        writeln!(out, "\n--- Customers by value × recency (%) ---")?;
        write!(out, "  {:<14}", "")?;
        for recency in RecencySegment::ALL {
            write!(out, " {:>9}", recency.label())?;
        }
        writeln!(out)?;
        for value in ValueSegment::ALL {
            write!(out, "  {:<14}", value.label())?;
            for recency in RecencySegment::ALL {
                write!(out, " {:>9.2}", tab.percent(value, recency))?;
            }
            writeln!(out)?;
        }
        let (value, recency, pct) = tab.largest_cell();
        writeln!(out, "  Largest group: {value} / {recency} ({pct:.2}%)")?;
    }

    if top_n > 0 && !report.customers.is_empty() {
        writeln!(out, "\n--- Best customers ---")?;
        for (title, by) in [
            ("By recency (days)", RankBy::Recency),
            ("By frequency", RankBy::Frequency),
            ("By monetary", RankBy::Monetary),
        ] {
            writeln!(out, "  {title}:")?;
            for customer in report.top_customers(by, top_n) {
                let value = match by {
                    RankBy::Recency => customer.rfm.recency.to_string(),
                    RankBy::Frequency => customer.rfm.frequency.to_string(),
                    RankBy::Monetary => customer.rfm.monetary.to_string(),
                };
                writeln!(out, "    {:<34} {value}", customer.rfm.customer_id)?;
            }
        }
    }

    if let (Some(first), Some(last)) = (report.monthly.first(), report.monthly.last()) {
        writeln!(
            out,
            "\nMonthly series: {} months ({} to {})",
            report.monthly.len(),
            first.order_date,
            last.order_date
        )?;
    }

    Ok(())
}
