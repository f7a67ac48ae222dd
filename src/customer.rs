//! Per-customer aggregation and recency using Polars

use chrono::NaiveDate;
use polars::prelude::*;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use crate::data::{
    i64_values, string_values, OrderFrame, CUSTOMER_ID, ORDER_DAY, ORDER_ID, PRICE_MINOR,
};
use crate::error::RfmError;

const LAST_ORDER_DAY: &str = "last_order_day";
const FREQUENCY: &str = "frequency";
const MONETARY_MINOR: &str = "monetary_minor";

/// Orders of one customer collapsed to a single row, before recency is known
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerActivity {
    pub customer_id: String,
    pub last_order_date: NaiveDate,
    pub frequency: u32,
    pub monetary: Decimal,
}

/// Recency, frequency and monetary values for one customer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerRfm {
    pub customer_id: String,
    pub frequency: u32,
    pub monetary: Decimal,
    /// Days between the customer's last order and the latest order in the dataset
    pub recency: i64,
}

/// Collapse order rows to one activity row per customer, ordered by customer id
pub fn aggregate_customers(orders: &OrderFrame) -> Result<Vec<CustomerActivity>, RfmError> {
    if orders.is_empty() {
        return Ok(Vec::new());
    }

    let grouped = orders
        .frame()
        .clone()
        .lazy()
        .group_by([col(CUSTOMER_ID)])
        .agg([
            // time of day is already gone from the day column
            col(ORDER_DAY).max().alias(LAST_ORDER_DAY),
            col(ORDER_ID).count().alias(FREQUENCY),
            col(PRICE_MINOR).sum().alias(MONETARY_MINOR),
        ])
        .sort([CUSTOMER_ID], SortMultipleOptions::default())
        .collect()?;

    let customer_ids = string_values(&grouped, CUSTOMER_ID)?;
    let last_days = i64_values(&grouped, LAST_ORDER_DAY)?;
    let frequencies = i64_values(&grouped, FREQUENCY)?;
    let monetary = i64_values(&grouped, MONETARY_MINOR)?;

    customer_ids
        .into_iter()
        .zip(last_days)
        .zip(frequencies)
        .zip(monetary)
        .map(|(((customer_id, day), frequency), monetary)| -> Result<CustomerActivity, RfmError> {
            let last_order_date = i32::try_from(day)
                .ok()
                .and_then(NaiveDate::from_num_days_from_ce_opt)
                .ok_or_else(|| {
                    RfmError::malformed(format!("customer `{customer_id}`: order date out of range"))
                })?;
            let frequency = u32::try_from(frequency).map_err(|_| {
                RfmError::malformed(format!("customer `{customer_id}`: too many orders"))
            })?;
            Ok(CustomerActivity {
                customer_id,
                last_order_date,
                frequency,
                monetary: orders.amount(monetary),
            })
        })
        .collect()
}

/// The latest last-order date across all customers
pub fn reference_date(activity: &[CustomerActivity]) -> Option<NaiveDate> {
    activity.iter().map(|a| a.last_order_date).max()
}

/// Turn last-order dates into whole days before the dataset's reference date
pub fn compute_recency(activity: Vec<CustomerActivity>) -> Vec<CustomerRfm> {
    let Some(reference) = reference_date(&activity) else {
        return Vec::new();
    };
    debug!(%reference, customers = activity.len(), "computing recency");

    activity
        .into_iter()
        .map(|a| CustomerRfm {
            recency: (reference - a.last_order_date).num_days(),
            customer_id: a.customer_id,
            frequency: a.frequency,
            monetary: a.monetary,
        })
        .collect()
}

/// Build the customer RFM table straight from the order frame
pub fn build_customer_table(orders: &OrderFrame) -> Result<Vec<CustomerRfm>, RfmError> {
    Ok(compute_recency(aggregate_customers(orders)?))
}
