//! Order table loading using Polars
//!
//! Every column is read as text and parsed here, so a bad cell fails the whole
//! load with its line number instead of silently turning into a null. Parsed
//! rows are then packed into a typed [`OrderFrame`] for the group-by stages.

use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use rust_decimal::Decimal;
use tracing::debug;

use crate::error::RfmError;

pub const ORDER_ID: &str = "order_id";
pub const CUSTOMER_ID: &str = "customer_id";
pub const PRICE: &str = "price";
pub const PURCHASE_TIMESTAMP: &str = "order_purchase_timestamp";

/// Columns the loader refuses to run without; any others are ignored.
pub const REQUIRED_COLUMNS: [&str; 4] = [ORDER_ID, CUSTOMER_ID, PRICE, PURCHASE_TIMESTAMP];

/// Purchase date as days from the common era
pub const ORDER_DAY: &str = "order_day";
/// Purchase month as `year * 12 + month - 1`
pub const ORDER_MONTH: &str = "order_month";
/// Price in minor units at the frame's price scale
pub const PRICE_MINOR: &str = "price_minor";

const DATETIME_FORMATS: [&str; 3] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// One order line as it appears in the input table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRecord {
    pub order_id: String,
    pub customer_id: String,
    pub price: Decimal,
    pub purchased_at: NaiveDateTime,
}

impl OrderRecord {
    pub fn purchase_date(&self) -> NaiveDate {
        self.purchased_at.date()
    }
}

/// Load order records from a CSV file
///
/// # Arguments
/// * `file_path` - Path to a CSV file with a header row containing at least
///   `order_id`, `customer_id`, `price` and `order_purchase_timestamp`
///
/// # Returns
/// * Every row as an `OrderRecord`, in file order
pub fn load_orders(file_path: impl AsRef<Path>) -> Result<Vec<OrderRecord>, RfmError> {
    let path = file_path.as_ref();
    let file = std::fs::File::open(path).map_err(|source| RfmError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .into_reader_with_file_handle(file)
        .finish()
        .map_err(|err| match err {
            PolarsError::NoData(_) => {
                RfmError::malformed(format!("{} has no header row", path.display()))
            }
            other => other.into(),
        })?;

    debug!(rows = df.height(), path = %path.display(), "read order table");
    orders_from_frame(&df)
}

/// Convert an already loaded frame into order records
pub fn orders_from_frame(df: &DataFrame) -> Result<Vec<OrderRecord>, RfmError> {
    let order_ids = text_column(df, ORDER_ID)?;
    let customer_ids = text_column(df, CUSTOMER_ID)?;
    let prices = text_column(df, PRICE)?;
    let timestamps = text_column(df, PURCHASE_TIMESTAMP)?;

    let mut orders = Vec::with_capacity(df.height());
    let rows = order_ids
        .into_iter()
        .zip(customer_ids.into_iter())
        .zip(prices.into_iter())
        .zip(timestamps.into_iter());

    for (index, (((order_id, customer_id), price), timestamp)) in rows.enumerate() {
        // header is line 1
        let line = index + 2;
        let order_id = required_cell(order_id, ORDER_ID, line)?;
        let customer_id = required_cell(customer_id, CUSTOMER_ID, line)?;
        let price = parse_price(required_cell(price, PRICE, line)?, line)?;
        let purchased_at =
            parse_timestamp(required_cell(timestamp, PURCHASE_TIMESTAMP, line)?, line)?;

        orders.push(OrderRecord {
            order_id: order_id.to_string(),
            customer_id: customer_id.to_string(),
            price,
            purchased_at,
        });
    }

    Ok(orders)
}

fn text_column(df: &DataFrame, name: &str) -> Result<StringChunked, RfmError> {
    let column = df
        .column(name)
        .map_err(|_| RfmError::malformed(format!("missing required column `{name}`")))?;
    Ok(column.cast(&DataType::String)?.str()?.clone())
}

fn required_cell<'a>(value: Option<&'a str>, column: &str, line: usize) -> Result<&'a str, RfmError> {
    match value.map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(RfmError::malformed(format!(
            "line {line}: missing value for `{column}`"
        ))),
    }
}

fn parse_price(value: &str, line: usize) -> Result<Decimal, RfmError> {
    let price = Decimal::from_str(value)
        .or_else(|_| Decimal::from_scientific(value))
        .map_err(|_| RfmError::malformed(format!("line {line}: price `{value}` is not numeric")))?;
    if price.is_sign_negative() && !price.is_zero() {
        return Err(RfmError::malformed(format!(
            "line {line}: price `{value}` is negative"
        )));
    }
    Ok(price)
}

/// Parse a purchase timestamp, accepting the common CSV export layouts
///
/// RFC 3339 values keep their local wall-clock time and the offset is dropped,
/// so the calendar date never moves. A bare date is taken as midnight.
pub fn parse_timestamp(value: &str, line: usize) -> Result<NaiveDateTime, RfmError> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.naive_local());
    }
    for format in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(parsed);
        }
    }
    if let Some(midnight) = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
    {
        return Ok(midnight);
    }
    Err(RfmError::malformed(format!(
        "line {line}: cannot parse timestamp `{value}`"
    )))
}

/// Orders packed into a typed frame for the customer and monthly group-bys
///
/// Prices are stored as `i64` minor units at one scale shared by the whole
/// table, so sums stay exact and tie comparisons on spend are not affected by
/// float rounding.
#[derive(Debug, Clone)]
pub struct OrderFrame {
    df: DataFrame,
    price_scale: u32,
}

impl OrderFrame {
    /// Pack parsed order records into a frame
    ///
    /// # Errors
    /// * `RfmError::MalformedInput` when a price, or the total of all prices,
    ///   does not fit the minor-unit range
    pub fn from_records(orders: &[OrderRecord]) -> Result<Self, RfmError> {
        let price_scale = orders
            .iter()
            .map(|o| o.price.normalize().scale())
            .max()
            .unwrap_or(0);

        let mut order_ids = Vec::with_capacity(orders.len());
        let mut customer_ids = Vec::with_capacity(orders.len());
        let mut days = Vec::with_capacity(orders.len());
        let mut months = Vec::with_capacity(orders.len());
        let mut prices = Vec::with_capacity(orders.len());
        let mut total = 0i64;

        for order in orders {
            let minor = to_minor_units(order.price, price_scale).ok_or_else(|| {
                RfmError::malformed(format!(
                    "order `{}`: price {} is out of range",
                    order.order_id, order.price
                ))
            })?;
            total = total.checked_add(minor).ok_or_else(|| {
                RfmError::malformed("sum of order prices is out of range")
            })?;

            let date = order.purchase_date();
            order_ids.push(order.order_id.as_str());
            customer_ids.push(order.customer_id.as_str());
            days.push(date.num_days_from_ce());
            months.push(month_index(date));
            prices.push(minor);
        }

        let df = df!(
            ORDER_ID => order_ids,
            CUSTOMER_ID => customer_ids,
            ORDER_DAY => days,
            ORDER_MONTH => months,
            PRICE_MINOR => prices
        )?;
        debug!(rows = df.height(), price_scale, "packed order frame");
        Ok(Self { df, price_scale })
    }

    pub fn frame(&self) -> &DataFrame {
        &self.df
    }

    pub fn len(&self) -> usize {
        self.df.height()
    }

    pub fn is_empty(&self) -> bool {
        self.df.height() == 0
    }

    pub fn price_scale(&self) -> u32 {
        self.price_scale
    }

    /// Convert a minor-unit amount from this frame back to currency
    pub fn amount(&self, minor: i64) -> Decimal {
        Decimal::new(minor, self.price_scale)
    }
}

fn to_minor_units(price: Decimal, scale: u32) -> Option<i64> {
    let mut scaled = price;
    scaled.rescale(scale);
    if scaled.scale() != scale {
        return None;
    }
    i64::try_from(scaled.mantissa()).ok()
}

pub(crate) fn month_index(date: NaiveDate) -> i32 {
    date.year() * 12 + date.month0() as i32
}

pub(crate) fn i64_values(df: &DataFrame, name: &str) -> Result<Vec<i64>, RfmError> {
    let column = df.column(name)?.cast(&DataType::Int64)?;
    Ok(column.i64()?.into_no_null_iter().collect())
}

pub(crate) fn string_values(df: &DataFrame, name: &str) -> Result<Vec<String>, RfmError> {
    Ok(df
        .column(name)?
        .str()?
        .into_no_null_iter()
        .map(str::to_string)
        .collect())
}
