//! End-to-end RFM pipeline over one in-memory order table

use tracing::{debug, info, warn};

use crate::config::RfmConfig;
use crate::customer::build_customer_table;
use crate::data::{OrderFrame, OrderRecord};
use crate::error::RfmError;
use crate::monthly::monthly_summary;
use crate::report::{
    average_transaction, revenue_by_recency_segment, revenue_by_value_segment, round_currency,
    CrossTab, ReportMetrics, RfmReport,
};
use crate::scoring::score_customers;

/// Runs the RFM stages with a fixed, validated configuration
#[derive(Debug, Clone)]
pub struct RfmPipeline {
    config: RfmConfig,
}

impl RfmPipeline {
    pub fn new(config: RfmConfig) -> Result<Self, RfmError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RfmConfig {
        &self.config
    }

    /// Build the full report from order rows
    ///
    /// An empty table yields empty tables and absent averages, shares and
    /// cross-tab rather than an error.
    pub fn run(&self, orders: &[OrderRecord]) -> Result<RfmReport, RfmError> {
        let frame = OrderFrame::from_records(orders)?;
        self.run_frame(&frame)
    }

    /// Build the full report from an already packed order frame
    pub fn run_frame(&self, orders: &OrderFrame) -> Result<RfmReport, RfmError> {
        if orders.is_empty() {
            warn!("order table is empty, report will have no customers");
        }

        let monthly = monthly_summary(orders, self.config.incomplete_from)?;
        let customers = build_customer_table(orders)?;
        let average = average_transaction(&customers).ok();
        let total_revenue = round_currency(customers.iter().map(|c| c.monetary).sum());
        let customer_count = customers.len();
        debug!(customers = customer_count, months = monthly.len(), "aggregated orders");

        let scored = score_customers(customers, &self.config)?;
        let value_revenue = revenue_by_value_segment(&scored.customers);
        let recency_revenue = revenue_by_recency_segment(&scored.customers);
        let cross_tab = CrossTab::from_customers(&scored.customers);

        info!(
            orders = orders.len(),
            customers = customer_count,
            "RFM report ready"
        );

        Ok(RfmReport {
            metrics: ReportMetrics {
                total_orders: orders.len() as u64,
                total_revenue,
                average_transaction: average,
                customer_count,
            },
            monthly,
            customers: scored.customers,
            monetary_cut: scored.monetary_cut,
            value_revenue,
            recency_revenue,
            cross_tab,
        })
    }
}
