//! Property-based tests for the RFM pipeline invariants

use std::collections::HashSet;

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use rfm_report::monthly::monthly_summary;
use rfm_report::{OrderFrame, OrderRecord, RfmConfig, RfmPipeline, ValueSegment, YearMonth};
use rust_decimal::Decimal;

fn arb_orders() -> impl Strategy<Value = Vec<OrderRecord>> {
    prop::collection::vec((0u8..12, 0u32..500_000, 0i64..720, 0u32..86_400), 1..80).prop_map(
        |rows| {
            let start = NaiveDate::from_ymd_opt(2016, 10, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap();
            rows.into_iter()
                .enumerate()
                .map(|(i, (customer, cents, day, second))| OrderRecord {
                    order_id: format!("order-{i}"),
                    customer_id: format!("customer-{customer:02}"),
                    price: Decimal::new(i64::from(cents), 2),
                    purchased_at: start + Duration::days(day) + Duration::seconds(i64::from(second)),
                })
                .collect()
        },
    )
}

fn pipeline() -> RfmPipeline {
    RfmPipeline::new(RfmConfig::default()).unwrap()
}

proptest! {
    #[test]
    fn test_monthly_counts_cover_every_kept_row(
        orders in arb_orders(),
        cutoff_offset in 0u32..30,
    ) {
        let cutoff = YearMonth::new(2016 + ((9 + cutoff_offset) / 12) as i32, (9 + cutoff_offset) % 12 + 1).unwrap();

        let frame = OrderFrame::from_records(&orders).unwrap();
        let all: u64 = monthly_summary(&frame, None).unwrap().iter().map(|m| m.order_count).sum();
        prop_assert_eq!(all, orders.len() as u64);

        let kept = orders
            .iter()
            .filter(|o| YearMonth::of(&o.purchased_at) < cutoff)
            .count() as u64;
        let counted: u64 = monthly_summary(&frame, Some(cutoff))
            .unwrap()
            .iter()
            .map(|m| m.order_count)
            .sum();
        prop_assert_eq!(counted, kept);
    }

    #[test]
    fn test_customers_unique_and_recency_non_negative(orders in arb_orders()) {
        let report = pipeline().run(&orders).unwrap();

        let distinct: HashSet<&str> = orders.iter().map(|o| o.customer_id.as_str()).collect();
        prop_assert_eq!(report.customers.len(), distinct.len());

        let latest = orders.iter().map(|o| o.purchased_at.date()).max().unwrap();
        for customer in &report.customers {
            prop_assert!(customer.rfm.recency >= 0);
            let last = orders
                .iter()
                .filter(|o| o.customer_id == customer.rfm.customer_id)
                .map(|o| o.purchased_at.date())
                .max()
                .unwrap();
            prop_assert_eq!(customer.rfm.recency == 0, last == latest);
        }
    }

    #[test]
    fn test_monetary_score_matches_value_segment(orders in arb_orders()) {
        let report = pipeline().run(&orders).unwrap();
        let cut = report.monetary_cut.unwrap();

        for customer in &report.customers {
            let expected = match customer.m_score {
                1 => ValueSegment::Low,
                2 => ValueSegment::High,
                _ => ValueSegment::Special,
            };
            prop_assert_eq!(customer.value_segment, expected);
            prop_assert_eq!(cut.segment(customer.rfm.monetary), customer.value_segment);
        }
    }

    #[test]
    fn test_percentages_sum_to_hundred(orders in arb_orders()) {
        let report = pipeline().run(&orders).unwrap();

        let cells: f64 = report.cross_tab.as_ref().unwrap().percentages().sum();
        prop_assert!((cells - 100.0).abs() < 0.01);

        if let Some(shares) = &report.value_revenue {
            let total: f64 = shares.iter().map(|s| s.percent).sum();
            prop_assert!((total - 100.0).abs() < 0.01);
        }
        if let Some(shares) = &report.recency_revenue {
            let total: f64 = shares.iter().map(|s| s.percent).sum();
            prop_assert!((total - 100.0).abs() < 0.01);
        }
    }

    #[test]
    fn test_row_order_does_not_change_report(orders in arb_orders()) {
        let forward = pipeline().run(&orders).unwrap();

        let mut reversed = orders.clone();
        reversed.reverse();
        let backward = pipeline().run(&reversed).unwrap();

        prop_assert_eq!(forward.to_json().unwrap(), backward.to_json().unwrap());
    }
}
