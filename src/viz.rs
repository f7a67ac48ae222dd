//! Report charts rendered with Plotters

use std::path::{Path, PathBuf};

use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::report::{CrossTab, RankBy, RfmReport, SegmentShare};
use crate::scoring::{RecencySegment, ValueSegment};

pub const BEST_CUSTOMERS_PNG: &str = "best_customers.png";
pub const MONTHLY_REVENUE_PNG: &str = "monthly_revenue.png";
pub const SEGMENT_REVENUE_PNG: &str = "segment_revenue.png";
pub const SEGMENT_HEATMAP_PNG: &str = "segment_heatmap.png";

/// Bar colour for the best customers panels and the highlighted segment (#72BCD4)
const HIGHLIGHT: RGBColor = RGBColor(114, 188, 212);
const MUTED: RGBColor = RGBColor(211, 211, 211);
const LINE: RGBColor = RGBColor(173, 216, 230);

/// Lightest and darkest ends of the heatmap scale
const HEAT_LOW: RGBColor = RGBColor(247, 252, 245);
const HEAT_HIGH: RGBColor = RGBColor(0, 109, 44);

type Area<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

/// Label for a category axis tick; non-integer ticks stay blank
fn category_label(labels: &[String], x: f64) -> String {
    let rounded = x.round();
    if (x - rounded).abs() > 1e-6 || rounded < 0.0 {
        return String::new();
    }
    labels.get(rounded as usize).cloned().unwrap_or_default()
}

/// Index of the largest value, first one on ties
fn highlight_index(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, top)) if top >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

/// Interpolate the heatmap scale at `t` in `[0, 1]`
fn heat_color(t: f64) -> RGBColor {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
    RGBColor(
        mix(HEAT_LOW.0, HEAT_HIGH.0),
        mix(HEAT_LOW.1, HEAT_HIGH.1),
        mix(HEAT_LOW.2, HEAT_HIGH.2),
    )
}

/// Short customer label for a chart axis
fn short_id(customer_id: &str) -> String {
    customer_id.chars().take(8).collect()
}

fn to_f64(amount: Decimal) -> f64 {
    amount.to_f64().unwrap_or_default()
}

/// Draw one vertical bar chart panel with a value printed above each bar
fn draw_bar_panel(
    area: &Area<'_>,
    title: &str,
    labels: &[String],
    values: &[f64],
    highlight_max: bool,
    annotate: impl Fn(f64) -> String,
) -> crate::Result<()> {
    let n = labels.len().max(1);
    let max = values.iter().copied().fold(0.0, f64::max);
    let y_max = if max > 0.0 { max * 1.15 } else { 1.0 };
    let best = if highlight_max { highlight_index(values) } else { None };

    let mut chart = ChartBuilder::on(area)
        .caption(title, ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.5f64..(n as f64 - 0.5), 0f64..y_max)?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(n)
        .x_label_formatter(&|x| category_label(labels, *x))
        .draw()?;

    chart.draw_series(values.iter().enumerate().map(|(i, &value)| {
        let color = match best {
            Some(b) if b != i => MUTED,
            _ => HIGHLIGHT,
        };
        let x = i as f64;
        Rectangle::new([(x - 0.4, 0.0), (x + 0.4, value)], color.filled())
    }))?;

    let label_style = TextStyle::from(("sans-serif", 14).into_font())
        .pos(Pos::new(HPos::Center, VPos::Bottom));
    chart.draw_series(values.iter().enumerate().map(|(i, &value)| {
        Text::new(annotate(value), (i as f64, value), label_style.clone())
    }))?;

    Ok(())
}

/// Top customers by recency, frequency and monetary side by side
pub fn create_best_customers_chart(report: &RfmReport, top_n: usize, output_path: &Path) -> crate::Result<()> {
    let root = BitMapBackend::new(output_path, (1500, 500)).into_drawing_area();
    root.fill(&WHITE)?;
    let root = root.titled(
        "Best Customer Based on RFM Parameters (customer_id)",
        ("sans-serif", 26),
    )?;
    let panels = root.split_evenly((1, 3));

    let axes = [
        ("By Recency (days)", RankBy::Recency),
        ("By Frequency", RankBy::Frequency),
        ("By Monetary", RankBy::Monetary),
    ];
    for (panel, (title, by)) in panels.iter().zip(axes) {
        let top = report.top_customers(by, top_n);
        let labels: Vec<String> = top.iter().map(|c| short_id(&c.rfm.customer_id)).collect();
        let values: Vec<f64> = top
            .iter()
            .map(|c| match by {
                RankBy::Recency => c.rfm.recency as f64,
                RankBy::Frequency => c.rfm.frequency as f64,
                RankBy::Monetary => to_f64(c.rfm.monetary),
            })
            .collect();
        draw_bar_panel(panel, title, &labels, &values, false, |v| format!("{v:.0}"))?;
    }

    root.present()?;
    info!(path = %output_path.display(), "best customers chart saved");
    Ok(())
}

/// Line chart of revenue per month
pub fn create_monthly_revenue_chart(report: &RfmReport, output_path: &Path) -> crate::Result<()> {
    let labels: Vec<String> = report
        .monthly
        .iter()
        .map(|row| row.order_date.to_string())
        .collect();
    let revenue: Vec<f64> = report.monthly.iter().map(|row| to_f64(row.revenue)).collect();
    let n = labels.len().max(1);
    let max = revenue.iter().copied().fold(0.0, f64::max);
    let y_max = if max > 0.0 { max * 1.1 } else { 1.0 };

    let root = BitMapBackend::new(output_path, (1000, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Monthly Revenue", ("sans-serif", 28))
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(80)
        .build_cartesian_2d(-0.5f64..(n as f64 - 0.5), 0f64..y_max)?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(n.min(12))
        .x_label_formatter(&|x| category_label(&labels, *x))
        .y_desc("Revenue")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    let points: Vec<(f64, f64)> = revenue
        .iter()
        .enumerate()
        .map(|(i, &value)| (i as f64, value))
        .collect();
    chart.draw_series(LineSeries::new(points.iter().copied(), LINE.stroke_width(2)))?;
    chart.draw_series(points.iter().map(|&p| Circle::new(p, 4, LINE.filled())))?;

    root.present()?;
    info!(path = %output_path.display(), "monthly revenue chart saved");
    Ok(())
}

/// Revenue share by value segment and by recency segment, largest bar highlighted
pub fn create_segment_revenue_chart(
    value: &[SegmentShare<ValueSegment>],
    recency: &[SegmentShare<RecencySegment>],
    output_path: &Path,
) -> crate::Result<()> {
    let root = BitMapBackend::new(output_path, (1400, 600)).into_drawing_area();
    root.fill(&WHITE)?;
    let root = root.titled("Monetary Distribution", ("sans-serif", 26))?;
    let panels = root.split_evenly((1, 2));

    let value_labels: Vec<String> = value.iter().map(|s| s.segment.to_string()).collect();
    let value_pct: Vec<f64> = value.iter().map(|s| s.percent).collect();
    draw_bar_panel(
        &panels[0],
        "Monetary Distribution by Value Segment",
        &value_labels,
        &value_pct,
        true,
        |v| format!("{v:.2}%"),
    )?;

    let recency_labels: Vec<String> = recency.iter().map(|s| s.segment.to_string()).collect();
    let recency_pct: Vec<f64> = recency.iter().map(|s| s.percent).collect();
    draw_bar_panel(
        &panels[1],
        "Monetary Distribution by Recency Segment",
        &recency_labels,
        &recency_pct,
        true,
        |v| format!("{v:.2}%"),
    )?;

    root.present()?;
    info!(path = %output_path.display(), "segment revenue chart saved");
    Ok(())
}

/// Heatmap of customer share per value × recency pair
pub fn create_segment_heatmap(tab: &CrossTab, output_path: &Path) -> crate::Result<()> {
    let rows = ValueSegment::ALL.len();
    let cols = RecencySegment::ALL.len();
    let max_pct = tab.percentages().iter().copied().fold(0.0, f64::max);

    // first value segment drawn on top
    let row_labels: Vec<String> = ValueSegment::ALL
        .iter()
        .rev()
        .map(|s| s.to_string())
        .collect();
    let col_labels: Vec<String> = RecencySegment::ALL.iter().map(|s| s.to_string()).collect();

    let root = BitMapBackend::new(output_path, (1000, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Heatmap of Recency Segment and Value Segment", ("sans-serif", 24))
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(110)
        .build_cartesian_2d(-0.5f64..(cols as f64 - 0.5), -0.5f64..(rows as f64 - 0.5))?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(cols)
        .y_labels(rows)
        .x_label_formatter(&|x| category_label(&col_labels, *x))
        .y_label_formatter(&|y| category_label(&row_labels, *y))
        .draw()?;

    let mut cells = Vec::with_capacity(rows * cols);
    for (r, value) in ValueSegment::ALL.iter().enumerate() {
        for (c, recency) in RecencySegment::ALL.iter().enumerate() {
            let pct = tab.percent(*value, *recency);
            let y = (rows - 1 - r) as f64;
            cells.push((c as f64, y, pct));
        }
    }

    chart.draw_series(cells.iter().map(|&(x, y, pct)| {
        let t = if max_pct > 0.0 { pct / max_pct } else { 0.0 };
        Rectangle::new(
            [(x - 0.5, y - 0.5), (x + 0.5, y + 0.5)],
            heat_color(t).filled(),
        )
    }))?;

    let label_style = TextStyle::from(("sans-serif", 16).into_font())
        .pos(Pos::new(HPos::Center, VPos::Center));
    chart.draw_series(cells.iter().map(|&(x, y, pct)| {
        let style = if max_pct > 0.0 && pct / max_pct > 0.6 {
            label_style.color(&WHITE)
        } else {
            label_style.clone()
        };
        Text::new(format!("{pct:.2}"), (x, y), style)
    }))?;

    root.present()?;
    info!(path = %output_path.display(), "segment heatmap saved");
    Ok(())
}

/// Render every chart the report has data for into `output_dir`
///
/// # Returns
/// * Paths of the PNG files written, in rendering order
pub fn generate_visualization_report(
    report: &RfmReport,
    output_dir: &Path,
    top_n: usize,
) -> crate::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)?;
    let mut written = Vec::new();

    if report.customers.is_empty() {
        warn!("no customers, skipping customer charts");
    } else {
        let path = output_dir.join(BEST_CUSTOMERS_PNG);
        create_best_customers_chart(report, top_n.max(1), &path)?;
        written.push(path);
    }

    if !report.monthly.is_empty() {
        let path = output_dir.join(MONTHLY_REVENUE_PNG);
        create_monthly_revenue_chart(report, &path)?;
        written.push(path);
    }

    if let (Some(value), Some(recency)) = (&report.value_revenue, &report.recency_revenue) {
        let path = output_dir.join(SEGMENT_REVENUE_PNG);
        create_segment_revenue_chart(value, recency, &path)?;
        written.push(path);
    }

    if let Some(tab) = &report.cross_tab {
        let path = output_dir.join(SEGMENT_HEATMAP_PNG);
        create_segment_heatmap(tab, &path)?;
        written.push(path);
    }

    Ok(written)
}
