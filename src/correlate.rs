//! Pairwise Pearson correlation between the delay measures and the
//! financial measures, plus the "strongest relationship" summary.
//!
//! Classification thresholds apply to the raw coefficient (`|r| > 0.3`);
//! the console rendering shows `r * 100` as a percentage, but the percentage
//! never feeds back into classification.

use crate::metrics::profitability_slice;
use crate::types::{CorrelationRow, ShipmentRecord};
use crate::util::average;
use serde::Serialize;
use std::fmt;

/// Columns the correlation view needs beyond the load-required set. When any
/// of these are absent from the file header, the view reports them and skips.
pub const OPTIONAL_COLUMNS: &[&str] = &[
    "Benefit per order",
    "Sales per customer",
    "Order Item Profit Ratio",
    "Order Item Total",
];

const DELAY_MEASURES: &[&str] = &["Shipping Delay", "Days for shipping (real)"];

const FINANCIAL_MEASURES: &[&str] = &[
    "Benefit per order",
    "Sales per customer",
    "Order Item Profit Ratio",
    "Sales",
    "Order Item Total",
    "Order Profit Per Order",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relationship {
    Positive,
    Negative,
    None,
}

impl Relationship {
    /// `r > 0.3` positive, `r < -0.3` negative, otherwise not significant.
    pub fn classify(r: f64) -> Self {
        if r > 0.3 {
            Relationship::Positive
        } else if r < -0.3 {
            Relationship::Negative
        } else {
            Relationship::None
        }
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Relationship::Positive => "Positive (delays increase this metric)",
            Relationship::Negative => "Negative (delays reduce this metric)",
            Relationship::None => "No significant correlation",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CorrelationCell {
    pub delay_measure: &'static str,
    pub financial_measure: &'static str,
    pub r: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StrongestPair {
    pub delay_measure: &'static str,
    pub financial_measure: &'static str,
    pub r: f64,
    /// Mean of the financial measure among rows at the minimum observed
    /// value of the delay measure, and at the maximum.
    pub mean_at_min_delay: f64,
    pub mean_at_max_delay: f64,
    /// Percentage change between the two means; `None` when the baseline
    /// mean is zero.
    pub pct_change: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CorrelationReport {
    pub cells: Vec<CorrelationCell>,
    pub strongest: Option<StrongestPair>,
    pub rows_used: usize,
}

/// Which of the correlation-only columns are absent from the loaded header.
pub fn missing_columns(headers: &[String]) -> Vec<&'static str> {
    OPTIONAL_COLUMNS
        .iter()
        .copied()
        .filter(|c| !headers.iter().any(|h| h == c))
        .collect()
}

/// Pearson correlation coefficient, clamped to [-1, 1]. Returns 0 for
/// degenerate input (fewer than two points or zero variance).
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len() as f64;
    if n < 2.0 || x.len() != y.len() {
        return 0.0;
    }

    let sum_x: f64 = x.iter().sum();
    let sum_y: f64 = y.iter().sum();
    let sum_xy: f64 = x.iter().zip(y.iter()).map(|(a, b)| a * b).sum();
    let sum_x2: f64 = x.iter().map(|a| a * a).sum();
    let sum_y2: f64 = y.iter().map(|a| a * a).sum();

    let numerator = n * sum_xy - sum_x * sum_y;
    let denominator = ((n * sum_x2 - sum_x * sum_x) * (n * sum_y2 - sum_y * sum_y)).sqrt();

    if denominator.abs() < f64::EPSILON {
        0.0
    } else {
        (numerator / denominator).clamp(-1.0, 1.0)
    }
}

/// The cleaned column matrix: one `Vec<f64>` per measure, row-aligned, built
/// from rows where every measure is present. Mirrors the dataframe's
/// to-numeric + dropna step.
struct MeasureMatrix {
    delay: Vec<Vec<f64>>,
    financial: Vec<Vec<f64>>,
    rows: usize,
}

fn build_matrix(records: &[ShipmentRecord]) -> MeasureMatrix {
    let mut delay = vec![Vec::new(); DELAY_MEASURES.len()];
    let mut financial = vec![Vec::new(); FINANCIAL_MEASURES.len()];
    let mut rows = 0usize;

    for r in profitability_slice(records) {
        let values = [
            r.delay().map(|d| d as f64),
            r.days_real.map(|d| d as f64),
            r.benefit_per_order,
            r.sales_per_customer,
            r.item_profit_ratio,
            r.sales,
            r.item_total,
            r.profit_per_order,
        ];
        if values.iter().any(|v| v.is_none()) {
            continue;
        }
        rows += 1;
        for (i, v) in values[..2].iter().enumerate() {
            delay[i].push(v.unwrap_or_default());
        }
        for (i, v) in values[2..].iter().enumerate() {
            financial[i].push(v.unwrap_or_default());
        }
    }

    MeasureMatrix {
        delay,
        financial,
        rows,
    }
}

/// Correlate every (delay measure, financial measure) pair and pick the
/// strongest relationship by absolute coefficient.
pub fn correlation_report(records: &[ShipmentRecord]) -> CorrelationReport {
    let matrix = build_matrix(records);

    let mut cells = Vec::with_capacity(DELAY_MEASURES.len() * FINANCIAL_MEASURES.len());
    for (di, delay_name) in DELAY_MEASURES.iter().enumerate() {
        for (fi, financial_name) in FINANCIAL_MEASURES.iter().enumerate() {
            cells.push(CorrelationCell {
                delay_measure: delay_name,
                financial_measure: financial_name,
                r: pearson(&matrix.delay[di], &matrix.financial[fi]),
            });
        }
    }

    let strongest = cells
        .iter()
        .max_by(|a, b| {
            a.r.abs()
                .partial_cmp(&b.r.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .and_then(|cell| {
            let di = DELAY_MEASURES.iter().position(|m| *m == cell.delay_measure)?;
            let fi = FINANCIAL_MEASURES
                .iter()
                .position(|m| *m == cell.financial_measure)?;
            summarize_pair(cell, &matrix.delay[di], &matrix.financial[fi])
        });

    CorrelationReport {
        cells,
        strongest,
        rows_used: matrix.rows,
    }
}

fn summarize_pair(
    cell: &CorrelationCell,
    delay: &[f64],
    financial: &[f64],
) -> Option<StrongestPair> {
    let min = delay.iter().copied().fold(f64::INFINITY, f64::min);
    let max = delay.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !min.is_finite() || !max.is_finite() {
        return None;
    }

    let at = |target: f64| -> Vec<f64> {
        delay
            .iter()
            .zip(financial.iter())
            .filter(|(d, _)| **d == target)
            .map(|(_, f)| *f)
            .collect()
    };
    let mean_at_min_delay = average(&at(min));
    let mean_at_max_delay = average(&at(max));
    let pct_change = if mean_at_min_delay != 0.0 {
        Some((mean_at_max_delay - mean_at_min_delay) / mean_at_min_delay.abs() * 100.0)
    } else {
        None
    };

    Some(StrongestPair {
        delay_measure: cell.delay_measure,
        financial_measure: cell.financial_measure,
        r: cell.r,
        mean_at_min_delay,
        mean_at_max_delay,
        pct_change,
    })
}

/// One display row per financial measure, with the coefficient against each
/// delay measure rendered as a percentage.
pub fn correlation_rows(report: &CorrelationReport) -> Vec<CorrelationRow> {
    FINANCIAL_MEASURES
        .iter()
        .map(|metric| {
            let find = |delay_measure: &str| {
                report
                    .cells
                    .iter()
                    .find(|c| c.financial_measure == *metric && c.delay_measure == delay_measure)
                    .map(|c| c.r)
                    .unwrap_or(0.0)
            };
            let vs_delay = find("Shipping Delay");
            let vs_real = find("Days for shipping (real)");
            CorrelationRow {
                financial_metric: metric.to_string(),
                corr_shipping_delay: format!("{:.2}%", vs_delay * 100.0),
                interpretation_delay: Relationship::classify(vs_delay).to_string(),
                corr_days_real: format!("{:.2}%", vs_real * 100.0),
                interpretation_days_real: Relationship::classify(vs_real).to_string(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(real: i64, sched: i64, sales: f64, profit: f64) -> ShipmentRecord {
        ShipmentRecord {
            transaction_type: "DEBIT".into(),
            category: "Cleats".into(),
            department: "Fan Shop".into(),
            market: "LATAM".into(),
            order_region: "South America".into(),
            order_country: "Brasil".into(),
            product_name: "Rip Deck".into(),
            shipping_mode: "Standard Class".into(),
            customer_segment: "Consumer".into(),
            days_real: Some(real),
            days_scheduled: Some(sched),
            profit_per_order: Some(profit),
            sales: Some(sales),
            shipping_date: NaiveDate::from_ymd_opt(2017, 6, 1)
                .and_then(|d| d.and_hms_opt(12, 0, 0)),
            latitude: Some(1.0),
            longitude: Some(2.0),
            benefit_per_order: Some(profit),
            sales_per_customer: Some(sales * 0.95),
            item_profit_ratio: Some(profit / sales),
            item_total: Some(sales * 0.9),
        }
    }

    #[test]
    fn pearson_detects_perfect_relationships() {
        let x = vec![1.0, 2.0, 3.0, 4.0];
        let up: Vec<f64> = x.iter().map(|v| v * 2.0 + 1.0).collect();
        let down: Vec<f64> = x.iter().map(|v| -v).collect();
        assert!((pearson(&x, &up) - 1.0).abs() < 1e-12);
        assert!((pearson(&x, &down) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn pearson_is_zero_for_degenerate_input() {
        assert_eq!(pearson(&[], &[]), 0.0);
        assert_eq!(pearson(&[1.0], &[2.0]), 0.0);
        assert_eq!(pearson(&[3.0, 3.0, 3.0], &[1.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn coefficients_stay_in_unit_range() {
        let records = vec![
            record(5, 3, 100.0, 10.0),
            record(2, 4, 80.0, -4.0),
            record(4, 4, 120.0, 30.0),
            record(7, 2, 60.0, 2.0),
        ];
        let report = correlation_report(&records);
        assert_eq!(report.rows_used, 4);
        assert_eq!(report.cells.len(), 12);
        for cell in &report.cells {
            assert!((-1.0..=1.0).contains(&cell.r), "{:?}", cell);
        }
    }

    #[test]
    fn classification_uses_raw_coefficients() {
        assert_eq!(Relationship::classify(0.31), Relationship::Positive);
        assert_eq!(Relationship::classify(-0.31), Relationship::Negative);
        assert_eq!(Relationship::classify(0.3), Relationship::None);
        assert_eq!(Relationship::classify(-0.3), Relationship::None);
        assert_eq!(Relationship::classify(0.0), Relationship::None);
    }

    #[test]
    fn strongest_pair_compares_min_and_max_delay_rows() {
        // Sales rise monotonically with delay, so |r| for (Shipping Delay,
        // Sales)-style pairs is 1 and the min/max means are the endpoints.
        let records = vec![
            record(3, 3, 100.0, 10.0), // delay 0
            record(5, 3, 200.0, 20.0), // delay 2
            record(7, 3, 300.0, 30.0), // delay 4
        ];
        let report = correlation_report(&records);
        let strongest = report.strongest.expect("strongest pair");
        assert!((strongest.r.abs() - 1.0).abs() < 1e-9);
        let pct = strongest.pct_change.expect("pct change");
        assert!(pct > 0.0);
        assert!(strongest.mean_at_max_delay > strongest.mean_at_min_delay);
    }

    #[test]
    fn rows_with_missing_measures_are_dropped() {
        let mut incomplete = record(5, 3, 100.0, 10.0);
        incomplete.sales_per_customer = None;
        let records = vec![record(2, 4, 80.0, -4.0), incomplete, record(4, 4, 120.0, 30.0)];
        let report = correlation_report(&records);
        assert_eq!(report.rows_used, 2);
    }

    #[test]
    fn missing_columns_are_listed() {
        let headers = vec!["Type".to_string(), "Sales per customer".to_string()];
        let missing = missing_columns(&headers);
        assert_eq!(
            missing,
            vec![
                "Benefit per order",
                "Order Item Profit Ratio",
                "Order Item Total"
            ]
        );
    }

    #[test]
    fn empty_input_produces_empty_report() {
        let report = correlation_report(&[]);
        assert_eq!(report.rows_used, 0);
        assert!(report.cells.iter().all(|c| c.r == 0.0));
    }
}
