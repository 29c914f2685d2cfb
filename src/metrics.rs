//! Derived metrics and grouped aggregates over a filtered record set.
//!
//! Everything here is a pure function of its input: views call these on every
//! interaction and nothing is cached. Rows missing a field required by a
//! particular aggregate are excluded from that aggregate only; they are never
//! imputed and never dropped from unrelated computations.

use crate::reference::CountryTranslation;
use crate::types::{
    DelayCategory, DeptCategoryRow, HeatmapPointRow, ModeDelayRow, SegmentBubbleRow,
    SegmentTypeRow, ShipmentRecord, TopProductRow, TrendRow, TreemapRow,
};
use crate::util::{average, format_int, format_number};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Fixed presentation factor applied on top of the relative bubble size.
const BUBBLE_SCALE: f64 = 3.0;

/// Normalized delay per record over the *current* set: `(d - min) / (max - min)`
/// using the min/max of this set, so the scale shifts whenever the filters
/// change. When every delay in the set is equal the whole set maps to 0.5.
/// Records without a delay get `None`.
pub fn normalized_delays(records: &[ShipmentRecord]) -> Vec<Option<f64>> {
    let delays: Vec<Option<i64>> = records.iter().map(|r| r.delay()).collect();
    let valid: Vec<i64> = delays.iter().filter_map(|d| *d).collect();
    let (Some(&min), Some(&max)) = (valid.iter().min(), valid.iter().max()) else {
        return vec![None; records.len()];
    };
    delays
        .into_iter()
        .map(|d| {
            d.map(|d| {
                if max == min {
                    0.5
                } else {
                    (d - min) as f64 / (max - min) as f64
                }
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeatmapPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub weight: f64,
}

/// Delivery points for the delay heatmap: one entry per record that has
/// coordinates and a delay, weighted by normalized delay.
pub fn heatmap_points(records: &[ShipmentRecord]) -> Vec<HeatmapPoint> {
    let norms = normalized_delays(records);
    records
        .iter()
        .zip(norms)
        .filter_map(|(r, norm)| {
            Some(HeatmapPoint {
                latitude: r.latitude?,
                longitude: r.longitude?,
                weight: norm?,
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct CountryAggregate {
    pub country: String,
    pub shipments: usize,
    pub avg_delay: f64,
}

/// Mean delay per translated order country. Rows without a country or a
/// delay are excluded, so the per-country counts sum back to exactly the
/// number of rows that had both.
pub fn country_aggregates(
    records: &[ShipmentRecord],
    translation: &CountryTranslation,
) -> Vec<CountryAggregate> {
    let mut map: HashMap<String, Vec<f64>> = HashMap::new();
    for r in records {
        if r.order_country.is_empty() {
            continue;
        }
        let Some(delay) = r.delay() else { continue };
        let country = translation.translate(&r.order_country).to_string();
        map.entry(country).or_default().push(delay as f64);
    }
    let mut out: Vec<CountryAggregate> = map
        .into_iter()
        .map(|(country, delays)| CountryAggregate {
            country,
            shipments: delays.len(),
            avg_delay: average(&delays),
        })
        .collect();
    out.sort_by(|a, b| a.country.cmp(&b.country));
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModeDelayCounts {
    pub shipping_mode: String,
    pub low: usize,
    pub medium: usize,
    pub high: usize,
}

/// Per shipping mode, how many deliveries fall in each delay bucket.
pub fn mode_delay_counts(records: &[ShipmentRecord]) -> Vec<ModeDelayCounts> {
    let mut map: HashMap<String, (usize, usize, usize)> = HashMap::new();
    for r in records {
        let Some(cat) = r.delay_category() else { continue };
        let e = map.entry(r.shipping_mode.clone()).or_default();
        match cat {
            DelayCategory::Low => e.0 += 1,
            DelayCategory::Medium => e.1 += 1,
            DelayCategory::High => e.2 += 1,
        }
    }
    let mut out: Vec<ModeDelayCounts> = map
        .into_iter()
        .map(|(shipping_mode, (low, medium, high))| ModeDelayCounts {
            shipping_mode,
            low,
            medium,
            high,
        })
        .collect();
    out.sort_by(|a, b| a.shipping_mode.cmp(&b.shipping_mode));
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrendPoint {
    pub month: String,
    pub shipments: usize,
    pub avg_delay: f64,
}

/// Mean delay per shipping month (`YYYY-MM`), chronological.
pub fn monthly_trend(records: &[ShipmentRecord]) -> Vec<TrendPoint> {
    let mut map: HashMap<String, Vec<f64>> = HashMap::new();
    for r in records {
        let Some(date) = r.shipping_date else { continue };
        let Some(delay) = r.delay() else { continue };
        map.entry(date.format("%Y-%m").to_string())
            .or_default()
            .push(delay as f64);
    }
    let mut out: Vec<TrendPoint> = map
        .into_iter()
        .map(|(month, delays)| TrendPoint {
            month,
            shipments: delays.len(),
            avg_delay: average(&delays),
        })
        .collect();
    out.sort_by(|a, b| a.month.cmp(&b.month));
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeptCategoryAggregate {
    pub department: String,
    pub category: String,
    pub orders: usize,
    pub total_delay: i64,
    pub avg_delay: f64,
}

/// Sum and mean of delay per (department, category).
pub fn dept_category_delays(records: &[ShipmentRecord]) -> Vec<DeptCategoryAggregate> {
    let mut map: HashMap<(String, String), Vec<i64>> = HashMap::new();
    for r in records {
        let Some(delay) = r.delay() else { continue };
        map.entry((r.department.clone(), r.category.clone()))
            .or_default()
            .push(delay);
    }
    let mut out: Vec<DeptCategoryAggregate> = map
        .into_iter()
        .map(|((department, category), delays)| {
            let as_f64: Vec<f64> = delays.iter().map(|d| *d as f64).collect();
            DeptCategoryAggregate {
                department,
                category,
                orders: delays.len(),
                total_delay: delays.iter().sum(),
                avg_delay: average(&as_f64),
            }
        })
        .collect();
    out.sort_by(|a, b| {
        a.department
            .cmp(&b.department)
            .then_with(|| a.category.cmp(&b.category))
    });
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductSalesAggregate {
    pub category: String,
    pub product: String,
    pub total_sales: f64,
    pub avg_delay: f64,
    pub shipments: usize,
}

/// Treemap input: per (category, product), total sales for sizing and mean
/// delay for coloring. Sorted by total sales, largest first.
pub fn treemap_aggregates(records: &[ShipmentRecord]) -> Vec<ProductSalesAggregate> {
    #[derive(Default)]
    struct Acc {
        sales: f64,
        delays: Vec<f64>,
        shipments: usize,
    }
    let mut map: HashMap<(String, String), Acc> = HashMap::new();
    for r in records {
        let e = map
            .entry((r.category.clone(), r.product_name.clone()))
            .or_default();
        e.shipments += 1;
        if let Some(s) = r.sales {
            e.sales += s;
        }
        if let Some(d) = r.delay() {
            e.delays.push(d as f64);
        }
    }
    let mut out: Vec<ProductSalesAggregate> = map
        .into_iter()
        .map(|((category, product), acc)| ProductSalesAggregate {
            category,
            product,
            total_sales: acc.sales,
            avg_delay: average(&acc.delays),
            shipments: acc.shipments,
        })
        .collect();
    out.sort_by(|a, b| {
        b.total_sales
            .partial_cmp(&a.total_sales)
            .unwrap_or(Ordering::Equal)
    });
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductDelayAggregate {
    pub product: String,
    pub shipments: usize,
    pub avg_delay: f64,
}

/// The `n` products with the highest mean delay.
pub fn top_delayed_products(records: &[ShipmentRecord], n: usize) -> Vec<ProductDelayAggregate> {
    let mut map: HashMap<String, Vec<f64>> = HashMap::new();
    for r in records {
        let Some(delay) = r.delay() else { continue };
        map.entry(r.product_name.clone())
            .or_default()
            .push(delay as f64);
    }
    let mut out: Vec<ProductDelayAggregate> = map
        .into_iter()
        .map(|(product, delays)| ProductDelayAggregate {
            product,
            shipments: delays.len(),
            avg_delay: average(&delays),
        })
        .collect();
    out.sort_by(|a, b| {
        b.avg_delay
            .partial_cmp(&a.avg_delay)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.product.cmp(&b.product))
    });
    out.truncate(n);
    out
}

/// Rows eligible for the profitability aggregates and the correlation
/// analysis: a positive scheduled duration and a defined profit margin
/// (which itself requires sales > 0). Returns references; nothing is copied
/// until an aggregate needs it.
pub fn profitability_slice(records: &[ShipmentRecord]) -> Vec<&ShipmentRecord> {
    records
        .iter()
        .filter(|r| {
            matches!(r.days_scheduled, Some(s) if s > 0)
                && r.days_real.is_some()
                && r.profit_margin().is_some()
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentAggregate {
    pub segment: String,
    pub avg_delay_ratio: f64,
    pub avg_profit_margin: f64,
    pub total_sales: f64,
    pub bubble_size: f64,
}

/// Per customer segment: mean delay, mean profit margin, total sales, and a
/// presentation bubble size relative to the best-selling segment:
/// `((total / max_total) * 100 + 10) * 3`.
pub fn segment_aggregates(records: &[ShipmentRecord]) -> Vec<SegmentAggregate> {
    #[derive(Default)]
    struct Acc {
        delays: Vec<f64>,
        margins: Vec<f64>,
        sales: f64,
    }
    let mut map: HashMap<String, Acc> = HashMap::new();
    for r in profitability_slice(records) {
        let (Some(delay), Some(margin), Some(sales)) = (r.delay(), r.profit_margin(), r.sales)
        else {
            continue;
        };
        let e = map.entry(r.customer_segment.clone()).or_default();
        e.delays.push(delay as f64);
        e.margins.push(margin);
        e.sales += sales;
    }
    let mut out: Vec<SegmentAggregate> = map
        .into_iter()
        .map(|(segment, acc)| SegmentAggregate {
            segment,
            avg_delay_ratio: average(&acc.delays),
            avg_profit_margin: average(&acc.margins),
            total_sales: acc.sales,
            bubble_size: 0.0,
        })
        .collect();
    let max_sales = out.iter().map(|s| s.total_sales).fold(0.0f64, f64::max);
    for s in &mut out {
        let relative = if max_sales > 0.0 {
            s.total_sales / max_sales * 100.0
        } else {
            0.0
        };
        s.bubble_size = (relative + 10.0) * BUBBLE_SCALE;
    }
    out.sort_by(|a, b| a.segment.cmp(&b.segment));
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentTypeAggregate {
    pub segment: String,
    pub transaction_type: String,
    pub orders: usize,
    pub avg_delay: f64,
}

/// Mean delay per (customer segment, transaction type), over the same
/// eligible rows as the segment bubbles.
pub fn segment_type_delays(records: &[ShipmentRecord]) -> Vec<SegmentTypeAggregate> {
    let mut map: HashMap<(String, String), Vec<f64>> = HashMap::new();
    for r in profitability_slice(records) {
        let Some(delay) = r.delay() else { continue };
        map.entry((r.customer_segment.clone(), r.transaction_type.clone()))
            .or_default()
            .push(delay as f64);
    }
    let mut out: Vec<SegmentTypeAggregate> = map
        .into_iter()
        .map(|((segment, transaction_type), delays)| SegmentTypeAggregate {
            segment,
            transaction_type,
            orders: delays.len(),
            avg_delay: average(&delays),
        })
        .collect();
    out.sort_by(|a, b| {
        a.segment
            .cmp(&b.segment)
            .then_with(|| a.transaction_type.cmp(&b.transaction_type))
    });
    out
}

// ---------------------------------------------------------------------------
// Display-row builders for the console previews and exports.
// ---------------------------------------------------------------------------

pub fn heatmap_rows(points: &[HeatmapPoint]) -> Vec<HeatmapPointRow> {
    points
        .iter()
        .map(|p| HeatmapPointRow {
            latitude: format!("{:.6}", p.latitude),
            longitude: format!("{:.6}", p.longitude),
            normalized_delay: format!("{:.4}", p.weight),
        })
        .collect()
}

pub fn mode_rows(counts: &[ModeDelayCounts]) -> Vec<ModeDelayRow> {
    counts
        .iter()
        .map(|c| ModeDelayRow {
            shipping_mode: c.shipping_mode.clone(),
            low: format_int(c.low),
            medium: format_int(c.medium),
            high: format_int(c.high),
        })
        .collect()
}

pub fn trend_rows(trend: &[TrendPoint]) -> Vec<TrendRow> {
    trend
        .iter()
        .map(|t| TrendRow {
            month: t.month.clone(),
            shipments: format_int(t.shipments),
            avg_delay: format_number(t.avg_delay, 2),
        })
        .collect()
}

pub fn dept_category_rows(aggs: &[DeptCategoryAggregate]) -> Vec<DeptCategoryRow> {
    aggs.iter()
        .map(|a| DeptCategoryRow {
            department: a.department.clone(),
            category: a.category.clone(),
            orders: format_int(a.orders),
            total_delay: format_int(a.total_delay),
            avg_delay: format_number(a.avg_delay, 2),
        })
        .collect()
}

pub fn treemap_rows(aggs: &[ProductSalesAggregate]) -> Vec<TreemapRow> {
    aggs.iter()
        .map(|a| TreemapRow {
            category: a.category.clone(),
            product: a.product.clone(),
            total_sales: format_number(a.total_sales, 2),
            avg_delay: format_number(a.avg_delay, 2),
            shipments: format_int(a.shipments),
        })
        .collect()
}

pub fn top_product_rows(aggs: &[ProductDelayAggregate]) -> Vec<TopProductRow> {
    aggs.iter()
        .enumerate()
        .map(|(idx, a)| TopProductRow {
            rank: idx + 1,
            product: a.product.clone(),
            avg_delay: format_number(a.avg_delay, 2),
            shipments: format_int(a.shipments),
        })
        .collect()
}

pub fn segment_rows(aggs: &[SegmentAggregate]) -> Vec<SegmentBubbleRow> {
    aggs.iter()
        .map(|a| SegmentBubbleRow {
            segment: a.segment.clone(),
            avg_delay_ratio: format_number(a.avg_delay_ratio, 4),
            avg_profit_margin: format_number(a.avg_profit_margin, 2),
            total_sales: format_number(a.total_sales, 2),
            bubble_size: format_number(a.bubble_size, 2),
        })
        .collect()
}

pub fn segment_type_rows(aggs: &[SegmentTypeAggregate]) -> Vec<SegmentTypeRow> {
    aggs.iter()
        .map(|a| SegmentTypeRow {
            segment: a.segment.clone(),
            transaction_type: a.transaction_type.clone(),
            orders: format_int(a.orders),
            avg_delay: format_number(a.avg_delay, 2),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::CountryTranslation;
    use chrono::NaiveDate;
    use std::collections::HashMap;

    fn record(real: i64, sched: i64) -> ShipmentRecord {
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
            profit_per_order: Some(10.0),
            sales: Some(100.0),
            shipping_date: NaiveDate::from_ymd_opt(2017, 6, 1)
                .and_then(|d| d.and_hms_opt(12, 0, 0)),
            latitude: Some(10.0),
            longitude: Some(-60.0),
            benefit_per_order: Some(10.0),
            sales_per_customer: Some(95.0),
            item_profit_ratio: Some(0.1),
            item_total: Some(95.0),
        }
    }

    #[test]
    fn delay_category_and_normalization_example() {
        let records = vec![record(5, 3), record(2, 4), record(4, 4)];
        let delays: Vec<i64> = records.iter().filter_map(|r| r.delay()).collect();
        assert_eq!(delays, vec![2, -2, 0]);

        let cats: Vec<DelayCategory> =
            records.iter().filter_map(|r| r.delay_category()).collect();
        assert_eq!(
            cats,
            vec![DelayCategory::High, DelayCategory::Low, DelayCategory::Medium]
        );

        let norms = normalized_delays(&records);
        assert_eq!(norms, vec![Some(1.0), Some(0.0), Some(0.5)]);
    }

    #[test]
    fn delay_buckets_are_exhaustive_and_exclusive() {
        for d in -10i64..=10 {
            let cat = DelayCategory::from_delay(d);
            let expected = if d <= -1 {
                DelayCategory::Low
            } else if d <= 1 {
                DelayCategory::Medium
            } else {
                DelayCategory::High
            };
            assert_eq!(cat, expected, "delay {}", d);
        }
    }

    #[test]
    fn equal_delays_normalize_to_midpoint() {
        let records = vec![record(4, 4), record(6, 6), record(3, 3)];
        let norms = normalized_delays(&records);
        assert!(norms.iter().all(|n| *n == Some(0.5)));
    }

    #[test]
    fn normalized_delay_stays_in_unit_interval() {
        let records = vec![record(9, 1), record(1, 9), record(5, 5), record(7, 2)];
        for n in normalized_delays(&records).into_iter().flatten() {
            assert!((0.0..=1.0).contains(&n));
        }
    }

    #[test]
    fn profit_margin_example() {
        let mut a = record(4, 4);
        a.sales = Some(100.0);
        a.profit_per_order = Some(10.0);
        let mut b = record(4, 4);
        b.sales = Some(0.0);
        b.profit_per_order = Some(5.0);
        let mut c = record(4, 4);
        c.sales = Some(50.0);
        c.profit_per_order = Some(-5.0);

        assert_eq!(a.profit_margin(), Some(10.0));
        assert_eq!(b.profit_margin(), None);
        assert_eq!(c.profit_margin(), Some(-10.0));
    }

    #[test]
    fn country_counts_are_conserved() {
        let mut records = vec![record(5, 3), record(2, 4), record(4, 4)];
        records[1].order_country = "Francia".into();
        records.push({
            let mut r = record(3, 3);
            r.order_country = String::new(); // missing country
            r
        });
        records.push({
            let mut r = record(3, 3);
            r.days_real = None; // no delay
            r
        });

        let translation = CountryTranslation::from_map(HashMap::from([
            ("Brasil".to_string(), "Brazil".to_string()),
            ("Francia".to_string(), "France".to_string()),
        ]));
        let aggs = country_aggregates(&records, &translation);
        let names: Vec<&str> = aggs.iter().map(|a| a.country.as_str()).collect();
        assert_eq!(names, vec!["Brazil", "France"]);

        let eligible = records
            .iter()
            .filter(|r| !r.order_country.is_empty() && r.delay().is_some())
            .count();
        let counted: usize = aggs.iter().map(|a| a.shipments).sum();
        assert_eq!(counted, eligible);
    }

    #[test]
    fn unmapped_countries_pass_through() {
        let translation = CountryTranslation::from_map(HashMap::new());
        let records = vec![record(5, 3)];
        let aggs = country_aggregates(&records, &translation);
        assert_eq!(aggs[0].country, "Brasil");
    }

    #[test]
    fn mode_counts_bucket_by_category() {
        let mut records = vec![record(5, 3), record(2, 4), record(4, 4)];
        records[1].shipping_mode = "First Class".into();
        let counts = mode_delay_counts(&records);
        assert_eq!(counts.len(), 2);
        let first = counts.iter().find(|c| c.shipping_mode == "First Class").unwrap();
        assert_eq!((first.low, first.medium, first.high), (1, 0, 0));
        let std = counts
            .iter()
            .find(|c| c.shipping_mode == "Standard Class")
            .unwrap();
        assert_eq!((std.low, std.medium, std.high), (0, 1, 1));
    }

    #[test]
    fn trend_groups_by_month_in_order() {
        let mut records = vec![record(5, 3), record(2, 4), record(4, 4)];
        records[0].shipping_date =
            NaiveDate::from_ymd_opt(2017, 1, 15).and_then(|d| d.and_hms_opt(8, 0, 0));
        records[2].shipping_date = None;
        let trend = monthly_trend(&records);
        let months: Vec<&str> = trend.iter().map(|t| t.month.as_str()).collect();
        assert_eq!(months, vec!["2017-01", "2017-06"]);
        assert_eq!(trend[0].avg_delay, 2.0);
    }

    #[test]
    fn dept_category_sums_and_means() {
        let records = vec![record(5, 3), record(6, 3), record(2, 4)];
        let aggs = dept_category_delays(&records);
        assert_eq!(aggs.len(), 1);
        assert_eq!(aggs[0].orders, 3);
        assert_eq!(aggs[0].total_delay, 3); // 2 + 3 - 2
        assert_eq!(aggs[0].avg_delay, 1.0);
    }

    #[test]
    fn treemap_sorts_by_sales_desc() {
        let mut records = vec![record(5, 3), record(2, 4)];
        records[1].product_name = "Other".into();
        records[1].sales = Some(500.0);
        let aggs = treemap_aggregates(&records);
        assert_eq!(aggs[0].product, "Other");
        assert_eq!(aggs[0].total_sales, 500.0);
        assert_eq!(aggs[1].avg_delay, 2.0);
    }

    #[test]
    fn top_products_ranks_by_mean_delay() {
        let mut records = vec![record(9, 1), record(4, 4), record(5, 4)];
        records[1].product_name = "B".into();
        records[2].product_name = "C".into();
        let top = top_delayed_products(&records, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].product, "Rip Deck");
        assert_eq!(top[0].avg_delay, 8.0);
        assert_eq!(top[1].product, "C");
    }

    #[test]
    fn profitability_slice_requires_positive_schedule_and_margin() {
        let mut records = vec![record(5, 3), record(4, 0), record(4, 4)];
        records[2].sales = Some(0.0); // margin undefined
        let slice = profitability_slice(&records);
        assert_eq!(slice.len(), 1);
        assert_eq!(slice[0].days_scheduled, Some(3));
    }

    #[test]
    fn bubble_size_is_relative_to_best_segment() {
        let mut records = vec![record(5, 3), record(4, 4)];
        records[1].customer_segment = "Corporate".into();
        records[1].sales = Some(50.0);
        let aggs = segment_aggregates(&records);
        let consumer = aggs.iter().find(|a| a.segment == "Consumer").unwrap();
        let corporate = aggs.iter().find(|a| a.segment == "Corporate").unwrap();
        // (100/100 * 100 + 10) * 3 and (50/100 * 100 + 10) * 3.
        assert_eq!(consumer.bubble_size, 330.0);
        assert_eq!(corporate.bubble_size, 180.0);
    }

    #[test]
    fn segment_type_means_are_grouped() {
        let mut records = vec![record(5, 3), record(2, 4), record(4, 4)];
        records[1].transaction_type = "TRANSFER".into();
        let aggs = segment_type_delays(&records);
        assert_eq!(aggs.len(), 2);
        assert_eq!(aggs[0].transaction_type, "DEBIT");
        assert_eq!(aggs[0].orders, 2);
        assert_eq!(aggs[0].avg_delay, 1.0);
    }

    #[test]
    fn empty_input_yields_empty_aggregates() {
        let records: Vec<ShipmentRecord> = Vec::new();
        let translation = CountryTranslation::from_map(HashMap::new());
        assert!(normalized_delays(&records).is_empty());
        assert!(heatmap_points(&records).is_empty());
        assert!(country_aggregates(&records, &translation).is_empty());
        assert!(mode_delay_counts(&records).is_empty());
        assert!(monthly_trend(&records).is_empty());
        assert!(dept_category_delays(&records).is_empty());
        assert!(treemap_aggregates(&records).is_empty());
        assert!(top_delayed_products(&records, 5).is_empty());
        assert!(segment_aggregates(&records).is_empty());
        assert!(segment_type_delays(&records).is_empty());
    }
}
