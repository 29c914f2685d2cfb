use crate::types::{RawRow, ShipmentRecord};
use crate::util::{parse_datetime_safe, parse_f64_safe, parse_i64_safe};
use anyhow::{bail, Context, Result};
use csv::ReaderBuilder;
use encoding_rs::WINDOWS_1252;
use log::{debug, info};
use std::path::Path;

/// Columns that must be present in the header for the load to succeed.
/// The correlation-only columns ("Benefit per order", "Sales per customer",
/// "Order Item Profit Ratio", "Order Item Total") are deliberately not in
/// this list; the correlation view checks for them itself and degrades.
pub const REQUIRED_COLUMNS: &[&str] = &[
    "Type",
    "Category Name",
    "Department Name",
    "Market",
    "Order Region",
    "Order Country",
    "Product Name",
    "Shipping Mode",
    "Customer Segment",
    "Days for shipping (real)",
    "Days for shipment (scheduled)",
    "Order Profit Per Order",
    "Sales",
    "shipping date (DateOrders)",
    "Latitude",
    "Longitude",
];

#[derive(Debug, Clone)]
pub struct LoadReport {
    pub total_rows: usize,
    pub kept_rows: usize,
    pub parse_errors: usize,
    pub missing_dates: usize,
    /// Header names exactly as they appeared in the file. The correlation
    /// view uses these to report which of its optional columns are absent.
    pub headers: Vec<String>,
}

pub fn load(path: &Path) -> Result<(Vec<ShipmentRecord>, LoadReport)> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    load_from_bytes(&bytes)
}

/// Decode the raw bytes as Windows-1252 (a superset of Latin-1 that also
/// covers plain ASCII/UTF-8 Latin text in this dataset) and parse the CSV.
///
/// Malformed field values never fail the load; they are coerced to missing
/// and the owning aggregates exclude them later. Only an unreadable file,
/// a missing required column, or a structurally broken row is treated as an
/// error, and broken rows are merely counted and skipped.
pub fn load_from_bytes(bytes: &[u8]) -> Result<(Vec<ShipmentRecord>, LoadReport)> {
    let (decoded, _, had_errors) = WINDOWS_1252.decode(bytes);
    if had_errors {
        debug!("some byte sequences could not be decoded and were replaced");
    }

    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .from_reader(decoded.as_bytes());

    let headers: Vec<String> = rdr
        .headers()
        .context("failed to read CSV header row")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|c| !headers.iter().any(|h| h == c))
        .collect();
    if !missing.is_empty() {
        bail!("missing required columns: {}", missing.join(", "));
    }

    let mut total_rows = 0usize;
    let mut parse_errors = 0usize;
    let mut missing_dates = 0usize;
    let mut records: Vec<ShipmentRecord> = Vec::new();

    for result in rdr.deserialize::<RawRow>() {
        total_rows += 1;
        let row = match result {
            Ok(r) => r,
            Err(_) => {
                parse_errors += 1;
                continue;
            }
        };

        let shipping_date = parse_datetime_safe(row.shipping_date.as_deref());
        if shipping_date.is_none() {
            missing_dates += 1;
        }

        records.push(ShipmentRecord {
            transaction_type: clean_label(row.transaction_type),
            category: clean_label(row.category),
            department: clean_label(row.department),
            market: clean_label(row.market),
            order_region: clean_label(row.order_region),
            // Empty means missing: country aggregation skips these rows.
            order_country: row.order_country.unwrap_or_default().trim().to_string(),
            product_name: clean_label(row.product_name),
            shipping_mode: clean_label(row.shipping_mode),
            customer_segment: clean_label(row.customer_segment),
            days_real: parse_i64_safe(row.days_real.as_deref()),
            days_scheduled: parse_i64_safe(row.days_scheduled.as_deref()),
            profit_per_order: parse_f64_safe(row.profit_per_order.as_deref()),
            sales: parse_f64_safe(row.sales.as_deref()),
            shipping_date,
            latitude: parse_f64_safe(row.latitude.as_deref()),
            longitude: parse_f64_safe(row.longitude.as_deref()),
            benefit_per_order: parse_f64_safe(row.benefit_per_order.as_deref()),
            sales_per_customer: parse_f64_safe(row.sales_per_customer.as_deref()),
            item_profit_ratio: parse_f64_safe(row.item_profit_ratio.as_deref()),
            item_total: parse_f64_safe(row.item_total.as_deref()),
        });
    }

    let report = LoadReport {
        total_rows,
        kept_rows: records.len(),
        parse_errors,
        missing_dates,
        headers,
    };
    info!(
        "loaded {} rows ({} kept, {} parse errors, {} missing dates)",
        report.total_rows, report.kept_rows, report.parse_errors, report.missing_dates
    );
    Ok((records, report))
}

fn clean_label(s: Option<String>) -> String {
    match s {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => "Unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Type,Category Name,Department Name,Market,Order Region,Order Country,\
Product Name,Shipping Mode,Customer Segment,Days for shipping (real),\
Days for shipment (scheduled),Order Profit Per Order,Sales,\
shipping date (DateOrders),Latitude,Longitude,Benefit per order,\
Sales per customer,Order Item Profit Ratio,Order Item Total";

    fn sample_csv() -> String {
        format!(
            "{HEADER}\n\
DEBIT,Cleats,Fan Shop,LATAM,South America,Brasil,Perfect Fitness Rip Deck,\
Standard Class,Consumer,5,4,91.25,327.75,1/18/2018 12:27,18.2,-66.0,\
91.25,314.64,0.29,314.64\n\
TRANSFER,Shoes,Footwear,Europe,Western Europe,Francia,Nike CrossTrainer,\
First Class,Corporate,2,4,-10.5,50.0,bad-date,,,-10.5,48.0,-0.21,48.0\n"
        )
    }

    #[test]
    fn loads_and_coerces_rows() {
        let (records, report) = load_from_bytes(sample_csv().as_bytes()).unwrap();
        assert_eq!(report.total_rows, 2);
        assert_eq!(report.kept_rows, 2);
        assert_eq!(report.parse_errors, 0);
        assert_eq!(report.missing_dates, 1);

        assert_eq!(records[0].delay(), Some(1));
        assert_eq!(records[1].delay(), Some(-2));
        assert!(records[0].shipping_date.is_some());
        assert!(records[1].shipping_date.is_none());
        assert_eq!(records[1].latitude, None);
    }

    #[test]
    fn decodes_latin_1_country_names() {
        let mut bytes = format!("{HEADER}\n").into_bytes();
        // "Perú" in Latin-1: the ú is a single 0xFA byte, invalid as UTF-8.
        bytes.extend_from_slice(b"DEBIT,Cleats,Fan Shop,LATAM,South America,Per\xFA,P,\
Standard Class,Consumer,3,2,10.0,100.0,1/1/2017 09:00,1.0,2.0,10.0,95.0,0.1,95.0\n");
        let (records, _) = load_from_bytes(&bytes).unwrap();
        assert_eq!(records[0].order_country, "Per\u{fa}");
    }

    #[test]
    fn missing_required_column_is_reported_by_name() {
        let csv = "Type,Category Name\nDEBIT,Cleats\n";
        let err = load_from_bytes(csv.as_bytes()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("missing required columns"));
        assert!(msg.contains("Days for shipping (real)"));
        assert!(msg.contains("Latitude"));
    }

    #[test]
    fn malformed_numbers_become_missing_not_errors() {
        let csv = format!(
            "{HEADER}\n\
DEBIT,Cleats,Fan Shop,LATAM,South America,Brasil,P,Standard Class,Consumer,\
oops,4,not-a-number,327.75,1/18/2018 12:27,18.2,-66.0,,,,\n"
        );
        let (records, report) = load_from_bytes(csv.as_bytes()).unwrap();
        assert_eq!(report.parse_errors, 0);
        assert_eq!(records[0].days_real, None);
        assert_eq!(records[0].delay(), None);
        assert_eq!(records[0].profit_per_order, None);
        assert_eq!(records[0].benefit_per_order, None);
    }
}
