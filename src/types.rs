use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tabled::Tabled;

/// One CSV row as it appears on disk. Every field is optional because the
/// dataset is full of blanks and half-broken values; coercion happens in the
/// loader, not here.
#[derive(Debug, Deserialize)]
pub struct RawRow {
    #[serde(rename = "Type")]
    pub transaction_type: Option<String>,
    #[serde(rename = "Category Name")]
    pub category: Option<String>,
    #[serde(rename = "Department Name")]
    pub department: Option<String>,
    #[serde(rename = "Market")]
    pub market: Option<String>,
    #[serde(rename = "Order Region")]
    pub order_region: Option<String>,
    #[serde(rename = "Order Country")]
    pub order_country: Option<String>,
    #[serde(rename = "Product Name")]
    pub product_name: Option<String>,
    #[serde(rename = "Shipping Mode")]
    pub shipping_mode: Option<String>,
    #[serde(rename = "Customer Segment")]
    pub customer_segment: Option<String>,
    #[serde(rename = "Days for shipping (real)")]
    pub days_real: Option<String>,
    #[serde(rename = "Days for shipment (scheduled)")]
    pub days_scheduled: Option<String>,
    #[serde(rename = "Order Profit Per Order")]
    pub profit_per_order: Option<String>,
    #[serde(rename = "Sales")]
    pub sales: Option<String>,
    // The source CSV really does use a lowercase "shipping" in this header.
    #[serde(rename = "shipping date (DateOrders)")]
    pub shipping_date: Option<String>,
    #[serde(rename = "Latitude")]
    pub latitude: Option<String>,
    #[serde(rename = "Longitude")]
    pub longitude: Option<String>,
    #[serde(rename = "Benefit per order")]
    pub benefit_per_order: Option<String>,
    #[serde(rename = "Sales per customer")]
    pub sales_per_customer: Option<String>,
    #[serde(rename = "Order Item Profit Ratio")]
    pub item_profit_ratio: Option<String>,
    #[serde(rename = "Order Item Total")]
    pub item_total: Option<String>,
}

/// A cleaned shipment row. Categorical fields are trimmed strings; numeric
/// and temporal fields stay `None` when the source value was missing or
/// unparseable, so each aggregate can exclude exactly the rows it cannot use.
#[derive(Debug, Clone)]
pub struct ShipmentRecord {
    pub transaction_type: String,
    pub category: String,
    pub department: String,
    pub market: String,
    pub order_region: String,
    pub order_country: String,
    pub product_name: String,
    pub shipping_mode: String,
    pub customer_segment: String,
    pub days_real: Option<i64>,
    pub days_scheduled: Option<i64>,
    pub profit_per_order: Option<f64>,
    pub sales: Option<f64>,
    pub shipping_date: Option<NaiveDateTime>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub benefit_per_order: Option<f64>,
    pub sales_per_customer: Option<f64>,
    pub item_profit_ratio: Option<f64>,
    pub item_total: Option<f64>,
}

impl ShipmentRecord {
    /// Shipping delay in days: real minus scheduled. Positive means late,
    /// negative means the shipment arrived early.
    pub fn delay(&self) -> Option<i64> {
        Some(self.days_real? - self.days_scheduled?)
    }

    pub fn delay_category(&self) -> Option<DelayCategory> {
        self.delay().map(DelayCategory::from_delay)
    }

    /// Profit margin as a percentage of sales. Undefined when sales are
    /// missing or non-positive.
    pub fn profit_margin(&self) -> Option<f64> {
        let sales = self.sales?;
        let profit = self.profit_per_order?;
        if sales <= 0.0 || !sales.is_finite() || !profit.is_finite() {
            return None;
        }
        let margin = profit / sales * 100.0;
        margin.is_finite().then_some(margin)
    }
}

/// Delay severity buckets with edges at -1 and +1 days:
/// `(-inf, -1]` is Low, `(-1, 1]` is Medium, `(1, inf)` is High.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DelayCategory {
    Low,
    Medium,
    High,
}

impl DelayCategory {
    pub fn from_delay(delay: i64) -> Self {
        if delay <= -1 {
            DelayCategory::Low
        } else if delay <= 1 {
            DelayCategory::Medium
        } else {
            DelayCategory::High
        }
    }
}

// ---------------------------------------------------------------------------
// Display rows for console previews and CSV exports. Numbers arrive
// pre-formatted as strings; the numeric aggregates live in `metrics`.
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct HeatmapPointRow {
    #[serde(rename = "Latitude")]
    #[tabled(rename = "Latitude")]
    pub latitude: String,
    #[serde(rename = "Longitude")]
    #[tabled(rename = "Longitude")]
    pub longitude: String,
    #[serde(rename = "NormalizedDelay")]
    #[tabled(rename = "NormalizedDelay")]
    pub normalized_delay: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct CountryDelayRow {
    #[serde(rename = "Country")]
    #[tabled(rename = "Country")]
    pub country: String,
    #[serde(rename = "Shipments")]
    #[tabled(rename = "Shipments")]
    pub shipments: String,
    #[serde(rename = "AvgDelay")]
    #[tabled(rename = "AvgDelay")]
    pub avg_delay: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct ChoroplethRow {
    #[serde(rename = "Country")]
    #[tabled(rename = "Country")]
    pub country: String,
    #[serde(rename = "AvgDelay")]
    #[tabled(rename = "AvgDelay")]
    pub avg_delay: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct ModeDelayRow {
    #[serde(rename = "ShippingMode")]
    #[tabled(rename = "ShippingMode")]
    pub shipping_mode: String,
    #[serde(rename = "Low")]
    #[tabled(rename = "Low")]
    pub low: String,
    #[serde(rename = "Medium")]
    #[tabled(rename = "Medium")]
    pub medium: String,
    #[serde(rename = "High")]
    #[tabled(rename = "High")]
    pub high: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct TrendRow {
    #[serde(rename = "ShippingMonth")]
    #[tabled(rename = "ShippingMonth")]
    pub month: String,
    #[serde(rename = "Shipments")]
    #[tabled(rename = "Shipments")]
    pub shipments: String,
    #[serde(rename = "AvgDelay")]
    #[tabled(rename = "AvgDelay")]
    pub avg_delay: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct TreemapRow {
    #[serde(rename = "Category")]
    #[tabled(rename = "Category")]
    pub category: String,
    #[serde(rename = "Product")]
    #[tabled(rename = "Product")]
    pub product: String,
    #[serde(rename = "TotalSales")]
    #[tabled(rename = "TotalSales")]
    pub total_sales: String,
    #[serde(rename = "AvgDelay")]
    #[tabled(rename = "AvgDelay")]
    pub avg_delay: String,
    #[serde(rename = "Shipments")]
    #[tabled(rename = "Shipments")]
    pub shipments: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct TopProductRow {
    #[serde(rename = "Rank")]
    #[tabled(rename = "Rank")]
    pub rank: usize,
    #[serde(rename = "Product")]
    #[tabled(rename = "Product")]
    pub product: String,
    #[serde(rename = "AvgDelay")]
    #[tabled(rename = "AvgDelay")]
    pub avg_delay: String,
    #[serde(rename = "Shipments")]
    #[tabled(rename = "Shipments")]
    pub shipments: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct DeptCategoryRow {
    #[serde(rename = "Department")]
    #[tabled(rename = "Department")]
    pub department: String,
    #[serde(rename = "Category")]
    #[tabled(rename = "Category")]
    pub category: String,
    #[serde(rename = "Orders")]
    #[tabled(rename = "Orders")]
    pub orders: String,
    #[serde(rename = "TotalDelay")]
    #[tabled(rename = "TotalDelay")]
    pub total_delay: String,
    #[serde(rename = "AvgDelay")]
    #[tabled(rename = "AvgDelay")]
    pub avg_delay: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct SegmentBubbleRow {
    #[serde(rename = "CustomerSegment")]
    #[tabled(rename = "CustomerSegment")]
    pub segment: String,
    #[serde(rename = "AvgDelayRatio")]
    #[tabled(rename = "AvgDelayRatio")]
    pub avg_delay_ratio: String,
    #[serde(rename = "AvgProfitMargin")]
    #[tabled(rename = "AvgProfitMargin")]
    pub avg_profit_margin: String,
    #[serde(rename = "TotalSales")]
    #[tabled(rename = "TotalSales")]
    pub total_sales: String,
    #[serde(rename = "BubbleSize")]
    #[tabled(rename = "BubbleSize")]
    pub bubble_size: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct SegmentTypeRow {
    #[serde(rename = "CustomerSegment")]
    #[tabled(rename = "CustomerSegment")]
    pub segment: String,
    #[serde(rename = "Type")]
    #[tabled(rename = "Type")]
    pub transaction_type: String,
    #[serde(rename = "Orders")]
    #[tabled(rename = "Orders")]
    pub orders: String,
    #[serde(rename = "AvgDelay")]
    #[tabled(rename = "AvgDelay")]
    pub avg_delay: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct CorrelationRow {
    #[serde(rename = "FinancialMetric")]
    #[tabled(rename = "FinancialMetric")]
    pub financial_metric: String,
    #[serde(rename = "CorrShippingDelay")]
    #[tabled(rename = "CorrShippingDelay")]
    pub corr_shipping_delay: String,
    #[serde(rename = "InterpretationDelay")]
    #[tabled(rename = "InterpretationDelay")]
    pub interpretation_delay: String,
    #[serde(rename = "CorrDaysReal")]
    #[tabled(rename = "CorrDaysReal")]
    pub corr_days_real: String,
    #[serde(rename = "InterpretationDaysReal")]
    #[tabled(rename = "InterpretationDaysReal")]
    pub interpretation_days_real: String,
}
