//! Conjunctive categorical + year filtering over the loaded records.
//!
//! A `FilterSet` mirrors the sidebar of the dashboard: one selection per
//! categorical field plus a year selection over the shipping date. Applying
//! it never mutates the input; it produces a fresh filtered copy.
//!
//! Convention: an empty `Only` set behaves exactly like `All`. The sidebar
//! defaults every control to "everything selected", so a cleared control
//! means "no restriction", not "match nothing".

use crate::types::ShipmentRecord;
use chrono::Datelike;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// The categorical fields a user can filter on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FilterField {
    TransactionType,
    Category,
    Department,
    Market,
    OrderRegion,
    ProductName,
    ShippingMode,
    CustomerSegment,
}

pub const ALL_FIELDS: &[FilterField] = &[
    FilterField::TransactionType,
    FilterField::Category,
    FilterField::Department,
    FilterField::Market,
    FilterField::OrderRegion,
    FilterField::ProductName,
    FilterField::ShippingMode,
    FilterField::CustomerSegment,
];

impl FilterField {
    /// The column label shown to the user, matching the source headers.
    pub fn label(&self) -> &'static str {
        match self {
            FilterField::TransactionType => "Type",
            FilterField::Category => "Category Name",
            FilterField::Department => "Department Name",
            FilterField::Market => "Market",
            FilterField::OrderRegion => "Order Region",
            FilterField::ProductName => "Product Name",
            FilterField::ShippingMode => "Shipping Mode",
            FilterField::CustomerSegment => "Customer Segment",
        }
    }

    pub fn value_of<'a>(&self, r: &'a ShipmentRecord) -> &'a str {
        match self {
            FilterField::TransactionType => &r.transaction_type,
            FilterField::Category => &r.category,
            FilterField::Department => &r.department,
            FilterField::Market => &r.market,
            FilterField::OrderRegion => &r.order_region,
            FilterField::ProductName => &r.product_name,
            FilterField::ShippingMode => &r.shipping_mode,
            FilterField::CustomerSegment => &r.customer_segment,
        }
    }
}

impl fmt::Display for FilterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Accepted values for one field: everything, or only the listed values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    All,
    Only(BTreeSet<String>),
}

impl Selection {
    fn accepts(&self, value: &str) -> bool {
        match self {
            Selection::All => true,
            // An empty explicit set means "no restriction" (see module docs).
            Selection::Only(set) if set.is_empty() => true,
            Selection::Only(set) => set.contains(value),
        }
    }

    pub fn is_all(&self) -> bool {
        match self {
            Selection::All => true,
            Selection::Only(set) => set.is_empty(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    fields: BTreeMap<FilterField, Selection>,
    years: Option<BTreeSet<i32>>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, field: FilterField, selection: Selection) {
        if selection.is_all() {
            self.fields.remove(&field);
        } else {
            self.fields.insert(field, selection);
        }
    }

    pub fn set_years(&mut self, years: Option<BTreeSet<i32>>) {
        self.years = match years {
            Some(set) if set.is_empty() => None,
            other => other,
        };
    }

    pub fn clear(&mut self) {
        self.fields.clear();
        self.years = None;
    }

    pub fn matches(&self, r: &ShipmentRecord) -> bool {
        if let Some(years) = &self.years {
            // A restricted year selection drops undated records.
            match r.shipping_date {
                Some(d) => {
                    if !years.contains(&d.year()) {
                        return false;
                    }
                }
                None => return false,
            }
        }
        self.fields
            .iter()
            .all(|(field, sel)| sel.accepts(field.value_of(r)))
    }

    /// Produce a filtered copy of `records`. The input is left untouched;
    /// every view recomputes from the full table on each interaction.
    pub fn apply(&self, records: &[ShipmentRecord]) -> Vec<ShipmentRecord> {
        records.iter().filter(|r| self.matches(r)).cloned().collect()
    }

    /// Human-readable summary for the console, e.g.
    /// `Market in {Europe, LATAM}; Years in {2017}`.
    pub fn describe(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        for (field, sel) in &self.fields {
            if let Selection::Only(set) = sel {
                let values: Vec<&str> = set.iter().map(String::as_str).collect();
                parts.push(format!("{} in {{{}}}", field, values.join(", ")));
            }
        }
        if let Some(years) = &self.years {
            let values: Vec<String> = years.iter().map(|y| y.to_string()).collect();
            parts.push(format!("Years in {{{}}}", values.join(", ")));
        }
        if parts.is_empty() {
            "none (all records)".to_string()
        } else {
            parts.join("; ")
        }
    }
}

/// Distinct values of a field, sorted, for building the selection prompt.
pub fn distinct_values(records: &[ShipmentRecord], field: FilterField) -> Vec<String> {
    let set: BTreeSet<&str> = records.iter().map(|r| field.value_of(r)).collect();
    set.into_iter().map(str::to_string).collect()
}

/// Distinct shipping-date years, sorted. Undated records contribute nothing.
pub fn available_years(records: &[ShipmentRecord]) -> Vec<i32> {
    let set: BTreeSet<i32> = records
        .iter()
        .filter_map(|r| r.shipping_date.map(|d| d.year()))
        .collect();
    set.into_iter().collect()
}
