//! Reference data shared by the map views: the raw-to-canonical country name
//! translation table and the world boundary geometry.
//!
//! Both are loaded once and then passed by reference into whichever view
//! needs them. The translation file is required at startup; the boundary
//! fetch may fail, in which case only the choropleth table degrades and an
//! explicit reload can be requested from the menu.

use crate::metrics::CountryAggregate;
use crate::types::{ChoroplethRow, CountryDelayRow};
use crate::util::{format_int, format_number};
use anyhow::{Context, Result};
use log::info;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Mapping from the raw country labels in the dataset (mostly Spanish) to
/// the canonical English names the boundary data uses.
#[derive(Debug, Clone)]
pub struct CountryTranslation {
    map: HashMap<String, String>,
}

impl CountryTranslation {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).with_context(|| {
            format!(
                "country translation file {} not found; country views need it",
                path.display()
            )
        })?;
        let map: HashMap<String, String> = serde_json::from_str(&raw)
            .with_context(|| format!("{} is not a JSON string-to-string map", path.display()))?;
        info!("loaded {} country translations", map.len());
        Ok(Self { map })
    }

    pub fn from_map(map: HashMap<String, String>) -> Self {
        Self { map }
    }

    /// Unmapped names pass through unchanged.
    pub fn translate<'a>(&'a self, raw: &'a str) -> &'a str {
        self.map.get(raw).map(String::as_str).unwrap_or(raw)
    }
}

/// Country names extracted from the boundary GeoJSON, in feature order.
#[derive(Debug, Clone)]
pub struct WorldBoundaries {
    countries: Vec<String>,
}

impl WorldBoundaries {
    /// Blocking fetch of the boundary GeoJSON. Runs at most once per session
    /// unless the user asks for a reload.
    pub fn fetch(url: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build HTTP client")?;
        let body: Value = client
            .get(url)
            .send()
            .and_then(|resp| resp.error_for_status())
            .with_context(|| format!("failed to fetch boundary data from {}", url))?
            .json()
            .context("boundary data is not valid JSON")?;
        Self::from_geojson(&body)
    }

    pub fn from_geojson(body: &Value) -> Result<Self> {
        let features = body
            .get("features")
            .and_then(Value::as_array)
            .context("boundary data has no features array")?;
        let countries: Vec<String> = features
            .iter()
            .filter_map(|f| f.pointer("/properties/name"))
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();
        info!("loaded {} boundary features", countries.len());
        Ok(Self { countries })
    }

    pub fn len(&self) -> usize {
        self.countries.len()
    }

    /// Join the per-country delay averages onto the boundary features: one
    /// row per feature, "No data" where no shipments matched that country.
    pub fn choropleth_rows(&self, aggregates: &[CountryAggregate]) -> Vec<ChoroplethRow> {
        let by_country: HashMap<&str, f64> = aggregates
            .iter()
            .map(|a| (a.country.as_str(), a.avg_delay))
            .collect();
        self.countries
            .iter()
            .map(|name| ChoroplethRow {
                country: name.clone(),
                avg_delay: match by_country.get(name.as_str()) {
                    Some(delay) => format!("{} days", format_number(*delay, 2)),
                    None => "No data".to_string(),
                },
            })
            .collect()
    }
}

pub fn country_rows(aggregates: &[CountryAggregate]) -> Vec<CountryDelayRow> {
    aggregates
        .iter()
        .map(|a| CountryDelayRow {
            country: a.country.clone(),
            shipments: format_int(a.shipments),
            avg_delay: format_number(a.avg_delay, 2),
        })
        .collect()
}
