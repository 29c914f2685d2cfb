// Entry point and high-level CLI flow.
//
// The binary replaces the original multi-page web dashboard with a console
// menu: each menu entry corresponds to one dashboard page and prints the
// tables that page charted, then exports them as CSV/JSON. The loaded table
// lives in process-wide state for the session; every view re-applies the
// current filters and recomputes its aggregates from scratch.
mod correlate;
mod filter;
mod loader;
mod metrics;
mod output;
mod reference;
mod types;
mod util;

use anyhow::Result;
use clap::Parser;
use filter::{FilterSet, Selection, ALL_FIELDS};
use loader::LoadReport;
use log::warn;
use once_cell::sync::Lazy;
use reference::{CountryTranslation, WorldBoundaries};
use std::collections::BTreeSet;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Mutex;
use types::ShipmentRecord;

const DEFAULT_BOUNDARIES_URL: &str =
    "https://raw.githubusercontent.com/johan/world.geo.json/master/countries.geo.json";

/// How many distinct values to list inline in a filter prompt before we
/// only show the count.
const PROMPT_VALUE_LIMIT: usize = 20;

#[derive(Parser)]
#[command(
    name = "shipdash",
    version,
    about = "Supply chain shipment delay dashboard"
)]
struct Cli {
    /// Shipment CSV to analyze (Latin-1 or UTF-8 encoded)
    #[arg(long, default_value = "DataCoSupplyChainDataset.csv")]
    data: PathBuf,

    /// JSON map from raw country labels to canonical names
    #[arg(long, default_value = "country_translation.json")]
    translation: PathBuf,

    /// Endpoint serving the world boundary GeoJSON
    #[arg(long, default_value = DEFAULT_BOUNDARIES_URL)]
    boundaries_url: String,

    /// Skip the boundary fetch; the choropleth table is not produced
    #[arg(long)]
    offline: bool,
}

// Session state: the table is loaded once, filters and boundary data stick
// around between menu interactions.
static APP_STATE: Lazy<Mutex<AppState>> = Lazy::new(|| {
    Mutex::new(AppState {
        data: None,
        filters: FilterSet::new(),
        boundaries: None,
    })
});

struct AppState {
    data: Option<LoadedData>,
    filters: FilterSet,
    boundaries: Option<WorldBoundaries>,
}

struct LoadedData {
    records: Vec<ShipmentRecord>,
    report: LoadReport,
}

/// Read a single line of input after printing the common "Enter choice:" prompt.
fn read_choice() -> String {
    print!("Enter choice: ");
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

/// Prompt for a comma-separated list; an empty answer means "everything".
fn read_values(prompt: &str) -> Vec<String> {
    print!("{}", prompt);
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Handle option [1]: load and clean the shipment CSV.
///
/// On success the records are stored in `APP_STATE` and the filters are
/// reset, since selections made against a previous file may not exist in
/// the new one.
fn handle_load(cli: &Cli) {
    match loader::load(&cli.data) {
        Ok((records, report)) => {
            println!(
                "Processing dataset... ({} rows read, {} kept)",
                util::format_int(report.total_rows as i64),
                util::format_int(report.kept_rows as i64)
            );
            if report.parse_errors > 0 {
                println!(
                    "Note: {} rows skipped due to parse errors.",
                    util::format_int(report.parse_errors as i64)
                );
            }
            if report.missing_dates > 0 {
                println!(
                    "Note: {} rows have no usable shipping date.",
                    util::format_int(report.missing_dates as i64)
                );
            }
            println!("");
            let mut state = APP_STATE.lock().unwrap();
            state.data = Some(LoadedData { records, report });
            state.filters.clear();
        }
        Err(e) => {
            eprintln!("Failed to load file: {:#}\n", e);
        }
    }
}

/// The current filtered view plus the file headers, or `None` (with the
/// standard warning printed) when no file has been loaded yet.
fn filtered_view() -> Option<(Vec<ShipmentRecord>, Vec<String>, String)> {
    let state = APP_STATE.lock().unwrap();
    let Some(loaded) = &state.data else {
        println!("Warning: no data loaded. Please load the CSV file first (option 1).\n");
        return None;
    };
    let view = state.filters.apply(&loaded.records);
    Some((view, loaded.report.headers.clone(), state.filters.describe()))
}

/// Handle option [2]: interactively rebuild the filter set, one field at a
/// time plus the shipping-year selection. Empty input keeps everything,
/// matching the "all selected" default of the original sidebar.
fn handle_filters() {
    let (records, filters) = {
        let state = APP_STATE.lock().unwrap();
        let Some(loaded) = &state.data else {
            println!("Warning: no data loaded. Please load the CSV file first (option 1).\n");
            return;
        };
        (loaded.records.clone(), state.filters.clone())
    };
    let mut filters = filters;

    let years = filter::available_years(&records);
    let year_labels: Vec<String> = years.iter().map(|y| y.to_string()).collect();
    println!("Available years: {}", year_labels.join(", "));
    let chosen = read_values("Select years (comma-separated, empty = all): ");
    let mut year_set: BTreeSet<i32> = BTreeSet::new();
    for c in &chosen {
        match c.parse::<i32>() {
            Ok(y) if years.contains(&y) => {
                year_set.insert(y);
            }
            _ => println!("Ignoring unknown year: {}", c),
        }
    }
    filters.set_years((!year_set.is_empty()).then_some(year_set));

    for field in ALL_FIELDS {
        let values = filter::distinct_values(&records, *field);
        if values.len() <= PROMPT_VALUE_LIMIT {
            println!("{} values: {}", field.label(), values.join(", "));
        } else {
            println!(
                "{}: {} distinct values",
                field.label(),
                util::format_int(values.len() as i64)
            );
        }
        let chosen = read_values(&format!(
            "Select {} (comma-separated, empty = all): ",
            field.label()
        ));
        let mut set = BTreeSet::new();
        for c in chosen {
            if values.contains(&c) {
                set.insert(c);
            } else {
                println!("Ignoring unknown value: {}", c);
            }
        }
        filters.set(*field, Selection::Only(set));
    }

    println!("\nActive filters: {}\n", filters.describe());
    APP_STATE.lock().unwrap().filters = filters;
}

/// Boundary data, fetched on first use and cached until an explicit reload.
fn boundaries(cli: &Cli) -> Option<WorldBoundaries> {
    if cli.offline {
        return None;
    }
    let mut state = APP_STATE.lock().unwrap();
    if state.boundaries.is_none() {
        match WorldBoundaries::fetch(&cli.boundaries_url) {
            Ok(b) => state.boundaries = Some(b),
            Err(e) => {
                warn!("boundary fetch failed: {:#}", e);
                println!("Warning: could not fetch boundary data; the country map table is skipped.");
            }
        }
    }
    state.boundaries.clone()
}

fn print_section(title: &str) {
    println!("--- {} ---", title);
}

/// Preview and export one report table, or warn when the selection left it
/// empty. A single empty table never suppresses the rest of the view.
fn emit<T>(title: &str, file: &str, rows: &[T], preview: usize)
where
    T: serde::Serialize + tabled::Tabled + Clone,
{
    print_section(title);
    if rows.is_empty() {
        println!("Warning: no data for the selected filters; table skipped.\n");
        return;
    }
    output::preview_table_rows(rows, preview);
    if let Err(e) = output::write_csv(file, rows) {
        eprintln!("Write error: {:#}", e);
    }
    println!("(Full table exported to {})\n", file);
}

/// Handle option [3]: the "Region & Mode" page. Delivery-point heatmap
/// weights, per-country averages joined onto the boundary data, delay
/// counts per shipping mode, and the monthly delay trend.
fn handle_region_mode(cli: &Cli, translation: &CountryTranslation) {
    let Some((view, _, active)) = filtered_view() else { return };
    println!("Dashboard: Delivery Delays by Region & Mode");
    println!("Filters: {}\n", active);
    if view.is_empty() {
        println!("Warning: the current filters match no records.\n");
        return;
    }

    let points = metrics::heatmap_points(&view);
    emit(
        "Heatmap of delivery delays (inbound logistics)",
        "heatmap_points.csv",
        &metrics::heatmap_rows(&points),
        5,
    );

    let countries = metrics::country_aggregates(&view, translation);
    emit(
        "Average delivery delay by country (outbound logistics)",
        "country_delays.csv",
        &reference::country_rows(&countries),
        5,
    );

    if let Some(bounds) = boundaries(cli) {
        emit(
            "Country map join (choropleth)",
            "choropleth.csv",
            &bounds.choropleth_rows(&countries),
            5,
        );
    }

    emit(
        "Delay count by shipping mode",
        "mode_delay_counts.csv",
        &metrics::mode_rows(&metrics::mode_delay_counts(&view)),
        10,
    );

    emit(
        "Average delay trend over time",
        "delay_trend.csv",
        &metrics::trend_rows(&metrics::monthly_trend(&view)),
        6,
    );
}

/// Handle option [4]: the "Product Categories & Delays" page. Treemap
/// input (sales-sized, delay-colored), the five most delayed products, and
/// the department/category delay rollup.
fn handle_categories() {
    let Some((view, _, active)) = filtered_view() else { return };
    println!("Dashboard: Product Categories & Delays");
    println!("Filters: {}\n", active);
    if view.is_empty() {
        println!("Warning: the current filters match no records.\n");
        return;
    }

    emit(
        "Delay ratio by category & product (treemap input)",
        "treemap_rows.csv",
        &metrics::treemap_rows(&metrics::treemap_aggregates(&view)),
        8,
    );

    emit(
        "Top 5 products with highest delays",
        "top_delayed_products.csv",
        &metrics::top_product_rows(&metrics::top_delayed_products(&view, 5)),
        5,
    );

    emit(
        "Delay totals by department & category",
        "dept_category_delays.csv",
        &metrics::dept_category_rows(&metrics::dept_category_delays(&view)),
        8,
    );
}

/// Handle option [5]: the "Shipping Delays & Profitability" page. Segment
/// bubbles, segment-by-transaction-type delays, and the correlation KPI.
fn handle_profitability() {
    let Some((view, headers, active)) = filtered_view() else { return };
    println!("Dashboard: Impact of Shipping Delays on Profitability and Sales");
    println!("Filters: {}\n", active);
    if view.is_empty() {
        println!("Warning: the current filters match no records.\n");
        return;
    }

    emit(
        "Profit margin vs. delay ratio by customer segment",
        "segment_bubbles.csv",
        &metrics::segment_rows(&metrics::segment_aggregates(&view)),
        5,
    );

    emit(
        "Average delay by customer segment & payment type",
        "segment_type_delays.csv",
        &metrics::segment_type_rows(&metrics::segment_type_delays(&view)),
        8,
    );

    print_section("Correlation between shipping delays and profitability");
    let missing = correlate::missing_columns(&headers);
    if !missing.is_empty() {
        println!(
            "Warning: required columns missing: {}. Correlation analysis skipped.\n",
            missing.join(", ")
        );
        return;
    }
    let report = correlate::correlation_report(&view);
    if report.rows_used == 0 {
        println!("Warning: no rows with a complete measure set; correlation analysis skipped.\n");
        return;
    }
    println!(
        "Computed over {} complete rows.\n",
        util::format_int(report.rows_used as i64)
    );
    let rows = correlate::correlation_rows(&report);
    output::preview_table_rows(&rows, rows.len());
    if let Err(e) = output::write_csv("correlation.csv", &rows) {
        eprintln!("Write error: {:#}", e);
    }

    if let Some(s) = &report.strongest {
        println!(
            "Strongest relationship: {} vs {} (r = {:.2}%)",
            s.delay_measure,
            s.financial_measure,
            s.r * 100.0
        );
        println!(
            "  mean {} at lowest {}: {}",
            s.financial_measure,
            s.delay_measure,
            util::format_number(s.mean_at_min_delay, 2)
        );
        println!(
            "  mean {} at highest {}: {}",
            s.financial_measure,
            s.delay_measure,
            util::format_number(s.mean_at_max_delay, 2)
        );
        match s.pct_change {
            Some(pct) => println!("  change: {}%", util::format_number(pct, 2)),
            None => println!("  change: undefined (baseline mean is zero)"),
        }
    }
    if let Err(e) = output::write_json("correlation_summary.json", &report) {
        eprintln!("Write error: {:#}", e);
    }
    println!("(Correlation table exported to correlation.csv, summary to correlation_summary.json)\n");
}

/// Handle option [6]: drop the cached boundary data and fetch it again.
fn handle_reload_boundaries(cli: &Cli) {
    if cli.offline {
        println!("Running offline; boundary data is disabled.\n");
        return;
    }
    APP_STATE.lock().unwrap().boundaries = None;
    match boundaries(cli) {
        Some(b) => println!("Boundary data reloaded ({} features).\n", b.len()),
        None => println!(""),
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    // The translation table is required for every country-level view, so a
    // missing file is fatal at startup rather than a per-view surprise.
    let translation = CountryTranslation::load(&cli.translation)?;

    loop {
        println!("Supply Chain Shipments - Delays");
        println!("[1] Load the CSV file");
        println!("[2] Set filters");
        println!("[3] Region & Mode dashboard");
        println!("[4] Product Categories & Delays dashboard");
        println!("[5] Shipping Delays & Profitability dashboard");
        println!("[6] Reload boundary data");
        println!("[q] Quit\n");
        match read_choice().as_str() {
            "1" => handle_load(&cli),
            "2" => handle_filters(),
            "3" => handle_region_mode(&cli, &translation),
            "4" => handle_categories(),
            "5" => handle_profitability(),
            "6" => handle_reload_boundaries(&cli),
            "q" | "Q" => {
                println!("Exiting the program.");
                break;
            }
            _ => {
                println!("Invalid choice. Please enter 1-6 or q.\n");
            }
        }
    }
    Ok(())
}
