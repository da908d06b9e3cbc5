use comfy_table::{
    presets::UTF8_FULL, Attribute, Cell, CellAlignment, Color as TColor, ContentArrangement,
    Table,
};

use crate::format::{format_forecast, format_grouped};
use crate::schema::{CalculationRow, ForecastInputs, InputSet};

/// Rows whose baseline follows the input set's average, with their offsets.
pub const LINKED_ROWS: [(usize, f64); 5] = [(5, -4.0), (6, -2.0), (7, 0.0), (8, 2.0), (9, 4.0)];

/// Conventional range of the sensitivity slider. Values outside it are still applied.
pub const SENSITIVITY_RANGE: (f64, f64) = (-10.0, 10.0);

/// Projected cumulative tweet count at the end of the window.
///
/// `total_tweet` is the count already produced; the remaining window is
/// converted to days and weighted by `average`. The result is not rounded.
pub fn forecast(average: f64, remaining_days: f64, remaining_hours: f64, total_tweet: f64) -> f64 {
    total_tweet + average * (remaining_days + remaining_hours / 24.0)
}

/// Offset applied to the row at `index`, if it is a linked row.
pub fn linked_offset(index: usize) -> Option<f64> {
    LINKED_ROWS
        .iter()
        .find(|(i, _)| *i == index)
        .map(|(_, offset)| *offset)
}

/// Display label of a linked offset ("AVG" for the unshifted row).
pub fn offset_label(offset: f64) -> String {
    if offset == 0.0 {
        "AVG".to_string()
    } else {
        format!("{offset:+}")
    }
}

/// A calculation row with its derived values.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRow {
    pub index: usize,
    pub linked: Option<f64>,
    pub baseline: f64,
    pub effective_average: f64,
    pub forecast: f64,
}

impl ResolvedRow {
    pub fn label(&self) -> Option<String> {
        self.linked.map(offset_label)
    }
}

pub fn resolve_row(index: usize, row: &CalculationRow, inputs: &ForecastInputs) -> ResolvedRow {
    let linked = linked_offset(index);
    // A linked row ignores its stored average without overwriting it.
    let baseline = match linked {
        Some(offset) => inputs.average + offset,
        None => row.avg_daily_tweet,
    };
    let effective_average = baseline + inputs.sensitivity;

    ResolvedRow {
        index,
        linked,
        baseline,
        effective_average,
        forecast: forecast(
            effective_average,
            inputs.remaining_days,
            inputs.remaining_hours,
            inputs.total_tweet,
        ),
    }
}

pub fn resolve_rows(rows: &[CalculationRow], inputs: &ForecastInputs) -> Vec<ResolvedRow> {
    rows.iter()
        .enumerate()
        .map(|(i, row)| resolve_row(i, row, inputs))
        .collect()
}

// Print the parameters of one input set followed by its forecast table
pub fn print_forecast(set: InputSet, inputs: &ForecastInputs, rows: &[CalculationRow]) {
    println!(
        "Set {set} | total {} | average {} | elapsed {} | remaining {}d {}h | sensitivity {:+}",
        format_grouped(inputs.total_tweet, 0),
        inputs.average,
        inputs.elapsed,
        inputs.remaining_days,
        inputs.remaining_hours,
        inputs.sensitivity
    );

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(100)
        .set_header(vec![
            Cell::new("#").add_attribute(Attribute::Bold),
            Cell::new("Link").add_attribute(Attribute::Bold),
            Cell::new("Daily Avg").add_attribute(Attribute::Bold),
            Cell::new("Forecast").add_attribute(Attribute::Bold),
            Cell::new("Group").add_attribute(Attribute::Bold),
            Cell::new("Mark").add_attribute(Attribute::Bold),
        ]);

    for (resolved, row) in resolve_rows(rows, inputs).iter().zip(rows) {
        let link_cell = match resolved.label() {
            Some(label) => Cell::new(label).fg(TColor::Blue),
            None => Cell::new(""),
        };
        table.add_row(vec![
            Cell::new(resolved.index),
            link_cell,
            average_cell(resolved),
            forecast_cell(resolved, inputs),
            Cell::new(&row.group),
            Cell::new(&row.mark),
        ]);
    }

    println!("{table}");
}

fn average_cell(resolved: &ResolvedRow) -> Cell {
    Cell::new(format!("{:.2}", resolved.effective_average)).set_alignment(CellAlignment::Right)
}

// Forecasts below the count already reached are shown in red.
fn forecast_cell(resolved: &ResolvedRow, inputs: &ForecastInputs) -> Cell {
    let cell = Cell::new(format_forecast(resolved.forecast)).set_alignment(CellAlignment::Right);
    if resolved.forecast >= inputs.total_tweet {
        cell
    } else {
        cell.fg(TColor::Red)
    }
}

/// Resolves every row against both input sets, paired by row index.
pub fn compare_rows(
    rows: &[CalculationRow],
    a: &ForecastInputs,
    b: &ForecastInputs,
) -> Vec<(ResolvedRow, ResolvedRow)> {
    resolve_rows(rows, a)
        .into_iter()
        .zip(resolve_rows(rows, b))
        .collect()
}

/// Prints input sets A and B side by side over the same calculation rows.
pub fn print_comparison(a: &ForecastInputs, b: &ForecastInputs, rows: &[CalculationRow]) {
    for (set, inputs) in [(InputSet::A, a), (InputSet::B, b)] {
        println!(
            "Set {set} | total {} | average {} | remaining {}d {}h | sensitivity {:+}",
            format_grouped(inputs.total_tweet, 0),
            inputs.average,
            inputs.remaining_days,
            inputs.remaining_hours,
            inputs.sensitivity
        );
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120)
        .set_header(
            ["#", "Link", "A Avg", "A Forecast", "B Avg", "B Forecast", "Group", "Mark"]
                .map(|h| Cell::new(h).add_attribute(Attribute::Bold)),
        );

    for ((ra, rb), row) in compare_rows(rows, a, b).iter().zip(rows) {
        table.add_row(vec![
            Cell::new(ra.index),
            Cell::new(ra.label().unwrap_or_default()).fg(TColor::Blue),
            average_cell(ra),
            forecast_cell(ra, a),
            average_cell(rb),
            forecast_cell(rb, b),
            Cell::new(&row.group),
            Cell::new(&row.mark),
        ]);
    }

    println!("{table}");
}
