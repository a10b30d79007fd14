use crate::components::sprinkler_head::planning::registry::{Category, DwellError, Point};
use crate::utils::time::Timestamp;
use serde::{Deserialize, Serialize};
use std::{fs::File, io, path::Path};
use thiserror::Error;

/// Litres of water delivered per second of dwell, measured on the
/// installed head and nozzle.
pub const FLOW_RATE: f64 = 0.0166;

/// Column headings of the exported record set, in order.
pub const RECORD_COLUMNS: [&str; 8] = [
    "index",
    "distance",
    "degree_left",
    "degree_right",
    "category",
    "duration",
    "mark_time",
    "run_time",
];

/// Failures summarising or saving a run.
#[derive(Error, Debug)]
pub enum ReportError {
    /// A point carries a dwell that is not a number of seconds.
    #[error("point {index} has an invalid duration")]
    InvalidDuration {
        index: usize,
        #[source]
        source: DwellError,
    },
    #[error("failed to write records")]
    Csv(#[from] csv::Error),
    #[error("failed to write records")]
    Io(#[from] io::Error),
}

/// Exported form of a [`Point`]. The plan position and the out of
/// range flag only matter while placing targets and are left out.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SessionRecord {
    pub index: usize,
    pub distance: f64,
    pub degree_left: f64,
    pub degree_right: f64,
    pub category: Category,
    pub duration: String,
    pub mark_time: Timestamp,
    pub run_time: Timestamp,
}

/// Round to two decimal places for display and export.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Seconds of dwell for every point, failing on the first point whose
/// dwell cannot be read.
fn dwell_seconds(points: &[Point]) -> impl Iterator<Item = Result<f64, ReportError>> + '_ {
    points.iter().map(|point| {
        point
            .duration
            .seconds()
            .map_err(|source| ReportError::InvalidDuration {
                index: point.index,
                source,
            })
    })
}

/// Total dwell of the run in seconds.
pub fn total_time(points: &[Point]) -> Result<f64, ReportError> {
    dwell_seconds(points).sum()
}

/// Estimated litres used for a given total dwell.
pub fn water_use(total_time: f64) -> f64 {
    total_time * FLOW_RATE
}

/// Estimated litres used by the run.
pub fn total_water_use(points: &[Point]) -> Result<f64, ReportError> {
    total_time(points).map(water_use)
}

/// Records for every point in registry order. Fails if any dwell is
/// not a valid number, an empty run gives an empty set.
pub fn export_record(points: &[Point]) -> Result<Vec<SessionRecord>, ReportError> {
    points
        .iter()
        .zip(dwell_seconds(points))
        .map(|(point, seconds)| {
            seconds?;
            Ok(SessionRecord {
                index: point.index,
                distance: round2(point.distance),
                degree_left: round2(point.degree_left),
                degree_right: round2(point.degree_right),
                category: point.category,
                duration: point.duration.to_string(),
                mark_time: point.mark_time,
                run_time: point.run_time,
            })
        })
        .collect()
}

/// Write `records` as CSV with a header row.
pub fn write_csv<W: io::Write>(records: &[SessionRecord], writer: W) -> Result<(), ReportError> {
    let mut writer = csv::Writer::from_writer(writer);
    // The header comes from the first serialised record, so an empty
    // run needs it written by hand.
    if records.is_empty() {
        writer.write_record(RECORD_COLUMNS)?;
    }
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Export the run to a CSV file at `path`, replacing any previous
/// file. Returns the number of records written.
pub fn save<P: AsRef<Path>>(points: &[Point], path: P) -> Result<usize, ReportError> {
    let records = export_record(points)?;
    write_csv(&records, File::create(path)?)?;
    Ok(records.len())
}

/// Markdown table of the run, newest point first, followed by the
/// totals. This is what the operator sees after each change.
pub fn render_table(points: &[Point]) -> Result<String, ReportError> {
    let records = export_record(points)?;
    let total = total_time(points)?;

    let rows: Vec<[String; 8]> = records
        .iter()
        .rev()
        .map(|record| {
            [
                record.index.to_string(),
                record.distance.to_string(),
                record.degree_left.to_string(),
                record.degree_right.to_string(),
                record.category.to_string(),
                record.duration.clone(),
                record.mark_time.to_string(),
                record.run_time.to_string(),
            ]
        })
        .collect();

    let mut widths = RECORD_COLUMNS.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let header = RECORD_COLUMNS
        .iter()
        .zip(widths)
        .map(|(name, width)| format!("{name:<width$}"));
    let mut lines = vec![
        table_row(header),
        table_row(widths.map(|width| "-".repeat(width))),
    ];
    lines.extend(rows.iter().map(|row| {
        table_row(
            row.iter()
                .zip(widths)
                .map(|(cell, width)| format!("{cell:<width$}")),
        )
    }));
    lines.push(String::new());
    lines.push(summary(total));

    let mut table = lines.join("\n");
    table.push('\n');
    Ok(table)
}

fn table_row<I: IntoIterator<Item = String>>(cells: I) -> String {
    let mut out = String::from("|");
    for cell in cells {
        out.push(' ');
        out.push_str(&cell);
        out.push_str(" |");
    }
    out
}

/// One line summary of the totals.
pub fn summary(total_time: f64) -> String {
    format!(
        "Total time: {total_time} sec | Total water use: {:.2} litre",
        water_use(total_time)
    )
}
