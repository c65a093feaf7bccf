//! Continuous glucose monitor (Dexcom) series construction.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::csv_table::CsvRow;
use crate::wall_clock::{hour_of_day, parse_wall_clock};

/// Leading rows of every Dexcom export that hold device and patient metadata.
pub const DEXCOM_PREAMBLE_ROWS: usize = 12;

pub const INDEX_COLUMN: &str = "Index";
pub const TIMESTAMP_COLUMN: &str = "Timestamp (YYYY-MM-DDThh:mm:ss)";
pub const GLUCOSE_COLUMN: &str = "Glucose Value (mg/dL)";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GlucoseReading {
    /// `None` when the source timestamp did not parse. Such readings are kept.
    pub timestamp: Option<NaiveDateTime>,
    /// mg/dL; `NaN` when the source value was not numeric.
    pub glucose_mg_dl: f64,
    /// Remaining source columns (event type, device, ...), `Index` excluded.
    pub extra: CsvRow,
}

impl GlucoseReading {
    pub fn hour_of_day(&self) -> f64 {
        hour_of_day(self.timestamp.as_ref())
    }

    pub fn has_valid_timestamp(&self) -> bool {
        self.timestamp.is_some()
    }
}

/// Numeric coercion of a raw glucose cell.
///
/// Whitespace is ignored and a blank cell coerces to `0`. Anything that is
/// not a finite number (`"Low"`, `"High"`, `"n/a"`) becomes `NaN`.
pub fn parse_glucose_value(raw: &str) -> f64 {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => f64::NAN,
    }
}

/// Turn one subject's Dexcom rows into readings, in file order.
///
/// The first `preamble_rows` rows are dropped unconditionally. Unparseable
/// timestamps are propagated as `None` rather than filtered out.
pub fn build_glucose_series(rows: Vec<CsvRow>, preamble_rows: usize) -> Vec<GlucoseReading> {
    rows.into_iter()
        .skip(preamble_rows)
        .map(|mut row| {
            row.remove(INDEX_COLUMN);
            let timestamp = row
                .remove(TIMESTAMP_COLUMN)
                .and_then(|raw| parse_wall_clock(&raw));
            let glucose_mg_dl = row
                .remove(GLUCOSE_COLUMN)
                .map(|raw| parse_glucose_value(&raw))
                .unwrap_or(f64::NAN);
            GlucoseReading {
                timestamp,
                glucose_mg_dl,
                extra: row,
            }
        })
        .collect()
}

/// Readings whose timestamp failed to parse.
pub fn count_invalid_timestamps(series: &[GlucoseReading]) -> usize {
    series.iter().filter(|r| !r.has_valid_timestamp()).count()
}
