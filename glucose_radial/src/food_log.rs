//! Food log normalization onto a fixed positional schema.
//!
//! Source exports use inconsistent header names, so columns are matched by
//! position only. The column order contract is [`FOOD_LOG_COLUMNS`]; a file
//! whose header width differs is rejected with
//! [`GlucoseError::SchemaDrift`] instead of being silently mis-mapped.

use std::path::Path;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::csv_table::{CsvRow, CsvTable};
use crate::wall_clock::parse_wall_clock;
use crate::GlucoseError;

/// Positional column contract, in source order.
pub const FOOD_LOG_COLUMNS: [&str; 14] = [
    "date",
    "time_of_day",
    "time_begin",
    "time_end",
    "logged_food",
    "amount",
    "unit",
    "searched_food",
    "calorie",
    "total_carb",
    "dietary_fiber",
    "sugar",
    "protein",
    "total_fat",
];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FoodLogEntry {
    pub date: String,
    pub time_of_day: String,
    /// `None` when the raw begin time could not be parsed.
    pub time_begin: Option<NaiveDateTime>,
    pub time_end: String,
    pub logged_food: String,
    pub amount: String,
    pub unit: String,
    pub searched_food: String,
    pub calorie: String,
    pub total_carb: String,
    pub dietary_fiber: String,
    pub sugar: String,
    pub protein: String,
    pub total_fat: String,
    /// Set for every row once breakfast flags have been derived.
    pub has_standard_breakfast: Option<bool>,
}

impl FoodLogEntry {
    /// Build an entry from the 14 raw values in [`FOOD_LOG_COLUMNS`] order.
    pub fn from_values(values: [String; 14]) -> Self {
        let [
            date,
            time_of_day,
            time_begin,
            time_end,
            logged_food,
            amount,
            unit,
            searched_food,
            calorie,
            total_carb,
            dietary_fiber,
            sugar,
            protein,
            total_fat,
        ] = values;
        Self {
            date,
            time_of_day,
            time_begin: parse_wall_clock(&time_begin),
            time_end,
            logged_food,
            amount,
            unit,
            searched_food,
            calorie,
            total_carb,
            dietary_fiber,
            sugar,
            protein,
            total_fat,
            has_standard_breakfast: None,
        }
    }

    /// Rows from [`read_csv`](crate::csv_table::read_csv) already match the
    /// header width, so only a hand-built row of the wrong width fails here.
    fn from_row(row: CsvRow, path: &Path) -> Result<Self, GlucoseError> {
        let found = row.len();
        let values: [String; 14] = row
            .into_values()
            .try_into()
            .map_err(|_| schema_drift(path, found))?;
        Ok(Self::from_values(values))
    }
}

fn schema_drift(path: &Path, found: usize) -> GlucoseError {
    GlucoseError::SchemaDrift {
        path: path.to_path_buf(),
        expected: FOOD_LOG_COLUMNS.len(),
        found,
    }
}

/// Re-key every row of a food log positionally onto [`FoodLogEntry`].
pub fn normalize_food_log(table: CsvTable, path: &Path) -> Result<Vec<FoodLogEntry>, GlucoseError> {
    if table.headers.len() != FOOD_LOG_COLUMNS.len() {
        return Err(schema_drift(path, table.headers.len()));
    }
    table
        .rows
        .into_iter()
        .map(|row| FoodLogEntry::from_row(row, path))
        .collect()
}

/// Entries whose begin time failed to parse.
pub fn count_missing_begin_times(entries: &[FoodLogEntry]) -> usize {
    entries.iter().filter(|e| e.time_begin.is_none()).count()
}
