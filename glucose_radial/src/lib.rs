//! Glucose monitor and food log ingestion with radial chart geometry.
//!
//! Loading is a chain of pure functions composed by [`load_study`]: each
//! subject's Dexcom export becomes a [`GlucoseReading`] series, each food log
//! becomes [`FoodLogEntry`] rows stamped with a per-day breakfast flag, and
//! [`polar::build_polar_chart`] lays out one subject's series on a 24 hour
//! dial.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, info};

pub mod breakfast;
pub mod csv_table;
pub mod food_log;
pub mod glucose;
pub mod polar;
pub mod subjects;
pub mod wall_clock;

pub use breakfast::{breakfast_days, derive_breakfast_flags, BreakfastDay, BREAKFAST_LEXICON};
pub use csv_table::{load_csv, CsvRow, CsvTable};
pub use food_log::{normalize_food_log, FoodLogEntry, FOOD_LOG_COLUMNS};
pub use glucose::{build_glucose_series, GlucoseReading, DEXCOM_PREAMBLE_ROWS};
pub use polar::{build_polar_chart, ChartLayout, PolarChart};
pub use subjects::{SubjectId, DEFAULT_SUBJECT, EXCLUDED_SUBJECTS, SUBJECT_ID_RANGE};

#[derive(Error, Debug)]
pub enum GlucoseError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse CSV {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("food log {} has {found} columns, expected {expected}", .path.display())]
    SchemaDrift {
        path: PathBuf,
        expected: usize,
        found: usize,
    },
    #[error("subject {0} is not part of the loaded study")]
    UnknownSubject(SubjectId),
}

/// Where the exports live and which subjects to load.
#[derive(Clone, Debug)]
pub struct StudyConfig {
    pub data_dir: PathBuf,
    pub first_subject: u16,
    pub last_subject: u16,
    pub excluded_subjects: Vec<u16>,
    pub dexcom_preamble_rows: usize,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("../data"),
            first_subject: *SUBJECT_ID_RANGE.start(),
            last_subject: *SUBJECT_ID_RANGE.end(),
            excluded_subjects: EXCLUDED_SUBJECTS.to_vec(),
            dexcom_preamble_rows: DEXCOM_PREAMBLE_ROWS,
        }
    }
}

impl StudyConfig {
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn subject_range(&self) -> RangeInclusive<u16> {
        self.first_subject..=self.last_subject
    }

    pub fn subjects(&self) -> Vec<SubjectId> {
        subjects::study_subjects(self.subject_range(), &self.excluded_subjects)
    }

    pub fn demographics_path(&self) -> PathBuf {
        self.data_dir.join("Demographics.csv")
    }

    pub fn dexcom_path(&self, subject: SubjectId) -> PathBuf {
        self.data_dir
            .join("dexcom")
            .join(format!("Dexcom_{}.csv", subject))
    }

    pub fn food_log_path(&self, subject: SubjectId) -> PathBuf {
        self.data_dir
            .join("food_log")
            .join(format!("Food_Log_{}.csv", subject))
    }
}

/// Everything loaded for one run. Collections are keyed by subject and never
/// share rows across subjects.
#[derive(Clone, Debug, Default)]
pub struct Study {
    pub demographics: Vec<CsvRow>,
    pub glucose: BTreeMap<SubjectId, Vec<GlucoseReading>>,
    pub food_logs: BTreeMap<SubjectId, Vec<FoodLogEntry>>,
}

impl Study {
    pub fn glucose_series(&self, subject: SubjectId) -> Result<&[GlucoseReading], GlucoseError> {
        self.glucose
            .get(&subject)
            .map(Vec::as_slice)
            .ok_or(GlucoseError::UnknownSubject(subject))
    }

    pub fn food_log(&self, subject: SubjectId) -> Result<&[FoodLogEntry], GlucoseError> {
        self.food_logs
            .get(&subject)
            .map(Vec::as_slice)
            .ok_or(GlucoseError::UnknownSubject(subject))
    }
}

pub fn load_demographics(config: &StudyConfig) -> Result<Vec<CsvRow>, GlucoseError> {
    Ok(load_csv(&config.demographics_path())?.rows)
}

pub fn load_glucose_series(
    config: &StudyConfig,
    subject: SubjectId,
) -> Result<Vec<GlucoseReading>, GlucoseError> {
    let table = load_csv(&config.dexcom_path(subject))?;
    Ok(build_glucose_series(table.rows, config.dexcom_preamble_rows))
}

/// Load and normalize one food log. Breakfast flags are not derived here.
pub fn load_food_log(
    config: &StudyConfig,
    subject: SubjectId,
) -> Result<Vec<FoodLogEntry>, GlucoseError> {
    let path = config.food_log_path(subject);
    let table = load_csv(&path)?;
    normalize_food_log(table, &path)
}

/// Load every dataset in order, then derive breakfast flags.
///
/// Loads run one subject at a time; the first failure aborts the whole load.
pub fn load_study(config: &StudyConfig) -> Result<Study, GlucoseError> {
    let demographics = load_demographics(config)?;
    info!(rows = demographics.len(), "loaded demographics");
    for row in demographics.iter().take(5) {
        debug!(?row, "demographics head");
    }

    let subjects = config.subjects();

    let mut series_by_subject = BTreeMap::new();
    for &subject in &subjects {
        let series = load_glucose_series(config, subject)?;
        let invalid = glucose::count_invalid_timestamps(&series);
        info!(
            subject = %subject,
            readings = series.len(),
            invalid_timestamps = invalid,
            "loaded glucose series"
        );
        series_by_subject.insert(subject, series);
    }

    let mut food_logs = BTreeMap::new();
    for &subject in &subjects {
        let entries = load_food_log(config, subject)?;
        info!(
            subject = %subject,
            entries = entries.len(),
            missing_begin = food_log::count_missing_begin_times(&entries),
            "loaded food log"
        );
        food_logs.insert(subject, entries);
    }

    for entries in food_logs.values_mut() {
        derive_breakfast_flags(entries);
    }

    if let Some(series) = series_by_subject.get(&DEFAULT_SUBJECT) {
        for reading in series.iter().take(5) {
            debug!(?reading, "glucose head {}", DEFAULT_SUBJECT.label());
        }
    }
    if let Some(entries) = food_logs.get(&DEFAULT_SUBJECT) {
        for entry in entries.iter().take(50) {
            debug!(?entry, "food log head {}", DEFAULT_SUBJECT.label());
        }
    }

    Ok(Study {
        demographics,
        glucose: series_by_subject,
        food_logs,
    })
}

/// Paths a run will read, in load order.
pub fn expected_inputs(config: &StudyConfig) -> Vec<PathBuf> {
    let subjects = config.subjects();
    let mut paths = vec![config.demographics_path()];
    paths.extend(subjects.iter().map(|&s| config.dexcom_path(s)));
    paths.extend(subjects.iter().map(|&s| config.food_log_path(s)));
    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_use_zero_padded_ids() {
        let config = StudyConfig::with_data_dir("/data");
        assert_eq!(
            config.dexcom_path(SubjectId(1)),
            PathBuf::from("/data/dexcom/Dexcom_001.csv")
        );
        assert_eq!(
            config.food_log_path(SubjectId(12)),
            PathBuf::from("/data/food_log/Food_Log_012.csv")
        );
        assert_eq!(config.demographics_path(), PathBuf::from("/data/Demographics.csv"));
    }

    #[test]
    fn default_config_matches_study_constants() {
        let config = StudyConfig::default();
        assert_eq!(config.data_dir, PathBuf::from("../data"));
        assert_eq!(config.subjects().len(), 11);
        assert_eq!(config.dexcom_preamble_rows, 12);
        assert_eq!(expected_inputs(&config).len(), 1 + 2 * 11);
    }

    #[test]
    fn missing_data_dir_is_fatal() {
        let config = StudyConfig::with_data_dir("/no/such/study");
        let err = load_study(&config).unwrap_err();
        assert!(matches!(err, GlucoseError::Io { .. }));
    }
}
