//! Untyped CSV loading: one ordered record per data line, keyed by header.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};

use crate::GlucoseError;

/// One data line. Column order follows the header row.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsvRow {
    fields: Vec<(String, String)>,
}

impl CsvRow {
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    /// Remove a column, returning its value if it was present.
    pub fn remove(&mut self, column: &str) -> Option<String> {
        let idx = self.fields.iter().position(|(name, _)| name == column)?;
        Some(self.fields.remove(idx).1)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.fields.iter().any(|(name, _)| name == column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(_, value)| value.as_str())
    }

    /// Consume the row, yielding values in column order.
    pub fn into_values(self) -> Vec<String> {
        self.fields.into_iter().map(|(_, value)| value).collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Parsed file: header names plus the data rows in file order.
#[derive(Clone, Debug, Default)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub rows: Vec<CsvRow>,
}

impl CsvTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Read a CSV file from disk. A missing or unreadable file is an error.
pub fn load_csv(path: &Path) -> Result<CsvTable, GlucoseError> {
    let file = File::open(path).map_err(|source| GlucoseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_csv(BufReader::new(file), path)
}

/// Parse CSV text from any reader; `origin` is only used for error messages.
///
/// Every row is normalized to the header width: short rows are padded with
/// empty strings and trailing extra fields are ignored.
pub fn read_csv<R: Read>(reader: R, origin: &Path) -> Result<CsvTable, GlucoseError> {
    let csv_err = |source: csv::Error| GlucoseError::Csv {
        path: origin.to_path_buf(),
        source,
    };

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);
    let headers: Vec<String> = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        let fields = headers
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.clone(), record.get(idx).unwrap_or("").to_string()))
            .collect();
        rows.push(CsvRow { fields });
    }

    Ok(CsvTable { headers, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn parse(text: &str) -> CsvTable {
        read_csv(text.as_bytes(), &PathBuf::from("inline.csv")).unwrap()
    }

    #[test]
    fn rows_are_keyed_by_header() {
        let table = parse("a,b,c\n1,2,3\n4,5,6\n");
        assert_eq!(table.headers, vec!["a", "b", "c"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[1].get("b"), Some("5"));
        assert_eq!(table.rows[0].values().collect::<Vec<_>>(), vec!["1", "2", "3"]);
    }

    #[test]
    fn ragged_rows_match_header_width() {
        let table = parse("a,b,c\n1\n1,2,3,4\n");
        assert_eq!(table.rows[0].len(), 3);
        assert_eq!(table.rows[0].get("c"), Some(""));
        assert_eq!(table.rows[1].len(), 3);
        assert!(!table.rows[1].values().any(|v| v == "4"));
    }

    #[test]
    fn remove_drops_column() {
        let mut row = CsvRow::from_pairs([("Index", "1"), ("Value", "9")]);
        assert_eq!(row.remove("Index").as_deref(), Some("1"));
        assert!(!row.contains("Index"));
        assert_eq!(row.remove("Index"), None);
        assert_eq!(row.columns().collect::<Vec<_>>(), vec!["Value"]);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_csv(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert!(matches!(err, GlucoseError::Io { .. }));
    }
}
