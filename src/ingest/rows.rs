// src/ingest/rows.rs
// Row sources: ordered, lazily produced string-keyed rows plus a header
// list. The processor only ever sees this trait; which concrete reader
// backs it is decided once, at the entry point, by file extension.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};

use crate::errors::ProcessingError;

/// One spreadsheet row keyed by source column name. Missing cells are
/// simply absent keys.
pub type Row = HashMap<String, String>;

/// Canonical field names the processor requires in every file.
pub const REQUIRED_COLUMNS: [&str; 4] = ["businessName", "country1", "products", "ingredients"];

pub trait RowSource {
    fn headers(&self) -> &[String];

    /// Next row in file order, or `None` at end of input. A malformed row
    /// yields `Some(Err(..))` and the source stays usable.
    fn next_row(&mut self) -> Option<Result<Row>>;
}

/// Maps canonical field names to the column names a particular source
/// uses. Identity by default; substitutions are looked up first.
#[derive(Debug, Default, Clone)]
pub struct HeaderMapping {
    substitutions: HashMap<String, String>,
}

impl HeaderMapping {
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn with_substitutions<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            substitutions: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Source column name for a canonical field.
    pub fn column<'a>(&'a self, field: &'a str) -> &'a str {
        self.substitutions
            .get(field)
            .map(String::as_str)
            .unwrap_or(field)
    }

    pub fn cell<'a>(&self, row: &'a Row, field: &str) -> Option<&'a str> {
        row.get(self.column(field)).map(String::as_str)
    }
}

/// Rejects the whole file when a required column is missing, before any
/// row is touched.
pub fn validate_headers(
    headers: &[String],
    mapping: &HeaderMapping,
) -> std::result::Result<(), ProcessingError> {
    for field in REQUIRED_COLUMNS {
        let column = mapping.column(field);
        if !headers.iter().any(|h| h == column) {
            return Err(ProcessingError::MissingColumn(column.to_string()));
        }
    }
    Ok(())
}

/// Streaming delimited-text adapter.
pub struct CsvRowSource {
    headers: Vec<String>,
    records: csv::StringRecordsIntoIter<File>,
}

impl CsvRowSource {
    pub fn from_path(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("opening {}", path.display()))?;
        let mut reader = csv::Reader::from_reader(file);
        let headers = reader
            .headers()
            .context("reading CSV header row")?
            .iter()
            .map(str::to_string)
            .collect();
        Ok(Self {
            headers,
            records: reader.into_records(),
        })
    }
}

impl RowSource for CsvRowSource {
    fn headers(&self) -> &[String] {
        &self.headers
    }

    fn next_row(&mut self) -> Option<Result<Row>> {
        let record = match self.records.next()? {
            Ok(record) => record,
            Err(e) => return Some(Err(e).context("reading CSV row")),
        };
        let row = self
            .headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.clone(), v.to_string()))
            .collect();
        Some(Ok(row))
    }
}

/// Pre-parsed adapter: the seam for spreadsheet readers, whose parsing
/// mechanics live outside this crate. Also the test double.
pub struct PreparsedRows {
    headers: Vec<String>,
    rows: std::vec::IntoIter<Row>,
}

impl PreparsedRows {
    pub fn new(headers: Vec<String>, rows: Vec<Row>) -> Self {
        Self {
            headers,
            rows: rows.into_iter(),
        }
    }
}

impl RowSource for PreparsedRows {
    fn headers(&self) -> &[String] {
        &self.headers
    }

    fn next_row(&mut self) -> Option<Result<Row>> {
        self.rows.next().map(Ok)
    }
}

/// Picks a row source by file extension. Spreadsheet formats are accepted
/// at the boundary but need external conversion; the error carries the
/// remediation hint.
pub fn open_row_source(path: &Path) -> std::result::Result<Box<dyn RowSource>, ProcessingError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    match extension.as_str() {
        "csv" => {
            let source = CsvRowSource::from_path(path)
                .map_err(|e| ProcessingError::file_format(format!("cannot read {}: {e}", path.display())))?;
            Ok(Box::new(source))
        }
        "xlsx" | "xls" => Err(ProcessingError::file_format(format!(
            "'{}' is a spreadsheet workbook, which this tool cannot read directly.",
            path.display()
        ))),
        other => Err(ProcessingError::file_format(format!(
            "Unsupported file format: '{other}'. Only .csv files are processed directly."
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn header_validation_flags_missing_required_column() {
        let headers: Vec<String> = ["businessName", "country1", "products"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        match validate_headers(&headers, &HeaderMapping::identity()) {
            Err(ProcessingError::MissingColumn(col)) => assert_eq!(col, "ingredients"),
            other => panic!("expected missing column, got {:?}", other.err()),
        }
    }

    #[test]
    fn header_mapping_substitutes_source_names() {
        let mapping = HeaderMapping::with_substitutions([("businessName", "Company")]);
        let headers: Vec<String> = ["Company", "country1", "products", "ingredients"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert!(validate_headers(&headers, &mapping).is_ok());

        let r = row(&[("Company", "Acme"), ("country1", "Canada")]);
        assert_eq!(mapping.cell(&r, "businessName"), Some("Acme"));
        assert_eq!(mapping.cell(&r, "country1"), Some("Canada"));
        assert_eq!(mapping.cell(&r, "products"), None);
    }

    #[test]
    fn preparsed_rows_stream_in_order() {
        let headers = vec!["businessName".to_string()];
        let mut source = PreparsedRows::new(
            headers,
            vec![row(&[("businessName", "A")]), row(&[("businessName", "B")])],
        );
        assert_eq!(
            source.next_row().unwrap().unwrap().get("businessName").map(String::as_str),
            Some("A")
        );
        assert_eq!(
            source.next_row().unwrap().unwrap().get("businessName").map(String::as_str),
            Some("B")
        );
        assert!(source.next_row().is_none());
    }

    #[test]
    fn workbook_extensions_get_a_conversion_hint() {
        match open_row_source(Path::new("submissions.xlsx")) {
            Err(ProcessingError::FileFormat { hint, .. }) => {
                assert!(hint.contains("CSV"));
            }
            other => panic!("expected file format error, got {:?}", other.err()),
        }
    }
}
