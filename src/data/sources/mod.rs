//! Remote table readers
//!
//! This module provides read-only access to the remote analytical source:
//! - `FileSource`: a mirrored copy of remote tables as Parquet or CSV files
//! - `MemorySource`: frames held in memory
//! - `FredSource` (feature `async`): CPI downloads over HTTP

#[cfg(feature = "async")]
pub mod fred;

#[cfg(feature = "async")]
pub use fred::FredSource;

use crate::error::{Result, WrdsError};
use crate::query::{conjunction, ScanRequest};
use hashbrown::HashMap;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Trait for remote table sources
pub trait RemoteSource {
    /// Verify the source is reachable; failures are fatal
    fn check(&self) -> Result<()>;

    /// Filtered, projected scan of a single table
    fn scan(&self, request: &ScanRequest) -> Result<DataFrame>;
}

/// Apply a request's predicates and projection to a lazy frame.
///
/// Every projected or filtered column must exist in the table schema.
pub fn apply_request(frame: LazyFrame, request: &ScanRequest) -> Result<LazyFrame> {
    let schema = frame.schema()?;
    let referenced = request
        .columns
        .iter()
        .map(String::as_str)
        .chain(request.predicates.iter().map(|p| p.column()));
    for column in referenced {
        if schema.get(column).is_none() {
            return Err(WrdsError::schema("scan", request.table.as_str(), column));
        }
    }

    let mut frame = frame;
    if let Some(predicate) = conjunction(&request.predicates) {
        frame = frame.filter(predicate);
    }
    if !request.columns.is_empty() {
        let columns: Vec<Expr> = request.columns.iter().map(|c| col(c)).collect();
        frame = frame.select(columns);
    }
    Ok(frame)
}

/// On-disk file format of a mirrored table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Parquet,
    Csv,
}

impl FileFormat {
    fn extension(&self) -> &'static str {
        match self {
            FileFormat::Parquet => "parquet",
            FileFormat::Csv => "csv",
        }
    }
}

/// Remote tables mirrored as `<root>/<schema>/<table>.<ext>`
#[derive(Debug, Clone)]
pub struct FileSource {
    root: PathBuf,
    format: FileFormat,
}

impl FileSource {
    pub fn new(root: impl Into<PathBuf>, format: FileFormat) -> Self {
        Self {
            root: root.into(),
            format,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of `schema.table`
    pub fn table_path(&self, table: &str) -> PathBuf {
        let mut path = self.root.clone();
        for part in table.split('.') {
            path.push(part);
        }
        path.set_extension(self.format.extension());
        path
    }

    fn lazy_table(&self, table: &str) -> Result<LazyFrame> {
        let path = self.table_path(table);
        if !path.exists() {
            return Err(WrdsError::connection(
                "scan",
                table,
                format!("no table file at {}", path.display()),
            ));
        }
        let frame = match self.format {
            FileFormat::Parquet => LazyFrame::scan_parquet(&path, ScanArgsParquet::default())?,
            FileFormat::Csv => LazyCsvReader::new(&path)
                .with_try_parse_dates(true)
                .finish()?,
        };
        Ok(frame)
    }
}

impl RemoteSource for FileSource {
    fn check(&self) -> Result<()> {
        if self.root.is_dir() {
            Ok(())
        } else {
            Err(WrdsError::connection(
                "connect",
                self.root.display().to_string(),
                "source directory does not exist",
            ))
        }
    }

    fn scan(&self, request: &ScanRequest) -> Result<DataFrame> {
        let frame = self.lazy_table(&request.table)?;
        log::debug!(
            "Scanning {} ({} predicates)",
            request.table,
            request.predicates.len()
        );
        apply_request(frame, request)?
            .collect()
            .map_err(|e| WrdsError::DataError(format!("Scan of {} failed: {}", request.table, e)))
    }
}

/// Remote tables held in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    tables: HashMap<String, DataFrame>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, table: &str, frame: DataFrame) -> Self {
        self.insert(table, frame);
        self
    }

    pub fn insert(&mut self, table: &str, frame: DataFrame) {
        self.tables.insert(table.to_string(), frame);
    }
}

impl RemoteSource for MemorySource {
    fn check(&self) -> Result<()> {
        Ok(())
    }

    fn scan(&self, request: &ScanRequest) -> Result<DataFrame> {
        let frame = self.tables.get(&request.table).ok_or_else(|| {
            WrdsError::connection("scan", request.table.as_str(), "table not registered")
        })?;
        apply_request(frame.clone().lazy(), request)?
            .collect()
            .map_err(|e| WrdsError::DataError(format!("Scan of {} failed: {}", request.table, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::frame::{date_series, FrameReader};
    use crate::query::Predicate;
    use chrono::NaiveDate;

    fn sample_frame() -> DataFrame {
        let dates = [
            Some(NaiveDate::from_ymd_opt(2021, 1, 29).unwrap()),
            Some(NaiveDate::from_ymd_opt(2021, 2, 26).unwrap()),
            Some(NaiveDate::from_ymd_opt(2021, 1, 29).unwrap()),
        ];
        DataFrame::new(vec![
            Series::new("permno", &[1i64, 1, 2]),
            date_series("date", &dates),
            Series::new("ret", &[Some(0.01), Some(0.02), None]),
        ])
        .unwrap()
    }

    #[test]
    fn test_memory_source_applies_predicates_and_projection() {
        let source = MemorySource::new().with_table("crsp.msf", sample_frame());
        let request = ScanRequest::new("crsp.msf")
            .columns(&["permno", "ret"])
            .filter(Predicate::eq("permno", 1i64))
            .filter(Predicate::between(
                "date",
                NaiveDate::from_ymd_opt(2021, 2, 1).unwrap(),
                NaiveDate::from_ymd_opt(2021, 2, 28).unwrap(),
            ));

        let frame = source.scan(&request).unwrap();
        assert_eq!(frame.height(), 1);
        assert_eq!(frame.width(), 2);
        let reader = FrameReader::new(&frame, "test", "crsp.msf");
        assert_eq!(reader.f64("ret").unwrap(), vec![Some(0.02)]);
    }

    #[test]
    fn test_memory_source_unknown_table() {
        let source = MemorySource::new();
        let err = source.scan(&ScanRequest::new("crsp.dsf")).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_missing_column_is_schema_fault() {
        let source = MemorySource::new().with_table("crsp.msf", sample_frame());
        let request = ScanRequest::new("crsp.msf").columns(&["permno", "altprc"]);
        let err = source.scan(&request).unwrap_err();
        assert!(matches!(err, WrdsError::Schema { ref column, .. } if column == "altprc"));
    }

    #[test]
    fn test_file_source_missing_root_is_fatal() {
        let source = FileSource::new("/nonexistent/wrds/mirror", FileFormat::Parquet);
        let err = source.check().unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_file_source_table_path() {
        let source = FileSource::new("/data/wrds", FileFormat::Csv);
        assert_eq!(
            source.table_path("crsp.msf"),
            PathBuf::from("/data/wrds/crsp/msf.csv")
        );
    }

    #[test]
    fn test_file_source_scans_csv() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("crsp")).unwrap();
        std::fs::write(
            dir.path().join("crsp").join("dsf.csv"),
            "permno,date,ret\n1,2021-01-04,0.01\n2,2021-01-04,0.02\n1,2021-01-05,-0.01\n",
        )
        .unwrap();

        let source = FileSource::new(dir.path(), FileFormat::Csv);
        source.check().unwrap();
        let frame = source
            .scan(
                &ScanRequest::new("crsp.dsf")
                    .columns(&["date", "ret"])
                    .filter(Predicate::eq("permno", 1i64)),
            )
            .unwrap();
        assert_eq!(frame.height(), 2);
        let reader = FrameReader::new(&frame, "test", "crsp.dsf");
        assert_eq!(
            reader.date("date").unwrap()[1],
            NaiveDate::from_ymd_opt(2021, 1, 5)
        );
    }
}
