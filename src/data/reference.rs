//! Broadcast reference series (risk-free rates, price index)

use crate::calendar::month_start;
use crate::error::{Result, WrdsError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Sampling frequency of a series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Monthly,
    Daily,
}

/// Location and layout of a reference series CSV
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceFile {
    pub path: PathBuf,
    #[serde(default = "default_date_column")]
    pub date_column: String,
    pub value_column: String,
    /// Multiplier applied to every value (0.01 for percent quotes)
    #[serde(default = "default_scale")]
    pub scale: f64,
}

fn default_date_column() -> String {
    "date".to_string()
}

fn default_scale() -> f64 {
    1.0
}

/// Read-only series keyed by date; monthly series are keyed by month start
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceSeries {
    values: BTreeMap<NaiveDate, f64>,
}

impl ReferenceSeries {
    pub fn from_map(values: BTreeMap<NaiveDate, f64>) -> Self {
        Self { values }
    }

    pub fn monthly<I: IntoIterator<Item = (NaiveDate, f64)>>(points: I) -> Self {
        Self {
            values: points
                .into_iter()
                .map(|(d, v)| (month_start(d), v))
                .collect(),
        }
    }

    pub fn daily<I: IntoIterator<Item = (NaiveDate, f64)>>(points: I) -> Self {
        Self {
            values: points.into_iter().collect(),
        }
    }

    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.values.get(&date).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Rescale so that the latest observation equals 1.0
    pub fn normalized_to_last(&self) -> Self {
        match self.values.values().next_back().copied() {
            Some(last) if last != 0.0 => Self {
                values: self.values.iter().map(|(d, v)| (*d, v / last)).collect(),
            },
            _ => self.clone(),
        }
    }

    /// Load a series from CSV.
    ///
    /// Accepted date layouts: `YYYY-MM-DD`, `YYYYMM` and `YYYYMMDD`.
    pub fn from_csv(file: &ReferenceFile, granularity: Granularity) -> Result<Self> {
        let mut reader = csv::Reader::from_path(&file.path).map_err(|e| {
            WrdsError::connection("reference", file.path.display().to_string(), e)
        })?;
        let headers = reader
            .headers()
            .map_err(|e| WrdsError::ParseError(format!("Failed to read CSV header: {}", e)))?
            .clone();
        let position = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| WrdsError::schema("reference", display(&file.path), name))
        };
        let date_idx = position(&file.date_column)?;
        let value_idx = position(&file.value_column)?;

        let mut values = BTreeMap::new();
        for result in reader.records() {
            let record = result
                .map_err(|e| WrdsError::ParseError(format!("Failed to parse CSV row: {}", e)))?;
            let raw_date = record.get(date_idx).unwrap_or("").trim();
            let Some(date) = parse_reference_date(raw_date) else {
                log::debug!("Skipping reference row with date '{}'", raw_date);
                continue;
            };
            let Some(value) = record
                .get(value_idx)
                .and_then(|v| v.trim().parse::<f64>().ok())
            else {
                continue;
            };
            let key = match granularity {
                Granularity::Monthly => month_start(date),
                Granularity::Daily => date,
            };
            values.insert(key, value * file.scale);
        }

        log::info!(
            "Loaded {} {:?} reference observations from {}",
            values.len(),
            granularity,
            file.path.display()
        );
        Ok(Self { values })
    }
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

fn parse_reference_date(s: &str) -> Option<NaiveDate> {
    match s.len() {
        6 => NaiveDate::parse_from_str(&format!("{}01", s), "%Y%m%d").ok(),
        8 => NaiveDate::parse_from_str(s, "%Y%m%d").ok(),
        _ => NaiveDate::parse_from_str(s.get(..10).unwrap_or(s), "%Y-%m-%d").ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Write;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_reference_date_layouts() {
        assert_eq!(parse_reference_date("202101"), Some(d(2021, 1, 1)));
        assert_eq!(parse_reference_date("20210104"), Some(d(2021, 1, 4)));
        assert_eq!(parse_reference_date("2021-01-04"), Some(d(2021, 1, 4)));
        assert_eq!(parse_reference_date("Annual Factors"), None);
    }

    #[test]
    fn test_monthly_csv_in_percent() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "date,Mkt-RF,SMB,HML,RF").unwrap();
        writeln!(file, "202101,-0.03,6.88,2.85,0.00").unwrap();
        writeln!(file, "202102,2.78,4.51,7.08,0.02").unwrap();
        writeln!(file, "bad,1,1,1,1").unwrap();

        let reference = ReferenceFile {
            path: file.path().to_path_buf(),
            date_column: "date".to_string(),
            value_column: "RF".to_string(),
            scale: 0.01,
        };
        let series = ReferenceSeries::from_csv(&reference, Granularity::Monthly).unwrap();
        assert_eq!(series.len(), 2);
        assert_relative_eq!(series.get(d(2021, 2, 1)).unwrap(), 0.0002);
    }

    #[test]
    fn test_missing_value_column_is_schema_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "date,value").unwrap();
        let reference = ReferenceFile {
            path: file.path().to_path_buf(),
            date_column: "date".to_string(),
            value_column: "RF".to_string(),
            scale: 1.0,
        };
        let err = ReferenceSeries::from_csv(&reference, Granularity::Monthly).unwrap_err();
        assert!(matches!(err, WrdsError::Schema { .. }));
    }

    #[test]
    fn test_normalized_to_last() {
        let cpi = ReferenceSeries::monthly([(d(2021, 1, 15), 250.0), (d(2021, 2, 1), 500.0)]);
        let normalized = cpi.normalized_to_last();
        assert_relative_eq!(normalized.get(d(2021, 1, 1)).unwrap(), 0.5);
        assert_relative_eq!(normalized.get(d(2021, 2, 1)).unwrap(), 1.0);
    }
}
