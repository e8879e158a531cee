//! Decoding polars frames into typed columns

use crate::error::{Result, WrdsError};
use chrono::{Duration, NaiveDate};
use polars::prelude::*;

/// Borrowed frame tagged with the stage and table it came from, so that
/// schema faults can name both
pub struct FrameReader<'a> {
    frame: &'a DataFrame,
    stage: &'a str,
    table: &'a str,
}

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

impl<'a> FrameReader<'a> {
    pub fn new(frame: &'a DataFrame, stage: &'a str, table: &'a str) -> Self {
        Self {
            frame,
            stage,
            table,
        }
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    fn schema_error(&self, column: &str) -> WrdsError {
        WrdsError::schema(self.stage, self.table, column)
    }

    fn series(&self, column: &str) -> Result<&Series> {
        self.frame
            .column(column)
            .map_err(|_| self.schema_error(column))
    }

    fn cast(&self, column: &str, dtype: &DataType) -> Result<Series> {
        self.series(column)?
            .cast(dtype)
            .map_err(|_| self.schema_error(column))
    }

    pub fn f64(&self, column: &str) -> Result<Vec<Option<f64>>> {
        let series = self.cast(column, &DataType::Float64)?;
        let values = series.f64().map_err(|_| self.schema_error(column))?;
        Ok(values.into_iter().collect())
    }

    pub fn i64(&self, column: &str) -> Result<Vec<Option<i64>>> {
        let series = self.cast(column, &DataType::Int64)?;
        let values = series.i64().map_err(|_| self.schema_error(column))?;
        Ok(values.into_iter().collect())
    }

    pub fn i32(&self, column: &str) -> Result<Vec<Option<i32>>> {
        Ok(self
            .i64(column)?
            .into_iter()
            .map(|v| v.and_then(|v| i32::try_from(v).ok()))
            .collect())
    }

    pub fn string(&self, column: &str) -> Result<Vec<Option<String>>> {
        let series = self.cast(column, &DataType::String)?;
        let values = series.str().map_err(|_| self.schema_error(column))?;
        Ok(values.into_iter().map(|v| v.map(str::to_string)).collect())
    }

    /// Dates may arrive as `Date`, `Datetime` or ISO strings
    pub fn date(&self, column: &str) -> Result<Vec<Option<NaiveDate>>> {
        let series = self.series(column)?;
        match series.dtype() {
            DataType::String => {
                let values = series.str().map_err(|_| self.schema_error(column))?;
                Ok(values
                    .into_iter()
                    .map(|v| {
                        v.and_then(|s| {
                            let s = s.get(..10).unwrap_or(s);
                            NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
                        })
                    })
                    .collect())
            }
            _ => {
                let days = series
                    .cast(&DataType::Date)
                    .and_then(|s| s.cast(&DataType::Int32))
                    .map_err(|_| self.schema_error(column))?;
                let days = days.i32().map_err(|_| self.schema_error(column))?;
                let epoch = epoch();
                Ok(days
                    .into_iter()
                    .map(|v| v.map(|d| epoch + Duration::days(d as i64)))
                    .collect())
            }
        }
    }
}

/// Build a polars `Date` series from calendar dates
pub fn date_series(name: &str, dates: &[Option<NaiveDate>]) -> Series {
    let epoch = epoch();
    let days: Vec<Option<i32>> = dates
        .iter()
        .map(|d| d.map(|d| (d - epoch).num_days() as i32))
        .collect();
    Int32Chunked::from_iter_options(name, days.into_iter())
        .into_date()
        .into_series()
}
