//! Calendar-month arithmetic and date ranges

use crate::error::{Result, WrdsError};
use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};

/// Truncate a date to the first day of its month
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Shift a month-start date by a signed number of calendar months
pub fn shift_months(month: NaiveDate, months: i32) -> Option<NaiveDate> {
    let month = month_start(month);
    if months >= 0 {
        month.checked_add_months(Months::new(months as u32))
    } else {
        month.checked_sub_months(Months::new(months.unsigned_abs()))
    }
}

/// The calendar month following `month`
pub fn next_month(month: NaiveDate) -> Option<NaiveDate> {
    shift_months(month, 1)
}

/// Inclusive date range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(WrdsError::ConfigError(format!(
                "Start date {} is after end date {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }
}
