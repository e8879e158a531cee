//! CRSP stock files: monthly, daily, names history and delistings

use crate::calendar::DateRange;
use crate::data::frame::FrameReader;
use crate::error::Result;
use crate::query::{Predicate, ScanRequest};
use crate::types::{DelistingRecord, MonthlyPrice, NameRecord, Permno, SecurityDayRecord};
use polars::prelude::DataFrame;

pub const MSF: &str = "crsp.msf";
pub const MSENAMES: &str = "crsp.msenames";
pub const MSEDELIST: &str = "crsp.msedelist";
pub const DSF: &str = "crsp.dsf";

/// Common stocks (share codes 10 and 11)
pub const DEFAULT_SHARE_CODES: [i32; 2] = [10, 11];

pub fn monthly_prices_request(range: DateRange) -> ScanRequest {
    ScanRequest::new(MSF)
        .columns(&["permno", "date", "ret", "shrout", "altprc"])
        .filter(Predicate::between("date", range.start, range.end))
}

pub fn names_request(share_codes: &[i32]) -> ScanRequest {
    ScanRequest::new(MSENAMES)
        .columns(&["permno", "namedt", "nameendt", "shrcd", "exchcd", "siccd"])
        .filter(Predicate::is_in("shrcd", share_codes.iter().copied()))
}

pub fn delistings_request() -> ScanRequest {
    ScanRequest::new(MSEDELIST).columns(&["permno", "dlstdt", "dlret", "dlstcd"])
}

pub fn daily_request(permno: Permno, range: DateRange) -> ScanRequest {
    ScanRequest::new(DSF)
        .columns(&["permno", "date", "ret"])
        .filter(Predicate::eq("permno", permno))
        .filter(Predicate::between("date", range.start, range.end))
}

fn skipped(table: &str, count: usize) {
    if count > 0 {
        log::debug!("{}: skipped {} rows without key columns", table, count);
    }
}

pub fn parse_monthly_prices(frame: &DataFrame, stage: &str) -> Result<Vec<MonthlyPrice>> {
    let reader = FrameReader::new(frame, stage, MSF);
    let permno = reader.i64("permno")?;
    let date = reader.date("date")?;
    let ret = reader.f64("ret")?;
    let shrout = reader.f64("shrout")?;
    let altprc = reader.f64("altprc")?;

    let mut rows = Vec::with_capacity(reader.height());
    for i in 0..reader.height() {
        let (Some(permno), Some(date)) = (permno[i], date[i]) else {
            continue;
        };
        rows.push(MonthlyPrice {
            permno,
            date,
            ret: ret[i],
            shrout: shrout[i],
            altprc: altprc[i],
        });
    }
    skipped(MSF, reader.height() - rows.len());
    Ok(rows)
}

pub fn parse_names(frame: &DataFrame, stage: &str) -> Result<Vec<NameRecord>> {
    let reader = FrameReader::new(frame, stage, MSENAMES);
    let permno = reader.i64("permno")?;
    let namedt = reader.date("namedt")?;
    let nameendt = reader.date("nameendt")?;
    let shrcd = reader.i32("shrcd")?;
    let exchcd = reader.i32("exchcd")?;
    let siccd = reader.i32("siccd")?;

    let mut rows = Vec::with_capacity(reader.height());
    for i in 0..reader.height() {
        let (Some(permno), Some(namedt)) = (permno[i], namedt[i]) else {
            continue;
        };
        rows.push(NameRecord {
            permno,
            namedt,
            nameendt: nameendt[i],
            shrcd: shrcd[i],
            exchcd: exchcd[i],
            siccd: siccd[i],
        });
    }
    skipped(MSENAMES, reader.height() - rows.len());
    Ok(rows)
}

pub fn parse_delistings(frame: &DataFrame, stage: &str) -> Result<Vec<DelistingRecord>> {
    let reader = FrameReader::new(frame, stage, MSEDELIST);
    let permno = reader.i64("permno")?;
    let dlstdt = reader.date("dlstdt")?;
    let dlret = reader.f64("dlret")?;
    let dlstcd = reader.i32("dlstcd")?;

    let mut rows = Vec::with_capacity(reader.height());
    for i in 0..reader.height() {
        let (Some(permno), Some(dlstdt)) = (permno[i], dlstdt[i]) else {
            continue;
        };
        rows.push(DelistingRecord {
            permno,
            dlstdt,
            dlret: dlret[i],
            dlstcd: dlstcd[i],
        });
    }
    skipped(MSEDELIST, reader.height() - rows.len());
    Ok(rows)
}

pub fn parse_daily(frame: &DataFrame, stage: &str) -> Result<Vec<SecurityDayRecord>> {
    let reader = FrameReader::new(frame, stage, DSF);
    let permno = reader.i64("permno")?;
    let date = reader.date("date")?;
    let ret = reader.f64("ret")?;

    Ok((0..reader.height())
        .filter_map(|i| {
            Some(SecurityDayRecord {
                permno: permno[i]?,
                date: date[i]?,
                ret: ret[i],
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::frame::date_series;
    use crate::error::WrdsError;
    use chrono::NaiveDate;
    use polars::prelude::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_parse_monthly_prices_skips_rows_without_keys() {
        let frame = DataFrame::new(vec![
            Series::new("permno", &[Some(1i64), None]),
            date_series("date", &[Some(d(2021, 1, 29)), Some(d(2021, 1, 29))]),
            Series::new("ret", &[Some(0.01), Some(0.02)]),
            Series::new("shrout", &[Some(100.0), Some(50.0)]),
            Series::new("altprc", &[Some(-5.0), None]),
        ])
        .unwrap();

        let rows = parse_monthly_prices(&frame, "monthly").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].altprc, Some(-5.0));
    }

    #[test]
    fn test_parse_names_requires_columns() {
        let frame = df!("permno" => &[1i64]).unwrap();
        let err = parse_names(&frame, "monthly").unwrap_err();
        assert!(matches!(err, WrdsError::Schema { ref table, .. } if table == MSENAMES));
    }

    #[test]
    fn test_daily_request_is_scoped_to_one_security() {
        let range = DateRange::new(d(2021, 1, 1), d(2021, 12, 31)).unwrap();
        let request = daily_request(10001, range);
        assert_eq!(request.table, DSF);
        assert_eq!(request.predicates[0], Predicate::eq("permno", 10001i64));
        assert_eq!(request.columns.len(), 3);
    }
}
