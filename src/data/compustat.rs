//! Compustat annual fundamentals

use crate::calendar::DateRange;
use crate::data::frame::FrameReader;
use crate::error::Result;
use crate::query::{Predicate, ScanRequest};
use crate::types::FirmYearRecord;
use chrono::Datelike;
use hashbrown::HashMap;
use polars::prelude::DataFrame;

pub const FUNDA: &str = "comp.funda";

const ITEMS: [&str; 16] = [
    "seq", "ceq", "at", "lt", "txditc", "txdb", "itcb", "pstkrv", "pstkl", "pstk", "capx",
    "oancf", "sale", "cogs", "xint", "xsga",
];

/// Industrial-format, standardized, consolidated statements in `range`
pub fn funda_request(range: DateRange) -> ScanRequest {
    let mut columns = vec!["gvkey", "datadate"];
    columns.extend(ITEMS);
    ScanRequest::new(FUNDA)
        .columns(&columns)
        .filter(Predicate::eq("indfmt", "INDL"))
        .filter(Predicate::eq("datafmt", "STD"))
        .filter(Predicate::eq("consol", "C"))
        .filter(Predicate::between("datadate", range.start, range.end))
}

pub fn parse_funda(frame: &DataFrame, stage: &str) -> Result<Vec<FirmYearRecord>> {
    let reader = FrameReader::new(frame, stage, FUNDA);
    let gvkey = reader.string("gvkey")?;
    let datadate = reader.date("datadate")?;
    let items: HashMap<&str, Vec<Option<f64>>> = ITEMS
        .iter()
        .map(|item| Ok((*item, reader.f64(item)?)))
        .collect::<Result<_>>()?;
    let item = |name: &str, i: usize| items.get(name).and_then(|values| values[i]);

    let mut rows = Vec::with_capacity(reader.height());
    for i in 0..reader.height() {
        let (Some(gvkey), Some(datadate)) = (gvkey[i].clone(), datadate[i]) else {
            continue;
        };
        rows.push(FirmYearRecord {
            gvkey,
            datadate,
            year: datadate.year(),
            seq: item("seq", i),
            ceq: item("ceq", i),
            at: item("at", i),
            lt: item("lt", i),
            txditc: item("txditc", i),
            txdb: item("txdb", i),
            itcb: item("itcb", i),
            pstkrv: item("pstkrv", i),
            pstkl: item("pstkl", i),
            pstk: item("pstk", i),
            capx: item("capx", i),
            oancf: item("oancf", i),
            sale: item("sale", i),
            cogs: item("cogs", i),
            xint: item("xint", i),
            xsga: item("xsga", i),
            ..Default::default()
        });
    }
    let skipped = reader.height() - rows.len();
    if skipped > 0 {
        log::debug!("{}: skipped {} rows without gvkey or datadate", FUNDA, skipped);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::frame::date_series;
    use chrono::NaiveDate;
    use polars::prelude::*;

    #[test]
    fn test_parse_funda() {
        let mut columns = vec![
            Series::new("gvkey", &["001690", "012141"]),
            date_series(
                "datadate",
                &[
                    NaiveDate::from_ymd_opt(2020, 9, 30),
                    NaiveDate::from_ymd_opt(2020, 6, 30),
                ],
            ),
        ];
        for item in ITEMS {
            columns.push(Series::new(item, &[Some(1.0), None]));
        }
        let frame = DataFrame::new(columns).unwrap();

        let rows = parse_funda(&frame, "compustat").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].gvkey, "001690");
        assert_eq!(rows[0].year, 2020);
        assert_eq!(rows[0].seq, Some(1.0));
        assert_eq!(rows[1].xsga, None);
    }

    #[test]
    fn test_funda_request_filters_statement_format() {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(1960, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2022, 12, 31).unwrap(),
        )
        .unwrap();
        let request = funda_request(range);
        assert_eq!(request.columns.len(), 18);
        assert!(request
            .predicates
            .contains(&Predicate::eq("consol", "C")));
    }
}
