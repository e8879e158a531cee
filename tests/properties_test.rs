//! Property-based tests for the row-level derivations

use chrono::NaiveDate;
use proptest::prelude::*;
use rusty_wrds::calendar::shift_months;
use rusty_wrds::data::ReferenceSeries;
use rusty_wrds::transform::{
    adjusted_return, enrich_monthly, excess_return, is_liquidation_code, market_cap,
    LIQUIDATION_PENALTY,
};
use rusty_wrds::types::SecurityMonthRecord;
use std::collections::BTreeSet;

fn base_month() -> NaiveDate {
    NaiveDate::from_ymd_opt(2000, 1, 1).unwrap()
}

fn month(offset: u32) -> NaiveDate {
    shift_months(base_month(), offset as i32).unwrap()
}

fn record(offset: u32) -> SecurityMonthRecord {
    let month = month(offset);
    SecurityMonthRecord {
        permno: 10001,
        date: month,
        month,
        ret: Some(0.01),
        shrout: Some(f64::from(offset + 1)),
        altprc: Some(-10.0),
        exchcd: Some(1),
        siccd: Some(2000),
        dlret: None,
        dlstcd: None,
    }
}

fn liquidation_code() -> impl Strategy<Value = i32> {
    prop_oneof![
        Just(500),
        Just(520),
        Just(580),
        Just(584),
        551i32..=574,
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Market cap is strictly positive whenever it exists
    #[test]
    fn market_cap_is_positive_or_missing(
        shrout in prop::option::of(-1e7f64..1e7),
        altprc in prop::option::of(-1e4f64..1e4),
    ) {
        if let Some(mktcap) = market_cap(shrout, altprc) {
            prop_assert!(mktcap > 0.0);
        }
    }

    #[test]
    fn excess_return_never_below_total_loss(
        ret in -5.0f64..5.0,
        rf in -0.5f64..0.5,
    ) {
        let excess = excess_return(Some(ret), Some(rf)).unwrap();
        prop_assert!(excess >= -1.0);
    }

    /// Liquidation-like delistings without a delisting return lose 30%
    #[test]
    fn liquidation_without_dlret_is_penalised(
        ret in prop::option::of(-1.0f64..1.0),
        code in liquidation_code(),
    ) {
        prop_assert!(is_liquidation_code(code));
        prop_assert_eq!(adjusted_return(ret, None, Some(code)), Some(LIQUIDATION_PENALTY));
    }

    /// A lag exists only when the immediately preceding calendar month does
    #[test]
    fn lagged_market_cap_skips_gaps(offsets in prop::collection::btree_set(0u32..36, 1..24)) {
        let rf = ReferenceSeries::monthly((0..36).map(|o| (month(o), 0.0)));
        let records: Vec<SecurityMonthRecord> = offsets.iter().map(|o| record(*o)).collect();

        let (rows, report) = enrich_monthly(records, &rf, None);

        let expected: BTreeSet<u32> = offsets
            .iter()
            .copied()
            .filter(|o| *o > 0 && offsets.contains(&(o - 1)))
            .collect();
        prop_assert_eq!(rows.len(), expected.len());
        prop_assert_eq!(report.missing_mktcap_lag, offsets.len() - expected.len());

        for (row, offset) in rows.iter().zip(expected.iter()) {
            prop_assert_eq!(row.month, month(*offset));
            let previous = market_cap(Some(f64::from(*offset)), Some(-10.0)).unwrap();
            prop_assert!((row.mktcap_lag - previous).abs() < 1e-12);
            prop_assert!(row.mktcap > 0.0);
        }
    }
}
