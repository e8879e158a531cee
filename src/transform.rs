//! Row-level derivations for security-month, security-day and firm-year rows.
//!
//! Every function here is pure. Missing inputs are `None` and propagate
//! through arithmetic; nothing in this module fails on data quality.

use crate::calendar::{month_start, next_month};
use crate::data::reference::ReferenceSeries;
use crate::join::{left_join_exact, ExactIndex};
use crate::reduce::latest_per_group;
use crate::types::{
    Exchange, FirmYearRecord, Industry, SecurityDayExcess, SecurityDayRecord,
    SecurityMonthEnriched, SecurityMonthRecord,
};
use chrono::Datelike;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Shares are reported in thousands; market cap is kept in millions of USD
pub const MARKET_CAP_SCALE: f64 = 1.0 / 1000.0;

/// Return assigned to liquidation-like delistings without a delisting return
pub const LIQUIDATION_PENALTY: f64 = -0.30;

/// Return assigned to every other delisting without a delisting return
pub const DELISTING_FULL_LOSS: f64 = -1.0;

/// Delisting code for securities that are still trading
pub const ACTIVE_DELISTING_CODE: i32 = 100;

/// A security cannot lose more than its full value
pub const RETURN_FLOOR: f64 = -1.0;

fn add(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    a.zip(b).map(|(a, b)| a + b)
}

fn sub(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    a.zip(b).map(|(a, b)| a - b)
}

/// Delisting codes treated as liquidation-like
pub fn is_liquidation_code(code: i32) -> bool {
    matches!(code, 500 | 520 | 580 | 584 | 551..=574)
}

/// `|shrout * altprc|` scaled to millions; zero becomes missing
pub fn market_cap(shrout: Option<f64>, altprc: Option<f64>) -> Option<f64> {
    shrout
        .zip(altprc)
        .map(|(s, p)| (s * p).abs() * MARKET_CAP_SCALE)
        .filter(|m| *m != 0.0 && m.is_finite())
}

/// Delisting-adjusted return; the first matching rule wins
pub fn adjusted_return(ret: Option<f64>, dlret: Option<f64>, dlstcd: Option<i32>) -> Option<f64> {
    match (dlstcd, dlret) {
        (None, _) => ret,
        (Some(_), Some(dlret)) => Some(dlret),
        (Some(code), None) if is_liquidation_code(code) => Some(LIQUIDATION_PENALTY),
        (Some(ACTIVE_DELISTING_CODE), None) => ret,
        (Some(_), None) => Some(DELISTING_FULL_LOSS),
    }
}

/// Return in excess of the risk-free rate, floored at -1; NaN stays missing
pub fn excess_return(ret: Option<f64>, risk_free: Option<f64>) -> Option<f64> {
    sub(ret, risk_free)
        .filter(|r| r.is_finite())
        .map(|r| r.max(RETURN_FLOOR))
}

/// Rows removed by the required-field filter.
///
/// A row missing several fields counts once per field, so the per-field
/// counts can sum to more than `dropped()`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropReport {
    pub input_rows: usize,
    pub kept_rows: usize,
    pub missing_ret_excess: usize,
    pub missing_mktcap: usize,
    pub missing_mktcap_lag: usize,
}

impl DropReport {
    pub fn dropped(&self) -> usize {
        self.input_rows - self.kept_rows
    }

    pub fn log(&self, table: &str) {
        log::info!(
            "{}: kept {} of {} rows (missing ret_excess: {}, mktcap: {}, mktcap_lag: {})",
            table,
            self.kept_rows,
            self.input_rows,
            self.missing_ret_excess,
            self.missing_mktcap,
            self.missing_mktcap_lag
        );
    }
}

struct MonthlyDraft {
    record: SecurityMonthRecord,
    mktcap: Option<f64>,
    ret_adj: Option<f64>,
    ret_excess: Option<f64>,
    real_mktcap: Option<f64>,
}

fn draft(
    record: SecurityMonthRecord,
    risk_free: &ReferenceSeries,
    cpi: Option<&ReferenceSeries>,
) -> MonthlyDraft {
    let mktcap = market_cap(record.shrout, record.altprc);
    let ret_adj = adjusted_return(record.ret, record.dlret, record.dlstcd);
    let ret_excess = excess_return(ret_adj, risk_free.get(record.month));
    let real_mktcap = cpi
        .and_then(|cpi| cpi.get(record.month))
        .zip(mktcap)
        .filter(|(index, _)| *index != 0.0)
        .map(|(index, m)| m / index);
    MonthlyDraft {
        record,
        mktcap,
        ret_adj,
        ret_excess,
        real_mktcap,
    }
}

/// Enrich security-months and drop rows without excess return, market cap
/// or lagged market cap.
///
/// The lag is found by shifting each month forward by one calendar month
/// and joining on `(permno, month)`, so a gap in a security's history
/// yields a missing lag rather than an older value.
pub fn enrich_monthly(
    records: Vec<SecurityMonthRecord>,
    risk_free: &ReferenceSeries,
    cpi: Option<&ReferenceSeries>,
) -> (Vec<SecurityMonthEnriched>, DropReport) {
    let drafts: Vec<MonthlyDraft> = records
        .into_par_iter()
        .map(|record| draft(record, risk_free, cpi))
        .collect();

    let lagged = ExactIndex::build(drafts.iter().filter_map(|d| {
        let mktcap = d.mktcap?;
        let target = next_month(d.record.month)?;
        Some(((d.record.permno, target), mktcap))
    }));

    let joined = left_join_exact(
        drafts,
        &lagged,
        |d| (d.record.permno, d.record.month),
        |d, lag| (d, lag.copied()),
    );

    let mut report = DropReport {
        input_rows: joined.len(),
        ..DropReport::default()
    };
    let mut enriched = Vec::with_capacity(joined.len());

    for (d, mktcap_lag) in joined {
        report.missing_ret_excess += d.ret_excess.is_none() as usize;
        report.missing_mktcap += d.mktcap.is_none() as usize;
        report.missing_mktcap_lag += mktcap_lag.is_none() as usize;

        let (Some(ret_excess), Some(mktcap), Some(mktcap_lag)) =
            (d.ret_excess, d.mktcap, mktcap_lag)
        else {
            continue;
        };
        let r = d.record;
        enriched.push(SecurityMonthEnriched {
            exchange: Exchange::from_code(r.exchcd),
            industry: Industry::from_sic(r.siccd),
            permno: r.permno,
            date: r.date,
            month: r.month,
            ret: r.ret,
            shrout: r.shrout,
            altprc: r.altprc,
            exchcd: r.exchcd,
            siccd: r.siccd,
            dlret: r.dlret,
            dlstcd: r.dlstcd,
            ret_adj: d.ret_adj,
            ret_excess,
            mktcap,
            mktcap_lag,
            real_mktcap: d.real_mktcap,
            gvkey: None,
        });
    }

    report.kept_rows = enriched.len();
    (enriched, report)
}

/// Daily excess returns; rows without a return or risk-free rate are dropped
pub fn daily_excess_returns(
    rows: Vec<SecurityDayRecord>,
    risk_free: &ReferenceSeries,
) -> (Vec<SecurityDayExcess>, DropReport) {
    let input_rows = rows.len();
    let out: Vec<SecurityDayExcess> = rows
        .into_iter()
        .filter_map(|row| {
            let ret_excess = excess_return(row.ret, risk_free.get(row.date))?;
            Some(SecurityDayExcess {
                permno: row.permno,
                date: row.date,
                month: month_start(row.date),
                ret_excess,
            })
        })
        .collect();
    let report = DropReport {
        input_rows,
        kept_rows: out.len(),
        missing_ret_excess: input_rows - out.len(),
        ..DropReport::default()
    };
    (out, report)
}

/// Book equity with fallback precedence; null unless strictly positive
pub fn book_equity(r: &FirmYearRecord) -> Option<f64> {
    let stockholders = r
        .seq
        .or_else(|| add(r.ceq, r.pstk))
        .or_else(|| sub(r.at, r.lt));
    let deferred = r.txditc.or_else(|| add(r.txdb, r.itcb)).unwrap_or(0.0);
    let preferred = r.pstkrv.or(r.pstkl).or(r.pstk).unwrap_or(0.0);
    stockholders
        .map(|se| se + deferred - preferred)
        .filter(|be| *be > 0.0)
}

/// Operating profitability scaled by book equity
pub fn operating_profitability(r: &FirmYearRecord) -> Option<f64> {
    let be = r.be?;
    let sale = r.sale?;
    let profit =
        sale - r.cogs.unwrap_or(0.0) - r.xsga.unwrap_or(0.0) - r.xint.unwrap_or(0.0);
    Some(profit / be)
}

/// Derive book equity, keep the latest filing per `(gvkey, fiscal year)`,
/// then derive profitability and investment.
///
/// Investment joins total assets from the same firm's previous fiscal
/// year; a missing year gives a missing value.
pub fn prepare_firm_years(records: Vec<FirmYearRecord>) -> Vec<FirmYearRecord> {
    let derived: Vec<FirmYearRecord> = records
        .into_par_iter()
        .map(|mut r| {
            r.year = r.datadate.year();
            r.be = book_equity(&r);
            r
        })
        .collect();

    let latest = latest_per_group(derived, |r| (r.gvkey.clone(), r.year), |r| r.datadate);

    let assets = ExactIndex::build(
        latest
            .iter()
            .filter_map(|r| Some(((r.gvkey.clone(), r.year + 1), r.at?))),
    );

    left_join_exact(
        latest,
        &assets,
        |r| (r.gvkey.clone(), r.year),
        |mut r, at_lag| {
            r.op = operating_profitability(&r);
            r.inv = match (r.at, at_lag.copied()) {
                (Some(at), Some(at_lag)) if at_lag > 0.0 => Some(at / at_lag - 1.0),
                _ => None,
            };
            r
        },
    )
}
