//! Core row types and code lookups

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable CRSP security identifier
pub type Permno = i64;

/// Stable Compustat firm identifier
pub type Gvkey = String;

/// Row of the CRSP monthly stock file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyPrice {
    pub permno: Permno,
    pub date: NaiveDate,
    pub ret: Option<f64>,
    /// Shares outstanding, in thousands
    pub shrout: Option<f64>,
    /// Last price; negative values are bid/ask midpoints
    pub altprc: Option<f64>,
}

/// Names history row, valid over `[namedt, nameendt]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NameRecord {
    pub permno: Permno,
    pub namedt: NaiveDate,
    pub nameendt: Option<NaiveDate>,
    pub shrcd: Option<i32>,
    pub exchcd: Option<i32>,
    pub siccd: Option<i32>,
}

/// Delisting event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelistingRecord {
    pub permno: Permno,
    pub dlstdt: NaiveDate,
    pub dlret: Option<f64>,
    pub dlstcd: Option<i32>,
}

/// One security-month before enrichment.
///
/// At most one record exists per `(permno, date)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityMonthRecord {
    pub permno: Permno,
    pub date: NaiveDate,
    pub month: NaiveDate,
    pub ret: Option<f64>,
    pub shrout: Option<f64>,
    pub altprc: Option<f64>,
    pub exchcd: Option<i32>,
    pub siccd: Option<i32>,
    pub dlret: Option<f64>,
    pub dlstcd: Option<i32>,
}

/// Security-month with derived fields.
///
/// Rows only exist when excess return, market cap and lagged market cap
/// are all present, so those fields are not optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityMonthEnriched {
    pub permno: Permno,
    pub date: NaiveDate,
    pub month: NaiveDate,
    pub ret: Option<f64>,
    pub shrout: Option<f64>,
    pub altprc: Option<f64>,
    pub exchcd: Option<i32>,
    pub siccd: Option<i32>,
    pub dlret: Option<f64>,
    pub dlstcd: Option<i32>,
    pub ret_adj: Option<f64>,
    pub ret_excess: f64,
    pub mktcap: f64,
    pub mktcap_lag: f64,
    /// Market cap deflated by the CPI of the row's month
    pub real_mktcap: Option<f64>,
    pub exchange: Exchange,
    pub industry: Industry,
    pub gvkey: Option<Gvkey>,
}

/// Row of the CRSP daily stock file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityDayRecord {
    pub permno: Permno,
    pub date: NaiveDate,
    pub ret: Option<f64>,
}

/// Daily excess return
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityDayExcess {
    pub permno: Permno,
    pub date: NaiveDate,
    pub month: NaiveDate,
    pub ret_excess: f64,
}

/// Compustat annual fundamentals row with derived book equity
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FirmYearRecord {
    pub gvkey: Gvkey,
    pub datadate: NaiveDate,
    pub year: i32,
    pub seq: Option<f64>,
    pub ceq: Option<f64>,
    pub at: Option<f64>,
    pub lt: Option<f64>,
    pub txditc: Option<f64>,
    pub txdb: Option<f64>,
    pub itcb: Option<f64>,
    pub pstkrv: Option<f64>,
    pub pstkl: Option<f64>,
    pub pstk: Option<f64>,
    pub capx: Option<f64>,
    pub oancf: Option<f64>,
    pub sale: Option<f64>,
    pub cogs: Option<f64>,
    pub xint: Option<f64>,
    pub xsga: Option<f64>,
    /// Book equity; never zero or negative
    pub be: Option<f64>,
    /// Operating profitability
    pub op: Option<f64>,
    /// Asset growth over the previous fiscal year
    pub inv: Option<f64>,
}

/// CCM link as stored remotely; `linkenddt` is empty for current links
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawLink {
    pub permno: Permno,
    pub gvkey: Gvkey,
    pub linkdt: NaiveDate,
    pub linkenddt: Option<NaiveDate>,
}

/// CCM link with a closed validity interval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub permno: Permno,
    pub gvkey: Gvkey,
    pub linkdt: NaiveDate,
    pub linkenddt: NaiveDate,
}

impl RawLink {
    /// Close an open-ended link at `as_of`
    pub fn resolve(self, as_of: NaiveDate) -> LinkRecord {
        LinkRecord {
            permno: self.permno,
            gvkey: self.gvkey,
            linkdt: self.linkdt,
            linkenddt: self.linkenddt.unwrap_or(as_of),
        }
    }
}

/// Primary listing exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Exchange {
    Nyse,
    Amex,
    Nasdaq,
    Other,
}

impl Exchange {
    /// Map a CRSP exchange code; when-issued codes share their exchange
    pub fn from_code(exchcd: Option<i32>) -> Self {
        match exchcd {
            Some(1) | Some(31) => Exchange::Nyse,
            Some(2) | Some(32) => Exchange::Amex,
            Some(3) | Some(33) => Exchange::Nasdaq,
            _ => Exchange::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Exchange::Nyse => "NYSE",
            Exchange::Amex => "AMEX",
            Exchange::Nasdaq => "NASDAQ",
            Exchange::Other => "Other",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "NYSE" => Exchange::Nyse,
            "AMEX" => Exchange::Amex,
            "NASDAQ" => Exchange::Nasdaq,
            _ => Exchange::Other,
        }
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Industry division by SIC code range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Industry {
    Agriculture,
    Mining,
    Construction,
    Manufacturing,
    Transportation,
    Utilities,
    Wholesale,
    Retail,
    Finance,
    Services,
    Public,
    Missing,
}

impl Industry {
    pub fn from_sic(siccd: Option<i32>) -> Self {
        match siccd {
            Some(1..=999) => Industry::Agriculture,
            Some(1000..=1499) => Industry::Mining,
            Some(1500..=1799) => Industry::Construction,
            Some(2000..=3999) => Industry::Manufacturing,
            Some(4000..=4899) => Industry::Transportation,
            Some(4900..=4999) => Industry::Utilities,
            Some(5000..=5199) => Industry::Wholesale,
            Some(5200..=5999) => Industry::Retail,
            Some(6000..=6999) => Industry::Finance,
            Some(7000..=8999) => Industry::Services,
            Some(9000..=9999) => Industry::Public,
            _ => Industry::Missing,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Industry::Agriculture => "Agriculture",
            Industry::Mining => "Mining",
            Industry::Construction => "Construction",
            Industry::Manufacturing => "Manufacturing",
            Industry::Transportation => "Transportation",
            Industry::Utilities => "Utilities",
            Industry::Wholesale => "Wholesale",
            Industry::Retail => "Retail",
            Industry::Finance => "Finance",
            Industry::Services => "Services",
            Industry::Public => "Public",
            Industry::Missing => "Missing",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "Agriculture" => Industry::Agriculture,
            "Mining" => Industry::Mining,
            "Construction" => Industry::Construction,
            "Manufacturing" => Industry::Manufacturing,
            "Transportation" => Industry::Transportation,
            "Utilities" => Industry::Utilities,
            "Wholesale" => Industry::Wholesale,
            "Retail" => Industry::Retail,
            "Finance" => Industry::Finance,
            "Services" => Industry::Services,
            "Public" => Industry::Public,
            _ => Industry::Missing,
        }
    }
}

impl fmt::Display for Industry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
