//! FRED data source integration
//!
//! Downloads monthly price-index series (CPIAUCNS by default) as CSV.

use crate::calendar::month_start;
use crate::data::reference::ReferenceSeries;
use crate::error::{Result, WrdsError};
use chrono::NaiveDate;
use reqwest::Client;
use std::collections::BTreeMap;
use std::time::Duration;

const FRED_BASE_URL: &str = "https://fred.stlouisfed.org/graph/fredgraph.csv";

/// Consumer price index, all urban consumers, not seasonally adjusted
pub const CPI_SERIES: &str = "CPIAUCNS";

/// FRED data source (no API key required for graph downloads)
pub struct FredSource {
    client: Client,
}

impl FredSource {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| WrdsError::DataError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Fetch a monthly series between two dates
    pub async fn fetch_monthly(
        &self,
        series_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<ReferenceSeries> {
        let url = format!(
            "{}?id={}&cosd={}&coed={}",
            FRED_BASE_URL, series_id, start, end
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| WrdsError::connection("reference", "FRED", e))?;

        if !response.status().is_success() {
            return Err(WrdsError::connection(
                "reference",
                "FRED",
                format!("HTTP {}", response.status()),
            ));
        }

        let text = response
            .text()
            .await
            .map_err(|e| WrdsError::DataError(format!("Failed to read response: {}", e)))?;

        parse_fred_csv(&text)
    }
}

/// Parse the two-column `DATE,<SERIES>` CSV that FRED serves.
///
/// Missing observations are published as `.` and skipped.
pub fn parse_fred_csv(text: &str) -> Result<ReferenceSeries> {
    let mut reader = csv::Reader::from_reader(text.as_bytes());
    let mut values = BTreeMap::new();

    for result in reader.records() {
        let record =
            result.map_err(|e| WrdsError::ParseError(format!("FRED CSV parse error: {}", e)))?;
        let (Some(date), Some(value)) = (record.get(0), record.get(1)) else {
            continue;
        };
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map_err(|e| WrdsError::ParseError(format!("Invalid FRED date '{}': {}", date, e)))?;
        if let Ok(value) = value.trim().parse::<f64>() {
            values.insert(month_start(date), value);
        }
    }

    Ok(ReferenceSeries::from_map(values))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fred_csv_skips_missing() {
        let csv = "DATE,CPIAUCNS\n2021-01-01,261.582\n2021-02-01,.\n2021-03-01,264.877\n";
        let series = parse_fred_csv(csv).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(
            series.get(NaiveDate::from_ymd_opt(2021, 1, 1).unwrap()),
            Some(261.582)
        );
        assert_eq!(series.get(NaiveDate::from_ymd_opt(2021, 2, 1).unwrap()), None);
    }
}
