//! Pipeline configuration

use crate::batch::BatchOptions;
use crate::calendar::DateRange;
use crate::data::ccm::{DEFAULT_LINK_PRIMACY, DEFAULT_LINK_TYPES};
use crate::data::crsp::DEFAULT_SHARE_CODES;
use crate::data::reference::ReferenceFile;
use crate::data::sources::FileFormat;
use crate::error::{Result, WrdsError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable holding the remote mirror root
pub const DATA_ROOT_ENV: &str = "WRDS_DATA_ROOT";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub database_path: PathBuf,
    pub source: SourceConfig,
    pub reference: ReferenceConfig,
    pub tables: TableNames,
    pub universe: UniverseFilters,
    pub batch: BatchOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Falls back to `WRDS_DATA_ROOT` when unset
    pub root: Option<PathBuf>,
    pub format: FileFormat,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceConfig {
    pub rf_monthly: Option<ReferenceFile>,
    pub rf_daily: Option<ReferenceFile>,
    pub cpi_monthly: Option<ReferenceFile>,
    /// Download CPI from FRED when no CPI file is configured (feature `async`)
    pub cpi_from_fred: bool,
}

/// Local output table names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableNames {
    pub monthly: String,
    pub daily: String,
    pub compustat: String,
    /// Monthly table with `gvkey` attached; may equal `monthly`
    pub linked: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UniverseFilters {
    pub share_codes: Vec<i32>,
    pub link_types: Vec<String>,
    pub link_primacy: Vec<String>,
}

fn default_start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1960, 1, 1).unwrap_or_default()
}

fn default_end_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2022, 12, 31).unwrap_or_default()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            start_date: default_start_date(),
            end_date: default_end_date(),
            database_path: PathBuf::from("data/tidy_finance.sqlite"),
            source: SourceConfig::default(),
            reference: ReferenceConfig::default(),
            tables: TableNames::default(),
            universe: UniverseFilters::default(),
            batch: BatchOptions::default(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            root: None,
            format: FileFormat::Parquet,
        }
    }
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            monthly: "crsp_monthly".to_string(),
            daily: "crsp_daily".to_string(),
            compustat: "compustat".to_string(),
            linked: "crsp_monthly".to_string(),
        }
    }
}

impl Default for UniverseFilters {
    fn default() -> Self {
        Self {
            share_codes: DEFAULT_SHARE_CODES.to_vec(),
            link_types: DEFAULT_LINK_TYPES.iter().map(|s| s.to_string()).collect(),
            link_primacy: DEFAULT_LINK_PRIMACY.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl PipelineConfig {
    pub fn date_range(&self) -> Result<DateRange> {
        DateRange::new(self.start_date, self.end_date)
    }

    /// Fill the remote root from the environment when the file leaves it out
    pub fn apply_env(&mut self) {
        if self.source.root.is_none() {
            if let Ok(root) = std::env::var(DATA_ROOT_ENV) {
                if !root.is_empty() {
                    self.source.root = Some(PathBuf::from(root));
                }
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.date_range()?;
        if self.source.root.is_none() {
            return Err(WrdsError::ConfigError(format!(
                "No remote data root: set source.root or {}",
                DATA_ROOT_ENV
            )));
        }
        if self.universe.share_codes.is_empty() {
            return Err(WrdsError::ConfigError(
                "universe.share_codes must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
