//! Pipeline orchestration
//!
//! Each stage reads from the remote source, transforms in memory and owns
//! its output table in the local store. Stages share nothing but the store
//! handle, which is injected rather than reopened.

pub mod compustat;
pub mod daily;
pub mod links;
pub mod monthly;

use crate::batch::{BatchReport, ProgressSink};
use crate::calendar::DateRange;
use crate::config::{PipelineConfig, ReferenceConfig};
use crate::data::reference::{Granularity, ReferenceFile, ReferenceSeries};
use crate::data::sources::RemoteSource;
use crate::error::{Result, WrdsError};
use crate::query::ScanRequest;
use crate::store::{ProgressLedger, TableStore};
use crate::transform::DropReport;
use chrono::{DateTime, Local, NaiveDate, Utc};
use polars::prelude::DataFrame;
use serde::Serialize;
use uuid::Uuid;

/// Values fixed for the whole run
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub run_id: Uuid,
    /// Open-ended validity intervals close here
    pub run_date: NaiveDate,
    pub range: DateRange,
    pub config: PipelineConfig,
}

impl PipelineContext {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        Ok(Self {
            run_id: Uuid::new_v4(),
            run_date: Local::now().date_naive(),
            range: config.date_range()?,
            config,
        })
    }

    pub fn with_run_date(mut self, run_date: NaiveDate) -> Self {
        self.run_date = run_date;
        self
    }
}

/// Broadcast reference series for a run
#[derive(Debug, Clone, Default)]
pub struct References {
    pub rf_monthly: Option<ReferenceSeries>,
    pub rf_daily: Option<ReferenceSeries>,
    /// Normalized so the latest month is 1.0
    pub cpi: Option<ReferenceSeries>,
}

impl References {
    /// Load every configured series file
    pub fn load(config: &ReferenceConfig) -> Result<Self> {
        let load = |file: &Option<ReferenceFile>, granularity| {
            file.as_ref()
                .map(|f| ReferenceSeries::from_csv(f, granularity))
                .transpose()
        };
        let refs = Self {
            rf_monthly: load(&config.rf_monthly, Granularity::Monthly)?,
            rf_daily: load(&config.rf_daily, Granularity::Daily)?,
            cpi: load(&config.cpi_monthly, Granularity::Monthly)?
                .map(|cpi| cpi.normalized_to_last()),
        };
        log::info!(
            "Reference series: rf_monthly={} rf_daily={} cpi={}",
            refs.rf_monthly.as_ref().map_or(0, ReferenceSeries::len),
            refs.rf_daily.as_ref().map_or(0, ReferenceSeries::len),
            refs.cpi.as_ref().map_or(0, ReferenceSeries::len)
        );
        Ok(refs)
    }

    pub fn rf_monthly(&self) -> Result<&ReferenceSeries> {
        self.rf_monthly.as_ref().ok_or_else(|| {
            WrdsError::ConfigError("reference.rf_monthly is required".to_string())
        })
    }

    pub fn rf_daily(&self) -> Result<&ReferenceSeries> {
        self.rf_daily
            .as_ref()
            .ok_or_else(|| WrdsError::ConfigError("reference.rf_daily is required".to_string()))
    }
}

/// Row counts for one stage
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StageSummary {
    pub stage: String,
    pub table: String,
    pub rows_fetched: usize,
    pub rows_written: usize,
    pub drops: Option<DropReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub run_date: NaiveDate,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub stages: Vec<StageSummary>,
    pub batch: Option<BatchReport>,
}

impl RunSummary {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Scan for a bulk stage; every failure here is fatal and names the stage
pub(crate) fn fetch<R>(source: &R, request: &ScanRequest, stage: &str) -> Result<DataFrame>
where
    R: RemoteSource + ?Sized,
{
    let frame = source.scan(request).map_err(|e| match e {
        WrdsError::Schema { table, column, .. } => WrdsError::schema(stage, table, column),
        WrdsError::Connection {
            target, message, ..
        } => WrdsError::connection(stage, target, message),
        other => WrdsError::connection(stage, request.table.as_str(), other),
    })?;
    log::info!("[{}] fetched {} rows from {}", stage, frame.height(), request.table);
    Ok(frame)
}

/// Runs stages against one source and one store
pub struct Pipeline<'a, R: ?Sized, S> {
    ctx: PipelineContext,
    source: &'a R,
    store: &'a mut S,
    summary: RunSummary,
}

impl<'a, R, S> Pipeline<'a, R, S>
where
    R: RemoteSource + ?Sized,
    S: TableStore + ProgressLedger,
{
    pub fn new(ctx: PipelineContext, source: &'a R, store: &'a mut S) -> Self {
        let summary = RunSummary {
            run_id: ctx.run_id,
            run_date: ctx.run_date,
            started_at: Utc::now(),
            finished_at: None,
            stages: Vec::new(),
            batch: None,
        };
        Self {
            ctx,
            source,
            store,
            summary,
        }
    }

    pub fn context(&self) -> &PipelineContext {
        &self.ctx
    }

    /// Fail fast when the remote source is unreachable
    pub fn check(&self) -> Result<()> {
        self.source.check()
    }

    pub fn run_monthly(&mut self, refs: &References) -> Result<&StageSummary> {
        let stage = monthly::run(
            &self.ctx,
            self.source,
            &mut *self.store,
            refs.rf_monthly()?,
            refs.cpi.as_ref(),
        )?;
        Ok(self.record(stage))
    }

    pub fn run_compustat(&mut self) -> Result<&StageSummary> {
        let stage = compustat::run(&self.ctx, self.source, &mut *self.store)?;
        Ok(self.record(stage))
    }

    pub fn run_links(&mut self) -> Result<&StageSummary> {
        let stage = links::run(&self.ctx, self.source, &mut *self.store)?;
        Ok(self.record(stage))
    }

    pub fn run_daily<P>(&mut self, refs: &References, progress: &mut P) -> Result<&BatchReport>
    where
        P: ProgressSink + ?Sized,
    {
        let report = daily::run(
            &self.ctx,
            self.source,
            &mut *self.store,
            refs.rf_daily()?,
            progress,
        )?;
        Ok(&*self.summary.batch.insert(report))
    }

    /// Every stage in dependency order
    pub fn run_all<P>(&mut self, refs: &References, progress: &mut P) -> Result<()>
    where
        P: ProgressSink + ?Sized,
    {
        self.check()?;
        self.run_monthly(refs)?;
        self.run_compustat()?;
        self.run_links()?;
        self.run_daily(refs, progress)?;
        Ok(())
    }

    pub fn finish(mut self) -> RunSummary {
        self.summary.finished_at = Some(Utc::now());
        self.summary
    }

    fn record(&mut self, stage: StageSummary) -> &StageSummary {
        log::info!(
            "[{}] wrote {} rows to {}",
            stage.stage,
            stage.rows_written,
            stage.table
        );
        self.summary.stages.push(stage);
        &self.summary.stages[self.summary.stages.len() - 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sources::MemorySource;

    #[test]
    fn test_bulk_fetch_failures_name_the_stage() {
        let source = MemorySource::new();
        let err = fetch(&source, &ScanRequest::new("crsp.msf"), "monthly").unwrap_err();
        match err {
            WrdsError::Connection { stage, target, .. } => {
                assert_eq!(stage, "monthly");
                assert_eq!(target, "crsp.msf");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_missing_reference_is_config_error() {
        let refs = References::default();
        assert!(matches!(refs.rf_monthly(), Err(WrdsError::ConfigError(_))));
        assert!(matches!(refs.rf_daily(), Err(WrdsError::ConfigError(_))));
    }

    #[test]
    fn test_summary_serializes() {
        let ctx = PipelineContext::new(PipelineConfig::default())
            .unwrap()
            .with_run_date(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        let summary = RunSummary {
            run_id: ctx.run_id,
            run_date: ctx.run_date,
            started_at: Utc::now(),
            finished_at: None,
            stages: vec![StageSummary {
                stage: "monthly".to_string(),
                table: "crsp_monthly".to_string(),
                rows_fetched: 10,
                rows_written: 8,
                drops: None,
            }],
            batch: None,
        };
        let json = summary.to_json().unwrap();
        assert!(json.contains("\"run_date\": \"2024-01-02\""));
        assert!(json.contains("crsp_monthly"));
    }
}
