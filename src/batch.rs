//! Per-identifier batch driver
//!
//! Large tables are fetched one identifier at a time: each job scans a
//! single-identifier slice of the remote table, transforms it and appends
//! the result to the local store, so peak memory is bounded by the largest
//! single security.

use crate::calendar::DateRange;
use crate::data::crsp::{daily_request, parse_daily};
use crate::data::reference::ReferenceSeries;
use crate::data::sources::RemoteSource;
use crate::error::{Result, WrdsError};
use crate::query::ScanRequest;
use crate::store::{ProgressLedger, Record, TableStore};
use crate::transform::daily_excess_returns;
use crate::types::{Permno, SecurityDayExcess};
use hashbrown::HashSet;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

/// Work done for each identifier
pub trait BatchJob {
    type Row: Record;

    /// Stage name used in errors and logs
    fn stage(&self) -> &str;

    /// Local table receiving the appended rows
    fn target_table(&self) -> &str;

    fn request(&self, identifier: i64) -> ScanRequest;

    fn transform(&self, identifier: i64, frame: &DataFrame) -> Result<Vec<Self::Row>>;
}

/// Daily excess returns for one security over the sample period
#[derive(Debug, Clone)]
pub struct DailyReturnsJob {
    range: DateRange,
    risk_free: ReferenceSeries,
    table: String,
}

impl DailyReturnsJob {
    pub fn new(range: DateRange, risk_free: ReferenceSeries, table: impl Into<String>) -> Self {
        Self {
            range,
            risk_free,
            table: table.into(),
        }
    }
}

impl BatchJob for DailyReturnsJob {
    type Row = SecurityDayExcess;

    fn stage(&self) -> &str {
        "daily"
    }

    fn target_table(&self) -> &str {
        &self.table
    }

    fn request(&self, identifier: Permno) -> ScanRequest {
        daily_request(identifier, self.range)
    }

    fn transform(&self, identifier: Permno, frame: &DataFrame) -> Result<Vec<SecurityDayExcess>> {
        let rows = parse_daily(frame, self.stage())?;
        let (rows, report) = daily_excess_returns(rows, &self.risk_free);
        if report.dropped() > 0 {
            log::debug!(
                "permno {}: dropped {} of {} daily rows",
                identifier,
                report.dropped(),
                report.input_rows
            );
        }
        Ok(rows)
    }
}

/// Observer of batch progress
pub trait ProgressSink {
    fn start(&mut self, _total: usize) {}

    /// Called before job `index` (1-based) of `total` runs
    fn advance(&mut self, index: usize, total: usize, identifier: i64);

    fn finish(&mut self, _report: &BatchReport) {}
}

/// Logs progress every `every` jobs
#[derive(Debug, Clone)]
pub struct LogProgress {
    every: usize,
}

impl LogProgress {
    pub fn new(every: usize) -> Self {
        Self {
            every: every.max(1),
        }
    }
}

impl Default for LogProgress {
    fn default() -> Self {
        Self::new(100)
    }
}

impl ProgressSink for LogProgress {
    fn start(&mut self, total: usize) {
        log::info!("Starting batch of {} identifiers", total);
    }

    fn advance(&mut self, index: usize, total: usize, identifier: i64) {
        if index == 1 || index == total || index % self.every == 0 {
            log::info!("Batch {}/{} (identifier {})", index, total, identifier);
        }
    }

    fn finish(&mut self, report: &BatchReport) {
        log::info!(
            "Batch finished: {} appended, {} empty, {} skipped, {} failed, {} rows",
            report.appended,
            report.empty,
            report.skipped,
            report.failed.len(),
            report.rows_written
        );
    }
}

/// Restart and retry behaviour
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchOptions {
    /// Skip identifiers completed by an earlier run instead of starting over
    pub resume: bool,
    /// Extra attempts after a recoverable failure
    pub max_retries: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchFailure {
    pub identifier: i64,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub total: usize,
    pub appended: usize,
    pub empty: usize,
    pub skipped: usize,
    pub rows_written: usize,
    pub failed: Vec<BatchFailure>,
}

/// Runs a [`BatchJob`] over a population of identifiers
pub struct BatchDriver<'a, R: ?Sized, S> {
    source: &'a R,
    store: &'a mut S,
    options: BatchOptions,
}

impl<'a, R, S> BatchDriver<'a, R, S>
where
    R: RemoteSource + ?Sized,
    S: TableStore + ProgressLedger,
{
    pub fn new(source: &'a R, store: &'a mut S, options: BatchOptions) -> Self {
        Self {
            source,
            store,
            options,
        }
    }

    /// Process `identifiers` in order.
    ///
    /// A fresh run drops the target table and its completion records
    /// first. Recoverable failures are retried and then reported; fatal
    /// errors abort the batch, leaving already appended rows in place.
    /// An identifier's rows and its completion record commit together.
    pub fn run<J, P>(
        &mut self,
        job: &J,
        identifiers: &[i64],
        progress: &mut P,
    ) -> Result<BatchReport>
    where
        J: BatchJob,
        P: ProgressSink + ?Sized,
    {
        let table = job.target_table();
        let completed: HashSet<i64> = if self.options.resume {
            self.store.completed_ids(table)?
        } else {
            self.store.drop_table(table)?;
            self.store.clear_progress(table)?;
            HashSet::new()
        };

        let total = identifiers.len();
        let mut report = BatchReport {
            total,
            ..BatchReport::default()
        };
        progress.start(total);

        for (i, &identifier) in identifiers.iter().enumerate() {
            progress.advance(i + 1, total, identifier);
            if completed.contains(&identifier) {
                report.skipped += 1;
                continue;
            }

            let rows = match self.fetch_with_retry(job, identifier) {
                Ok(rows) => rows,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    log::warn!("Giving up on identifier {}: {}", identifier, e);
                    report.failed.push(BatchFailure {
                        identifier,
                        message: e.to_string(),
                    });
                    continue;
                }
            };

            let written = self.store.append_completed(table, identifier, &rows)?;
            if written == 0 {
                report.empty += 1;
            } else {
                report.rows_written += written;
                report.appended += 1;
            }
        }

        progress.finish(&report);
        Ok(report)
    }

    fn fetch_with_retry<J: BatchJob>(&self, job: &J, identifier: i64) -> Result<Vec<J::Row>> {
        let mut attempt = 0;
        loop {
            let result = self
                .source
                .scan(&job.request(identifier))
                .and_then(|frame| job.transform(identifier, &frame));
            match result {
                Ok(rows) => return Ok(rows),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) if attempt < self.options.max_retries => {
                    attempt += 1;
                    log::warn!(
                        "[{}] identifier {} failed (attempt {}): {}",
                        job.stage(),
                        identifier,
                        attempt,
                        e
                    );
                }
                Err(e) => {
                    return Err(WrdsError::Fetch {
                        identifier,
                        message: e.to_string(),
                    })
                }
            }
        }
    }
}
