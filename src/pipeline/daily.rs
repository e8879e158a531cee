//! CRSP daily stage, run as one batch per security

use super::PipelineContext;
use crate::batch::{BatchDriver, BatchReport, DailyReturnsJob, ProgressSink};
use crate::data::reference::ReferenceSeries;
use crate::data::sources::RemoteSource;
use crate::error::{Result, WrdsError};
use crate::store::{ProgressLedger, TableStore};
use rusqlite::types::Value as SqlValue;
use std::collections::BTreeSet;

/// Distinct permnos of the monthly table, ascending
pub fn security_population<S: TableStore>(store: &S, monthly_table: &str) -> Result<Vec<i64>> {
    if !store.table_exists(monthly_table)? {
        return Err(WrdsError::store(
            monthly_table,
            "monthly table missing; run the monthly stage first",
        ));
    }
    let permnos: BTreeSet<i64> = store
        .read_rows(monthly_table, &[], &["permno"])?
        .into_iter()
        .filter_map(|row| match row.first() {
            Some(SqlValue::Integer(permno)) => Some(*permno),
            _ => None,
        })
        .collect();
    Ok(permnos.into_iter().collect())
}

pub fn run<R, S, P>(
    ctx: &PipelineContext,
    source: &R,
    store: &mut S,
    risk_free: &ReferenceSeries,
    progress: &mut P,
) -> Result<BatchReport>
where
    R: RemoteSource + ?Sized,
    S: TableStore + ProgressLedger,
    P: ProgressSink + ?Sized,
{
    let tables = &ctx.config.tables;
    let population = security_population(store, &tables.monthly)?;
    log::info!(
        "[daily] {} securities, {} to {}",
        population.len(),
        ctx.range.start,
        ctx.range.end
    );

    let job = DailyReturnsJob::new(ctx.range, risk_free.clone(), tables.daily.as_str());
    BatchDriver::new(source, store, ctx.config.batch.clone()).run(&job, &population, progress)
}
