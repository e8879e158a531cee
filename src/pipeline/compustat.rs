//! Compustat firm-year stage

use super::{fetch, PipelineContext, StageSummary};
use crate::data::compustat::{funda_request, parse_funda};
use crate::data::sources::RemoteSource;
use crate::error::Result;
use crate::store::{TableStore, WriteMode};
use crate::transform::prepare_firm_years;

const STAGE: &str = "compustat";

pub fn run<R, S>(ctx: &PipelineContext, source: &R, store: &mut S) -> Result<StageSummary>
where
    R: RemoteSource + ?Sized,
    S: TableStore,
{
    let records = parse_funda(&fetch(source, &funda_request(ctx.range), STAGE)?, STAGE)?;
    let rows_fetched = records.len();

    let firm_years = prepare_firm_years(records);
    let missing_be = firm_years.iter().filter(|r| r.be.is_none()).count();
    log::info!(
        "[{}] {} firm-years from {} statements ({} without positive book equity)",
        STAGE,
        firm_years.len(),
        rows_fetched,
        missing_be
    );

    let table = &ctx.config.tables.compustat;
    let rows_written = store.write(table, &firm_years, WriteMode::Overwrite)?;
    Ok(StageSummary {
        stage: STAGE.to_string(),
        table: table.clone(),
        rows_fetched,
        rows_written,
        drops: None,
    })
}
