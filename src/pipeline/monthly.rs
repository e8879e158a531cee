//! CRSP monthly stage

use super::{fetch, PipelineContext, StageSummary};
use crate::calendar::month_start;
use crate::data::crsp::{
    delistings_request, monthly_prices_request, names_request, parse_delistings,
    parse_monthly_prices, parse_names,
};
use crate::data::reference::ReferenceSeries;
use crate::data::sources::RemoteSource;
use crate::error::Result;
use crate::join::{interval_join, left_join_exact, ExactIndex, IntervalIndex};
use crate::reduce::first_per_group;
use crate::store::{TableStore, WriteMode};
use crate::transform::enrich_monthly;
use crate::types::{DelistingRecord, MonthlyPrice, NameRecord, SecurityMonthRecord};
use chrono::NaiveDate;

const STAGE: &str = "monthly";

/// Join prices with the names history valid on each date, then attach the
/// delisting that falls in the same month.
///
/// Prices without a valid name record drop out, which restricts the
/// universe to the share codes the names were filtered on. When several
/// name records cover one date, the earliest-starting one is kept.
pub fn assemble_monthly(
    prices: Vec<MonthlyPrice>,
    names: Vec<NameRecord>,
    delistings: Vec<DelistingRecord>,
    run_date: NaiveDate,
) -> Vec<SecurityMonthRecord> {
    let names = IntervalIndex::build(names.into_iter().map(|n| {
        (
            n.permno,
            n.namedt,
            n.nameendt.unwrap_or(run_date),
            (n.exchcd, n.siccd),
        )
    }));

    let named = interval_join(
        &prices,
        &names,
        |p| (p.permno, p.date),
        |p, &(exchcd, siccd)| SecurityMonthRecord {
            permno: p.permno,
            date: p.date,
            month: month_start(p.date),
            ret: p.ret,
            shrout: p.shrout,
            altprc: p.altprc,
            exchcd,
            siccd,
            dlret: None,
            dlstcd: None,
        },
    );
    let named = first_per_group(named, |r| (r.permno, r.date));

    let delistings = ExactIndex::build(
        delistings
            .into_iter()
            .map(|d| ((d.permno, month_start(d.dlstdt)), (d.dlret, d.dlstcd))),
    );

    left_join_exact(
        named,
        &delistings,
        |r| (r.permno, r.month),
        |mut r, delisting| {
            if let Some(&(dlret, dlstcd)) = delisting {
                r.dlret = dlret;
                r.dlstcd = dlstcd;
            }
            r
        },
    )
}

pub fn run<R, S>(
    ctx: &PipelineContext,
    source: &R,
    store: &mut S,
    risk_free: &ReferenceSeries,
    cpi: Option<&ReferenceSeries>,
) -> Result<StageSummary>
where
    R: RemoteSource + ?Sized,
    S: TableStore,
{
    let prices = parse_monthly_prices(
        &fetch(source, &monthly_prices_request(ctx.range), STAGE)?,
        STAGE,
    )?;
    let names = parse_names(
        &fetch(
            source,
            &names_request(&ctx.config.universe.share_codes),
            STAGE,
        )?,
        STAGE,
    )?;
    let delistings = parse_delistings(&fetch(source, &delistings_request(), STAGE)?, STAGE)?;

    let rows_fetched = prices.len();
    let records = assemble_monthly(prices, names, delistings, ctx.run_date);
    log::info!(
        "[{}] {} security-months after names and delisting joins",
        STAGE,
        records.len()
    );

    let (enriched, drops) = enrich_monthly(records, risk_free, cpi);
    let table = &ctx.config.tables.monthly;
    drops.log(table);

    let rows_written = store.write(table, &enriched, WriteMode::Overwrite)?;
    Ok(StageSummary {
        stage: STAGE.to_string(),
        table: table.clone(),
        rows_fetched,
        rows_written,
        drops: Some(drops),
    })
}
