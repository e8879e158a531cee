//! CRSP/Compustat link stage

use super::{fetch, PipelineContext, StageSummary};
use crate::data::ccm::{links_request, load_links, parse_links};
use crate::data::sources::RemoteSource;
use crate::error::{Result, WrdsError};
use crate::join::{interval_left_join, IntervalIndex};
use crate::store::{TableStore, WriteMode};
use crate::types::{Gvkey, Permno, SecurityMonthEnriched};

const STAGE: &str = "links";

/// Set `gvkey` from the link valid on each row's date; unlinked rows keep
/// `None`. Returns the rows and the number that found a link.
pub fn attach_links(
    rows: Vec<SecurityMonthEnriched>,
    links: &IntervalIndex<Permno, Gvkey>,
) -> (Vec<SecurityMonthEnriched>, usize) {
    let rows = interval_left_join(
        rows,
        links,
        |r| (r.permno, r.date),
        |mut r, gvkey| {
            r.gvkey = gvkey.cloned();
            r
        },
    );
    let linked = rows.iter().filter(|r| r.gvkey.is_some()).count();
    (rows, linked)
}

pub fn run<R, S>(ctx: &PipelineContext, source: &R, store: &mut S) -> Result<StageSummary>
where
    R: RemoteSource + ?Sized,
    S: TableStore,
{
    let tables = &ctx.config.tables;
    if !store.table_exists(&tables.monthly)? {
        return Err(WrdsError::store(
            tables.monthly.as_str(),
            "monthly table missing; run the monthly stage first",
        ));
    }

    let universe = &ctx.config.universe;
    let raw = parse_links(
        &fetch(
            source,
            &links_request(&universe.link_types, &universe.link_primacy),
            STAGE,
        )?,
        STAGE,
    )?;
    let rows_fetched = raw.len();
    let links = load_links(raw, ctx.run_date);

    let monthly: Vec<SecurityMonthEnriched> = store.load(&tables.monthly, &[])?;
    let (linked_rows, linked) = attach_links(monthly, &links);
    log::info!(
        "[{}] {} of {} security-months linked to a gvkey",
        STAGE,
        linked,
        linked_rows.len()
    );

    let rows_written = store.write(&tables.linked, &linked_rows, WriteMode::Overwrite)?;
    Ok(StageSummary {
        stage: STAGE.to_string(),
        table: tables.linked.clone(),
        rows_fetched,
        rows_written,
        drops: None,
    })
}
