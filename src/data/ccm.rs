//! CRSP/Compustat merged link history

use crate::data::frame::FrameReader;
use crate::error::Result;
use crate::join::IntervalIndex;
use crate::query::{Predicate, ScanRequest};
use crate::types::{Gvkey, LinkRecord, Permno, RawLink};
use chrono::NaiveDate;
use polars::prelude::DataFrame;

pub const LNKHIST: &str = "crsp.ccmxpf_lnkhist";

pub const DEFAULT_LINK_TYPES: [&str; 2] = ["LU", "LC"];
pub const DEFAULT_LINK_PRIMACY: [&str; 2] = ["P", "C"];

pub fn links_request(link_types: &[String], link_primacy: &[String]) -> ScanRequest {
    ScanRequest::new(LNKHIST)
        .columns(&["lpermno", "gvkey", "linkdt", "linkenddt"])
        .filter(Predicate::is_in(
            "linktype",
            link_types.iter().map(|t| t.as_str()),
        ))
        .filter(Predicate::is_in(
            "linkprim",
            link_primacy.iter().map(|p| p.as_str()),
        ))
        .filter(Predicate::eq("usedflag", 1i64))
}

pub fn parse_links(frame: &DataFrame, stage: &str) -> Result<Vec<RawLink>> {
    let reader = FrameReader::new(frame, stage, LNKHIST);
    let permno = reader.i64("lpermno")?;
    let gvkey = reader.string("gvkey")?;
    let linkdt = reader.date("linkdt")?;
    let linkenddt = reader.date("linkenddt")?;

    let mut links = Vec::with_capacity(reader.height());
    for i in 0..reader.height() {
        let (Some(permno), Some(gvkey), Some(linkdt)) = (permno[i], gvkey[i].clone(), linkdt[i])
        else {
            continue;
        };
        links.push(RawLink {
            permno,
            gvkey,
            linkdt,
            linkenddt: linkenddt[i],
        });
    }
    Ok(links)
}

/// Close open links at `as_of` and index them by permno.
///
/// `as_of` is fixed for the whole run; a later run may see more matches.
pub fn load_links(raw: Vec<RawLink>, as_of: NaiveDate) -> IntervalIndex<Permno, Gvkey> {
    let open = raw.iter().filter(|l| l.linkenddt.is_none()).count();
    let index = IntervalIndex::build(raw.into_iter().map(|link| {
        let LinkRecord {
            permno,
            gvkey,
            linkdt,
            linkenddt,
        } = link.resolve(as_of);
        (permno, linkdt, linkenddt, gvkey)
    }));
    log::debug!(
        "Indexed {} links ({} open, closed at {})",
        index.len(),
        open,
        as_of
    );
    index
}
