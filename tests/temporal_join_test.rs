//! Temporal join behaviour at the public API

use chrono::NaiveDate;
use rusty_wrds::calendar::month_start;
use rusty_wrds::data::ccm::load_links;
use rusty_wrds::join::{interval_join, IntervalIndex};
use rusty_wrds::pipeline::links::attach_links;
use rusty_wrds::types::{Exchange, Industry, RawLink, SecurityMonthEnriched};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn open_link(permno: i64, gvkey: &str, linkdt: NaiveDate) -> RawLink {
    RawLink {
        permno,
        gvkey: gvkey.to_string(),
        linkdt,
        linkenddt: None,
    }
}

fn security_month(permno: i64, date: NaiveDate) -> SecurityMonthEnriched {
    SecurityMonthEnriched {
        permno,
        date,
        month: month_start(date),
        ret: Some(0.01),
        shrout: Some(100.0),
        altprc: Some(10.0),
        exchcd: Some(1),
        siccd: Some(3571),
        dlret: None,
        dlstcd: None,
        ret_adj: Some(0.01),
        ret_excess: 0.0,
        mktcap: 1.0,
        mktcap_lag: 1.0,
        real_mktcap: None,
        exchange: Exchange::Nyse,
        industry: Industry::Manufacturing,
        gvkey: None,
    }
}

#[test]
fn test_open_link_resolved_at_run_date() {
    let links = load_links(vec![open_link(1, "001690", d(2000, 1, 1))], d(2030, 6, 30));

    assert!(links.first_match(&1, d(2030, 1, 1)).is_some());
    assert!(links.first_match(&1, d(1999, 12, 31)).is_none());
}

#[test]
fn test_open_link_does_not_reach_past_run_date() {
    let links = load_links(vec![open_link(1, "001690", d(2000, 1, 1))], d(2024, 1, 2));
    assert!(links.first_match(&1, d(2024, 1, 2)).is_some());
    assert!(links.first_match(&1, d(2030, 1, 1)).is_none());
}

#[test]
fn test_attach_links_keeps_unlinked_rows() {
    let links = load_links(
        vec![
            open_link(1, "001690", d(2000, 1, 1)),
            RawLink {
                permno: 2,
                gvkey: "012141".to_string(),
                linkdt: d(1986, 3, 13),
                linkenddt: Some(d(2020, 12, 31)),
            },
        ],
        d(2024, 1, 2),
    );
    let rows = vec![
        security_month(1, d(2021, 1, 29)),
        security_month(2, d(2021, 1, 29)),
        security_month(3, d(2021, 1, 29)),
    ];

    let (rows, linked) = attach_links(rows, &links);
    assert_eq!(linked, 1);
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].gvkey.as_deref(), Some("001690"));
    assert_eq!(rows[1].gvkey, None);
    assert_eq!(rows[2].gvkey, None);
}

#[test]
fn test_successive_links_switch_on_boundary() {
    let links = load_links(
        vec![
            RawLink {
                permno: 1,
                gvkey: "A".to_string(),
                linkdt: d(2000, 1, 1),
                linkenddt: Some(d(2010, 6, 30)),
            },
            open_link(1, "B", d(2010, 7, 1)),
        ],
        d(2024, 1, 2),
    );
    let probes = vec![d(2010, 6, 30), d(2010, 7, 1)];
    let joined = interval_join(&probes, &links, |p| (1i64, *p), |p, g| (*p, g.clone()));
    assert_eq!(
        joined,
        vec![
            (d(2010, 6, 30), "A".to_string()),
            (d(2010, 7, 1), "B".to_string())
        ]
    );
}

#[test]
fn test_index_len_counts_every_interval() {
    let index = IntervalIndex::build([
        (1i64, d(2000, 1, 1), d(2000, 12, 31), ()),
        (1i64, d(2001, 1, 1), d(2001, 12, 31), ()),
        (2i64, d(2000, 1, 1), d(2000, 12, 31), ()),
    ]);
    assert_eq!(index.len(), 3);
}
