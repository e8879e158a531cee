//! Temporal join engine
//!
//! Rows are matched on an exact key and, for interval joins, on the probe
//! date falling inside `[valid_from, valid_to]` (inclusive at both ends).
//! Intervals must be closed before they are indexed; open-ended intervals
//! are resolved once, when their source table is loaded.

use chrono::NaiveDate;
use hashbrown::HashMap;
use std::hash::Hash;

/// Value valid over an inclusive date interval
#[derive(Debug, Clone, PartialEq)]
pub struct Validity<V> {
    pub valid_from: NaiveDate,
    pub valid_to: NaiveDate,
    pub value: V,
}

impl<V> Validity<V> {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.valid_from <= date && date <= self.valid_to
    }
}

/// Interval rows grouped by key, each group ordered by `valid_from`
#[derive(Debug, Clone)]
pub struct IntervalIndex<K, V> {
    entries: HashMap<K, Vec<Validity<V>>>,
    len: usize,
}

impl<K: Eq + Hash, V> IntervalIndex<K, V> {
    /// Build from `(key, valid_from, valid_to, value)` rows.
    ///
    /// Ordering within a key is stable for equal start dates.
    pub fn build<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (K, NaiveDate, NaiveDate, V)>,
    {
        let mut entries: HashMap<K, Vec<Validity<V>>> = HashMap::new();
        let mut len = 0;
        for (key, valid_from, valid_to, value) in rows {
            entries.entry(key).or_default().push(Validity {
                valid_from,
                valid_to,
                value,
            });
            len += 1;
        }
        for intervals in entries.values_mut() {
            intervals.sort_by_key(|v| v.valid_from);
        }
        Self { entries, len }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// All values for `key` whose interval contains `date`
    pub fn matches<'a>(&'a self, key: &K, date: NaiveDate) -> impl Iterator<Item = &'a V> + 'a {
        self.entries
            .get(key)
            .into_iter()
            .flat_map(move |intervals| {
                intervals
                    .iter()
                    // sorted by start, nothing later can contain `date`
                    .take_while(move |v| v.valid_from <= date)
                    .filter(move |v| v.contains(date))
                    .map(|v| &v.value)
            })
    }

    /// Earliest-starting interval for `key` that contains `date`
    pub fn first_match(&self, key: &K, date: NaiveDate) -> Option<&V> {
        self.matches(key, date).next()
    }
}

/// Inner interval join: one output row per (probe row, containing interval)
pub fn interval_join<L, K, V, O, P, C>(
    left: &[L],
    index: &IntervalIndex<K, V>,
    probe: P,
    combine: C,
) -> Vec<O>
where
    K: Eq + Hash,
    P: Fn(&L) -> (K, NaiveDate),
    C: Fn(&L, &V) -> O,
{
    let mut out = Vec::with_capacity(left.len());
    for row in left {
        let (key, date) = probe(row);
        for value in index.matches(&key, date) {
            out.push(combine(row, value));
        }
    }
    out
}

/// Left interval join keeping at most the first containing interval
pub fn interval_left_join<L, K, V, O, P, C>(
    left: Vec<L>,
    index: &IntervalIndex<K, V>,
    probe: P,
    combine: C,
) -> Vec<O>
where
    K: Eq + Hash,
    P: Fn(&L) -> (K, NaiveDate),
    C: Fn(L, Option<&V>) -> O,
{
    left.into_iter()
        .map(|row| {
            let (key, date) = probe(&row);
            let matched = index.first_match(&key, date);
            combine(row, matched)
        })
        .collect()
}

/// Exact-key lookup table; the first row inserted for a key wins
#[derive(Debug, Clone)]
pub struct ExactIndex<K, V> {
    entries: HashMap<K, V>,
}

impl<K: Eq + Hash, V> ExactIndex<K, V> {
    pub fn build<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let mut entries = HashMap::new();
        for (key, value) in rows {
            entries.entry(key).or_insert(value);
        }
        Self { entries }
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Left join on an exact key
pub fn left_join_exact<L, K, V, O, P, C>(
    left: Vec<L>,
    index: &ExactIndex<K, V>,
    probe: P,
    combine: C,
) -> Vec<O>
where
    K: Eq + Hash,
    P: Fn(&L) -> K,
    C: Fn(L, Option<&V>) -> O,
{
    left.into_iter()
        .map(|row| {
            let key = probe(&row);
            let matched = index.get(&key);
            combine(row, matched)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_interval_bounds_are_inclusive() {
        let index = IntervalIndex::build([(1i64, d(2000, 1, 1), d(2000, 12, 31), "a")]);
        assert_eq!(index.first_match(&1, d(2000, 1, 1)), Some(&"a"));
        assert_eq!(index.first_match(&1, d(2000, 12, 31)), Some(&"a"));
        assert_eq!(index.first_match(&1, d(1999, 12, 31)), None);
        assert_eq!(index.first_match(&1, d(2001, 1, 1)), None);
        assert_eq!(index.first_match(&2, d(2000, 6, 1)), None);
    }

    #[test]
    fn test_overlapping_intervals_emit_every_match() {
        let index = IntervalIndex::build([
            (1i64, d(2005, 1, 1), d(2010, 12, 31), "late"),
            (1i64, d(2000, 1, 1), d(2006, 12, 31), "early"),
        ]);
        let rows = vec![(1i64, d(2006, 6, 30)), (1i64, d(2008, 1, 31))];
        let joined = interval_join(&rows, &index, |r| (r.0, r.1), |r, v| (r.1, *v));
        assert_eq!(
            joined,
            vec![
                (d(2006, 6, 30), "early"),
                (d(2006, 6, 30), "late"),
                (d(2008, 1, 31), "late"),
            ]
        );
        assert_eq!(index.first_match(&1, d(2006, 6, 30)), Some(&"early"));
    }

    #[test]
    fn test_left_join_keeps_unmatched_rows() {
        let index = IntervalIndex::build([(1i64, d(2000, 1, 1), d(2000, 12, 31), 7)]);
        let rows = vec![(1i64, d(2000, 6, 1)), (1i64, d(2001, 6, 1))];
        let joined = interval_left_join(rows, &index, |r| (r.0, r.1), |r, v| (r.1, v.copied()));
        assert_eq!(joined, vec![(d(2000, 6, 1), Some(7)), (d(2001, 6, 1), None)]);
    }

    #[test]
    fn test_exact_index_first_insert_wins() {
        let index = ExactIndex::build([((1i64, d(2021, 1, 1)), 0.5), ((1i64, d(2021, 1, 1)), 0.9)]);
        assert_eq!(index.len(), 1);
        let joined = left_join_exact(
            vec![(1i64, d(2021, 1, 1)), (2i64, d(2021, 1, 1))],
            &index,
            |r| *r,
            |_, v| v.copied(),
        );
        assert_eq!(joined, vec![Some(0.5), None]);
    }
}
