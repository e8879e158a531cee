//! Per-group selection of a single canonical row

use chrono::NaiveDate;
use hashbrown::HashMap;
use std::hash::Hash;

/// Keep one row per key, replacing the current pick only when `prefer`
/// says the candidate is strictly better.
///
/// Groups appear in the order of their first row; on ties the earliest
/// row in input order is kept.
pub fn select_per_group<T, K, F, P>(rows: Vec<T>, key: F, prefer: P) -> Vec<T>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
    P: Fn(&T, &T) -> bool,
{
    let mut slots: HashMap<K, usize> = HashMap::new();
    let mut selected: Vec<T> = Vec::new();

    for row in rows {
        let k = key(&row);
        match slots.get(&k).copied() {
            Some(slot) => {
                if prefer(&row, &selected[slot]) {
                    selected[slot] = row;
                }
            }
            None => {
                slots.insert(k, selected.len());
                selected.push(row);
            }
        }
    }

    selected
}

/// Keep the row with the latest date in each group
pub fn latest_per_group<T, K, F, D>(rows: Vec<T>, key: F, date: D) -> Vec<T>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
    D: Fn(&T) -> NaiveDate,
{
    select_per_group(rows, key, |candidate, current| date(candidate) > date(current))
}

/// Keep the first row of each group
pub fn first_per_group<T, K, F>(rows: Vec<T>, key: F) -> Vec<T>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    select_per_group(rows, key, |_, _| false)
}
