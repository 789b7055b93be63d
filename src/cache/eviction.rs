//! Eviction Module
//!
//! Priority-weighted least-recently-inserted victim selection.
//!
//! Each entry scores `weight(priority) / age_ms`; the lowest score goes
//! first. Among equal priorities the oldest entry loses, among equal ages
//! the lowest priority loses.

use std::cmp::Ordering;

use crate::cache::CacheEntry;

// == Score ==
/// Eviction score of an entry at `now_ms`. Only used for reporting;
/// selection compares exactly via [`compare_scores`].
pub fn score(entry: &CacheEntry, now_ms: u64) -> f64 {
    entry.priority.weight() as f64 / entry.age_ms(now_ms) as f64
}

// == Compare Scores ==
/// Orders two entries by eviction score, lowest (first to evict) first.
///
/// `w_a / age_a < w_b / age_b` is evaluated as `w_a * age_b < w_b * age_a`
/// so the comparison stays exact. Ties fall back to insertion time, then key.
pub fn compare_scores(a: &CacheEntry, b: &CacheEntry, now_ms: u64) -> Ordering {
    let lhs = a.priority.weight() as u128 * b.age_ms(now_ms) as u128;
    let rhs = b.priority.weight() as u128 * a.age_ms(now_ms) as u128;

    lhs.cmp(&rhs)
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.key.cmp(&b.key))
}

// == Select Victim ==
/// Returns the key of the entry with the minimum score, if any.
pub fn select_victim<'a, I>(entries: I, now_ms: u64) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a CacheEntry>,
{
    entries
        .into_iter()
        .min_by(|a, b| compare_scores(a, b, now_ms))
        .map(|entry| entry.key.as_str())
}
