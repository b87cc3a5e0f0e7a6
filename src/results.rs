//! Vote list → per-option percentages.
//!
//! The service owns the authoritative tallies; this module only renders a
//! cached vote list as integer percentages. Votes are deduplicated by
//! `user_id` before counting (last entry wins), so a list that briefly
//! carries two entries for one participant can never double-count.
//! Percentages round half-up independently per option; the row total may
//! therefore differ from 100, which is accepted rather than corrected.

use std::collections::HashMap;

use crate::model::Vote;

/// Canonical form used for option comparison: surrounding whitespace
/// trimmed. Wire-level type coercion already happened at ingestion.
fn normalize_option(option: &str) -> &str {
    option.trim()
}

/// Percentage of (deduplicated) votes cast for `option`.
pub fn percentage(votes: &[Vote], option: &str) -> u8 {
    percentages_for(votes, std::slice::from_ref(&option.to_string()))[0]
}

/// Percentages for every option in `options`, in order.
///
/// An empty vote list yields 0 for every option.
pub fn percentages_for(votes: &[Vote], options: &[String]) -> Vec<u8> {
    // Dedup by user id, last entry winning, preserving nothing but the
    // chosen option.
    let mut by_user: HashMap<&str, &str> = HashMap::new();
    for vote in votes {
        by_user.insert(vote.user_id.as_str(), normalize_option(&vote.option));
    }

    let total = by_user.len();
    if total == 0 {
        return vec![0; options.len()];
    }

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for option in by_user.values() {
        *counts.entry(option).or_insert(0) += 1;
    }

    options
        .iter()
        .map(|option| {
            let count = counts.get(normalize_option(option)).copied().unwrap_or(0);
            (100.0 * count as f64 / total as f64).round() as u8
        })
        .collect()
}
