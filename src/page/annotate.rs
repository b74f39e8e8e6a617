//! Rank annotation for scraped sessions.
//!
//! Each selected session gets a rank badge next to its row in the CLI's
//! scrape and session listings, so the configured preference order is
//! visible at a glance. This module computes the labels.

/// Pair each page session with its 1-based rank in the priority list, if it
/// is selected at all. Duplicate priority entries rank by first occurrence.
pub fn rank_labels(session_ids: &[String], priority: &[String]) -> Vec<(String, Option<usize>)> {
    session_ids
        .iter()
        .map(|id| {
            let rank = priority.iter().position(|p| p == id).map(|i| i + 1);
            (id.clone(), rank)
        })
        .collect()
}

/// Render a rank as the badge text the user sees, e.g. `#1`.
pub fn badge(rank: Option<usize>) -> String {
    match rank {
        Some(n) => format!("#{n}"),
        None => "-".to_string(),
    }
}
