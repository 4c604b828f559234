//! Run-local set of manifest candidates

use std::collections::HashSet;

use super::filter::is_manifest_url;
use super::policy::SelectionPolicy;
use super::DiscoveryResult;
use crate::utils::constants::MASTER_PLAYLIST_MARKER;

/// What happened to a URL offered to the set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    Accepted,
    Duplicate,
    Rejected,
}

/// Distinct manifest URLs in the order they were first seen.
///
/// The set only grows. URLs that failed the filter are remembered so they
/// are not evaluated again during the same run.
#[derive(Debug, Default)]
pub struct CandidateSet {
    ordered: Vec<String>,
    seen: HashSet<String>,
    rejected: HashSet<String>,
}

impl CandidateSet {
    pub fn offer(&mut self, url: &str) -> Offer {
        if self.seen.contains(url) {
            return Offer::Duplicate;
        }
        if self.rejected.contains(url) {
            return Offer::Rejected;
        }

        if is_manifest_url(url) {
            self.seen.insert(url.to_string());
            self.ordered.push(url.to_string());
            Offer::Accepted
        } else {
            self.rejected.insert(url.to_string());
            Offer::Rejected
        }
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// Candidates in insertion order
    pub fn as_slice(&self) -> &[String] {
        &self.ordered
    }

    /// Pick the primary candidate; the rest become alternatives ordered
    /// longest to shortest (ties keep insertion order).
    pub fn select(self, policy: SelectionPolicy) -> DiscoveryResult {
        let mut ordered = self.ordered;
        if ordered.is_empty() {
            return DiscoveryResult::NotFound;
        }

        let primary = match policy {
            SelectionPolicy::Longest => {
                let mut best = 0;
                for (idx, url) in ordered.iter().enumerate() {
                    if url.len() > ordered[best].len() {
                        best = idx;
                    }
                }
                best
            }
            SelectionPolicy::First => 0,
            SelectionPolicy::Last => ordered.len() - 1,
            SelectionPolicy::PreferMaster => ordered
                .iter()
                .position(|url| url.to_ascii_lowercase().contains(MASTER_PLAYLIST_MARKER))
                .unwrap_or(0),
        };

        let selected = ordered.remove(primary);
        ordered.sort_by(|a, b| b.len().cmp(&a.len()));

        DiscoveryResult::Found {
            selected,
            alternatives: ordered,
        }
    }
}
