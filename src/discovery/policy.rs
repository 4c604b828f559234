//! Early-exit, selection and event-kind policies for a discovery run

use serde::{Deserialize, Serialize};

use crate::session::NetworkEventKind;

fn default_collect_cap() -> usize {
    3
}

/// When the poll loop may stop before its timeout elapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum EarlyExitPolicy {
    /// Stop as soon as one candidate has been seen.
    FirstMatch,
    /// Keep polling until `cap` distinct candidates have been seen.
    Collect {
        #[serde(default = "default_collect_cap")]
        cap: usize,
    },
}

impl Default for EarlyExitPolicy {
    fn default() -> Self {
        Self::Collect {
            cap: default_collect_cap(),
        }
    }
}

impl EarlyExitPolicy {
    pub fn should_stop(&self, candidates: usize) -> bool {
        match *self {
            Self::FirstMatch => candidates > 0,
            // a zero cap would stop before anything is seen
            Self::Collect { cap } => candidates >= cap.max(1),
        }
    }
}

/// How the primary candidate is chosen once polling ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Longest URL wins; ties go to the earliest seen.
    #[default]
    Longest,
    /// Earliest seen.
    First,
    /// Most recently seen.
    Last,
    /// First URL naming a `master.m3u8`, otherwise the earliest seen.
    PreferMaster,
}

/// Which network events are inspected for candidates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKindFilter {
    Requests,
    Responses,
    #[default]
    Both,
}

impl EventKindFilter {
    pub fn accepts(&self, kind: NetworkEventKind) -> bool {
        match self {
            Self::Requests => kind == NetworkEventKind::RequestSent,
            Self::Responses => kind == NetworkEventKind::ResponseReceived,
            Self::Both => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_match_stops_on_any_candidate() {
        assert!(!EarlyExitPolicy::FirstMatch.should_stop(0));
        assert!(EarlyExitPolicy::FirstMatch.should_stop(1));
    }

    #[test]
    fn collect_stops_at_cap() {
        let policy = EarlyExitPolicy::Collect { cap: 3 };
        assert!(!policy.should_stop(2));
        assert!(policy.should_stop(3));
        assert!(policy.should_stop(4));
    }

    #[test]
    fn collect_with_zero_cap_behaves_like_first_match() {
        let policy = EarlyExitPolicy::Collect { cap: 0 };
        assert!(!policy.should_stop(0));
        assert!(policy.should_stop(1));
    }

    #[test]
    fn event_kind_filter() {
        use NetworkEventKind::*;
        assert!(EventKindFilter::Requests.accepts(RequestSent));
        assert!(!EventKindFilter::Requests.accepts(ResponseReceived));
        assert!(EventKindFilter::Responses.accepts(ResponseReceived));
        assert!(!EventKindFilter::Responses.accepts(RequestSent));
        assert!(EventKindFilter::Both.accepts(RequestSent));
        assert!(EventKindFilter::Both.accepts(ResponseReceived));
    }
}
