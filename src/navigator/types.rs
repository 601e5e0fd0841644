//! Navigator statistics.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::domain::navigation::NavigationOutcome;

/// Point-in-time counters for one navigator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NavigatorStats {
    /// Navigations that patched the page and played the enter animation.
    pub arrived: u64,
    /// Navigations that ended in a hard browser navigation.
    pub fell_back: u64,
    /// Navigations whose response was discarded in favour of a newer request.
    pub superseded: u64,
    /// Requests parked in the mailbox while another navigation was in flight.
    pub deferred: u64,
}

#[derive(Debug, Default)]
pub(crate) struct StatCounters {
    arrived: AtomicU64,
    fell_back: AtomicU64,
    superseded: AtomicU64,
    deferred: AtomicU64,
}

impl StatCounters {
    pub(crate) fn record(&self, outcome: &NavigationOutcome) {
        let counter = match outcome {
            NavigationOutcome::Arrived(_) => &self.arrived,
            NavigationOutcome::FellBack(_) => &self.fell_back,
            NavigationOutcome::Superseded(_) => &self.superseded,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_deferred(&self) {
        self.deferred.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> NavigatorStats {
        NavigatorStats {
            arrived: self.arrived.load(Ordering::Relaxed),
            fell_back: self.fell_back.load(Ordering::Relaxed),
            superseded: self.superseded.load(Ordering::Relaxed),
            deferred: self.deferred.load(Ordering::Relaxed),
        }
    }
}
