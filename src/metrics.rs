//! Navigation metrics.
//!
//! Recorded through the `metrics` facade; the host decides whether and where
//! to export them. Without an installed recorder every call is a no-op.
//!
//! - `pageturn_navigations_total{outcome}`: terminal outcomes
//!   (`arrived`, `fell_back`, `superseded`)
//! - `pageturn_fallbacks_total{reason}`: why the AJAX path was abandoned
//! - `pageturn_navigations_deferred_total`: requests parked in the mailbox
//! - `pageturn_animation_race_total{phase, winner}`: leave/enter race winners
//! - `pageturn_navigation_duration_seconds{outcome}`: admission to settlement

use std::time::Duration;

use metrics::{counter, histogram};

use crate::transition::{Phase, RaceWinner};

pub fn record_outcome(outcome: &'static str, elapsed: Duration) {
    counter!("pageturn_navigations_total", "outcome" => outcome).increment(1);
    histogram!("pageturn_navigation_duration_seconds", "outcome" => outcome)
        .record(elapsed.as_secs_f64());
}

pub fn record_fallback(reason: &'static str) {
    counter!("pageturn_fallbacks_total", "reason" => reason).increment(1);
}

pub fn record_deferred() {
    counter!("pageturn_navigations_deferred_total").increment(1);
}

pub fn record_animation_race(phase: Phase, winner: RaceWinner) {
    counter!(
        "pageturn_animation_race_total",
        "phase" => phase.as_str(),
        "winner" => winner.as_str()
    )
    .increment(1);
}
