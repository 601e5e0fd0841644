//! Navigation types using the typestate pattern.
//!
//! One `Navigation<T>` value tracks a single request through the pipeline.
//! The generic parameter `T` is the current phase; transitions consume the
//! value and return the next phase, so a navigation cannot be patched twice
//! or revealed before it was patched.

use std::fmt;

use chrono::{DateTime, Utc};
use url::Url;
use uuid::Uuid;

use crate::dom::NodeId;
use crate::domain::preset::TransitionPreset;
use crate::transition::RaceWinner;

/// Identifier used to correlate log lines of one navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NavigationId(pub Uuid);

impl NavigationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NavigationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NavigationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is enough to tell navigations apart in logs
        write!(f, "{}", &self.0.simple().to_string()[..8])
    }
}

/// A request to navigate, created per intercepted click, submit or popstate
/// and consumed once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationRequest {
    pub id: NavigationId,
    /// Absolute target URL.
    pub target: Url,
    /// Write history with `replaceState` instead of `pushState`.
    pub replace_history: bool,
    /// Triggered by `popstate`; history must not be written again.
    pub is_pop_state: bool,
}

impl NavigationRequest {
    /// Ordinary link navigation (pushes a history entry).
    pub fn push(target: Url) -> Self {
        Self {
            id: NavigationId::new(),
            target,
            replace_history: false,
            is_pop_state: false,
        }
    }

    pub fn replace(target: Url) -> Self {
        Self {
            replace_history: true,
            ..Self::push(target)
        }
    }

    pub fn pop_state(target: Url) -> Self {
        Self {
            is_pop_state: true,
            ..Self::push(target)
        }
    }
}

/// Marker trait for valid navigation phases.
pub trait NavigationPhase: Send + Sync {}

#[derive(Debug, Clone)]
pub struct Navigation<T: NavigationPhase> {
    pub request: NavigationRequest,
    pub state: T,
}

// ============================================================================
// Navigation Phases
// ============================================================================

/// Admitted by the queue, nothing visible has happened yet.
#[derive(Debug, Clone)]
pub struct Requested {
    pub requested_at: DateTime<Utc>,
}

impl NavigationPhase for Requested {}

/// Overlay shown, leave animation running, fetch in flight.
#[derive(Debug, Clone)]
pub struct Departing {
    pub requested_at: DateTime<Utc>,
    pub departed_at: DateTime<Utc>,
    pub preset: &'static TransitionPreset,
    /// Page shell at departure time; `None` when the page has none.
    pub shell: Option<NodeId>,
}

impl NavigationPhase for Departing {}

/// Incoming regions applied to the live document.
#[derive(Debug, Clone)]
pub struct Patched {
    pub requested_at: DateTime<Utc>,
    pub patched_at: DateTime<Utc>,
    pub preset: &'static TransitionPreset,
    /// The freshly inserted page shell.
    pub shell: Option<NodeId>,
}

impl NavigationPhase for Patched {}

/// Enter animation finished, page revealed (terminal).
#[derive(Debug, Clone)]
pub struct Arrived {
    pub requested_at: DateTime<Utc>,
    pub arrived_at: DateTime<Utc>,
    pub preset: &'static TransitionPreset,
    /// Which branch ended the enter animation; `None` without a page shell.
    pub enter: Option<RaceWinner>,
}

impl NavigationPhase for Arrived {}

/// Which stage of the pipeline gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackKind {
    Fetch,
    Patch,
}

/// AJAX path abandoned, hard navigation issued (terminal).
#[derive(Debug, Clone)]
pub struct FellBack {
    pub requested_at: DateTime<Utc>,
    pub failed_at: DateTime<Utc>,
    pub kind: FallbackKind,
    pub reason: String,
}

impl NavigationPhase for FellBack {}

/// A newer request arrived while this one was in flight; its response was
/// discarded (terminal).
#[derive(Debug, Clone)]
pub struct Superseded {
    pub requested_at: DateTime<Utc>,
    pub superseded_at: DateTime<Utc>,
    pub by: Url,
}

impl NavigationPhase for Superseded {}

// ============================================================================
// Unified Outcome
// ============================================================================

/// Terminal result of one navigation cycle.
#[derive(Debug, Clone)]
pub enum NavigationOutcome {
    Arrived(Navigation<Arrived>),
    FellBack(Navigation<FellBack>),
    Superseded(Navigation<Superseded>),
}

impl NavigationOutcome {
    pub fn request(&self) -> &NavigationRequest {
        match self {
            NavigationOutcome::Arrived(n) => &n.request,
            NavigationOutcome::FellBack(n) => &n.request,
            NavigationOutcome::Superseded(n) => &n.request,
        }
    }

    pub fn target(&self) -> &Url {
        &self.request().target
    }

    pub fn status(&self) -> &'static str {
        match self {
            NavigationOutcome::Arrived(_) => "arrived",
            NavigationOutcome::FellBack(_) => "fell_back",
            NavigationOutcome::Superseded(_) => "superseded",
        }
    }

    pub fn is_arrived(&self) -> bool {
        matches!(self, NavigationOutcome::Arrived(_))
    }
}

impl From<Navigation<Arrived>> for NavigationOutcome {
    fn from(n: Navigation<Arrived>) -> Self {
        NavigationOutcome::Arrived(n)
    }
}

impl From<Navigation<FellBack>> for NavigationOutcome {
    fn from(n: Navigation<FellBack>) -> Self {
        NavigationOutcome::FellBack(n)
    }
}

impl From<Navigation<Superseded>> for NavigationOutcome {
    fn from(n: Navigation<Superseded>) -> Self {
        NavigationOutcome::Superseded(n)
    }
}
