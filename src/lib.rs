//! AJAX page navigation with animated transitions.
//!
//! This crate provides a [`Navigator`] that takes over same-origin link clicks on a
//! server-rendered site: it plays a leave animation while fetching the next page in the
//! background, patches the fetched page's regions into the live document, records history,
//! and plays an enter animation. Any failure falls back to an ordinary full page load.
//!
//! The browser is reached only through capability traits ([`LiveDocument`],
//! [`BrowserHistory`], [`EventSource`], [`PageFetcher`]), so the whole pipeline runs
//! against the in-memory [`MemoryBrowser`] in tests.

pub mod dom;
pub mod domain;
pub mod error;
pub mod events;
pub mod gate;
pub mod history;
pub mod http;
pub mod memory;
pub mod metrics;
pub mod navigator;
pub mod patch;
pub mod transition;

// Re-export commonly used types
pub use dom::{Initializer, LiveDocument, NodeId, Region, initializer};
pub use domain::navigation::{NavigationOutcome, NavigationRequest};
pub use domain::preset::{PRESETS, TransitionPreset};
pub use error::{NavError, Result};
pub use events::{
    ClickEvent, Disposition, ElementSnapshot, EventSource, FormSubmitEvent, MockEventSource,
    PageEvent, PageEventHandler, PopStateEvent,
};
pub use gate::{GateDecision, IgnoreReason};
pub use history::{BrowserHistory, HistoryController, HistoryEntry, HistoryWrite};
pub use http::{MockPageFetcher, PageFetcher, PageResponse, ReqwestPageFetcher};
pub use memory::{AnimationMode, HistoryCall, MemoryBrowser};
pub use navigator::{Admission, Navigator, NavigatorConfig, NavigatorStats};
pub use patch::{DocumentPatcher, IncomingPage};
pub use transition::{RaceWinner, TransitionDirector};
