//! The navigation controller.
//!
//! One [`Navigator`] exists per page lifetime. It owns the queue state, the
//! transition director and the patcher, and is the only thing that mutates
//! them. Navigations run on the tokio runtime the navigator was initialised
//! in; at most one is in flight at a time.
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use url::Url;

use crate::dom::{Initializer, LiveDocument};
use crate::domain::navigation::{Navigation, NavigationOutcome, NavigationRequest};
use crate::error::Result;
use crate::events::{Disposition, EventSource, PageEvent, PageEventHandler};
use crate::gate::{self, GateDecision};
use crate::history::{BrowserHistory, HistoryController};
use crate::http::{PageFetcher, fetch_page};
use crate::metrics;
use crate::patch::DocumentPatcher;
use crate::transition::TransitionDirector;

pub mod queue;
pub mod types;

pub use queue::NavigationState;
pub use types::NavigatorStats;

use types::StatCounters;

/// Configuration for the navigator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigatorConfig {
    /// Upper bound on waiting for `animationend` in each direction
    pub animation_timeout_ms: u64,

    /// Time the overlay stays in the tree after deactivation before it is
    /// marked invisible
    pub overlay_linger_ms: u64,

    /// Timeout for the page request (production fetcher only)
    pub fetch_timeout_ms: u64,

    /// Value of the `X-Requested-With` header
    pub requested_with: String,

    /// Value of the `Accept` header
    pub accept: String,

    /// Body class marking that scripting is enabled; re-added after the body
    /// class is replaced
    pub scripting_class: String,

    /// Class that makes the overlay visible and interactive
    pub overlay_active_class: String,

    /// Seed for preset selection. `None` seeds from the OS.
    pub preset_seed: Option<u64>,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            animation_timeout_ms: 1200,
            overlay_linger_ms: 400,
            fetch_timeout_ms: 30000,
            requested_with: "XMLHttpRequest".to_string(),
            accept: "text/html,application/xhtml+xml".to_string(),
            scripting_class: "js".to_string(),
            overlay_active_class: "is-active".to_string(),
            preset_seed: None,
        }
    }
}

impl NavigatorConfig {
    /// Parse a JSON config; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| anyhow::anyhow!("Invalid navigator config: {}", e).into())
    }
}

/// Result of handing a request to the queue.
#[derive(Debug)]
pub enum Admission {
    /// The request started immediately. The handle resolves with the outcome
    /// of every navigation this run performed, including drained ones.
    Started(JoinHandle<Vec<NavigationOutcome>>),
    /// Another navigation is in flight; the request now occupies the pending
    /// slot.
    Deferred {
        /// Earlier pending request that was discarded.
        displaced: Option<NavigationRequest>,
    },
}

/// AJAX navigation controller.
pub struct Navigator<D, H, F>
where
    D: LiveDocument,
    H: BrowserHistory,
    F: PageFetcher,
{
    document: Arc<D>,
    history: HistoryController<H>,
    fetcher: Arc<F>,
    director: TransitionDirector,
    patcher: DocumentPatcher,
    queue: Mutex<NavigationState>,
    idle: watch::Sender<bool>,
    stats: StatCounters,
    runtime: Handle,
}

impl<D, H, F> Navigator<D, H, F>
where
    D: LiveDocument + 'static,
    H: BrowserHistory + 'static,
    F: PageFetcher + 'static,
{
    /// Build the navigator and stamp the current history entry.
    ///
    /// Must be called from within a tokio runtime; navigations are spawned
    /// onto it.
    pub fn init(
        document: Arc<D>,
        history: Arc<H>,
        fetcher: Arc<F>,
        config: NavigatorConfig,
        initializers: Vec<Arc<dyn Initializer>>,
    ) -> Result<Arc<Self>> {
        let runtime = Handle::try_current().map_err(|e| {
            anyhow::anyhow!("Navigator must be initialised inside a tokio runtime: {}", e)
        })?;

        let history = HistoryController::new(history);
        history.init(&document.location());

        let mut patcher = DocumentPatcher::new(config.scripting_class.clone());
        for initializer in initializers {
            patcher.add_initializer(initializer);
        }

        tracing::info!(location = %document.location(), "Navigator initialised");

        Ok(Arc::new(Self {
            director: TransitionDirector::new(&config),
            document,
            history,
            fetcher,
            patcher,
            queue: Mutex::new(NavigationState::default()),
            idle: watch::Sender::new(true),
            stats: StatCounters::default(),
            runtime,
        }))
    }

    /// Subscribe to the page's click, submit and popstate events.
    pub fn attach<S: EventSource + ?Sized>(self: &Arc<Self>, source: &S) {
        source.subscribe(Arc::new(NavigationInterceptor {
            navigator: self.clone(),
        }));
    }

    /// Hand a request to the queue: start it now or park it in the pending
    /// slot, replacing whatever was parked there.
    pub fn submit(self: &Arc<Self>, request: NavigationRequest) -> Admission {
        let mut queue = self.queue.lock();
        if !queue.try_begin() {
            tracing::debug!(
                target_url = %request.target,
                navigation_id = %request.id,
                "Navigation in flight, deferring"
            );
            let displaced = queue.defer(request);
            self.stats.record_deferred();
            metrics::record_deferred();
            return Admission::Deferred { displaced };
        }
        self.idle.send_replace(false);
        drop(queue);

        let navigator = self.clone();
        Admission::Started(self.runtime.spawn(navigator.drive(request)))
    }

    /// Run `first` and then every request drained from the pending slot.
    /// The caller must hold the in-flight slot.
    async fn drive(self: Arc<Self>, first: NavigationRequest) -> Vec<NavigationOutcome> {
        let mut slot = SlotGuard {
            queue: &self.queue,
            idle: &self.idle,
            armed: true,
        };
        let mut outcomes = Vec::new();
        let mut current = first;

        loop {
            let outcome = self.run_cycle(current).await;
            self.stats.record(&outcome);
            let completed = outcome.target().clone();
            outcomes.push(outcome);

            match self.settle(&completed) {
                Some(next) => current = next,
                None => break,
            }
        }

        slot.armed = false;
        outcomes
    }

    /// Hand over the pending request, or release the slot and publish idle.
    ///
    /// The idle flag changes only under the queue lock, the same lock
    /// `submit` holds while claiming the slot, so the flag always agrees with
    /// `is_navigating`.
    fn settle(&self, completed: &Url) -> Option<NavigationRequest> {
        let mut queue = self.queue.lock();
        let next = queue.next_after(completed);
        if next.is_none() {
            self.idle.send_replace(true);
        }
        next
    }

    #[tracing::instrument(
        skip(self, request),
        fields(navigation_id = %request.id, target_url = %request.target)
    )]
    async fn run_cycle(&self, request: NavigationRequest) -> NavigationOutcome {
        let started = tokio::time::Instant::now();
        let doc: &dyn LiveDocument = self.document.as_ref();

        let departing = Navigation::new(request).depart(&self.director, doc);
        let leave = departing.leave(&self.director, doc);
        let (_, fetched) = tokio::join!(
            leave,
            fetch_page(self.fetcher.as_ref(), &departing.request.target)
        );

        let superseded_by = {
            let queue = self.queue.lock();
            queue
                .is_superseded(&departing.request.target)
                .then(|| queue.pending_target().cloned())
                .flatten()
        };

        let outcome: NavigationOutcome = if let Some(by) = superseded_by {
            departing.supersede(by, &self.director, doc).into()
        } else {
            match departing.land(fetched, &self.patcher, &self.director, doc) {
                Ok(patched) => {
                    let write = self.history.record(&patched.request);
                    tracing::debug!(history = ?write, "History updated");
                    patched.arrive(&self.director, doc).await.into()
                }
                Err(fell_back) => fell_back.into(),
            }
        };

        tracing::info!(
            outcome = outcome.status(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Navigation settled"
        );
        metrics::record_outcome(outcome.status(), started.elapsed());
        outcome
    }

    /// Visual cue for a regular (non-hijacked) form submission.
    pub fn show_submit_cue(&self) {
        let doc: &dyn LiveDocument = self.document.as_ref();
        let preset = self.director.choose(doc.prefers_reduced_motion());
        self.director.show_overlay(doc, preset);
    }

    /// Resolves once no navigation is in flight and none is pending.
    pub async fn wait_idle(&self) {
        let mut idle = self.idle.subscribe();
        // The sender lives in self, so the channel cannot close here
        let _ = idle.wait_for(|idle| *idle).await;
    }

    pub fn is_navigating(&self) -> bool {
        self.queue.lock().is_navigating()
    }

    /// Deferred requests currently parked (0 or 1).
    pub fn pending_depth(&self) -> usize {
        self.queue.lock().depth()
    }

    pub fn stats(&self) -> NavigatorStats {
        self.stats.snapshot()
    }
}

/// Releases the in-flight slot if a drive ends abnormally (panic or the task
/// being dropped), so the queue can never stay wedged.
struct SlotGuard<'a> {
    queue: &'a Mutex<NavigationState>,
    idle: &'a watch::Sender<bool>,
    armed: bool,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            tracing::warn!("Navigation ended abnormally, releasing queue");
            let mut queue = self.queue.lock();
            queue.release();
            self.idle.send_replace(true);
        }
    }
}

/// Event handler installed by [`Navigator::attach`].
struct NavigationInterceptor<D, H, F>
where
    D: LiveDocument,
    H: BrowserHistory,
    F: PageFetcher,
{
    navigator: Arc<Navigator<D, H, F>>,
}

impl<D, H, F> PageEventHandler for NavigationInterceptor<D, H, F>
where
    D: LiveDocument + 'static,
    H: BrowserHistory + 'static,
    F: PageFetcher + 'static,
{
    fn handle(&self, event: &PageEvent) -> Disposition {
        let location = self.navigator.document.location();
        match event {
            PageEvent::Click(click) => match gate::evaluate_click(click, &location) {
                GateDecision::Intercept(request) => {
                    self.navigator.submit(request);
                    Disposition::Prevented
                }
                GateDecision::Ignore(reason) => {
                    tracing::trace!(reason = ?reason, "Click left to the browser");
                    Disposition::Default
                }
            },
            PageEvent::Submit(submit) => {
                if gate::wants_submit_cue(submit) {
                    self.navigator.show_submit_cue();
                }
                Disposition::Default
            }
            PageEvent::PopState(pop) => {
                let target =
                    HistoryController::<H>::popstate_target(pop.state.as_ref(), &location);
                self.navigator.submit(NavigationRequest::pop_state(target));
                Disposition::Default
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::MockPageFetcher;
    use crate::memory::MemoryBrowser;

    #[test]
    fn test_config_defaults_and_partial_json() {
        let config = NavigatorConfig::default();
        assert_eq!(config.animation_timeout_ms, 1200);
        assert_eq!(config.overlay_linger_ms, 400);
        assert_eq!(config.requested_with, "XMLHttpRequest");

        let config =
            NavigatorConfig::from_json(r#"{ "animation_timeout_ms": 300, "preset_seed": 9 }"#)
                .unwrap();
        assert_eq!(config.animation_timeout_ms, 300);
        assert_eq!(config.preset_seed, Some(9));
        assert_eq!(config.overlay_linger_ms, 400);

        assert!(NavigatorConfig::from_json("{ not json").is_err());
    }

    type TestNavigator = Navigator<MemoryBrowser, MemoryBrowser, MockPageFetcher>;

    fn navigator() -> Arc<TestNavigator> {
        let browser = Arc::new(
            MemoryBrowser::from_html(
                "http://localhost/",
                "<html><body><main data-page-shell>home</main></body></html>",
            )
            .unwrap(),
        );
        Navigator::init(
            browser.clone(),
            browser,
            Arc::new(MockPageFetcher::new()),
            NavigatorConfig::default(),
            Vec::new(),
        )
        .unwrap()
    }

    fn url(path: &str) -> Url {
        Url::parse("http://localhost/").unwrap().join(path).unwrap()
    }

    /// Claim the slot the way `submit` does, without spawning a drive.
    fn claim(navigator: &TestNavigator) {
        let mut queue = navigator.queue.lock();
        assert!(queue.try_begin());
        navigator.idle.send_replace(false);
    }

    fn idle_flag(navigator: &TestNavigator) -> bool {
        *navigator.idle.borrow()
    }

    #[tokio::test]
    async fn test_settle_releases_slot_and_publishes_idle_together() {
        let navigator = navigator();
        claim(&navigator);

        assert!(navigator.settle(&url("/a/")).is_none());
        assert!(!navigator.is_navigating());
        assert!(idle_flag(&navigator));

        // A submit right after settling sees a free slot and flips the flag
        // back; nothing from the finished drive may overwrite it.
        claim(&navigator);
        assert!(navigator.is_navigating());
        assert!(!idle_flag(&navigator));
    }

    #[tokio::test]
    async fn test_settle_hand_over_keeps_busy() {
        let navigator = navigator();
        claim(&navigator);
        navigator.queue.lock().defer(NavigationRequest::push(url("/b/")));

        let next = navigator.settle(&url("/a/")).unwrap();
        assert_eq!(next.target, url("/b/"));
        assert!(navigator.is_navigating());
        assert!(!idle_flag(&navigator));
    }

    #[tokio::test]
    async fn test_armed_slot_guard_releases_queue() {
        let navigator = navigator();
        claim(&navigator);
        navigator.queue.lock().defer(NavigationRequest::push(url("/b/")));

        drop(SlotGuard {
            queue: &navigator.queue,
            idle: &navigator.idle,
            armed: true,
        });

        assert!(!navigator.is_navigating());
        assert_eq!(navigator.pending_depth(), 0);
        assert!(idle_flag(&navigator));
        navigator.wait_idle().await;
    }

    #[test]
    fn test_init_outside_runtime_fails() {
        let browser = Arc::new(
            MemoryBrowser::from_html(
                "http://localhost/",
                "<html><body><main data-page-shell>home</main></body></html>",
            )
            .unwrap(),
        );
        let result = Navigator::init(
            browser.clone(),
            browser,
            Arc::new(MockPageFetcher::new()),
            NavigatorConfig::default(),
            Vec::new(),
        );
        assert!(result.is_err());
    }
}
