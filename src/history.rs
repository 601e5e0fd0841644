//! Browser history synchronisation.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::domain::navigation::NavigationRequest;

/// History state object written for every AJAX navigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub url: String,
}

impl HistoryEntry {
    pub fn new(url: &Url) -> Self {
        Self {
            url: url.to_string(),
        }
    }

    pub fn to_state(&self) -> serde_json::Value {
        serde_json::json!({ "url": self.url })
    }

    /// Read a state object; anything without a string `url` is treated as
    /// absent.
    pub fn from_state(state: &serde_json::Value) -> Option<Self> {
        serde_json::from_value(state.clone()).ok()
    }
}

/// `window.history`.
pub trait BrowserHistory: Send + Sync {
    /// `history.state`
    fn state(&self) -> Option<serde_json::Value>;

    fn push_state(&self, state: serde_json::Value, url: &str);

    fn replace_state(&self, state: serde_json::Value, url: &str);
}

/// How a completed navigation was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryWrite {
    Pushed,
    Replaced,
    /// Popstate navigations leave history alone.
    Skipped,
}

/// Keeps browser history in step with completed navigations.
pub struct HistoryController<H: BrowserHistory> {
    history: Arc<H>,
}

impl<H: BrowserHistory> HistoryController<H> {
    pub fn new(history: Arc<H>) -> Self {
        Self { history }
    }

    /// Stamp the entry of the initial page load so a later `popstate` back to
    /// it carries a resolvable URL.
    pub fn init(&self, current: &Url) {
        let entry = HistoryEntry::new(current);
        self.history.replace_state(entry.to_state(), &entry.url);
    }

    pub fn record(&self, request: &NavigationRequest) -> HistoryWrite {
        if request.is_pop_state {
            return HistoryWrite::Skipped;
        }
        let entry = HistoryEntry::new(&request.target);
        if request.replace_history {
            self.history.replace_state(entry.to_state(), &entry.url);
            HistoryWrite::Replaced
        } else {
            self.history.push_state(entry.to_state(), &entry.url);
            HistoryWrite::Pushed
        }
    }

    /// Target of a `popstate`: the recorded URL, or the current location when
    /// the state is missing or unreadable.
    pub fn popstate_target(state: Option<&serde_json::Value>, location: &Url) -> Url {
        state
            .and_then(HistoryEntry::from_state)
            .and_then(|entry| location.join(&entry.url).ok())
            .unwrap_or_else(|| location.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{HistoryCall, MemoryBrowser};

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn browser() -> Arc<MemoryBrowser> {
        Arc::new(
            MemoryBrowser::from_html(
                "http://localhost/catalog/",
                "<html><body><main data-page-shell>x</main></body></html>",
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_init_replaces_current_entry() {
        let browser = browser();
        let controller = HistoryController::new(browser.clone());
        controller.init(&url("http://localhost/catalog/"));

        assert_eq!(
            browser.history_calls(),
            [HistoryCall::Replace("http://localhost/catalog/".to_string())]
        );
        assert_eq!(
            HistoryEntry::from_state(&browser.state().unwrap()).unwrap().url,
            "http://localhost/catalog/"
        );
    }

    #[test]
    fn test_record_push_replace_and_skip() {
        let browser = browser();
        let controller = HistoryController::new(browser.clone());
        let target = url("http://localhost/venues/42/");

        assert_eq!(
            controller.record(&NavigationRequest::push(target.clone())),
            HistoryWrite::Pushed
        );
        assert_eq!(
            controller.record(&NavigationRequest::replace(target.clone())),
            HistoryWrite::Replaced
        );
        assert_eq!(
            controller.record(&NavigationRequest::pop_state(target)),
            HistoryWrite::Skipped
        );
        assert_eq!(browser.history_calls().len(), 2);
    }

    #[test]
    fn test_popstate_target_falls_back_to_location() {
        let here = url("http://localhost/catalog/");
        let state = serde_json::json!({ "url": "/venues/7/" });
        assert_eq!(
            HistoryController::<MemoryBrowser>::popstate_target(Some(&state), &here).path(),
            "/venues/7/"
        );

        let foreign = serde_json::json!({ "scroll": 120 });
        assert_eq!(
            HistoryController::<MemoryBrowser>::popstate_target(Some(&foreign), &here),
            here
        );
        assert_eq!(
            HistoryController::<MemoryBrowser>::popstate_target(None, &here),
            here
        );
    }
}
