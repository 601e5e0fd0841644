//! Navigation serialisation: an in-flight flag plus a one-slot mailbox.
//!
//! While a navigation is in flight, new requests overwrite the single pending
//! slot instead of queueing behind each other; only the latest survives. The
//! in-flight navigation is never aborted. Its result is discarded if the slot
//! holds a different target by the time its fetch settles.

use url::Url;

use crate::domain::navigation::NavigationRequest;

#[derive(Debug, Default)]
pub struct NavigationState {
    is_navigating: bool,
    pending: Option<NavigationRequest>,
}

impl NavigationState {
    pub fn is_navigating(&self) -> bool {
        self.is_navigating
    }

    /// Number of deferred requests; never more than one.
    pub fn depth(&self) -> usize {
        usize::from(self.pending.is_some())
    }

    pub fn pending_target(&self) -> Option<&Url> {
        self.pending.as_ref().map(|request| &request.target)
    }

    /// Claim the in-flight slot. Returns `false` when already navigating.
    pub fn try_begin(&mut self) -> bool {
        if self.is_navigating {
            return false;
        }
        self.is_navigating = true;
        true
    }

    /// Park `request` as the pending navigation, returning the one it
    /// displaced.
    pub fn defer(&mut self, request: NavigationRequest) -> Option<NavigationRequest> {
        self.pending.replace(request)
    }

    /// Whether the in-flight navigation to `target` should be discarded.
    pub fn is_superseded(&self, target: &Url) -> bool {
        self.pending_target().is_some_and(|pending| pending != target)
    }

    /// Called once the in-flight navigation to `completed` has settled.
    ///
    /// Hands back the pending request when it targets somewhere else (the
    /// slot stays claimed). Otherwise clears the mailbox and releases the
    /// slot, atomically, so a request arriving right after cannot be lost.
    pub fn next_after(&mut self, completed: &Url) -> Option<NavigationRequest> {
        match self.pending.take() {
            Some(next) if next.target != *completed => Some(next),
            _ => {
                self.is_navigating = false;
                None
            }
        }
    }

    /// Unconditionally clear everything.
    pub fn release(&mut self) {
        self.is_navigating = false;
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(path: &str) -> NavigationRequest {
        NavigationRequest::push(Url::parse("http://localhost/").unwrap().join(path).unwrap())
    }

    #[test]
    fn test_first_request_claims_slot() {
        let mut state = NavigationState::default();
        assert!(state.try_begin());
        assert!(!state.try_begin());
        assert!(state.is_navigating());
    }

    #[test]
    fn test_mailbox_depth_never_exceeds_one() {
        let mut state = NavigationState::default();
        state.try_begin();

        assert!(state.defer(request("/a/")).is_none());
        let displaced = state.defer(request("/b/")).unwrap();
        assert_eq!(displaced.target.path(), "/a/");
        state.defer(request("/c/"));

        assert_eq!(state.depth(), 1);
        assert_eq!(state.pending_target().unwrap().path(), "/c/");
    }

    #[test]
    fn test_next_after_hands_over_different_target() {
        let mut state = NavigationState::default();
        state.try_begin();
        state.defer(request("/b/"));

        let completed = request("/a/").target;
        assert!(state.is_superseded(&completed));
        let next = state.next_after(&completed).unwrap();
        assert_eq!(next.target.path(), "/b/");
        assert!(state.is_navigating());
        assert_eq!(state.depth(), 0);
    }

    #[test]
    fn test_next_after_same_target_releases() {
        let mut state = NavigationState::default();
        state.try_begin();
        state.defer(request("/a/"));

        let completed = request("/a/").target;
        assert!(!state.is_superseded(&completed));
        assert!(state.next_after(&completed).is_none());
        assert!(!state.is_navigating());
        assert_eq!(state.depth(), 0);
    }

    #[test]
    fn test_release_clears_everything() {
        let mut state = NavigationState::default();
        state.try_begin();
        state.defer(request("/a/"));
        state.release();
        assert!(!state.is_navigating());
        assert_eq!(state.depth(), 0);
        assert!(state.try_begin());
    }
}
