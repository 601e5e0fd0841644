//! Page events and the event source capability.
//!
//! A host delegates document-level `click`, `submit` and `popstate` listeners
//! to a single [`PageEventHandler`]. Events arrive as plain snapshots so the
//! interception logic can be exercised without a DOM.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

/// Attribute snapshot of the element an event is about (the closest anchor
/// for clicks, the form for submits).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementSnapshot {
    attributes: BTreeMap<String, String>,
}

impl ElementSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Anchor with the given `href`.
    pub fn anchor(href: &str) -> Self {
        Self::new().with_attribute("href", href)
    }

    pub fn with_attribute(mut self, name: &str, value: &str) -> Self {
        self.attributes
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }
}

/// Keyboard modifiers held during a click.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub meta: bool,
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
}

impl Modifiers {
    pub fn any(&self) -> bool {
        self.meta || self.ctrl || self.shift || self.alt
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickEvent {
    pub default_prevented: bool,
    /// `MouseEvent.button`; 0 is the primary button.
    pub button: i16,
    pub modifiers: Modifiers,
    /// Closest `a[href]` ancestor of the event target, if any.
    pub anchor: Option<ElementSnapshot>,
}

impl ClickEvent {
    /// Plain primary-button click on an anchor.
    pub fn on(anchor: ElementSnapshot) -> Self {
        Self {
            default_prevented: false,
            button: 0,
            modifiers: Modifiers::default(),
            anchor: Some(anchor),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormSubmitEvent {
    pub default_prevented: bool,
    pub form: ElementSnapshot,
}

impl FormSubmitEvent {
    pub fn on(form: ElementSnapshot) -> Self {
        Self {
            default_prevented: false,
            form,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PopStateEvent {
    /// `event.state` as written by `pushState`/`replaceState`.
    pub state: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PageEvent {
    Click(ClickEvent),
    Submit(FormSubmitEvent),
    PopState(PopStateEvent),
}

impl PageEvent {
    fn mark_prevented(&mut self) {
        match self {
            PageEvent::Click(click) => click.default_prevented = true,
            PageEvent::Submit(submit) => submit.default_prevented = true,
            PageEvent::PopState(_) => {}
        }
    }
}

/// What the host must do with the event after the handler returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Let the browser perform its default action.
    Default,
    /// Call `preventDefault()`.
    Prevented,
}

pub trait PageEventHandler: Send + Sync {
    fn handle(&self, event: &PageEvent) -> Disposition;
}

/// Document-wide event delegation, subscribed to once per page lifetime.
pub trait EventSource {
    fn subscribe(&self, handler: Arc<dyn PageEventHandler>);
}

// ============================================================================
// Test/Mock Implementation
// ============================================================================

/// In-process event source for tests.
///
/// Dispatches to every subscriber in subscription order. Once a handler
/// prevents the default action, later handlers observe
/// `default_prevented = true`, as with DOM listeners.
#[derive(Default)]
pub struct MockEventSource {
    handlers: Mutex<Vec<Arc<dyn PageEventHandler>>>,
}

impl MockEventSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dispatch(&self, event: PageEvent) -> Disposition {
        let handlers = self.handlers.lock().clone();
        let mut event = event;
        let mut disposition = Disposition::Default;
        for handler in handlers {
            if handler.handle(&event) == Disposition::Prevented {
                disposition = Disposition::Prevented;
                event.mark_prevented();
            }
        }
        disposition
    }

    pub fn subscriber_count(&self) -> usize {
        self.handlers.lock().len()
    }
}

impl EventSource for MockEventSource {
    fn subscribe(&self, handler: Arc<dyn PageEventHandler>) {
        self.handlers.lock().push(handler);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Preventer;

    impl PageEventHandler for Preventer {
        fn handle(&self, _event: &PageEvent) -> Disposition {
            Disposition::Prevented
        }
    }

    #[derive(Default)]
    struct Observer {
        saw_prevented: AtomicBool,
    }

    impl PageEventHandler for Observer {
        fn handle(&self, event: &PageEvent) -> Disposition {
            if let PageEvent::Click(click) = event {
                self.saw_prevented
                    .store(click.default_prevented, Ordering::SeqCst);
            }
            Disposition::Default
        }
    }

    #[test]
    fn test_later_handlers_see_prevented_event() {
        let source = MockEventSource::new();
        let observer = Arc::new(Observer::default());
        source.subscribe(Arc::new(Preventer));
        source.subscribe(observer.clone());

        let disposition = source.dispatch(PageEvent::Click(ClickEvent::on(
            ElementSnapshot::anchor("/venues/"),
        )));

        assert_eq!(disposition, Disposition::Prevented);
        assert!(observer.saw_prevented.load(Ordering::SeqCst));
    }

    #[test]
    fn test_attribute_names_are_case_insensitive() {
        let anchor = ElementSnapshot::anchor("/").with_attribute("Data-No-Ajax", "");
        assert!(anchor.has_attribute("data-no-ajax"));
        assert_eq!(anchor.attribute("href"), Some("/"));
    }
}
