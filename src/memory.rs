//! In-memory browser tab for tests.
//!
//! `MemoryBrowser` implements both [`LiveDocument`] and [`BrowserHistory`]
//! over a flat table of region nodes, so pushing history moves the location
//! the way a real tab does. It is built from ordinary page markup and can be
//! inspected after a navigation.

use std::collections::{BTreeMap, HashMap};

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use scraper::{ElementRef, Html};
use tokio::sync::oneshot;
use url::Url;

use crate::dom::{LiveDocument, NodeId, Region};
use crate::error::Result;
use crate::events::{PageEvent, PopStateEvent};
use crate::history::BrowserHistory;
use crate::patch::selector;

/// How `animationend` behaves for animated nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnimationMode {
    /// Fires as soon as it is awaited.
    #[default]
    Immediate,
    /// Fires only through [`MemoryBrowser::fire_animation_end`].
    Manual,
    /// Never fires; only the deadline can end a race.
    Never,
}

/// Recorded history write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryCall {
    Push(String),
    Replace(String),
}

/// Snapshot of a region element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryNode {
    pub tag: String,
    pub classes: Vec<String>,
    /// Attributes other than `class`.
    pub attributes: BTreeMap<String, String>,
    /// Inline style overrides.
    pub styles: BTreeMap<String, String>,
    pub inner_html: String,
}

impl MemoryNode {
    fn from_element(element: ElementRef<'_>) -> Self {
        let value = element.value();
        Self {
            tag: value.name().to_string(),
            classes: split_classes(value.attr("class").unwrap_or_default()),
            attributes: value
                .attrs()
                .filter(|(name, _)| *name != "class")
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
            styles: BTreeMap::new(),
            inner_html: element.inner_html(),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }
}

fn split_classes(class: &str) -> Vec<String> {
    let mut classes: Vec<String> = Vec::new();
    for class in class.split_whitespace() {
        if !classes.iter().any(|c| c == class) {
            classes.push(class.to_string());
        }
    }
    classes
}

struct HistorySlot {
    state: serde_json::Value,
    url: Url,
}

struct BrowserState {
    location: Url,
    assigned: Vec<Url>,
    title: String,
    body_classes: Vec<String>,
    nodes: HashMap<NodeId, MemoryNode>,
    regions: HashMap<Region, NodeId>,
    next_id: u64,
    animation: AnimationMode,
    waiters: HashMap<NodeId, Vec<oneshot::Sender<()>>>,
    reduced_motion: bool,
    scroll_resets: usize,
    entries: Vec<HistorySlot>,
    index: usize,
    history_calls: Vec<HistoryCall>,
}

impl BrowserState {
    fn insert(&mut self, node: MemoryNode) -> NodeId {
        self.next_id += 1;
        let id = NodeId(self.next_id);
        self.nodes.insert(id, node);
        id
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut MemoryNode> {
        self.nodes.get_mut(&id)
    }

    fn resolve(&self, url: &str) -> Url {
        self.location
            .join(url)
            .unwrap_or_else(|_| self.location.clone())
    }
}

pub struct MemoryBrowser {
    state: Mutex<BrowserState>,
}

impl MemoryBrowser {
    /// Load `html` as the current page at `location`.
    pub fn from_html(location: &str, html: &str) -> Result<Self> {
        let location = Url::parse(location)?;
        let document = Html::parse_document(html);

        let title = document
            .select(&selector("title")?)
            .next()
            .map(|title| title.text().collect::<String>().trim().to_string())
            .unwrap_or_default();
        let body_classes = document
            .select(&selector("body")?)
            .next()
            .and_then(|body| body.value().attr("class"))
            .map(split_classes)
            .unwrap_or_default();

        let mut state = BrowserState {
            location: location.clone(),
            assigned: Vec::new(),
            title,
            body_classes,
            nodes: HashMap::new(),
            regions: HashMap::new(),
            next_id: 0,
            animation: AnimationMode::default(),
            waiters: HashMap::new(),
            reduced_motion: false,
            scroll_resets: 0,
            entries: vec![HistorySlot {
                state: serde_json::Value::Null,
                url: location,
            }],
            index: 0,
            history_calls: Vec::new(),
        };

        for region in Region::ALL {
            if let Some(element) = document.select(&selector(region.selector())?).next() {
                let id = state.insert(MemoryNode::from_element(element));
                state.regions.insert(region, id);
            }
        }

        Ok(Self {
            state: Mutex::new(state),
        })
    }

    pub fn set_animation_mode(&self, mode: AnimationMode) {
        self.state.lock().animation = mode;
    }

    pub fn set_reduced_motion(&self, reduced: bool) {
        self.state.lock().reduced_motion = reduced;
    }

    /// Fire `animationend` on the region's current node. Returns whether any
    /// listener was waiting.
    pub fn fire_animation_end(&self, region: Region) -> bool {
        let mut state = self.state.lock();
        let Some(id) = state.regions.get(&region).copied() else {
            return false;
        };
        let waiters = state.waiters.remove(&id).unwrap_or_default();
        let fired = !waiters.is_empty();
        for waiter in waiters {
            let _ = waiter.send(());
        }
        fired
    }

    pub fn title(&self) -> String {
        self.state.lock().title.clone()
    }

    pub fn body_class(&self) -> String {
        self.state.lock().body_classes.join(" ")
    }

    /// Current node of a region.
    pub fn node(&self, region: Region) -> Option<MemoryNode> {
        let state = self.state.lock();
        let id = state.regions.get(&region)?;
        state.nodes.get(id).cloned()
    }

    /// Node by handle; `None` once it has been replaced.
    pub fn node_by_id(&self, id: NodeId) -> Option<MemoryNode> {
        self.state.lock().nodes.get(&id).cloned()
    }

    /// Hard navigations issued, in order.
    pub fn assigned_locations(&self) -> Vec<Url> {
        self.state.lock().assigned.clone()
    }

    pub fn scroll_resets(&self) -> usize {
        self.state.lock().scroll_resets
    }

    pub fn history_calls(&self) -> Vec<HistoryCall> {
        self.state.lock().history_calls.clone()
    }

    pub fn history_len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Browser back button: moves the location and returns the `popstate`
    /// event the host would dispatch.
    pub fn back(&self) -> Option<PageEvent> {
        let mut state = self.state.lock();
        if state.index == 0 {
            return None;
        }
        state.index -= 1;
        Some(Self::traverse(&mut state))
    }

    pub fn forward(&self) -> Option<PageEvent> {
        let mut state = self.state.lock();
        if state.index + 1 >= state.entries.len() {
            return None;
        }
        state.index += 1;
        Some(Self::traverse(&mut state))
    }

    fn traverse(state: &mut BrowserState) -> PageEvent {
        let slot = &state.entries[state.index];
        let url = slot.url.clone();
        let event_state = (!slot.state.is_null()).then(|| slot.state.clone());
        state.location = url;
        PageEvent::PopState(PopStateEvent { state: event_state })
    }
}

impl LiveDocument for MemoryBrowser {
    fn location(&self) -> Url {
        self.state.lock().location.clone()
    }

    fn assign_location(&self, url: &Url) {
        let mut state = self.state.lock();
        state.assigned.push(url.clone());
        state.location = url.clone();
    }

    fn query(&self, region: Region) -> Option<NodeId> {
        self.state.lock().regions.get(&region).copied()
    }

    fn set_title(&self, title: &str) {
        self.state.lock().title = title.to_string();
    }

    fn set_body_class(&self, class: &str) {
        self.state.lock().body_classes = split_classes(class);
    }

    fn add_body_class(&self, class: &str) {
        let mut state = self.state.lock();
        if !state.body_classes.iter().any(|c| c == class) {
            state.body_classes.push(class.to_string());
        }
    }

    fn class_list(&self, node: NodeId) -> Vec<String> {
        self.state
            .lock()
            .nodes
            .get(&node)
            .map(|n| n.classes.clone())
            .unwrap_or_default()
    }

    fn add_class(&self, node: NodeId, class: &str) {
        if let Some(node) = self.state.lock().node_mut(node)
            && !node.has_class(class)
        {
            node.classes.push(class.to_string());
        }
    }

    fn remove_class(&self, node: NodeId, class: &str) {
        if let Some(node) = self.state.lock().node_mut(node) {
            node.classes.retain(|c| c != class);
        }
    }

    fn set_attribute(&self, node: NodeId, name: &str, value: &str) {
        if let Some(node) = self.state.lock().node_mut(node) {
            if name == "class" {
                node.classes = split_classes(value);
            } else {
                node.attributes.insert(name.to_string(), value.to_string());
            }
        }
    }

    fn set_style(&self, node: NodeId, property: &str, value: Option<&str>) {
        if let Some(node) = self.state.lock().node_mut(node) {
            match value {
                Some(value) => {
                    node.styles.insert(property.to_string(), value.to_string());
                }
                None => {
                    node.styles.remove(property);
                }
            }
        }
    }

    fn set_inner_html(&self, node: NodeId, html: &str) {
        if let Some(node) = self.state.lock().node_mut(node) {
            node.inner_html = html.to_string();
        }
    }

    fn append_html(&self, node: NodeId, html: &str) {
        if let Some(node) = self.state.lock().node_mut(node) {
            node.inner_html.push_str(html);
        }
    }

    fn replace_node(&self, node: NodeId, outer_html: &str) -> Option<NodeId> {
        let fragment = Html::parse_fragment(outer_html);
        let replacement = fragment
            .root_element()
            .children()
            .filter_map(ElementRef::wrap)
            .next()
            .map(MemoryNode::from_element)?;

        let mut state = self.state.lock();
        state.nodes.remove(&node)?;
        // Listeners die with the node
        state.waiters.remove(&node);

        let id = state.insert(replacement);
        for bound in state.regions.values_mut() {
            if *bound == node {
                *bound = id;
            }
        }
        Some(id)
    }

    fn animation_end(&self, node: NodeId) -> BoxFuture<'static, ()> {
        let mut state = self.state.lock();
        match state.animation {
            AnimationMode::Immediate => futures::future::ready(()).boxed(),
            AnimationMode::Never => futures::future::pending().boxed(),
            AnimationMode::Manual => {
                let (tx, rx) = oneshot::channel();
                state.waiters.entry(node).or_default().push(tx);
                async move {
                    if rx.await.is_err() {
                        futures::future::pending::<()>().await;
                    }
                }
                .boxed()
            }
        }
    }

    fn scroll_to_top(&self) {
        self.state.lock().scroll_resets += 1;
    }

    fn prefers_reduced_motion(&self) -> bool {
        self.state.lock().reduced_motion
    }
}

impl BrowserHistory for MemoryBrowser {
    fn state(&self) -> Option<serde_json::Value> {
        let state = self.state.lock();
        let slot = &state.entries[state.index];
        (!slot.state.is_null()).then(|| slot.state.clone())
    }

    fn push_state(&self, entry: serde_json::Value, url: &str) {
        let mut state = self.state.lock();
        let url = state.resolve(url);
        let keep = state.index + 1;
        state.entries.truncate(keep);
        state.entries.push(HistorySlot {
            state: entry,
            url: url.clone(),
        });
        state.index += 1;
        state.history_calls.push(HistoryCall::Push(url.to_string()));
        state.location = url;
    }

    fn replace_state(&self, entry: serde_json::Value, url: &str) {
        let mut state = self.state.lock();
        let url = state.resolve(url);
        let index = state.index;
        state.entries[index] = HistorySlot {
            state: entry,
            url: url.clone(),
        };
        state.history_calls.push(HistoryCall::Replace(url.to_string()));
        state.location = url;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><head><title>Home</title></head>
        <body class="home">
            <header>top</header>
            <main data-page-shell class="shell">home</main>
        </body></html>"#;

    #[test]
    fn test_regions_are_indexed_from_markup() {
        let browser = MemoryBrowser::from_html("http://localhost/", PAGE).unwrap();
        assert_eq!(browser.title(), "Home");
        assert_eq!(browser.body_class(), "home");
        assert!(browser.query(Region::Header).is_some());
        assert!(browser.query(Region::Footer).is_none());

        let shell = browser.node(Region::PageShell).unwrap();
        assert_eq!(shell.tag, "main");
        assert!(shell.has_class("shell"));
        assert!(shell.attributes.contains_key("data-page-shell"));
    }

    #[test]
    fn test_replace_node_rebinds_region() {
        let browser = MemoryBrowser::from_html("http://localhost/", PAGE).unwrap();
        let old = browser.query(Region::PageShell).unwrap();
        let new = browser
            .replace_node(old, r#"<main data-page-shell class="venue">venue</main>"#)
            .unwrap();

        assert_ne!(old, new);
        assert_eq!(browser.query(Region::PageShell), Some(new));
        assert!(browser.node_by_id(old).is_none());
        assert_eq!(browser.node(Region::PageShell).unwrap().inner_html, "venue");
    }

    #[test]
    fn test_history_traversal_moves_location() {
        let browser = MemoryBrowser::from_html("http://localhost/", PAGE).unwrap();
        browser.push_state(serde_json::json!({ "url": "/a/" }), "/a/");
        assert_eq!(browser.location().path(), "/a/");

        let Some(PageEvent::PopState(event)) = browser.back() else {
            panic!("expected popstate");
        };
        assert_eq!(event.state, None);
        assert_eq!(browser.location().path(), "/");
        assert!(browser.back().is_none());

        assert!(browser.forward().is_some());
        assert_eq!(browser.location().path(), "/a/");
    }
}
