//! Live document capability.
//!
//! The orchestrator never touches a browser API directly. Everything it needs
//! from the page (region lookup, class and attribute edits, node replacement,
//! animation-end notification, hard navigation) goes through [`LiveDocument`],
//! which a wasm host implements over `web_sys` and tests implement with
//! [`MemoryBrowser`](crate::memory::MemoryBrowser).

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use url::Url;

/// Opaque handle to a node in the live document.
///
/// Handles are only valid until the node is replaced; regions are queried
/// again on every navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Named regions eligible for patching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    Header,
    Footer,
    PageShell,
    Overlay,
    ToastRoot,
    CsrfMeta,
}

impl Region {
    pub const ALL: [Region; 6] = [
        Region::Header,
        Region::Footer,
        Region::PageShell,
        Region::Overlay,
        Region::ToastRoot,
        Region::CsrfMeta,
    ];

    /// CSS selector resolving the region in a document.
    pub fn selector(&self) -> &'static str {
        match self {
            Region::Header => "header",
            Region::Footer => "footer",
            Region::PageShell => "[data-page-shell]",
            Region::Overlay => "#page-transition",
            Region::ToastRoot => "[data-toast-root]",
            Region::CsrfMeta => r#"meta[name="csrf-token"]"#,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Header => "header",
            Region::Footer => "footer",
            Region::PageShell => "page-shell",
            Region::Overlay => "overlay",
            Region::ToastRoot => "toast-root",
            Region::CsrfMeta => "csrf-meta",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The browser document as seen by the navigator.
///
/// All mutations are synchronous, matching DOM semantics. The only
/// asynchronous operation is [`animation_end`](LiveDocument::animation_end).
pub trait LiveDocument: Send + Sync {
    /// Current `window.location`.
    fn location(&self) -> Url;

    /// Full browser navigation (`location.href = url`).
    fn assign_location(&self, url: &Url);

    /// Resolve a region; `None` when the page has no such element.
    fn query(&self, region: Region) -> Option<NodeId>;

    fn set_title(&self, title: &str);

    /// Replace the `<body>` class attribute wholesale.
    fn set_body_class(&self, class: &str);

    fn add_body_class(&self, class: &str);

    fn class_list(&self, node: NodeId) -> Vec<String>;

    fn add_class(&self, node: NodeId, class: &str);

    fn remove_class(&self, node: NodeId, class: &str);

    fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.class_list(node).iter().any(|c| c == class)
    }

    fn set_attribute(&self, node: NodeId, name: &str, value: &str);

    /// Set (`Some`) or clear (`None`) an inline style property.
    fn set_style(&self, node: NodeId, property: &str, value: Option<&str>);

    fn set_inner_html(&self, node: NodeId, html: &str);

    /// Append markup after the node's existing children.
    fn append_html(&self, node: NodeId, html: &str);

    /// Replace the node itself with the element described by `outer_html`.
    ///
    /// Returns the handle of the inserted element, or `None` when the markup
    /// did not produce one.
    fn replace_node(&self, node: NodeId, outer_html: &str) -> Option<NodeId>;

    /// Resolves when an `animationend` event fires on exactly this node.
    ///
    /// The future must be obtained before the animating class is applied.
    /// If the node goes away the future never resolves.
    fn animation_end(&self, node: NodeId) -> BoxFuture<'static, ()>;

    fn scroll_to_top(&self);

    /// `prefers-reduced-motion: reduce`
    fn prefers_reduced_motion(&self) -> bool;
}

/// An idempotent DOM behaviour (nav toggle, scroll reveal, ripple effect)
/// that must be re-bound after new nodes are inserted.
pub trait Initializer: Send + Sync {
    fn name(&self) -> &str;

    fn initialize(&self, document: &dyn LiveDocument);
}

struct FnInitializer<F> {
    name: String,
    init: F,
}

impl<F> Initializer for FnInitializer<F>
where
    F: Fn(&dyn LiveDocument) + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&self, document: &dyn LiveDocument) {
        (self.init)(document)
    }
}

/// Wrap a closure as an [`Initializer`].
pub fn initializer<F>(name: impl Into<String>, init: F) -> Arc<dyn Initializer>
where
    F: Fn(&dyn LiveDocument) + Send + Sync + 'static,
{
    Arc::new(FnInitializer {
        name: name.into(),
        init,
    })
}
