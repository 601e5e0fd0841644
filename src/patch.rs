//! Incoming page parsing and region patching.
//!
//! The server always returns a full HTML page. Only the named regions are
//! lifted out of it and copied into the live document; everything else in the
//! response is ignored.

use std::sync::Arc;

use scraper::{ElementRef, Html, Selector};

use crate::dom::{Initializer, LiveDocument, NodeId, Region};
use crate::error::{NavError, Result};

/// Overlay state carried by the incoming page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverlayFragment {
    pub classes: Vec<String>,
    pub inner_html: String,
}

/// The regions of a fetched page, extracted into owned markup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncomingPage {
    pub title: Option<String>,
    /// Body class attribute; empty when the body carries none.
    pub body_class: String,
    pub overlay: Option<OverlayFragment>,
    pub csrf_token: Option<String>,
    /// Outer HTML of `header`.
    pub header: Option<String>,
    /// Outer HTML of `footer`.
    pub footer: Option<String>,
    /// Outer HTML of the page shell.
    pub page_shell: Option<String>,
    /// Inner HTML of the toast root.
    pub toasts: Option<String>,
}

pub(crate) fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow::anyhow!("Invalid selector {css}: {e:?}").into())
}

fn select_first<'a>(document: &'a Html, css: &str) -> Result<Option<ElementRef<'a>>> {
    Ok(document.select(&selector(css)?).next())
}

fn select_region<'a>(document: &'a Html, region: Region) -> Result<Option<ElementRef<'a>>> {
    select_first(document, region.selector())
}

impl IncomingPage {
    /// Parse a fetched document.
    ///
    /// # Errors
    /// [`NavError::Unparsable`] when the text yields no element besides the
    /// implicit `html`/`head`/`body` skeleton.
    pub fn parse(html: &str) -> Result<Self> {
        let document = Html::parse_document(html);

        let has_content = document
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .any(|element| !matches!(element.value().name(), "html" | "head" | "body"));
        if !has_content {
            return Err(NavError::Unparsable);
        }

        let title = select_first(&document, "title")?
            .map(|title| title.text().collect::<String>().trim().to_string());

        let body_class = select_first(&document, "body")?
            .and_then(|body| body.value().attr("class"))
            .unwrap_or_default()
            .to_string();

        let overlay = select_region(&document, Region::Overlay)?.map(|overlay| OverlayFragment {
            classes: overlay
                .value()
                .attr("class")
                .unwrap_or_default()
                .split_whitespace()
                .map(str::to_string)
                .collect(),
            inner_html: overlay.inner_html(),
        });

        let csrf_token = select_region(&document, Region::CsrfMeta)?
            .and_then(|meta| meta.value().attr("content"))
            .map(str::to_string);

        let outer = |region: Region| -> Result<Option<String>> {
            Ok(select_region(&document, region)?.map(|element| element.html()))
        };

        Ok(Self {
            title,
            body_class,
            overlay,
            csrf_token,
            header: outer(Region::Header)?,
            footer: outer(Region::Footer)?,
            page_shell: outer(Region::PageShell)?,
            toasts: select_region(&document, Region::ToastRoot)?.map(|root| root.inner_html()),
        })
    }
}

/// Applies an [`IncomingPage`] to the live document.
pub struct DocumentPatcher {
    scripting_class: String,
    initializers: Vec<Arc<dyn Initializer>>,
}

impl DocumentPatcher {
    pub fn new(scripting_class: impl Into<String>) -> Self {
        Self {
            scripting_class: scripting_class.into(),
            initializers: Vec::new(),
        }
    }

    pub fn with_initializer(mut self, initializer: Arc<dyn Initializer>) -> Self {
        self.initializers.push(initializer);
        self
    }

    pub fn add_initializer(&mut self, initializer: Arc<dyn Initializer>) {
        self.initializers.push(initializer);
    }

    /// Copy the incoming regions into `doc` and re-run initializers.
    ///
    /// Returns the inserted page shell, or the one it replaced when the host
    /// produced no node for the new markup.
    ///
    /// # Errors
    /// [`NavError::MissingRegion`] when either document lacks a page shell.
    /// Nothing is modified in that case.
    pub fn apply(&self, page: &IncomingPage, doc: &dyn LiveDocument) -> Result<NodeId> {
        let shell_html = page
            .page_shell
            .as_deref()
            .ok_or(NavError::MissingRegion(Region::PageShell))?;
        let live_shell = doc
            .query(Region::PageShell)
            .ok_or(NavError::MissingRegion(Region::PageShell))?;

        if let Some(title) = &page.title {
            doc.set_title(title);
        }

        doc.set_body_class(&page.body_class);
        doc.add_body_class(&self.scripting_class);

        // Overlay keeps its identity so in-flight animation listeners stay attached
        if let (Some(incoming), Some(overlay)) = (&page.overlay, doc.query(Region::Overlay)) {
            let current = doc.class_list(overlay);
            for class in &incoming.classes {
                if !current.contains(class) {
                    doc.add_class(overlay, class);
                }
            }
            doc.set_inner_html(overlay, &incoming.inner_html);
        }

        if let (Some(token), Some(meta)) = (&page.csrf_token, doc.query(Region::CsrfMeta)) {
            doc.set_attribute(meta, "content", token);
        }

        for (region, html) in [(Region::Header, &page.header), (Region::Footer, &page.footer)] {
            if let (Some(html), Some(node)) = (html, doc.query(region)) {
                doc.replace_node(node, html);
            }
        }

        let shell = doc.replace_node(live_shell, shell_html).unwrap_or(live_shell);

        if let (Some(toasts), Some(root)) = (&page.toasts, doc.query(Region::ToastRoot))
            && !toasts.trim().is_empty()
        {
            doc.append_html(root, toasts);
        }

        for initializer in &self.initializers {
            tracing::trace!(initializer = initializer.name(), "Re-running initializer");
            initializer.initialize(doc);
        }

        Ok(shell)
    }
}
