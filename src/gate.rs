//! Click and submit filtering.
//!
//! Decides whether a click is a same-origin, same-tab GET navigation the
//! navigator may take over. Anything else is left to the browser untouched.

use url::Url;

use crate::domain::navigation::NavigationRequest;
use crate::events::{ClickEvent, ElementSnapshot, FormSubmitEvent};

/// Per-element opt-out markers.
pub const OPT_OUT_ATTRS: [&str; 2] = ["data-no-ajax", "data-no-transition"];

/// Outcome of evaluating a click.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Intercept(NavigationRequest),
    Ignore(IgnoreReason),
}

/// Why a click was left to the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    DefaultPrevented,
    ModifiedClick,
    NoAnchor,
    OptedOut,
    ForeignTarget,
    MissingHref,
    Fragment,
    NonHttpScheme,
    Download,
    External,
    CrossOrigin,
    InvalidHref,
}

/// Whether the element carries one of the opt-out markers.
pub fn opted_out(element: &ElementSnapshot) -> bool {
    OPT_OUT_ATTRS
        .iter()
        .any(|attr| element.has_attribute(attr))
}

fn is_external(anchor: &ElementSnapshot) -> bool {
    anchor.has_attribute("data-external")
        || anchor
            .attribute("rel")
            .is_some_and(|rel| rel.split_whitespace().any(|r| r.eq_ignore_ascii_case("external")))
}

fn same_document(target: &Url, location: &Url) -> bool {
    let mut a = target.clone();
    let mut b = location.clone();
    a.set_fragment(None);
    b.set_fragment(None);
    a == b
}

/// Decide whether `click` should become an AJAX navigation from `location`.
pub fn evaluate_click(click: &ClickEvent, location: &Url) -> GateDecision {
    use IgnoreReason::*;

    if click.default_prevented {
        return GateDecision::Ignore(DefaultPrevented);
    }
    if click.button != 0 || click.modifiers.any() {
        return GateDecision::Ignore(ModifiedClick);
    }
    let Some(anchor) = click.anchor.as_ref() else {
        return GateDecision::Ignore(NoAnchor);
    };
    if opted_out(anchor) {
        return GateDecision::Ignore(OptedOut);
    }
    if let Some(target) = anchor.attribute("target")
        && !target.is_empty()
        && !target.eq_ignore_ascii_case("_self")
    {
        return GateDecision::Ignore(ForeignTarget);
    }

    let href = anchor.attribute("href").map(str::trim).unwrap_or_default();
    if href.is_empty() {
        return GateDecision::Ignore(MissingHref);
    }
    if href.starts_with('#') {
        return GateDecision::Ignore(Fragment);
    }
    if anchor.has_attribute("download") {
        return GateDecision::Ignore(Download);
    }
    if is_external(anchor) {
        return GateDecision::Ignore(External);
    }

    let Ok(target) = location.join(href) else {
        return GateDecision::Ignore(InvalidHref);
    };
    if !matches!(target.scheme(), "http" | "https") {
        return GateDecision::Ignore(NonHttpScheme);
    }
    if target.origin() != location.origin() {
        return GateDecision::Ignore(CrossOrigin);
    }
    if target.fragment().is_some() && same_document(&target, location) {
        return GateDecision::Ignore(Fragment);
    }

    let request = match anchor.attribute("data-history") {
        Some(mode) if mode.eq_ignore_ascii_case("replace") => NavigationRequest::replace(target),
        _ => NavigationRequest::push(target),
    };
    GateDecision::Intercept(request)
}

/// Whether a form submission should show the overlay as a visual cue. The
/// submission itself always proceeds natively.
pub fn wants_submit_cue(submit: &FormSubmitEvent) -> bool {
    !submit.default_prevented && !opted_out(&submit.form)
}
