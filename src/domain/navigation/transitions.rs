//! Phase transitions for a single navigation.
//!
//! ```text
//! Navigation<Requested>
//!   └─depart()─> Navigation<Departing>
//!                  ├─land()──────> Navigation<Patched> ─arrive()─> Navigation<Arrived>
//!                  ├─land() error─> Navigation<FellBack>
//!                  ├─fall_back()──> Navigation<FellBack>
//!                  └─supersede()──> Navigation<Superseded>
//! ```
//!
//! Every terminal transition leaves the page shell and the overlay without
//! transitional classes, so no navigation ends mid-animation.

use std::future::Future;

use url::Url;

use crate::dom::{LiveDocument, Region};
use crate::error::{NavError, Result};
use crate::metrics;
use crate::patch::{DocumentPatcher, IncomingPage};
use crate::transition::{Phase, RaceWinner, TransitionDirector};

use super::state::{
    Arrived, Departing, FallbackKind, FellBack, Navigation, NavigationRequest, Patched, Requested,
    Superseded,
};

impl Navigation<Requested> {
    pub fn new(request: NavigationRequest) -> Self {
        Navigation {
            request,
            state: Requested {
                requested_at: chrono::Utc::now(),
            },
        }
    }

    /// Pick a preset, show the overlay and freeze the current shell.
    pub fn depart(
        self,
        director: &TransitionDirector,
        doc: &dyn LiveDocument,
    ) -> Navigation<Departing> {
        let preset = director.choose(doc.prefers_reduced_motion());
        director.show_overlay(doc, preset);
        let shell = doc.query(Region::PageShell);
        director.freeze_shell(doc, shell);

        tracing::debug!(preset = preset.key, has_shell = shell.is_some(), "Departing");

        Navigation {
            request: self.request,
            state: Departing {
                requested_at: self.state.requested_at,
                departed_at: chrono::Utc::now(),
                preset,
                shell,
            },
        }
    }
}

impl Navigation<Departing> {
    /// Start the leave animation on the departing shell.
    pub fn leave(
        &self,
        director: &TransitionDirector,
        doc: &dyn LiveDocument,
    ) -> impl Future<Output = Option<RaceWinner>> + Send + use<> {
        director.animate(doc, self.state.shell, self.state.preset.leave_class, Phase::Leave)
    }

    /// Apply the fetched page, or fall back if it cannot be obtained,
    /// parsed or patched.
    pub fn land(
        self,
        fetched: Result<String>,
        patcher: &DocumentPatcher,
        director: &TransitionDirector,
        doc: &dyn LiveDocument,
    ) -> std::result::Result<Navigation<Patched>, Navigation<FellBack>> {
        let patched = fetched
            .and_then(|html| IncomingPage::parse(&html))
            .and_then(|page| patcher.apply(&page, doc));

        match patched {
            Ok(shell) => {
                doc.scroll_to_top();
                Ok(Navigation {
                    request: self.request,
                    state: Patched {
                        requested_at: self.state.requested_at,
                        patched_at: chrono::Utc::now(),
                        preset: self.state.preset,
                        shell: Some(shell),
                    },
                })
            }
            Err(e) => Err(self.fall_back(e, director, doc)),
        }
    }

    /// Abandon the AJAX path: reset visuals, then navigate the browser.
    pub fn fall_back(
        self,
        error: NavError,
        director: &TransitionDirector,
        doc: &dyn LiveDocument,
    ) -> Navigation<FellBack> {
        director.reveal_shell(doc, self.state.shell);
        director.reset_overlay(doc);

        let kind = if error.is_patch_failure() {
            FallbackKind::Patch
        } else {
            FallbackKind::Fetch
        };
        tracing::warn!(
            target_url = %self.request.target,
            error = %error,
            kind = ?kind,
            "Falling back to full page load"
        );
        metrics::record_fallback(error.kind());
        doc.assign_location(&self.request.target);

        Navigation {
            request: self.request,
            state: FellBack {
                requested_at: self.state.requested_at,
                failed_at: chrono::Utc::now(),
                kind,
                reason: error.to_string(),
            },
        }
    }

    /// Discard this navigation in favour of `by`.
    pub fn supersede(
        self,
        by: Url,
        director: &TransitionDirector,
        doc: &dyn LiveDocument,
    ) -> Navigation<Superseded> {
        director.reveal_shell(doc, self.state.shell);
        director.reset_overlay(doc);

        tracing::debug!(by = %by, "Navigation superseded, response discarded");

        Navigation {
            request: self.request,
            state: Superseded {
                requested_at: self.state.requested_at,
                superseded_at: chrono::Utc::now(),
                by,
            },
        }
    }
}

impl Navigation<Patched> {
    /// Play the enter animation on the new shell, reveal it and hide the
    /// overlay.
    pub async fn arrive(
        self,
        director: &TransitionDirector,
        doc: &dyn LiveDocument,
    ) -> Navigation<Arrived> {
        let enter = director
            .animate(doc, self.state.shell, self.state.preset.enter_class, Phase::Enter)
            .await;
        director.reveal_shell(doc, self.state.shell);
        director.hide_overlay(doc).await;

        Navigation {
            request: self.request,
            state: Arrived {
                requested_at: self.state.requested_at,
                arrived_at: chrono::Utc::now(),
                preset: self.state.preset,
                enter,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBrowser;
    use crate::navigator::NavigatorConfig;

    const PAGE: &str = r#"<html><head><title>Catalog</title></head><body>
        <div id="page-transition" aria-hidden="true"></div>
        <main data-page-shell>catalog</main>
    </body></html>"#;

    fn setup() -> (MemoryBrowser, TransitionDirector, Navigation<Requested>) {
        let browser = MemoryBrowser::from_html("http://localhost/catalog/", PAGE).unwrap();
        let director = TransitionDirector::new(&NavigatorConfig::default());
        let request =
            NavigationRequest::push(Url::parse("http://localhost/venues/42/").unwrap());
        (browser, director, Navigation::new(request))
    }

    #[test]
    fn test_depart_shows_overlay_and_freezes_shell() {
        let (browser, director, navigation) = setup();
        let departing = navigation.depart(&director, &browser);

        assert_eq!(departing.state.shell, browser.query(Region::PageShell));
        let overlay = browser.node(Region::Overlay).unwrap();
        assert!(overlay.has_class("is-active"));
        assert_eq!(
            overlay.attribute("data-transition"),
            Some(departing.state.preset.overlay_key)
        );
        let shell = browser.node(Region::PageShell).unwrap();
        assert_eq!(shell.styles.get("pointer-events").map(String::as_str), Some("none"));
    }

    #[tokio::test]
    async fn test_fall_back_resets_visuals_and_assigns_location() {
        let (browser, director, navigation) = setup();
        let departing = navigation.depart(&director, &browser);
        let leave_class = departing.state.preset.leave_class;
        departing.leave(&director, &browser).await;

        let fell_back = departing
            .land(Err(NavError::Status(404)), &DocumentPatcher::new("js"), &director, &browser)
            .unwrap_err();

        assert_eq!(fell_back.state.kind, FallbackKind::Fetch);
        assert_eq!(
            browser.assigned_locations(),
            [Url::parse("http://localhost/venues/42/").unwrap()]
        );
        let shell = browser.node(Region::PageShell).unwrap();
        assert!(!shell.has_class(leave_class));
        assert!(shell.styles.is_empty());
        assert!(!browser.node(Region::Overlay).unwrap().has_class("is-active"));
    }

    #[test]
    fn test_missing_shell_in_response_is_a_patch_fallback() {
        let (browser, director, navigation) = setup();
        let departing = navigation.depart(&director, &browser);

        let fell_back = departing
            .land(
                Ok("<html><body><p>maintenance</p></body></html>".to_string()),
                &DocumentPatcher::new("js"),
                &director,
                &browser,
            )
            .unwrap_err();

        assert_eq!(fell_back.state.kind, FallbackKind::Patch);
        assert_eq!(browser.title(), "Catalog");
    }
}
