//! Visual bracket around a DOM patch: preset choice, overlay, and the
//! animation-end / deadline race.
//!
//! CSS animations do not always report completion (reduced motion, presets
//! without keyframes on the shell, nodes removed mid-animation), so every wait
//! is a race between the element's `animationend` and a deadline. The race
//! reports which branch won; nothing here can wait forever.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::dom::{LiveDocument, NodeId, Region};
use crate::domain::preset::{FADE, PRESETS, TransitionPreset};
use crate::metrics;
use crate::navigator::NavigatorConfig;

/// Inline style property suppressed on the shell while it animates.
const SHELL_OVERRIDE: &str = "pointer-events";

/// Overlay attribute carrying the current preset's visual key.
pub const OVERLAY_TRANSITION_ATTR: &str = "data-transition";

/// Winner of an animation race.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaceWinner {
    /// `animationend` fired on the animated node.
    AnimationEnd,
    /// The deadline elapsed first.
    Deadline,
}

impl RaceWinner {
    pub fn as_str(&self) -> &'static str {
        match self {
            RaceWinner::AnimationEnd => "animation_end",
            RaceWinner::Deadline => "deadline",
        }
    }
}

/// Direction of an animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Leave,
    Enter,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Leave => "leave",
            Phase::Enter => "enter",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Await the first of `end` and a `deadline` timer.
///
/// When both are ready at the same poll, the animation end wins.
pub async fn race_animation<F>(end: F, deadline: Duration) -> RaceWinner
where
    F: Future<Output = ()>,
{
    tokio::select! {
        biased;
        _ = end => RaceWinner::AnimationEnd,
        _ = tokio::time::sleep(deadline) => RaceWinner::Deadline,
    }
}

/// Drives presets, the overlay and shell animations for the navigator.
pub struct TransitionDirector {
    rng: Mutex<StdRng>,
    animation_timeout: Duration,
    overlay_linger: Duration,
    overlay_active_class: String,
}

impl TransitionDirector {
    pub fn new(config: &NavigatorConfig) -> Self {
        let rng = match config.preset_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng: Mutex::new(rng),
            animation_timeout: Duration::from_millis(config.animation_timeout_ms),
            overlay_linger: Duration::from_millis(config.overlay_linger_ms),
            overlay_active_class: config.overlay_active_class.clone(),
        }
    }

    /// Uniformly random preset, or `fade` under reduced motion.
    pub fn choose(&self, reduced_motion: bool) -> &'static TransitionPreset {
        if reduced_motion {
            return &FADE;
        }
        let mut rng = self.rng.lock();
        PRESETS.choose(&mut *rng).unwrap_or(&FADE)
    }

    /// Make the overlay visible and interactive with the preset's visual.
    pub fn show_overlay(&self, doc: &dyn LiveDocument, preset: &TransitionPreset) {
        let Some(overlay) = doc.query(Region::Overlay) else {
            tracing::trace!("No overlay element on page");
            return;
        };
        doc.set_attribute(overlay, OVERLAY_TRANSITION_ATTR, preset.overlay_key);
        doc.add_class(overlay, &self.overlay_active_class);
        doc.set_attribute(overlay, "aria-hidden", "false");
    }

    /// Freeze the shell for the duration of the transition.
    pub fn freeze_shell(&self, doc: &dyn LiveDocument, shell: Option<NodeId>) {
        if let Some(shell) = shell {
            doc.set_style(shell, SHELL_OVERRIDE, Some("none"));
        }
    }

    /// Apply `class` to `node` and race its animation against the deadline.
    ///
    /// The animation-end listener is armed before the class is applied, so
    /// the returned future does not borrow the document. Resolves to `None`
    /// immediately when there is no node to animate.
    pub fn animate(
        &self,
        doc: &dyn LiveDocument,
        node: Option<NodeId>,
        class: &'static str,
        phase: Phase,
    ) -> impl Future<Output = Option<RaceWinner>> + Send + use<> {
        let armed = node.map(|node| {
            let end = doc.animation_end(node);
            doc.add_class(node, class);
            end
        });
        let deadline = self.animation_timeout;

        async move {
            let end = armed?;
            let winner = race_animation(end, deadline).await;
            tracing::debug!(phase = %phase, winner = winner.as_str(), "Animation settled");
            metrics::record_animation_race(phase, winner);
            Some(winner)
        }
    }

    /// Return the shell to its resting state: no transitional classes of any
    /// preset, no inline override.
    pub fn reveal_shell(&self, doc: &dyn LiveDocument, shell: Option<NodeId>) {
        let Some(shell) = shell else {
            return;
        };
        for class in TransitionPreset::transitional_classes() {
            doc.remove_class(shell, class);
        }
        doc.set_style(shell, SHELL_OVERRIDE, None);
    }

    /// Deactivate the overlay, then mark it invisible after the linger unless
    /// a new transition re-activated it meanwhile.
    pub async fn hide_overlay(&self, doc: &dyn LiveDocument) {
        let Some(overlay) = doc.query(Region::Overlay) else {
            return;
        };
        doc.remove_class(overlay, &self.overlay_active_class);

        tokio::time::sleep(self.overlay_linger).await;

        match doc.query(Region::Overlay) {
            Some(overlay) if !doc.has_class(overlay, &self.overlay_active_class) => {
                doc.set_attribute(overlay, "aria-hidden", "true");
            }
            _ => tracing::trace!("Overlay re-activated during linger"),
        }
    }

    /// Deactivate and hide the overlay at once (fallback and supersede paths).
    pub fn reset_overlay(&self, doc: &dyn LiveDocument) {
        if let Some(overlay) = doc.query(Region::Overlay) {
            doc.remove_class(overlay, &self.overlay_active_class);
            doc.set_attribute(overlay, "aria-hidden", "true");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{AnimationMode, MemoryBrowser};

    const PAGE: &str = r#"<html><head><title>Catalog</title></head><body>
        <div id="page-transition" aria-hidden="true"></div>
        <main data-page-shell>catalog</main>
    </body></html>"#;

    fn director() -> TransitionDirector {
        TransitionDirector::new(&NavigatorConfig {
            preset_seed: Some(7),
            ..NavigatorConfig::default()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_race_deadline_branch() {
        let start = tokio::time::Instant::now();
        let winner =
            race_animation(futures::future::pending::<()>(), Duration::from_millis(1200)).await;
        assert_eq!(winner, RaceWinner::Deadline);
        assert!(start.elapsed() >= Duration::from_millis(1200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_race_animation_end_branch() {
        let start = tokio::time::Instant::now();
        let end = tokio::time::sleep(Duration::from_millis(300));
        let winner = race_animation(end, Duration::from_millis(1200)).await;
        assert_eq!(winner, RaceWinner::AnimationEnd);
        assert!(start.elapsed() < Duration::from_millis(1200));
    }

    #[test]
    fn test_reduced_motion_forces_fade() {
        let director = director();
        for _ in 0..20 {
            assert_eq!(director.choose(true).key, "fade");
        }
    }

    #[test]
    fn test_random_choice_covers_catalog() {
        let director = director();
        let mut seen: Vec<&str> = (0..200).map(|_| director.choose(false).key).collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), PRESETS.len());
    }

    #[tokio::test(start_paused = true)]
    async fn test_animate_waits_for_manual_animation_end() {
        let browser = MemoryBrowser::from_html("http://localhost/catalog/", PAGE).unwrap();
        browser.set_animation_mode(AnimationMode::Manual);
        let director = director();
        let shell = browser.query(Region::PageShell);

        let race = tokio::spawn(director.animate(&browser, shell, "page-leave-zoom", Phase::Leave));
        tokio::task::yield_now().await;
        assert!(browser.fire_animation_end(Region::PageShell));

        assert_eq!(race.await.unwrap(), Some(RaceWinner::AnimationEnd));
        let node = browser.node(Region::PageShell).unwrap();
        assert!(node.classes.contains(&"page-leave-zoom".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hide_overlay_lingers_before_marking_hidden() {
        let browser = MemoryBrowser::from_html("http://localhost/catalog/", PAGE).unwrap();
        let director = director();
        director.show_overlay(&browser, &FADE);

        let overlay = browser.node(Region::Overlay).unwrap();
        assert_eq!(overlay.attribute("data-transition"), Some("fade"));
        assert_eq!(overlay.attribute("aria-hidden"), Some("false"));

        let start = tokio::time::Instant::now();
        director.hide_overlay(&browser).await;
        assert!(start.elapsed() >= Duration::from_millis(400));

        let overlay = browser.node(Region::Overlay).unwrap();
        assert!(!overlay.classes.contains(&"is-active".to_string()));
        assert_eq!(overlay.attribute("aria-hidden"), Some("true"));
    }
}
