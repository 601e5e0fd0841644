//! Transition presets.

use serde::Serialize;

/// A named combination of CSS animation classes and an overlay visual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransitionPreset {
    pub key: &'static str,
    pub enter_class: &'static str,
    pub leave_class: &'static str,
    /// Value written to the overlay's `data-transition` attribute.
    pub overlay_key: &'static str,
}

pub const FADE: TransitionPreset = TransitionPreset {
    key: "fade",
    enter_class: "page-enter-fade",
    leave_class: "page-leave-fade",
    overlay_key: "fade",
};

pub const SLIDE_LEFT: TransitionPreset = TransitionPreset {
    key: "slide-left",
    enter_class: "page-enter-slide-left",
    leave_class: "page-leave-slide-left",
    overlay_key: "slide-left",
};

pub const SLIDE_UP: TransitionPreset = TransitionPreset {
    key: "slide-up",
    enter_class: "page-enter-slide-up",
    leave_class: "page-leave-slide-up",
    overlay_key: "slide-up",
};

pub const ZOOM: TransitionPreset = TransitionPreset {
    key: "zoom",
    enter_class: "page-enter-zoom",
    leave_class: "page-leave-zoom",
    overlay_key: "zoom",
};

pub const TILT: TransitionPreset = TransitionPreset {
    key: "tilt",
    enter_class: "page-enter-tilt",
    leave_class: "page-leave-tilt",
    overlay_key: "tilt",
};

/// The fixed catalog.
pub static PRESETS: [TransitionPreset; 5] = [FADE, SLIDE_LEFT, SLIDE_UP, ZOOM, TILT];

impl TransitionPreset {
    pub fn by_key(key: &str) -> Option<&'static TransitionPreset> {
        PRESETS.iter().find(|preset| preset.key == key)
    }

    /// Every enter/leave class across the catalog.
    pub fn transitional_classes() -> impl Iterator<Item = &'static str> {
        PRESETS
            .iter()
            .flat_map(|preset| [preset.enter_class, preset.leave_class])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_keys_match_overlay_keys() {
        let keys: Vec<_> = PRESETS.iter().map(|p| p.key).collect();
        assert_eq!(keys, ["fade", "slide-left", "slide-up", "zoom", "tilt"]);
        assert!(PRESETS.iter().all(|p| p.key == p.overlay_key));
    }

    #[test]
    fn test_lookup_and_class_sweep() {
        assert_eq!(TransitionPreset::by_key("zoom"), Some(&ZOOM));
        assert_eq!(TransitionPreset::by_key("spin"), None);
        assert_eq!(TransitionPreset::transitional_classes().count(), 10);
    }
}
