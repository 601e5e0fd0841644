//! Core domain types for the navigator.
//!
//! Pure types with no browser dependencies:
//! - Navigation requests and the navigation typestate machine
//! - The transition preset catalog

pub mod navigation;
pub mod preset;
