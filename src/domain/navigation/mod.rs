//! Navigation aggregate: request, typestate phases and transitions.

pub mod state;
pub mod transitions;

pub use state::*;
