//! Domain model shared by the feedback engine wiring and its adapters: request
//! kinds, the event vocabulary, and the reducer that folds events into state.

pub mod domain;
pub mod error;
pub mod protocol;
pub mod state;

pub use domain::RequestKind;
pub use protocol::Event;
pub use state::{reduce, Query, Requests, State};

#[cfg(test)]
#[path = "tests/state_tests.rs"]
mod tests;
