//! Unidirectional state loop driven by feedback.
//!
//! A [`System`] owns one state value and a reducer. Events arrive from external
//! adapters (through an [`EventSink`]) and from effects started by feedback loops;
//! all of them are folded one at a time. After every fold each [`Feedback`] observes
//! the new state and may start or cancel effects, then the state is published to
//! subscribers.
//!
//! ```text
//! adapter ──EventSink──┐
//!                      ▼
//!          fold: reduce(state, event)
//!                      │
//!                      ├─► Feedback::observe ─► Effects::spawn / cancel
//!                      │                               │
//!                      │      effect events ◄──────────┘
//!                      ▼
//!          broadcast + watch ──► adapter renders
//! ```

mod effect;
pub mod error;
mod feedback;
mod system;

pub use effect::{EffectHandle, EffectId, Effects};
pub use error::SystemError;
pub use feedback::{react, react_each, Feedback, React, ReactEach};
pub use system::{EventSink, System, SystemHandle, DEFAULT_STATE_CAPACITY};
