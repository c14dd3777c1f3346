use serde::{Deserialize, Serialize};

use crate::domain::RequestKind;

/// Everything that can change [`crate::State`]. Adapters and effects only ever
/// influence state by emitting one of these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Event {
    #[default]
    None,
    Request(RequestKind),
    Response(RequestKind, String),
    Clear,
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::None => "none",
            Event::Request(_) => "request",
            Event::Response(..) => "response",
            Event::Clear => "clear",
        }
    }

    /// The canned response that serves a request of `kind`.
    pub fn canned_response(kind: RequestKind) -> Self {
        Event::Response(kind, kind.response_text().to_string())
    }
}
