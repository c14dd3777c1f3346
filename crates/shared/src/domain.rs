use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::ParseRequestKindError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    First,
    Second,
}

impl RequestKind {
    pub const ALL: [RequestKind; 2] = [RequestKind::First, RequestKind::Second];

    /// Canned payload delivered once the request for this kind is served.
    pub fn response_text(self) -> &'static str {
        match self {
            RequestKind::First => "response 1 received",
            RequestKind::Second => "response 2 received",
        }
    }

    /// Tag used when tracing the effect that serves this kind.
    pub fn debug_label(self) -> &'static str {
        match self {
            RequestKind::First => "---- request 1 ----",
            RequestKind::Second => "---- request 2 ----",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RequestKind::First => "first",
            RequestKind::Second => "second",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestKind {
    type Err = ParseRequestKindError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "first" => Ok(RequestKind::First),
            "2" | "second" => Ok(RequestKind::Second),
            other => Err(ParseRequestKindError(other.to_string())),
        }
    }
}
