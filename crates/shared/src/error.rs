use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown request kind '{0}' (expected first/1 or second/2)")]
pub struct ParseRequestKindError(pub String);
