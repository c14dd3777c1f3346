use std::time::Duration;

use shared::RequestKind;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResponseError {
    #[error("response source unavailable for request '{kind}'")]
    Unavailable { kind: RequestKind },
    #[error("no response for request '{kind}' within {after:?}")]
    Timeout { kind: RequestKind, after: Duration },
}
