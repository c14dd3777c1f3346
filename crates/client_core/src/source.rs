//! Executors that turn a request kind into its response payload.

use std::{collections::BTreeSet, time::Duration};

use async_trait::async_trait;
use shared::RequestKind;

use crate::error::ResponseError;

pub const DEFAULT_RESPONSE_DELAY: Duration = Duration::from_secs(2);

#[async_trait]
pub trait ResponseSource: Send + Sync {
    async fn fetch(&self, kind: RequestKind) -> Result<String, ResponseError>;
}

/// Waits `delay`, then answers with the kind's canned text. Kinds registered
/// through [`CannedResponses::with_failure`] fail instead.
#[derive(Debug, Clone)]
pub struct CannedResponses {
    delay: Duration,
    failing: BTreeSet<RequestKind>,
}

impl CannedResponses {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            failing: BTreeSet::new(),
        }
    }

    pub fn with_failure(mut self, kind: RequestKind) -> Self {
        self.failing.insert(kind);
        self
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for CannedResponses {
    fn default() -> Self {
        Self::new(DEFAULT_RESPONSE_DELAY)
    }
}

#[async_trait]
impl ResponseSource for CannedResponses {
    async fn fetch(&self, kind: RequestKind) -> Result<String, ResponseError> {
        tokio::time::sleep(self.delay).await;
        if self.failing.contains(&kind) {
            return Err(ResponseError::Unavailable { kind });
        }
        Ok(kind.response_text().to_string())
    }
}
