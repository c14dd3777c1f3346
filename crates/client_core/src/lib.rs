use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use feedback_core::{react, EventSink, React, System, SystemError, SystemHandle};
use futures::{stream, Stream, StreamExt};
use shared::{reduce, Event, Query, RequestKind, State};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

pub mod error;
pub mod source;

pub use error::ResponseError;
pub use source::{CannedResponses, ResponseSource, DEFAULT_RESPONSE_DELAY};

pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub response_timeout: Duration,
    pub state_capacity: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            state_capacity: feedback_core::DEFAULT_STATE_CAPACITY,
        }
    }
}

/// Drains pending requests on every state change and serves the drained set
/// through `source`. A new set cancels whatever the previous one was still waiting on.
pub fn request_feedback(
    source: Arc<dyn ResponseSource>,
    response_timeout: Duration,
) -> React<State, Query, Event> {
    react("requests", State::take_query, move |query: Query| {
        serve_query(Arc::clone(&source), query, response_timeout)
    })
}

fn serve_query(
    source: Arc<dyn ResponseSource>,
    query: Query,
    response_timeout: Duration,
) -> impl Stream<Item = Event> + Send + 'static {
    let concurrency = query.len().max(1);
    stream::iter(query)
        .map(move |kind| {
            let source = Arc::clone(&source);
            async move { fetch_response(source.as_ref(), kind, response_timeout).await }
        })
        .buffered(concurrency)
        .filter_map(|event| async move { event })
}

async fn fetch_response(
    source: &dyn ResponseSource,
    kind: RequestKind,
    response_timeout: Duration,
) -> Option<Event> {
    let result = match tokio::time::timeout(response_timeout, source.fetch(kind)).await {
        Ok(result) => result,
        Err(_) => Err(ResponseError::Timeout {
            kind,
            after: response_timeout,
        }),
    };

    match result {
        Ok(payload) => {
            debug!(label = kind.debug_label(), %kind, %payload, "response received");
            Some(Event::Response(kind, payload))
        }
        Err(err) => {
            warn!(%kind, error = %err, "request failed; no response will be folded");
            None
        }
    }
}

/// What a UI adapter needs from the running request loop.
#[async_trait]
pub trait ClientHandle: Send + Sync {
    fn send_event(&self, event: Event) -> Result<()>;
    fn state(&self) -> State;
    fn subscribe_states(&self) -> broadcast::Receiver<State>;
    fn in_flight(&self) -> usize;
    /// Waits until every event sent so far is folded and no response is
    /// outstanding, or `limit` elapses. Returns whether the loop settled.
    async fn settle(&self, limit: Duration) -> bool;
}

/// The request/response state loop: one reducer, one request feedback.
pub struct RequestClient {
    system: SystemHandle<State, Event>,
}

impl RequestClient {
    /// Starts the loop. Must be called from within a tokio runtime.
    pub fn start(source: Arc<dyn ResponseSource>, options: ClientOptions) -> Self {
        let system = System::new(State::new(), reduce)
            .with_state_capacity(options.state_capacity)
            .with_feedback(request_feedback(source, options.response_timeout))
            .start();
        info!(
            response_timeout_ms = u64::try_from(options.response_timeout.as_millis())
                .unwrap_or(u64::MAX),
            "request client started"
        );
        Self { system }
    }

    pub fn request(&self, kind: RequestKind) -> Result<(), SystemError> {
        self.system.send(Event::Request(kind))
    }

    pub fn clear(&self) -> Result<(), SystemError> {
        self.system.send(Event::Clear)
    }

    pub fn send(&self, event: Event) -> Result<(), SystemError> {
        self.system.send(event)
    }

    pub fn sink(&self) -> EventSink<Event> {
        self.system.sink()
    }

    pub fn watch_state(&self) -> watch::Receiver<State> {
        self.system.watch()
    }

    pub async fn shutdown(self) -> Result<(), SystemError> {
        self.system.shutdown().await?;
        info!("request client stopped");
        Ok(())
    }
}

#[async_trait]
impl ClientHandle for RequestClient {
    fn send_event(&self, event: Event) -> Result<()> {
        self.system.send(event)?;
        Ok(())
    }

    fn state(&self) -> State {
        self.system.state()
    }

    fn subscribe_states(&self) -> broadcast::Receiver<State> {
        self.system.subscribe()
    }

    fn in_flight(&self) -> usize {
        self.system.in_flight()
    }

    async fn settle(&self, limit: Duration) -> bool {
        matches!(
            tokio::time::timeout(limit, self.system.settled()).await,
            Ok(Ok(()))
        )
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
