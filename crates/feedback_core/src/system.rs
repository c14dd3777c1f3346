use std::fmt;

use tokio::{
    sync::{broadcast, mpsc, oneshot, watch},
    task::JoinHandle,
};
use tracing::{debug, info};

use crate::{
    effect::{EffectRegistry, Effects, Envelope},
    error::SystemError,
    feedback::Feedback,
};

pub const DEFAULT_STATE_CAPACITY: usize = 1024;

type ReduceFn<S, E> = Box<dyn Fn(&S, E) -> S + Send>;

/// Builder for a running feedback system.
pub struct System<S, E> {
    initial: S,
    reduce: ReduceFn<S, E>,
    feedbacks: Vec<Box<dyn Feedback<S, E>>>,
    state_capacity: usize,
}

impl<S, E> System<S, E>
where
    S: Clone + Send + Sync + 'static,
    E: fmt::Debug + Send + 'static,
{
    pub fn new(initial: S, reduce: impl Fn(&S, E) -> S + Send + 'static) -> Self {
        Self {
            initial,
            reduce: Box::new(reduce),
            feedbacks: Vec::new(),
            state_capacity: DEFAULT_STATE_CAPACITY,
        }
    }

    pub fn with_feedback(mut self, feedback: impl Feedback<S, E>) -> Self {
        self.feedbacks.push(Box::new(feedback));
        self
    }

    /// How many published states a slow subscriber may fall behind before it lags.
    pub fn with_state_capacity(mut self, capacity: usize) -> Self {
        self.state_capacity = capacity.max(1);
        self
    }

    /// Seeds every feedback with the initial state and spawns the fold loop.
    /// Must be called from within a tokio runtime.
    pub fn start(self) -> SystemHandle<S, E> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (states_tx, _) = broadcast::channel(self.state_capacity);
        let (latest_tx, latest_rx) = watch::channel(self.initial.clone());
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let (in_flight_tx, in_flight) = watch::channel(0);

        let mut fold = FoldLoop {
            state: self.initial,
            reduce: self.reduce,
            feedbacks: self.feedbacks,
            registry: EffectRegistry::new(events_tx.clone(), in_flight_tx),
            events: events_rx,
            states: states_tx.clone(),
            latest: latest_tx,
        };
        fold.observe_and_publish();
        info!(feedbacks = fold.feedbacks.len(), "feedback system started");

        let task = tokio::spawn(fold.run(shutdown_rx));

        SystemHandle {
            sink: EventSink { events: events_tx },
            states: states_tx,
            latest: latest_rx,
            in_flight,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        }
    }
}

struct FoldLoop<S, E> {
    state: S,
    reduce: ReduceFn<S, E>,
    feedbacks: Vec<Box<dyn Feedback<S, E>>>,
    registry: EffectRegistry<E>,
    events: mpsc::UnboundedReceiver<Envelope<E>>,
    states: broadcast::Sender<S>,
    latest: watch::Sender<S>,
}

impl<S, E> FoldLoop<S, E>
where
    S: Clone + Send + Sync + 'static,
    E: fmt::Debug + Send + 'static,
{
    async fn run(mut self, mut shutdown: oneshot::Receiver<()>) {
        loop {
            let envelope = tokio::select! {
                biased;
                _ = &mut shutdown => break,
                envelope = self.events.recv() => match envelope {
                    Some(envelope) => envelope,
                    None => break,
                },
            };

            let event = match envelope {
                Envelope::External(event) => event,
                Envelope::Effect { id, event } => {
                    if !self.registry.is_live(id) {
                        debug!(effect = %id, ?event, "discarding event from cancelled effect");
                        continue;
                    }
                    event
                }
                Envelope::Finished(id) => {
                    self.registry.finish(id);
                    continue;
                }
                Envelope::Barrier(ack) => {
                    let _ = ack.send(());
                    continue;
                }
            };

            debug!(?event, "folding event");
            self.state = (self.reduce)(&self.state, event);
            self.observe_and_publish();
        }

        info!("feedback system stopped");
    }

    fn observe_and_publish(&mut self) {
        let mut effects = Effects::new(&mut self.registry);
        for feedback in &mut self.feedbacks {
            feedback.observe(&mut self.state, &mut effects);
        }

        // No subscribers is fine; the latest state is still kept in the watch channel.
        let _ = self.states.send(self.state.clone());
        self.latest.send_replace(self.state.clone());
    }
}

/// Clonable entry point for events coming from outside the system.
pub struct EventSink<E> {
    events: mpsc::UnboundedSender<Envelope<E>>,
}

impl<E> Clone for EventSink<E> {
    fn clone(&self) -> Self {
        Self {
            events: self.events.clone(),
        }
    }
}

impl<E> EventSink<E> {
    pub fn send(&self, event: E) -> Result<(), SystemError> {
        self.events
            .send(Envelope::External(event))
            .map_err(|_| SystemError::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.events.is_closed()
    }
}

/// Handle to a started [`System`]. Dropping it aborts the fold loop and every effect.
pub struct SystemHandle<S, E> {
    sink: EventSink<E>,
    states: broadcast::Sender<S>,
    latest: watch::Receiver<S>,
    in_flight: watch::Receiver<usize>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl<S: Clone, E> SystemHandle<S, E> {
    pub fn sink(&self) -> EventSink<E> {
        self.sink.clone()
    }

    pub fn send(&self, event: E) -> Result<(), SystemError> {
        self.sink.send(event)
    }

    /// Every state published from now on. The current state is available from
    /// [`SystemHandle::state`].
    pub fn subscribe(&self) -> broadcast::Receiver<S> {
        self.states.subscribe()
    }

    pub fn watch(&self) -> watch::Receiver<S> {
        self.latest.clone()
    }

    pub fn state(&self) -> S {
        self.latest.borrow().clone()
    }

    /// Effects started by feedbacks that can still deliver events.
    pub fn in_flight(&self) -> usize {
        *self.in_flight.borrow()
    }

    /// Resolves once every event sent before the call has been folded and no
    /// effect is left in flight.
    pub async fn settled(&self) -> Result<(), SystemError> {
        let (ack, folded) = oneshot::channel();
        self.sink
            .events
            .send(Envelope::Barrier(ack))
            .map_err(|_| SystemError::Closed)?;
        folded.await.map_err(|_| SystemError::Closed)?;

        let mut in_flight = self.in_flight.clone();
        in_flight
            .wait_for(|count| *count == 0)
            .await
            .map_err(|_| SystemError::Closed)?;
        Ok(())
    }

    /// Stops folding, cancels outstanding effects, and waits for the loop to exit.
    pub async fn shutdown(mut self) -> Result<(), SystemError> {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        match self.task.take() {
            Some(task) => task.await.map_err(SystemError::from),
            None => Ok(()),
        }
    }
}

impl<S, E> Drop for SystemHandle<S, E> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
#[path = "tests/system_tests.rs"]
mod tests;
