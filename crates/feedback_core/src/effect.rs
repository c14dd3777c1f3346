use std::{collections::HashMap, fmt};

use futures::{Stream, StreamExt};
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectId(u64);

impl fmt::Display for EffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What travels on the system's event queue.
pub(crate) enum Envelope<E> {
    External(E),
    Effect { id: EffectId, event: E },
    Finished(EffectId),
    /// Acknowledged once every envelope queued ahead of it has been handled.
    Barrier(oneshot::Sender<()>),
}

/// Ownership token for a spawned effect. Hand it back to [`Effects::cancel`].
#[derive(Debug, PartialEq, Eq)]
pub struct EffectHandle {
    id: EffectId,
}

impl EffectHandle {
    pub fn id(&self) -> EffectId {
        self.id
    }
}

struct LiveEffect {
    label: String,
    task: JoinHandle<()>,
}

/// Effects that may still deliver events. Owned by the fold loop; dropping it
/// aborts everything still running.
pub(crate) struct EffectRegistry<E> {
    next_id: u64,
    live: HashMap<EffectId, LiveEffect>,
    events: mpsc::UnboundedSender<Envelope<E>>,
    in_flight: watch::Sender<usize>,
}

impl<E: Send + 'static> EffectRegistry<E> {
    pub(crate) fn new(
        events: mpsc::UnboundedSender<Envelope<E>>,
        in_flight: watch::Sender<usize>,
    ) -> Self {
        Self {
            next_id: 1,
            live: HashMap::new(),
            events,
            in_flight,
        }
    }

    pub(crate) fn is_live(&self, id: EffectId) -> bool {
        self.live.contains_key(&id)
    }

    /// The effect's stream ended on its own.
    pub(crate) fn finish(&mut self, id: EffectId) {
        if let Some(effect) = self.live.remove(&id) {
            debug!(effect = %id, label = %effect.label, "effect finished");
            self.publish_count();
        }
    }

    fn spawn<St>(&mut self, label: String, effect: St) -> EffectHandle
    where
        St: Stream<Item = E> + Send + 'static,
    {
        let id = EffectId(self.next_id);
        self.next_id += 1;

        let events = self.events.clone();
        let task = tokio::spawn(async move {
            let mut effect = Box::pin(effect);
            while let Some(event) = effect.next().await {
                if events.send(Envelope::Effect { id, event }).is_err() {
                    return;
                }
            }
            let _ = events.send(Envelope::Finished(id));
        });

        debug!(effect = %id, label = %label, "effect started");
        self.live.insert(id, LiveEffect { label, task });
        self.publish_count();
        EffectHandle { id }
    }

    fn cancel(&mut self, handle: EffectHandle) -> bool {
        let Some(effect) = self.live.remove(&handle.id) else {
            return false;
        };
        effect.task.abort();
        debug!(effect = %handle.id, label = %effect.label, "effect cancelled");
        self.publish_count();
        true
    }

    fn publish_count(&self) {
        self.in_flight.send_replace(self.live.len());
    }
}

impl<E> Drop for EffectRegistry<E> {
    fn drop(&mut self) {
        for (id, effect) in self.live.drain() {
            effect.task.abort();
            debug!(effect = %id, label = %effect.label, "effect aborted on teardown");
        }
        self.in_flight.send_replace(0);
    }
}

/// Scope handed to [`crate::Feedback::observe`] for starting and cancelling effects.
pub struct Effects<'a, E> {
    registry: &'a mut EffectRegistry<E>,
}

impl<'a, E: Send + 'static> Effects<'a, E> {
    pub(crate) fn new(registry: &'a mut EffectRegistry<E>) -> Self {
        Self { registry }
    }

    /// Runs `effect` on the runtime; every item it yields is folded as an event
    /// until the effect is cancelled.
    pub fn spawn<St>(&mut self, label: impl Into<String>, effect: St) -> EffectHandle
    where
        St: Stream<Item = E> + Send + 'static,
    {
        self.registry.spawn(label.into(), effect)
    }

    /// Stops the effect and discards any of its events not folded yet.
    /// Returns `false` if the effect had already finished.
    pub fn cancel(&mut self, handle: EffectHandle) -> bool {
        self.registry.cancel(handle)
    }

    pub fn is_live(&self, handle: &EffectHandle) -> bool {
        self.registry.is_live(handle.id)
    }

    pub fn in_flight(&self) -> usize {
        self.registry.live.len()
    }
}
