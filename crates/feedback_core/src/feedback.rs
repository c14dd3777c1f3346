use std::collections::{BTreeMap, BTreeSet};

use futures::{stream::BoxStream, Stream, StreamExt};
use tracing::debug;

use crate::effect::{EffectHandle, Effects};

/// A loop that watches state and drives effects.
///
/// `observe` runs inside the fold, once per published state and in fold order,
/// before the state reaches subscribers. It must not block; long-running work
/// belongs in an effect.
///
/// The state is the fold loop's own value. A feedback may drain one-shot fields
/// from it (a request queue, say); subscribers only ever see the result.
pub trait Feedback<S, E>: Send + 'static {
    fn name(&self) -> &str;

    fn observe(&mut self, state: &mut S, effects: &mut Effects<'_, E>);
}

type QueryFn<S, Q> = Box<dyn Fn(&mut S) -> Q + Send>;
type EffectFn<Q, E> = Box<dyn Fn(Q) -> BoxStream<'static, E> + Send>;

/// Restarts one effect whenever the derived query changes.
pub struct React<S, Q, E> {
    name: String,
    query: QueryFn<S, Q>,
    effects: EffectFn<Q, E>,
    last_query: Option<Q>,
    running: Option<EffectHandle>,
}

/// Derives `Q` from every published state; when it differs from the previous
/// query the in-flight effect is cancelled and `effects(query)` is started.
pub fn react<S, Q, E, QF, EF, St>(
    name: impl Into<String>,
    query: QF,
    effects: EF,
) -> React<S, Q, E>
where
    S: 'static,
    Q: PartialEq + Clone + Send + 'static,
    E: Send + 'static,
    QF: Fn(&mut S) -> Q + Send + 'static,
    EF: Fn(Q) -> St + Send + 'static,
    St: Stream<Item = E> + Send + 'static,
{
    React {
        name: name.into(),
        query: Box::new(query),
        effects: Box::new(move |query| effects(query).boxed()),
        last_query: None,
        running: None,
    }
}

impl<S, Q, E> React<S, Q, E> {
    pub fn last_query(&self) -> Option<&Q> {
        self.last_query.as_ref()
    }
}

impl<S, Q, E> Feedback<S, E> for React<S, Q, E>
where
    S: 'static,
    Q: PartialEq + Clone + Send + 'static,
    E: Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn observe(&mut self, state: &mut S, effects: &mut Effects<'_, E>) {
        let query = (self.query)(state);
        if self.last_query.as_ref() == Some(&query) {
            return;
        }

        if let Some(previous) = self.running.take() {
            if effects.cancel(previous) {
                debug!(feedback = %self.name, "query changed, in-flight effect cancelled");
            }
        }

        let stream = (self.effects)(query.clone());
        self.running = Some(effects.spawn(self.name.clone(), stream));
        self.last_query = Some(query);
    }
}

/// Keeps one effect per element of a derived set.
pub struct ReactEach<S, Q, E> {
    name: String,
    query: QueryFn<S, BTreeSet<Q>>,
    effects: EffectFn<Q, E>,
    running: BTreeMap<Q, EffectHandle>,
}

/// Elements that appear in the derived set start an effect, elements that leave
/// it have theirs cancelled, elements present in both are left alone.
pub fn react_each<S, Q, E, QF, EF, St>(
    name: impl Into<String>,
    query: QF,
    effects: EF,
) -> ReactEach<S, Q, E>
where
    S: 'static,
    Q: Ord + Clone + Send + 'static,
    E: Send + 'static,
    QF: Fn(&mut S) -> BTreeSet<Q> + Send + 'static,
    EF: Fn(Q) -> St + Send + 'static,
    St: Stream<Item = E> + Send + 'static,
{
    ReactEach {
        name: name.into(),
        query: Box::new(query),
        effects: Box::new(move |query| effects(query).boxed()),
        running: BTreeMap::new(),
    }
}

impl<S, Q, E> ReactEach<S, Q, E> {
    pub fn active(&self) -> impl Iterator<Item = &Q> {
        self.running.keys()
    }
}

impl<S, Q, E> Feedback<S, E> for ReactEach<S, Q, E>
where
    S: 'static,
    Q: Ord + Clone + Send + 'static,
    E: Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn observe(&mut self, state: &mut S, effects: &mut Effects<'_, E>) {
        let queries = (self.query)(state);

        let removed: Vec<Q> = self
            .running
            .keys()
            .filter(|query| !queries.contains(*query))
            .cloned()
            .collect();
        for query in removed {
            if let Some(handle) = self.running.remove(&query) {
                effects.cancel(handle);
            }
        }

        for query in queries {
            if self.running.contains_key(&query) {
                continue;
            }
            let stream = (self.effects)(query.clone());
            let handle = effects.spawn(self.name.clone(), stream);
            self.running.insert(query, handle);
        }
    }
}
