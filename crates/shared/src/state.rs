use std::collections::{BTreeMap, BTreeSet};

use serde::{ser::SerializeStruct, Serialize, Serializer};

use crate::{domain::RequestKind, protocol::Event};

/// Work that should currently be in flight, derived by draining [`Requests`].
pub type Query = BTreeSet<RequestKind>;

/// Pending requests accumulated between two drains. Plain owned data: a cloned
/// state carries its own copy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Requests {
    pending: Vec<RequestKind>,
}

impl Requests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, kind: RequestKind) {
        self.pending.push(kind);
    }

    /// Returns everything queued so far, in insertion order, and leaves the buffer empty.
    pub fn take_all(&mut self) -> Vec<RequestKind> {
        std::mem::take(&mut self.pending)
    }

    pub fn pending(&self) -> &[RequestKind] {
        &self.pending
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct State {
    requests: Requests,
    responses: BTreeMap<RequestKind, String>,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clone-and-patch: `transform` edits a copy, `self` is left as it was.
    pub fn mutate(&self, transform: impl FnOnce(&mut State)) -> State {
        let mut next = self.clone();
        transform(&mut next);
        next
    }

    pub fn requests(&self) -> &Requests {
        &self.requests
    }

    pub fn response(&self, kind: RequestKind) -> Option<&str> {
        self.responses.get(&kind).map(String::as_str)
    }

    pub fn responses(&self) -> &BTreeMap<RequestKind, String> {
        &self.responses
    }

    /// Drains the pending queue into a set. Duplicate requests collapse here.
    ///
    /// Only the fold loop calls this, on the state it owns, before that state is
    /// published; published copies never see the queue non-empty.
    pub fn take_query(&mut self) -> Query {
        self.requests.take_all().into_iter().collect()
    }
}

/// Published states always have an empty queue, so only the responses are written.
impl Serialize for State {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut out = serializer.serialize_struct("State", 2)?;
        out.serialize_field("response1", &self.response(RequestKind::First))?;
        out.serialize_field("response2", &self.response(RequestKind::Second))?;
        out.end()
    }
}

pub fn reduce(state: &State, event: Event) -> State {
    match event {
        Event::None => state.clone(),
        Event::Request(kind) => state.mutate(|next| next.requests.append(kind)),
        Event::Response(kind, payload) => state.mutate(|next| {
            next.responses.insert(kind, payload);
        }),
        Event::Clear => state.mutate(|next| {
            next.responses.clear();
            next.requests.take_all();
        }),
    }
}
