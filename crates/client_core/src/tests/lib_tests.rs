use super::*;

use std::sync::Mutex;

use async_trait::async_trait;
use tokio::time::{sleep, Instant};

struct RecordingSource {
    inner: CannedResponses,
    calls: Arc<Mutex<Vec<RequestKind>>>,
}

impl RecordingSource {
    fn new(inner: CannedResponses) -> (Arc<Self>, Arc<Mutex<Vec<RequestKind>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let source = Arc::new(Self {
            inner,
            calls: Arc::clone(&calls),
        });
        (source, calls)
    }
}

#[async_trait]
impl ResponseSource for RecordingSource {
    async fn fetch(&self, kind: RequestKind) -> Result<String, ResponseError> {
        self.calls.lock().expect("calls lock").push(kind);
        self.inner.fetch(kind).await
    }
}

fn start_canned(delay: Duration) -> (RequestClient, Arc<Mutex<Vec<RequestKind>>>) {
    let (source, calls) = RecordingSource::new(CannedResponses::new(delay));
    let client = RequestClient::start(source, ClientOptions::default());
    (client, calls)
}

async fn wait_for_state(
    client: &RequestClient,
    predicate: impl FnMut(&State) -> bool,
) -> State {
    let mut latest = client.watch_state();
    let state = tokio::time::timeout(Duration::from_secs(60), latest.wait_for(predicate))
        .await
        .expect("timed out waiting for state")
        .expect("client stopped")
        .clone();
    state
}

#[tokio::test(start_paused = true)]
async fn first_request_is_answered_after_the_delay() {
    let (client, calls) = start_canned(DEFAULT_RESPONSE_DELAY);
    let started = Instant::now();

    client.request(RequestKind::First).expect("request");
    let state = wait_for_state(&client, |state| {
        state.response(RequestKind::First).is_some()
    })
    .await;

    assert!(started.elapsed() >= DEFAULT_RESPONSE_DELAY);
    assert_eq!(
        state.response(RequestKind::First),
        Some("response 1 received")
    );
    assert_eq!(state.response(RequestKind::Second), None);
    assert!(state.requests().is_empty());
    assert_eq!(*calls.lock().expect("calls lock"), vec![RequestKind::First]);
}

#[tokio::test(start_paused = true)]
async fn duplicate_requests_start_one_fetch() {
    let (client, calls) = start_canned(Duration::from_secs(2));

    client.request(RequestKind::First).expect("request");
    client.request(RequestKind::First).expect("request");

    wait_for_state(&client, |state| {
        state.response(RequestKind::First).is_some()
    })
    .await;
    sleep(Duration::from_secs(10)).await;

    assert_eq!(*calls.lock().expect("calls lock"), vec![RequestKind::First]);
}

#[tokio::test(start_paused = true)]
async fn clear_cancels_the_outstanding_response() {
    let (client, _calls) = start_canned(Duration::from_secs(2));

    client.request(RequestKind::First).expect("request");
    sleep(Duration::from_secs(1)).await;
    client.clear().expect("clear");
    sleep(Duration::from_secs(10)).await;

    let state = client.state();
    assert_eq!(state.response(RequestKind::First), None);
    assert_eq!(client.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn clear_resets_responses_already_received() {
    let (client, _calls) = start_canned(Duration::from_millis(100));

    client.request(RequestKind::Second).expect("request");
    wait_for_state(&client, |state| {
        state.response(RequestKind::Second).is_some()
    })
    .await;
    client.clear().expect("clear");

    let state = wait_for_state(&client, |state| state.responses().is_empty()).await;
    assert_eq!(state.response(RequestKind::Second), None);
}

#[tokio::test(start_paused = true)]
async fn a_new_kind_replaces_the_pending_one() {
    let (client, calls) = start_canned(Duration::from_secs(2));

    client.request(RequestKind::First).expect("request");
    sleep(Duration::from_millis(500)).await;
    client.request(RequestKind::Second).expect("request");

    let state = wait_for_state(&client, |state| {
        state.response(RequestKind::Second).is_some()
    })
    .await;
    sleep(Duration::from_secs(10)).await;

    assert_eq!(state.response(RequestKind::First), None);
    assert_eq!(client.state().response(RequestKind::First), None);
    assert_eq!(
        *calls.lock().expect("calls lock"),
        vec![RequestKind::First, RequestKind::Second]
    );
}

#[tokio::test(start_paused = true)]
async fn failed_fetch_folds_nothing() {
    let source = CannedResponses::new(Duration::from_secs(1)).with_failure(RequestKind::Second);
    let client = RequestClient::start(Arc::new(source), ClientOptions::default());

    client.request(RequestKind::Second).expect("request");
    sleep(Duration::from_secs(5)).await;

    assert_eq!(client.state().response(RequestKind::Second), None);
    assert_eq!(client.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn slow_source_times_out() {
    let options = ClientOptions {
        response_timeout: Duration::from_secs(1),
        ..ClientOptions::default()
    };
    let client = RequestClient::start(
        Arc::new(CannedResponses::new(Duration::from_secs(5))),
        options,
    );

    client.request(RequestKind::First).expect("request");
    sleep(Duration::from_secs(2)).await;
    assert_eq!(client.in_flight(), 0);

    sleep(Duration::from_secs(10)).await;
    assert_eq!(client.state().response(RequestKind::First), None);
}

#[tokio::test(start_paused = true)]
async fn settle_waits_for_outstanding_responses() {
    let (client, _calls) = start_canned(Duration::from_secs(2));

    client.request(RequestKind::First).expect("request");
    assert!(client.settle(Duration::from_secs(30)).await);

    assert_eq!(
        client.state().response(RequestKind::First),
        Some("response 1 received")
    );
}

#[tokio::test]
async fn events_are_rejected_after_shutdown() {
    let (client, _calls) = start_canned(Duration::from_millis(10));
    let sink = client.sink();

    client.shutdown().await.expect("shutdown");

    assert!(matches!(
        sink.send(Event::Request(RequestKind::First)),
        Err(SystemError::Closed)
    ));
}

#[tokio::test]
async fn unknown_input_maps_to_a_no_op() {
    let (client, _calls) = start_canned(Duration::from_millis(10));
    let mut states = client.subscribe_states();

    client.send_event(Event::None).expect("send");
    let state = states.recv().await.expect("state");

    assert!(state.responses().is_empty());
    assert!(state.requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn published_states_do_not_share_the_request_queue() {
    let (client, calls) = start_canned(Duration::from_millis(100));

    let local = reduce(&client.state(), Event::Request(RequestKind::Second));
    assert_eq!(local.requests().pending(), [RequestKind::Second]);
    client.send_event(Event::None).expect("send");
    sleep(Duration::from_secs(5)).await;

    assert!(client.state().requests().is_empty());
    assert_eq!(client.state().response(RequestKind::Second), None);
    assert!(calls.lock().expect("calls lock").is_empty());
}

#[tokio::test(start_paused = true)]
async fn settle_right_after_sending_waits_for_the_fold() {
    let (client, _calls) = start_canned(Duration::from_millis(300));

    client.request(RequestKind::Second).expect("request");
    assert!(client.settle(Duration::from_secs(30)).await);

    assert_eq!(
        client.state().response(RequestKind::Second),
        Some("response 2 received")
    );
    assert_eq!(client.in_flight(), 0);
}
