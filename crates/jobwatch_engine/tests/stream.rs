mod common;

use std::sync::{Arc, Mutex};

use common::{eventually, init_logging, network_error, settle, EventScript, ScriptedApi};
use jobwatch_core::{JobHandle, RemoteStatus, StreamEvent};
use jobwatch_engine::{
    ClientSettings, EventStreamAdapter, HttpJobClient, ProtocolError, StreamError, MAX_LINE_BYTES,
};
use pretty_assertions::assert_eq;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default, Clone)]
struct Recorder {
    events: Arc<Mutex<Vec<StreamEvent>>>,
    errors: Arc<Mutex<Vec<StreamError>>>,
}

impl Recorder {
    fn subscribe(&self, adapter: &mut EventStreamAdapter, handle: &str) {
        let events = self.events.clone();
        let errors = self.errors.clone();
        adapter.subscribe(
            JobHandle::new(handle),
            move |event| events.lock().unwrap().push(event),
            move |err| errors.lock().unwrap().push(err),
        );
    }

    fn events(&self) -> Vec<StreamEvent> {
        self.events.lock().unwrap().clone()
    }

    fn errors(&self) -> Vec<StreamError> {
        self.errors.lock().unwrap().clone()
    }
}

#[tokio::test]
async fn ndjson_stream_is_decoded_and_end_reported_once() {
    init_logging();
    let server = MockServer::start().await;
    let body = concat!(
        "{\"type\":\"status\",\"status\":\"running\",\"progress\":10}\n",
        "this is not json\n",
        "\n",
        "{\"type\":\"log\",\"event\":{\"event\":\"page_done\",\"title\":\"Home\",\"done\":1,\"total\":20}}\n",
        "{\"type\":\"done\",\"status\":\"completed\",\"duration_sec\":12.4}"
    );
    Mock::given(method("GET"))
        .and(path("/api/jobs/Q9ZT4/events"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/x-ndjson"))
        .mount(&server)
        .await;

    let client = HttpJobClient::new(ClientSettings {
        base_url: format!("{}/api/", server.uri()),
        ..ClientSettings::default()
    })
    .expect("client");
    let mut adapter = EventStreamAdapter::new(Arc::new(client));
    let recorder = Recorder::default();
    recorder.subscribe(&mut adapter, "Q9ZT4");

    assert!(eventually(|| !recorder.errors().is_empty()).await);
    settle().await;

    let events = recorder.events();
    assert_eq!(events.len(), 3);
    assert!(matches!(
        &events[0],
        StreamEvent::Status(status) if status.status == RemoteStatus::Running
    ));
    assert!(matches!(&events[1], StreamEvent::Log(log) if log.is_page_done()));
    assert!(matches!(
        &events[2],
        StreamEvent::Done(done) if done.duration_seconds == Some(12.4)
    ));
    assert_eq!(recorder.errors(), vec![StreamError::Closed]);
}

#[tokio::test]
async fn sse_framing_is_accepted() {
    init_logging();
    let server = MockServer::start().await;
    let body = concat!(
        ": keep-alive\n",
        "event: message\n",
        "data: {\"type\":\"log\",\"message\":\"Loading templates\"}\n",
        "\n",
        "data: {\"type\":\"done\",\"status\":\"failed\",\"error\":\"quota exceeded\"}\n",
        "\n"
    );
    Mock::given(method("GET"))
        .and(path("/api/jobs/Q9ZT4/events"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let client = HttpJobClient::new(ClientSettings {
        base_url: format!("{}/api/", server.uri()),
        ..ClientSettings::default()
    })
    .expect("client");
    let mut adapter = EventStreamAdapter::new(Arc::new(client));
    let recorder = Recorder::default();
    recorder.subscribe(&mut adapter, "Q9ZT4");

    assert!(eventually(|| !recorder.errors().is_empty()).await);

    let events = recorder.events();
    assert_eq!(events.len(), 2);
    assert!(matches!(
        &events[1],
        StreamEvent::Done(done) if done.error.as_deref() == Some("quota exceeded")
    ));
}

#[tokio::test]
async fn refused_stream_reports_transport_error() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/jobs/Q9ZT4/events"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = HttpJobClient::new(ClientSettings {
        base_url: format!("{}/api/", server.uri()),
        ..ClientSettings::default()
    })
    .expect("client");
    let mut adapter = EventStreamAdapter::new(Arc::new(client));
    let recorder = Recorder::default();
    recorder.subscribe(&mut adapter, "Q9ZT4");

    assert!(eventually(|| !recorder.errors().is_empty()).await);
    assert!(recorder.events().is_empty());
    assert!(matches!(
        recorder.errors().as_slice(),
        [StreamError::Transport(_)]
    ));
}

#[tokio::test]
async fn closed_subscription_stays_silent() {
    init_logging();
    let api = ScriptedApi::new("Q9ZT4").with_events(EventScript::LinesThenHold(vec![
        r#"{"type":"status","status":"running"}"#.to_string(),
    ]));
    let mut adapter = EventStreamAdapter::new(Arc::new(api));
    let recorder = Recorder::default();
    recorder.subscribe(&mut adapter, "Q9ZT4");

    assert!(eventually(|| recorder.events().len() == 1).await);
    assert!(adapter.is_open());

    adapter.close();
    adapter.close();
    settle().await;

    assert!(!adapter.is_open());
    assert_eq!(recorder.events().len(), 1);
    assert!(recorder.errors().is_empty());
}

#[tokio::test]
async fn resubscribing_replaces_the_previous_subscription() {
    init_logging();
    let api = Arc::new(ScriptedApi::new("Q9ZT4").with_events(EventScript::LinesThenHold(vec![
        r#"{"type":"status","status":"running"}"#.to_string(),
    ])));
    let mut adapter = EventStreamAdapter::new(api.clone());
    let first = Recorder::default();
    first.subscribe(&mut adapter, "Q9ZT4");
    assert!(eventually(|| first.events().len() == 1).await);

    // No script left, so the second open is refused.
    let second = Recorder::default();
    second.subscribe(&mut adapter, "Q9ZT4");
    assert!(eventually(|| !second.errors().is_empty()).await);
    settle().await;

    assert!(first.errors().is_empty());
    assert_eq!(ScriptedApi::count(&api.open_calls), 2);
}

#[tokio::test]
async fn overlong_line_ends_the_subscription_once() {
    init_logging();
    let api = ScriptedApi::new("Q9ZT4").with_events(EventScript::Lines(vec![
        r#"{"type":"status","status":"running","progress":10}"#.to_string(),
        "x".repeat(MAX_LINE_BYTES + 1),
        r#"{"type":"log","event":{"event":"page_done","title":"Home","done":1}}"#.to_string(),
        r#"{"type":"done","status":"completed"}"#.to_string(),
    ]));
    let mut adapter = EventStreamAdapter::new(Arc::new(api));
    let recorder = Recorder::default();
    recorder.subscribe(&mut adapter, "Q9ZT4");

    assert!(eventually(|| !recorder.errors().is_empty()).await);
    settle().await;

    assert_eq!(
        recorder.errors(),
        vec![StreamError::Protocol(ProtocolError::LineTooLong {
            max_bytes: MAX_LINE_BYTES,
        })]
    );
    assert_eq!(recorder.events().len(), 1);
    assert!(!adapter.is_open());
}

#[tokio::test]
async fn transport_break_mid_stream_is_reported_after_earlier_events() {
    init_logging();
    let api = ScriptedApi::new("Q9ZT4").with_events(EventScript::LinesThenFail(
        vec![
            r#"{"type":"status","status":"running","progress":10}"#.to_string(),
            r#"{"type":"log","event":{"event":"page_done","title":"Home","done":1}}"#.to_string(),
        ],
        network_error("connection reset"),
    ));
    let mut adapter = EventStreamAdapter::new(Arc::new(api));
    let recorder = Recorder::default();
    recorder.subscribe(&mut adapter, "Q9ZT4");

    assert!(eventually(|| !recorder.errors().is_empty()).await);
    settle().await;

    assert_eq!(recorder.events().len(), 2);
    assert_eq!(
        recorder.errors(),
        vec![StreamError::Transport(network_error("connection reset"))]
    );
}
