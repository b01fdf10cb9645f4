mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{eventually, init_logging, network_error, settle, ScriptedApi};
use jobwatch_core::{JobHandle, RemoteStatus, StatusSnapshot};
use jobwatch_engine::{PollingFallback, PollingSettings};
use pretty_assertions::assert_eq;

fn fast(max_consecutive_failures: u32) -> PollingSettings {
    PollingSettings {
        interval: Duration::from_millis(10),
        max_consecutive_failures,
    }
}

#[derive(Default, Clone)]
struct Recorder {
    snapshots: Arc<Mutex<Vec<RemoteStatus>>>,
    exhausted: Arc<Mutex<Vec<u32>>>,
}

impl Recorder {
    fn start(&self, polling: &mut PollingFallback) {
        let snapshots = self.snapshots.clone();
        let exhausted = self.exhausted.clone();
        polling.start(
            JobHandle::new("Q9ZT4"),
            move |snapshot| snapshots.lock().unwrap().push(snapshot.status),
            move |failures| exhausted.lock().unwrap().push(failures),
        );
    }

    fn snapshots(&self) -> Vec<RemoteStatus> {
        self.snapshots.lock().unwrap().clone()
    }

    fn exhausted(&self) -> Vec<u32> {
        self.exhausted.lock().unwrap().clone()
    }
}

#[tokio::test]
async fn transient_failures_are_tolerated_until_terminal() {
    init_logging();
    let api = Arc::new(ScriptedApi::new("Q9ZT4").with_statuses([
        Err(network_error("reset")),
        Ok(StatusSnapshot::new(RemoteStatus::Running)),
        Err(network_error("reset")),
        Err(network_error("reset")),
        Ok(StatusSnapshot::new(RemoteStatus::Completed)),
        Ok(StatusSnapshot::new(RemoteStatus::Completed)),
    ]));
    let mut polling = PollingFallback::new(api.clone(), fast(2));
    let recorder = Recorder::default();
    recorder.start(&mut polling);

    assert!(eventually(|| recorder.snapshots().len() == 2).await);
    settle().await;

    assert_eq!(
        recorder.snapshots(),
        vec![RemoteStatus::Running, RemoteStatus::Completed]
    );
    assert!(recorder.exhausted().is_empty());
    assert_eq!(ScriptedApi::count(&api.status_calls), 5);
    assert!(!polling.is_running());
}

#[tokio::test]
async fn gives_up_after_one_failure_beyond_the_limit() {
    init_logging();
    let api = Arc::new(ScriptedApi::new("Q9ZT4"));
    let mut polling = PollingFallback::new(api.clone(), fast(5));
    let recorder = Recorder::default();
    recorder.start(&mut polling);

    assert!(eventually(|| !recorder.exhausted().is_empty()).await);
    settle().await;

    assert_eq!(recorder.exhausted(), vec![6]);
    assert!(recorder.snapshots().is_empty());
    assert_eq!(ScriptedApi::count(&api.status_calls), 6);
}

#[tokio::test]
async fn first_read_waits_one_interval() {
    init_logging();
    let api = Arc::new(ScriptedApi::new("Q9ZT4"));
    let mut polling = PollingFallback::new(
        api.clone(),
        PollingSettings {
            interval: Duration::from_secs(30),
            max_consecutive_failures: 5,
        },
    );
    Recorder::default().start(&mut polling);
    settle().await;

    assert!(polling.is_running());
    assert_eq!(ScriptedApi::count(&api.status_calls), 0);
}

#[tokio::test]
async fn stop_is_idempotent_and_silences_the_timer() {
    init_logging();
    let api = Arc::new(ScriptedApi::new("Q9ZT4").with_statuses(
        std::iter::repeat_with(|| Ok(StatusSnapshot::new(RemoteStatus::Running))).take(1000),
    ));
    let mut polling = PollingFallback::new(api.clone(), fast(5));
    let recorder = Recorder::default();
    recorder.start(&mut polling);
    assert!(eventually(|| !recorder.snapshots().is_empty()).await);

    polling.stop();
    polling.stop();
    let seen = recorder.snapshots().len();
    settle().await;

    assert!(!polling.is_running());
    assert_eq!(recorder.snapshots().len(), seen);
}

#[tokio::test]
async fn dropping_the_fallback_stops_polling() {
    init_logging();
    let api = Arc::new(ScriptedApi::new("Q9ZT4"));
    let recorder = Recorder::default();
    {
        let mut polling = PollingFallback::new(api.clone(), fast(100));
        recorder.start(&mut polling);
        assert!(eventually(|| ScriptedApi::count(&api.status_calls) > 0).await);
    }
    let calls = ScriptedApi::count(&api.status_calls);
    settle().await;

    assert_eq!(ScriptedApi::count(&api.status_calls), calls);
}
