use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use jobwatch_core::{update, Effect, JobHandle, JobRequest, JobView, Msg, RunId, TrackerState};
use jobwatch_logging::{watch_debug, watch_info, watch_warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::{
    ClientSettings, EventStreamAdapter, HttpJobClient, JobApi, PollingFallback, PollingSettings,
    TrackerError, TransportError,
};

#[derive(Debug, Clone, Default)]
pub struct TrackerSettings {
    pub client: ClientSettings,
    pub polling: PollingSettings,
}

type Listener = Arc<dyn Fn(&JobView) + Send + Sync>;

/// A message produced for one run; dropped if that run is no longer current.
struct Envelope {
    run: RunId,
    msg: Msg,
}

struct Shared {
    state: TrackerState,
    stream: EventStreamAdapter,
    polling: PollingFallback,
    listeners: BTreeMap<u64, Listener>,
    next_listener: u64,
    /// Views waiting to be handed to listeners, oldest first.
    pending_views: VecDeque<JobView>,
    /// Set while some caller is draining `pending_views`.
    delivering: bool,
}

struct Inner {
    api: Arc<dyn JobApi>,
    queue: mpsc::UnboundedSender<Envelope>,
    shared: Mutex<Shared>,
}

/// Tracks one remote job at a time and publishes a single consistent [`JobView`].
///
/// Stream and poll tasks never touch the state directly: they enqueue
/// messages that a single reactor task applies in order. `start` and
/// `dispose` apply their own messages under the same lock, so every reducer
/// step is serialized.
///
/// Listeners run after the lock is released, one view at a time and in
/// mutation order, so they may call back into the tracker. Views produced by
/// such a call are delivered once the current listener returns.
pub struct JobTracker {
    inner: Arc<Inner>,
    reactor: JoinHandle<()>,
}

impl JobTracker {
    /// Creates an idle tracker. Must be called from within a Tokio runtime.
    pub fn new(api: Arc<dyn JobApi>, polling: PollingSettings) -> Self {
        let (queue, mut inbox) = mpsc::unbounded_channel::<Envelope>();
        let inner = Arc::new(Inner {
            api: api.clone(),
            queue,
            shared: Mutex::new(Shared {
                state: TrackerState::new(),
                stream: EventStreamAdapter::new(api.clone()),
                polling: PollingFallback::new(api, polling),
                listeners: BTreeMap::new(),
                next_listener: 0,
                pending_views: VecDeque::new(),
                delivering: false,
            }),
        });

        let weak = Arc::downgrade(&inner);
        let reactor = tokio::spawn(async move {
            while let Some(envelope) = inbox.recv().await {
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                inner.dispatch(envelope.run, envelope.msg);
            }
        });

        Self { inner, reactor }
    }

    /// Creates a tracker talking HTTP to the configured service.
    pub fn connect(settings: TrackerSettings) -> Result<Self, TransportError> {
        let client = HttpJobClient::new(settings.client)?;
        Ok(Self::new(Arc::new(client), settings.polling))
    }

    /// Starts a new run: resets the view, creates the remote job and opens
    /// its event stream.
    ///
    /// Rejects invalid requests and a second start while a run is pending or
    /// running. A failed create request marks the view failed and is also
    /// returned. If the tracker is disposed while the create request is in
    /// flight, its result is discarded and [`TrackerError::Disposed`] returned.
    pub async fn start(&self, request: JobRequest) -> Result<JobHandle, TrackerError> {
        request.validate()?;
        let run = {
            let mut shared = self.inner.lock();
            if !shared.state.can_start() {
                return Err(TrackerError::AlreadyRunning);
            }
            self.inner.apply(
                &mut shared,
                Msg::StartRequested {
                    pages_total: request.page_set().page_count(),
                },
            );
            let run = shared.state.run();
            self.inner.notify(shared);
            run
        };
        watch_info!(
            "Starting run {} for {:?} ({} page set)",
            run,
            request.company(),
            request.page_set()
        );

        match self.inner.api.create_job(&request).await {
            Ok(created) => {
                let handle = created.handle.clone();
                let msg = Msg::JobCreated {
                    handle: created.handle,
                    pages_total: created.pages_total,
                };
                if !self.inner.dispatch(run, msg) {
                    return Err(TrackerError::Disposed);
                }
                Ok(handle)
            }
            Err(err) => {
                let err = TrackerError::from(err);
                let message = match &err {
                    TrackerError::Transport(transport) => {
                        format!("could not reach the job service: {transport}")
                    }
                    other => other.to_string(),
                };
                watch_warn!("Run {} could not create its job: {}", run, message);
                if !self.inner.dispatch(run, Msg::CreateFailed { message }) {
                    return Err(TrackerError::Disposed);
                }
                Err(err)
            }
        }
    }

    /// Closes the stream, stops polling and returns the view to idle.
    ///
    /// Results of requests still in flight are discarded when they arrive.
    pub fn dispose(&self) {
        let mut shared = self.inner.lock();
        self.inner.apply(&mut shared, Msg::Disposed);
        watch_debug!("Tracker disposed; now at run {}", shared.state.run());
        self.inner.notify(shared);
    }

    /// Registers a listener invoked after every view mutation, in mutation order.
    pub fn subscribe<L>(&self, listener: L) -> Subscription
    where
        L: Fn(&JobView) + Send + Sync + 'static,
    {
        let mut shared = self.inner.lock();
        let id = shared.next_listener;
        shared.next_listener += 1;
        shared.listeners.insert(id, Arc::new(listener));
        Subscription {
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn view(&self) -> JobView {
        self.inner.lock().state.view()
    }

    /// Handle of the current run's job, once created.
    pub fn handle(&self) -> Option<JobHandle> {
        self.inner.lock().state.handle().cloned()
    }
}

impl Drop for JobTracker {
    fn drop(&mut self) {
        {
            let mut shared = self.inner.lock();
            shared.stream.close();
            shared.polling.stop();
        }
        self.reactor.abort();
    }
}

/// Returned by [`JobTracker::subscribe`]; dropping it keeps the listener registered.
#[must_use = "call `unsubscribe` to remove the listener"]
pub struct Subscription {
    id: u64,
    inner: Weak<Inner>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.lock().listeners.remove(&self.id);
        }
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies `msg` if `run` is still current; returns whether it was applied.
    fn dispatch(&self, run: RunId, msg: Msg) -> bool {
        let mut shared = self.lock();
        let current = shared.state.run();
        if current != run {
            watch_debug!(
                "Discarding message for stale run {} (current run {}): {:?}",
                run,
                current,
                msg
            );
            return false;
        }
        self.apply(&mut shared, msg);
        self.notify(shared);
        true
    }

    /// Runs the reducer and its effects; a changed view is queued for [`notify`](Self::notify).
    fn apply(&self, shared: &mut Shared, msg: Msg) {
        let state = std::mem::take(&mut shared.state);
        let (mut state, effects) = update(state, msg);
        let run = state.run();
        if state.consume_dirty() {
            shared.pending_views.push_back(state.view());
        }
        shared.state = state;

        for effect in effects {
            self.execute(shared, run, effect);
        }
    }

    /// Hands queued views to the listeners with the lock released.
    ///
    /// Only one caller drains at a time; anyone arriving meanwhile, including
    /// a listener calling back into the tracker, leaves its views queued.
    fn notify<'a>(&'a self, mut shared: MutexGuard<'a, Shared>) {
        if shared.delivering {
            return;
        }
        shared.delivering = true;
        loop {
            let Some(view) = shared.pending_views.pop_front() else {
                break;
            };
            let listeners: Vec<Listener> = shared.listeners.values().cloned().collect();
            drop(shared);
            for listener in &listeners {
                listener(&view);
            }
            shared = self.lock();
        }
        shared.delivering = false;
    }

    fn execute(&self, shared: &mut Shared, run: RunId, effect: Effect) {
        match effect {
            Effect::OpenStream { handle } => {
                let events = self.queue.clone();
                let failures = self.queue.clone();
                shared.stream.subscribe(
                    handle,
                    move |event| {
                        let _ = events.send(Envelope {
                            run,
                            msg: Msg::Stream(event),
                        });
                    },
                    move |err| {
                        let _ = failures.send(Envelope {
                            run,
                            msg: Msg::StreamFailed {
                                reason: err.to_string(),
                            },
                        });
                    },
                );
            }
            Effect::CloseStream => shared.stream.close(),
            Effect::StartPolling { handle } => {
                watch_info!("Event stream lost for job {}; falling back to polling", handle);
                let snapshots = self.queue.clone();
                let exhausted = self.queue.clone();
                shared.polling.start(
                    handle,
                    move |snapshot| {
                        let _ = snapshots.send(Envelope {
                            run,
                            msg: Msg::Snapshot(snapshot),
                        });
                    },
                    move |consecutive_failures| {
                        let _ = exhausted.send(Envelope {
                            run,
                            msg: Msg::PollingExhausted {
                                consecutive_failures,
                            },
                        });
                    },
                );
            }
            Effect::StopPolling => shared.polling.stop(),
            Effect::FetchPages { handle } => {
                let api = self.api.clone();
                let queue = self.queue.clone();
                tokio::spawn(async move {
                    let msg = match api.fetch_pages(&handle).await {
                        Ok(pages) => Msg::PagesLoaded(pages),
                        Err(err) => {
                            watch_warn!("Could not list pages for job {}: {}", handle, err);
                            Msg::PagesFailed {
                                message: err.to_string(),
                            }
                        }
                    };
                    let _ = queue.send(Envelope { run, msg });
                });
            }
        }
    }
}
