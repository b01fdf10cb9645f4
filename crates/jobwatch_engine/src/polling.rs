use std::sync::Arc;
use std::time::Duration;

use jobwatch_core::{JobHandle, StatusSnapshot};
use jobwatch_logging::{watch_debug, watch_error, watch_info, watch_warn};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::JobApi;

#[derive(Debug, Clone)]
pub struct PollingSettings {
    pub interval: Duration,
    /// Polling gives up once this many consecutive status reads have failed
    /// and one more fails.
    pub max_consecutive_failures: u32,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_consecutive_failures: 5,
        }
    }
}

struct ActivePolling {
    handle: JobHandle,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Periodic status reads used while the event stream is unavailable.
///
/// Owns at most one timer; dropping the fallback stops it.
pub struct PollingFallback {
    api: Arc<dyn JobApi>,
    settings: PollingSettings,
    active: Option<ActivePolling>,
}

impl PollingFallback {
    pub fn new(api: Arc<dyn JobApi>, settings: PollingSettings) -> Self {
        Self {
            api,
            settings,
            active: None,
        }
    }

    /// Starts polling `handle`, replacing any running timer.
    ///
    /// The first read happens one interval after the call. `on_snapshot` gets
    /// every successful read; polling ends by itself after a terminal snapshot.
    /// Transport failures are tolerated until more than
    /// `max_consecutive_failures` happen in a row, then `on_exhausted` runs
    /// once with the failure count.
    pub fn start<S, X>(&mut self, handle: JobHandle, on_snapshot: S, on_exhausted: X)
    where
        S: FnMut(StatusSnapshot) + Send + 'static,
        X: FnOnce(u32) + Send + 'static,
    {
        self.stop();
        let cancel = CancellationToken::new();
        watch_info!(
            "Polling job {} every {:?}",
            handle,
            self.settings.interval
        );
        let task = tokio::spawn(run_polling(
            self.api.clone(),
            handle.clone(),
            self.settings.clone(),
            cancel.clone(),
            on_snapshot,
            on_exhausted,
        ));
        self.active = Some(ActivePolling {
            handle,
            cancel,
            task,
        });
    }

    pub fn is_running(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| !active.task.is_finished())
    }

    /// Releases the timer. Safe to call any number of times.
    pub fn stop(&mut self) {
        if let Some(active) = self.active.take() {
            active.cancel.cancel();
            active.task.abort();
            watch_debug!("Polling for job {} stopped", active.handle);
        }
    }
}

impl Drop for PollingFallback {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_polling<S, X>(
    api: Arc<dyn JobApi>,
    handle: JobHandle,
    settings: PollingSettings,
    cancel: CancellationToken,
    mut on_snapshot: S,
    on_exhausted: X,
) where
    S: FnMut(StatusSnapshot) + Send + 'static,
    X: FnOnce(u32) + Send + 'static,
{
    let period = settings.interval.max(Duration::from_millis(1));
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut consecutive_failures = 0u32;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }
        let result = tokio::select! {
            _ = cancel.cancelled() => return,
            result = api.fetch_status(&handle) => result,
        };
        match result {
            Ok(snapshot) => {
                consecutive_failures = 0;
                let terminal = snapshot.status.is_terminal();
                if cancel.is_cancelled() {
                    return;
                }
                on_snapshot(snapshot);
                if terminal {
                    watch_debug!("Job {} reached a terminal status; polling ends", handle);
                    return;
                }
            }
            Err(err) => {
                consecutive_failures += 1;
                watch_warn!(
                    "Status poll for job {} failed ({} in a row): {}",
                    handle,
                    consecutive_failures,
                    err
                );
                if consecutive_failures > settings.max_consecutive_failures {
                    watch_error!(
                        "Giving up on job {} after {} consecutive poll failures",
                        handle,
                        consecutive_failures
                    );
                    if !cancel.is_cancelled() {
                        on_exhausted(consecutive_failures);
                    }
                    return;
                }
            }
        }
    }
}
