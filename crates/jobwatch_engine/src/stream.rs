use std::sync::Arc;

use futures_util::StreamExt;
use jobwatch_core::{JobHandle, StreamEvent};
use jobwatch_logging::{watch_debug, watch_info, watch_warn};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::wire::decode_message;
use crate::{JobApi, ProtocolError, StreamError};

/// Longest single stream line accepted before the subscription is abandoned.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Splits raw stream bytes into message payloads.
///
/// Accepts newline-delimited JSON as well as SSE framing, where each
/// `data: <json>` line is one message and comments, blank separators and the
/// `event:`/`id:`/`retry:` fields are skipped.
#[derive(Debug)]
pub struct LineDecoder {
    buffer: Vec<u8>,
    max_line_bytes: usize,
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::new(MAX_LINE_BYTES)
    }
}

impl LineDecoder {
    pub fn new(max_line_bytes: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_line_bytes,
        }
    }

    /// Feeds one chunk and returns the payloads of every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<String, ProtocolError>> {
        self.buffer.extend_from_slice(chunk);
        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(payload) = self.payload(&line[..line.len() - 1]) {
                payloads.push(payload);
            }
        }
        if self.buffer.len() > self.max_line_bytes {
            self.buffer.clear();
            payloads.push(Err(ProtocolError::LineTooLong {
                max_bytes: self.max_line_bytes,
            }));
        }
        payloads
    }

    /// Flushes a final line that was not newline-terminated.
    pub fn finish(&mut self) -> Option<Result<String, ProtocolError>> {
        let line = std::mem::take(&mut self.buffer);
        self.payload(&line)
    }

    fn payload(&self, line: &[u8]) -> Option<Result<String, ProtocolError>> {
        if line.len() > self.max_line_bytes {
            return Some(Err(ProtocolError::LineTooLong {
                max_bytes: self.max_line_bytes,
            }));
        }
        let line = match std::str::from_utf8(line) {
            Ok(line) => line.trim(),
            Err(_) => return Some(Err(ProtocolError::InvalidUtf8)),
        };
        if line.is_empty() || line.starts_with(':') {
            return None;
        }
        if let Some(data) = line.strip_prefix("data:") {
            let data = data.trim();
            return (!data.is_empty()).then(|| Ok(data.to_string()));
        }
        if ["event:", "id:", "retry:"]
            .iter()
            .any(|field| line.starts_with(field))
        {
            return None;
        }
        Some(Ok(line.to_string()))
    }
}

struct ActiveSubscription {
    handle: JobHandle,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Owns at most one live event subscription.
///
/// Dropping the adapter closes the subscription.
pub struct EventStreamAdapter {
    api: Arc<dyn JobApi>,
    active: Option<ActiveSubscription>,
}

impl EventStreamAdapter {
    pub fn new(api: Arc<dyn JobApi>) -> Self {
        Self { api, active: None }
    }

    /// Opens a subscription for `handle`, closing any previous one first.
    ///
    /// `on_event` receives every decoded message in arrival order. Malformed
    /// messages are logged and dropped. When the stream ends for any reason
    /// other than [`close`](Self::close), `on_error` runs once and no further
    /// events follow.
    pub fn subscribe<E, F>(&mut self, handle: JobHandle, on_event: E, on_error: F)
    where
        E: FnMut(StreamEvent) + Send + 'static,
        F: FnOnce(StreamError) + Send + 'static,
    {
        self.close();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_subscription(
            self.api.clone(),
            handle.clone(),
            cancel.clone(),
            on_event,
            on_error,
        ));
        self.active = Some(ActiveSubscription {
            handle,
            cancel,
            task,
        });
    }

    pub fn is_open(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| !active.task.is_finished())
    }

    /// Releases the subscription. Safe to call any number of times.
    pub fn close(&mut self) {
        if let Some(active) = self.active.take() {
            active.cancel.cancel();
            active.task.abort();
            watch_debug!("Event stream for job {} closed", active.handle);
        }
    }
}

impl Drop for EventStreamAdapter {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run_subscription<E, F>(
    api: Arc<dyn JobApi>,
    handle: JobHandle,
    cancel: CancellationToken,
    mut on_event: E,
    on_error: F,
) where
    E: FnMut(StreamEvent) + Send + 'static,
    F: FnOnce(StreamError) + Send + 'static,
{
    let opened = tokio::select! {
        _ = cancel.cancelled() => return,
        opened = api.open_events(&handle) => opened,
    };
    let mut stream = match opened {
        Ok(stream) => stream,
        Err(err) => {
            watch_warn!("Could not open event stream for job {}: {}", handle, err);
            if !cancel.is_cancelled() {
                on_error(StreamError::Transport(err));
            }
            return;
        }
    };
    watch_info!("Event stream open for job {}", handle);

    let mut decoder = LineDecoder::default();
    let failure = loop {
        let chunk = tokio::select! {
            _ = cancel.cancelled() => return,
            chunk = stream.next() => chunk,
        };
        let (payloads, end) = match chunk {
            Some(Ok(bytes)) => (decoder.push(&bytes), None),
            Some(Err(err)) => (Vec::new(), Some(StreamError::Transport(err))),
            None => (
                decoder.finish().into_iter().collect(),
                Some(StreamError::Closed),
            ),
        };
        if let Some(fatal) = deliver(payloads, &mut on_event, &cancel, &handle) {
            break StreamError::Protocol(fatal);
        }
        if cancel.is_cancelled() {
            return;
        }
        if let Some(end) = end {
            break end;
        }
    };

    watch_warn!("Event stream for job {} ended: {}", handle, failure);
    if !cancel.is_cancelled() {
        on_error(failure);
    }
}

/// Hands decoded payloads to `on_event`; returns the first fatal decode error.
fn deliver<E>(
    payloads: Vec<Result<String, ProtocolError>>,
    on_event: &mut E,
    cancel: &CancellationToken,
    handle: &JobHandle,
) -> Option<ProtocolError>
where
    E: FnMut(StreamEvent),
{
    for payload in payloads {
        if cancel.is_cancelled() {
            return None;
        }
        match payload.and_then(|json| decode_message(&json)) {
            Ok(event) => on_event(event),
            Err(err) if err.is_fatal() => return Some(err),
            Err(err) => {
                watch_warn!("Dropping malformed stream message for job {}: {}", handle, err);
            }
        }
    }
    None
}
