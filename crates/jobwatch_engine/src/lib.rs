//! Jobwatch engine: transport, event stream, polling fallback and the tracker
//! that drives the core reducer.
mod client;
mod polling;
mod stream;
mod tracker;
mod types;
mod wire;

pub use client::{ClientSettings, CreatedJob, EventByteStream, HttpJobClient, JobApi};
pub use polling::{PollingFallback, PollingSettings};
pub use stream::{EventStreamAdapter, LineDecoder, MAX_LINE_BYTES};
pub use tracker::{JobTracker, Subscription, TrackerSettings};
pub use types::{ApiError, ProtocolError, StreamError, TrackerError, TransportError, TransportFailure};
pub use wire::decode_message;
