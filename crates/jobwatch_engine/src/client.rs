use std::time::Duration;

use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use jobwatch_core::{JobHandle, JobRequest, PageSummary, StatusSnapshot};
use jobwatch_logging::{watch_debug, watch_info};
use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use url::Url;

use crate::wire::{WireCreateRequest, WireJob, WirePages};
use crate::{ApiError, TransportError, TransportFailure};

/// Raw byte chunks of the live event stream.
pub type EventByteStream = BoxStream<'static, Result<bytes::Bytes, TransportError>>;

#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Service root; endpoint paths are appended as path segments.
    pub base_url: String,
    /// Path of the create endpoint relative to `base_url`.
    pub create_path: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    /// Longest silence tolerated on the event stream before it counts as dropped.
    pub stream_idle_timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api/".to_string(),
            create_path: "jobs".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            stream_idle_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedJob {
    pub handle: JobHandle,
    pub pages_total: Option<u32>,
}

/// Requests against the remote job service. No retries happen here.
#[async_trait::async_trait]
pub trait JobApi: Send + Sync {
    async fn create_job(&self, request: &JobRequest) -> Result<CreatedJob, ApiError>;

    async fn fetch_status(&self, handle: &JobHandle) -> Result<StatusSnapshot, TransportError>;

    async fn fetch_pages(&self, handle: &JobHandle) -> Result<Vec<PageSummary>, TransportError>;

    /// Opens the server-push channel for the job.
    async fn open_events(&self, handle: &JobHandle) -> Result<EventByteStream, TransportError>;
}

#[derive(Debug, Clone)]
pub struct HttpJobClient {
    base_url: Url,
    create_path: Vec<String>,
    client: reqwest::Client,
    stream_client: reqwest::Client,
}

impl HttpJobClient {
    pub fn new(settings: ClientSettings) -> Result<Self, TransportError> {
        let base_url = Url::parse(&settings.base_url)
            .map_err(|err| TransportError::new(TransportFailure::InvalidUrl, err.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(TransportError::new(
                TransportFailure::InvalidUrl,
                format!("{} cannot be used as a base url", settings.base_url),
            ));
        }
        let create_path = settings
            .create_path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(ToOwned::to_owned)
            .collect();

        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(map_reqwest_error)?;
        // The event stream lives as long as the job, so only idle gaps are bounded.
        let stream_client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .read_timeout(settings.stream_idle_timeout)
            .build()
            .map_err(map_reqwest_error)?;

        Ok(Self {
            base_url,
            create_path,
            client,
            stream_client,
        })
    }

    fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Result<Url, TransportError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| TransportError::new(TransportFailure::InvalidUrl, "base url has no path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn job_endpoint(&self, handle: &JobHandle, tail: Option<&str>) -> Result<Url, TransportError> {
        self.endpoint(["jobs", handle.as_str()].into_iter().chain(tail))
    }
}

#[async_trait::async_trait]
impl JobApi for HttpJobClient {
    async fn create_job(&self, request: &JobRequest) -> Result<CreatedJob, ApiError> {
        request.validate()?;
        let url = self.endpoint(self.create_path.iter().map(String::as_str))?;
        let response = self
            .client
            .post(url)
            .json(&WireCreateRequest::from(request))
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let job: WireJob = read_json(response).await?;
        let created = job.into_created().ok_or_else(|| {
            TransportError::new(TransportFailure::Decode, "create response carries no job_id")
        })?;
        watch_info!(
            "Created job {} (pages_total={:?})",
            created.handle,
            created.pages_total
        );
        Ok(created)
    }

    async fn fetch_status(&self, handle: &JobHandle) -> Result<StatusSnapshot, TransportError> {
        let url = self.job_endpoint(handle, None)?;
        let response = self.client.get(url).send().await.map_err(map_reqwest_error)?;
        let job: WireJob = read_json(response).await?;
        Ok(job.into_snapshot())
    }

    async fn fetch_pages(&self, handle: &JobHandle) -> Result<Vec<PageSummary>, TransportError> {
        let url = self.job_endpoint(handle, Some("pages"))?;
        let response = self.client.get(url).send().await.map_err(map_reqwest_error)?;
        let pages: WirePages = read_json(response).await?;
        let pages = pages.into_pages();
        watch_debug!("Job {} listed {} pages", handle, pages.len());
        Ok(pages)
    }

    async fn open_events(&self, handle: &JobHandle) -> Result<EventByteStream, TransportError> {
        let url = self.job_endpoint(handle, Some("events"))?;
        let response = self
            .stream_client
            .get(url)
            .header(ACCEPT, "text/event-stream, application/x-ndjson")
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::new(
                TransportFailure::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }
        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(map_reqwest_error))
            .boxed())
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, TransportError> {
    let status = response.status();
    if !status.is_success() {
        return Err(TransportError::new(
            TransportFailure::HttpStatus(status.as_u16()),
            status.to_string(),
        ));
    }
    let body = response.bytes().await.map_err(map_reqwest_error)?;
    serde_json::from_slice(&body)
        .map_err(|err| TransportError::new(TransportFailure::Decode, err.to_string()))
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        return TransportError::new(TransportFailure::Timeout, err.to_string());
    }
    if err.is_builder() {
        return TransportError::new(TransportFailure::InvalidUrl, err.to_string());
    }
    TransportError::new(TransportFailure::Network, err.to_string())
}
