use std::time::Duration;

use bytes::Bytes;
use course_core::{
    CatalogList, CourseRequest, FileListing, HealthReport, StatusSnapshot, SubmitResponse, TaskId,
    TaskList,
};
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use url::Url;

use crate::settings::{ClientSettings, API_KEY_HEADER};
use crate::{ApiError, FailureKind};

/// Raw body chunks of a streaming response, in arrival order.
pub type ByteStream = BoxStream<'static, Result<Bytes, ApiError>>;

/// Backend operations the collaborators depend on.
#[async_trait::async_trait]
pub trait CourseApi: Send + Sync {
    async fn status(&self, task_id: &TaskId) -> Result<StatusSnapshot, ApiError>;

    async fn files(&self, task_id: &TaskId) -> Result<FileListing, ApiError>;

    /// Open the chunked log stream. Resolves once response headers arrive.
    async fn open_log_stream(&self, task_id: &TaskId) -> Result<ByteStream, ApiError>;

    async fn submit(&self, request: &CourseRequest) -> Result<SubmitResponse, ApiError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestApi {
    client: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
    request_timeout: Duration,
}

impl ReqwestApi {
    pub fn new(settings: &ClientSettings) -> Result<Self, ApiError> {
        let base_url = parse_base_url(&settings.base_url)?;
        // No client-wide timeout: it would also cut off the log stream.
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .build()
            .map_err(|err| ApiError::new(FailureKind::Network, err.to_string()))?;

        Ok(Self {
            client,
            base_url,
            api_key: settings
                .api_key
                .as_ref()
                .map(|key| key.trim().to_string())
                .filter(|key| !key.is_empty()),
            request_timeout: settings.request_timeout,
        })
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn catalogs(&self) -> Result<CatalogList, ApiError> {
        let url = endpoint(&self.base_url, &["api", "catalog", "list"])?;
        self.get_json(url).await
    }

    pub async fn tasks(&self) -> Result<TaskList, ApiError> {
        let url = endpoint(&self.base_url, &["api", "tasks", "list"])?;
        self.get_json(url).await
    }

    pub async fn health(&self) -> Result<HealthReport, ApiError> {
        let url = endpoint(&self.base_url, &["health"])?;
        self.get_json(url).await
    }

    /// Stream the bytes of one result artifact.
    pub async fn download(&self, task_id: &TaskId, path: &str) -> Result<ByteStream, ApiError> {
        let url = download_url(&self.base_url, task_id, path)?;
        let response = self
            .authorize(self.client.get(url))
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let response = ensure_success(response)?;
        Ok(into_byte_stream(response))
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header(API_KEY_HEADER, key),
            None => builder,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        let request = self
            .authorize(self.client.get(url))
            .timeout(self.request_timeout);
        read_json(request).await
    }
}

#[async_trait::async_trait]
impl CourseApi for ReqwestApi {
    async fn status(&self, task_id: &TaskId) -> Result<StatusSnapshot, ApiError> {
        let url = endpoint(&self.base_url, &["api", "course", "status", task_id.as_str()])?;
        self.get_json(url).await
    }

    async fn files(&self, task_id: &TaskId) -> Result<FileListing, ApiError> {
        let url = endpoint(
            &self.base_url,
            &["api", "course", "results", task_id.as_str(), "files"],
        )?;
        self.get_json(url).await
    }

    async fn open_log_stream(&self, task_id: &TaskId) -> Result<ByteStream, ApiError> {
        let url = endpoint(
            &self.base_url,
            &["api", "course", "logs", task_id.as_str(), "stream"],
        )?;
        let response = self
            .authorize(self.client.get(url))
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let response = ensure_success(response)?;
        Ok(into_byte_stream(response))
    }

    async fn submit(&self, request: &CourseRequest) -> Result<SubmitResponse, ApiError> {
        if self.api_key.is_none() {
            return Err(ApiError::new(
                FailureKind::MissingApiKey,
                "set an API key before submitting",
            ));
        }
        let url = endpoint(&self.base_url, &["api", "course", "generate"])?;
        let body = serde_json::to_vec(request)
            .map_err(|err| ApiError::new(FailureKind::Decode, err.to_string()))?;
        let builder = self
            .authorize(self.client.post(url))
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .timeout(self.request_timeout);
        read_json(builder).await
    }
}

/// `{base}/api/course/results/{task}/download/{path}`; `path` keeps its `/`
/// separators, every segment is percent-encoded.
pub fn download_url(base_url: &Url, task_id: &TaskId, path: &str) -> Result<Url, ApiError> {
    let mut segments = vec!["api", "course", "results", task_id.as_str(), "download"];
    segments.extend(path.split('/').filter(|segment| !segment.is_empty()));
    endpoint(base_url, &segments)
}

pub(crate) fn parse_base_url(raw: &str) -> Result<Url, ApiError> {
    let url =
        Url::parse(raw.trim()).map_err(|err| ApiError::new(FailureKind::InvalidUrl, err.to_string()))?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(ApiError::new(
            FailureKind::InvalidUrl,
            format!("not an http(s) base url: {raw}"),
        ));
    }
    Ok(url)
}

fn endpoint(base_url: &Url, segments: &[&str]) -> Result<Url, ApiError> {
    let mut url = base_url.clone();
    url.path_segments_mut()
        .map_err(|_| ApiError::new(FailureKind::InvalidUrl, base_url.to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

async fn read_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ApiError> {
    let response = request.send().await.map_err(map_reqwest_error)?;
    let response = ensure_success(response)?;
    let body = response.bytes().await.map_err(map_reqwest_error)?;
    serde_json::from_slice(&body).map_err(|err| ApiError::new(FailureKind::Decode, err.to_string()))
}

fn ensure_success(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if !status.is_success() {
        return Err(ApiError::new(
            FailureKind::HttpStatus(status.as_u16()),
            status.to_string(),
        ));
    }
    Ok(response)
}

fn into_byte_stream(response: Response) -> ByteStream {
    response
        .bytes_stream()
        .map(|chunk| chunk.map_err(map_reqwest_error))
        .boxed()
}

fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_decode() {
        return ApiError::new(FailureKind::Decode, err.to_string());
    }
    ApiError::new(FailureKind::Network, err.to_string())
}
