use async_trait::async_trait;
use bytes::Bytes;
use log::{debug, error};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::{Origin, Url};

use crate::app_config::SynthesisConfig;
use crate::errors::ProviderError;
use crate::providers::{JobStatus, OutputFormat, SubmitRequest, SynthesisProvider};

/// Client for a task-based speech synthesis REST API
///
/// Speaks the `synthesisTasks` resource: tasks are started with a POST, polled
/// with a GET by id, and their outputs are fetched from the returned output URI.
pub struct HttpSynthesisProvider {
    /// HTTP client for API requests
    client: Client,
    /// API key, sent as `x-api-key` when not empty
    api_key: String,
    /// Base URL of the service
    endpoint: String,
    /// Only requests to this origin carry the API key
    endpoint_origin: Origin,
    /// Bucket the provider writes outputs into
    bucket: String,
}

impl std::fmt::Debug for HttpSynthesisProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSynthesisProvider")
            .field("endpoint", &self.endpoint)
            .field("bucket", &self.bucket)
            .finish()
    }
}

/// Start-task request body
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StartTaskRequest {
    pub engine: String,
    pub output_format: String,
    #[serde(rename = "OutputS3BucketName")]
    pub output_s3_bucket_name: String,
    #[serde(rename = "OutputS3KeyPrefix")]
    pub output_s3_key_prefix: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub speech_mark_types: Vec<String>,
    pub text: String,
    pub text_type: String,
    pub voice_id: String,
}

/// Envelope returned by both start and get
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskEnvelope {
    pub synthesis_task: SynthesisTask,
}

/// Task description returned by the API
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SynthesisTask {
    pub task_id: String,
    pub task_status: String,
    #[serde(default)]
    pub task_status_reason: Option<String>,
    #[serde(default)]
    pub output_uri: Option<String>,
}

impl StartTaskRequest {
    /// Build the request body for one job
    pub fn from_submit(request: &SubmitRequest, bucket: &str) -> Self {
        let speech_mark_types = match &request.output_format {
            OutputFormat::SpeechMarks(types) => types.iter().map(|t| t.as_str().to_string()).collect(),
            OutputFormat::Audio(_) => Vec::new(),
        };

        Self {
            engine: request.voice.engine.clone(),
            output_format: request.output_format.as_str().to_string(),
            output_s3_bucket_name: bucket.to_string(),
            output_s3_key_prefix: request.output_key_prefix.clone(),
            speech_mark_types,
            text: request.markup.clone(),
            text_type: "ssml".to_string(),
            voice_id: request.voice.voice_id.clone(),
        }
    }
}

/// Map a task status string to a job status
pub fn parse_task_status(status: &str, reason: Option<String>) -> Result<JobStatus, ProviderError> {
    match status.to_ascii_lowercase().as_str() {
        "scheduled" | "pending" => Ok(JobStatus::Pending),
        "inprogress" | "in_progress" => Ok(JobStatus::InProgress),
        "completed" => Ok(JobStatus::Completed),
        "failed" | "error" => Ok(JobStatus::Failed { reason }),
        other => Err(ProviderError::ParseError(format!("Unknown task status: {}", other))),
    }
}

impl HttpSynthesisProvider {
    /// Create a new client
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        bucket: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        let endpoint_origin = Url::parse(&endpoint)
            .map_err(|e| ProviderError::RequestFailed(format!("Invalid endpoint {}: {}", endpoint, e)))?
            .origin();

        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ProviderError::ConnectionError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            endpoint,
            endpoint_origin,
            bucket: bucket.into(),
        })
    }

    /// Create a client from the synthesis configuration
    pub fn from_config(config: &SynthesisConfig) -> Result<Self, ProviderError> {
        Self::new(
            config.endpoint.clone(),
            config.api_key.clone(),
            config.bucket.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    fn tasks_url(&self) -> String {
        format!("{}/v1/synthesisTasks", self.endpoint)
    }

    /// Whether a request to `url` may carry the API key
    fn is_endpoint_origin(&self, url: &str) -> bool {
        Url::parse(url)
            .map(|url| url.origin() == self.endpoint_origin)
            .unwrap_or(false)
    }

    fn with_auth(&self, builder: reqwest::RequestBuilder, url: &str) -> reqwest::RequestBuilder {
        if self.api_key.is_empty() || !self.is_endpoint_origin(url) {
            builder
        } else {
            builder.header("x-api-key", &self.api_key)
        }
    }

    async fn send(&self, builder: reqwest::RequestBuilder, url: &str) -> Result<Response, ProviderError> {
        let response = self.with_auth(builder, url).send().await.map_err(map_transport_error)?;
        check_status(response).await
    }

    async fn get_task(&self, job_id: &str) -> Result<SynthesisTask, ProviderError> {
        let url = format!("{}/{}", self.tasks_url(), job_id);
        let response = self.send(self.client.get(&url), &url).await?;
        let envelope = response
            .json::<TaskEnvelope>()
            .await
            .map_err(|e| ProviderError::ParseError(format!("Failed to parse synthesis task: {}", e)))?;
        Ok(envelope.synthesis_task)
    }

    async fn get_location(&self, location: &str) -> Result<Response, ProviderError> {
        if !self.is_endpoint_origin(location) {
            debug!("Fetching {} without credentials", location);
        }
        self.send(self.client.get(location), location).await
    }
}

fn map_transport_error(error: reqwest::Error) -> ProviderError {
    if error.is_timeout() || error.is_connect() {
        ProviderError::ConnectionError(error.to_string())
    } else {
        ProviderError::RequestFailed(error.to_string())
    }
}

async fn check_status(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to get error response text".to_string());
    error!("Synthesis API error ({}): {}", status, error_text);

    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::AuthenticationError(error_text),
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimitExceeded(error_text),
        _ => ProviderError::ApiError {
            status_code: status.as_u16(),
            message: error_text,
        },
    })
}

#[async_trait]
impl SynthesisProvider for HttpSynthesisProvider {
    fn name(&self) -> &str {
        "http"
    }

    async fn submit(&self, request: &SubmitRequest) -> Result<String, ProviderError> {
        let body = StartTaskRequest::from_submit(request, &self.bucket);
        debug!("Starting {} synthesis task under {}", request.kind, body.output_s3_key_prefix);

        let url = self.tasks_url();
        let response = self.send(self.client.post(&url).json(&body), &url).await?;
        let envelope = response
            .json::<TaskEnvelope>()
            .await
            .map_err(|e| ProviderError::ParseError(format!("Failed to parse start task response: {}", e)))?;

        Ok(envelope.synthesis_task.task_id)
    }

    async fn poll_status(&self, job_id: &str) -> Result<JobStatus, ProviderError> {
        let task = self.get_task(job_id).await?;
        parse_task_status(&task.task_status, task.task_status_reason)
    }

    async fn resolve_output(&self, job_id: &str) -> Result<String, ProviderError> {
        let task = self.get_task(job_id).await?;
        task.output_uri
            .filter(|uri| !uri.is_empty())
            .ok_or_else(|| ProviderError::ParseError(format!("Task {} has no output URI", job_id)))
    }

    async fn fetch_marks(&self, location: &str) -> Result<String, ProviderError> {
        self.get_location(location)
            .await?
            .text()
            .await
            .map_err(|e| ProviderError::RequestFailed(format!("Failed to read speech marks: {}", e)))
    }

    async fn fetch_audio(&self, location: &str) -> Result<Bytes, ProviderError> {
        self.get_location(location)
            .await?
            .bytes()
            .await
            .map_err(|e| ProviderError::RequestFailed(format!("Failed to read audio: {}", e)))
    }
}
