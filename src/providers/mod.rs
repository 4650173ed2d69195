/*!
 * Speech-synthesis provider capability.
 *
 * The orchestrator only ever talks to a provider through the `SynthesisProvider`
 * trait, so a different vendor can be dropped in without touching the dual-job
 * coordination. Implementations:
 * - `http`: task-based synthesis REST API (Polly `synthesisTasks` shape)
 * - `mock`: scripted in-process provider for tests and dry runs
 */

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};
use std::sync::Arc;

use crate::app_config::{SynthesisConfig, SynthesisProviderKind};
use crate::errors::{AppError, ProviderError};

pub mod http;
pub mod mock;

/// Which of the two jobs of an attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    /// Audio render
    Audio,
    /// Timing-mark render
    Marks,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Audio => write!(f, "audio"),
            Self::Marks => write!(f, "marks"),
        }
    }
}

/// Status of a submitted job as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    InProgress,
    Completed,
    Failed {
        /// Provider's explanation, when it gives one
        reason: Option<String>,
    },
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed { .. })
    }
}

/// One asynchronous unit of work at the provider
#[derive(Debug, Clone)]
pub struct SynthesisJob {
    pub job_id: String,
    pub kind: JobKind,
    pub status: JobStatus,
    pub output_location: Option<String>,
}

impl SynthesisJob {
    pub fn submitted(job_id: String, kind: JobKind) -> Self {
        Self {
            job_id,
            kind,
            status: JobStatus::Pending,
            output_location: None,
        }
    }
}

/// Audio container requested from the provider
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AudioFormat {
    #[default]
    Mp3,
    OggVorbis,
    Pcm,
}

impl AudioFormat {
    /// Value sent to the provider
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::OggVorbis => "ogg_vorbis",
            Self::Pcm => "pcm",
        }
    }

    /// File extension of the downloaded artifact
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::OggVorbis => "ogg",
            Self::Pcm => "pcm",
        }
    }
}

/// Speech mark families requested from the marks job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechMarkType {
    Ssml,
    Word,
}

impl SpeechMarkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ssml => "ssml",
            Self::Word => "word",
        }
    }
}

/// What a job should produce
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputFormat {
    Audio(AudioFormat),
    SpeechMarks(Vec<SpeechMarkType>),
}

impl OutputFormat {
    /// Value sent to the provider
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Audio(format) => format.as_str(),
            Self::SpeechMarks(_) => "json",
        }
    }
}

/// Voice and engine shared by both jobs so their timing lines up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceConfig {
    pub voice_id: String,
    pub engine: String,
}

/// Everything needed to submit one job
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub kind: JobKind,
    pub markup: String,
    pub output_format: OutputFormat,
    pub voice: VoiceConfig,
    pub output_key_prefix: String,
}

/// Common trait for all speech-synthesis providers
#[async_trait]
pub trait SynthesisProvider: Send + Sync + Debug {
    /// Short provider name for logs
    fn name(&self) -> &str;

    /// Submit a job and return its id
    async fn submit(&self, request: &SubmitRequest) -> Result<String, ProviderError>;

    /// Current status of a job
    async fn poll_status(&self, job_id: &str) -> Result<JobStatus, ProviderError>;

    /// Output location of a completed job
    async fn resolve_output(&self, job_id: &str) -> Result<String, ProviderError>;

    /// Raw newline-delimited JSON speech marks at a location
    async fn fetch_marks(&self, location: &str) -> Result<String, ProviderError>;

    /// Audio bytes at a location
    async fn fetch_audio(&self, location: &str) -> Result<Bytes, ProviderError>;

    /// Ask the provider to drop a job; providers without remote cancellation ignore it
    async fn cancel(&self, _job_id: &str) -> Result<(), ProviderError> {
        Ok(())
    }
}

/// Create the provider selected in the configuration
pub fn build_provider(config: &SynthesisConfig) -> Result<Arc<dyn SynthesisProvider>, AppError> {
    match config.provider {
        SynthesisProviderKind::Http => {
            let provider = http::HttpSynthesisProvider::from_config(config)
                .map_err(|e| AppError::Config(e.to_string()))?;
            Ok(Arc::new(provider))
        }
        SynthesisProviderKind::Mock => Ok(Arc::new(mock::MockProvider::working())),
    }
}
