use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::providers::{AudioFormat, VoiceConfig};

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// Caption segmentation settings
    #[serde(default)]
    pub segmentation: SegmentationConfig,

    /// Synthesis provider settings
    #[serde(default)]
    pub synthesis: SynthesisConfig,

    /// Where artifacts are written
    #[serde(default)]
    pub output: OutputConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Synthesis provider type
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SynthesisProviderKind {
    // @provider: Task-based synthesis REST API
    #[default]
    Http,
    // @provider: In-process scripted provider
    Mock,
}

impl SynthesisProviderKind {
    // @returns: Capitalized provider name
    pub fn display_name(&self) -> &str {
        match self {
            Self::Http => "HTTP",
            Self::Mock => "Mock",
        }
    }

    // @returns: Lowercase provider identifier
    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::Http => "http".to_string(),
            Self::Mock => "mock".to_string(),
        }
    }
}

impl std::fmt::Display for SynthesisProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase_string())
    }
}

impl std::str::FromStr for SynthesisProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "mock" => Ok(Self::Mock),
            _ => Err(anyhow!("Invalid provider type: {}", s)),
        }
    }
}

/// Caption segmentation configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SegmentationConfig {
    /// Maximum rendered characters per caption
    #[serde(default = "default_max_chunk_chars")]
    pub max_chunk_chars: usize,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: default_max_chunk_chars(),
        }
    }
}

/// Synthesis provider configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SynthesisConfig {
    /// Provider backend
    #[serde(default)]
    pub provider: SynthesisProviderKind,

    // @field: Service URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    // @field: API key, sent as x-api-key when set
    #[serde(default = "String::new")]
    pub api_key: String,

    /// Voice used by both jobs
    #[serde(default = "default_voice_id")]
    pub voice_id: String,

    /// Synthesis engine used by both jobs
    #[serde(default = "default_engine")]
    pub engine: String,

    /// Audio container for the audio job
    #[serde(default)]
    pub audio_format: AudioFormat,

    /// Output bucket at the provider's content store
    #[serde(default = "String::new")]
    pub bucket: String,

    /// Key prefix under which every attempt writes
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Delay between poll rounds in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Consecutive transient poll failures tolerated per job
    #[serde(default = "default_poll_retry_budget")]
    pub poll_retry_budget: u32,

    /// Timeout of a single HTTP request in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Overall limit for one attempt in seconds (none by default)
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            provider: SynthesisProviderKind::default(),
            endpoint: default_endpoint(),
            api_key: String::new(),
            voice_id: default_voice_id(),
            engine: default_engine(),
            audio_format: AudioFormat::default(),
            bucket: String::new(),
            key_prefix: default_key_prefix(),
            poll_interval_ms: default_poll_interval_ms(),
            poll_retry_budget: default_poll_retry_budget(),
            request_timeout_secs: default_request_timeout_secs(),
            timeout_secs: None,
        }
    }
}

impl SynthesisConfig {
    pub fn voice(&self) -> VoiceConfig {
        VoiceConfig {
            voice_id: self.voice_id.clone(),
            engine: self.engine.clone(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn attempt_timeout(&self) -> Option<Duration> {
        self.timeout_secs.filter(|secs| *secs > 0).map(Duration::from_secs)
    }
}

/// Output locations
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OutputConfig {
    /// Directory for audio files
    #[serde(default = "default_audio_dir")]
    pub audio_dir: PathBuf,

    /// Directory for subtitle files
    #[serde(default = "default_subtitles_dir")]
    pub subtitles_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            audio_dir: default_audio_dir(),
            subtitles_dir: default_subtitles_dir(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_max_chunk_chars() -> usize {
    crate::segmenter::DEFAULT_MAX_CHUNK_CHARS
}

fn default_endpoint() -> String {
    "http://localhost:8080".to_string()
}

fn default_voice_id() -> String {
    "Matthew".to_string()
}

fn default_engine() -> String {
    "neural".to_string()
}

fn default_key_prefix() -> String {
    "polly-output".to_string()
}

fn default_poll_interval_ms() -> u64 {
    5000
}

fn default_poll_retry_budget() -> u32 {
    3
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_audio_dir() -> PathBuf {
    PathBuf::from("audio")
}

fn default_subtitles_dir() -> PathBuf {
    PathBuf::from("audio").join("subtitles")
}

impl Config {
    /// Load a configuration file, or write the defaults there when it does not exist
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if path.exists() {
            let file = File::open(path)
                .with_context(|| format!("Failed to open config file: {}", path.display()))?;
            let reader = BufReader::new(file);
            let config: Config = serde_json::from_reader(reader)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            return Ok(config);
        }

        log::warn!("Config file not found at '{}', creating default config.", path.display());

        let config = Config::default();
        let config_json = serde_json::to_string_pretty(&config)
            .context("Failed to serialize default config to JSON")?;
        std::fs::write(path, config_json)
            .with_context(|| format!("Failed to write default config to file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        if self.segmentation.max_chunk_chars == 0 {
            return Err(anyhow!("segmentation.max_chunk_chars must be at least 1"));
        }

        let synthesis = &self.synthesis;
        if synthesis.poll_interval_ms == 0 {
            return Err(anyhow!("synthesis.poll_interval_ms must be greater than 0"));
        }
        if synthesis.voice_id.trim().is_empty() {
            return Err(anyhow!("synthesis.voice_id is required"));
        }

        if synthesis.provider == SynthesisProviderKind::Http {
            if synthesis.endpoint.trim().is_empty() {
                return Err(anyhow!("synthesis.endpoint is required for the HTTP provider"));
            }
            url::Url::parse(&synthesis.endpoint)
                .with_context(|| format!("synthesis.endpoint is not a valid URL: {}", synthesis.endpoint))?;
            if synthesis.bucket.trim().is_empty() {
                return Err(anyhow!("synthesis.bucket is required for the HTTP provider"));
            }
        }

        Ok(())
    }
}
