/*!
 * Segment synchronization façade.
 *
 * Runs one synchronization attempt end to end: segment the narration, build the
 * markup, drive both synthesis jobs, align the returned marks and write the audio
 * and subtitle artifacts. Both artifacts are committed together or not at all.
 */

use chrono::Utc;
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::aligner::{parse_marks, MarkAligner, DEFAULT_TRAILING_BUFFER};
use crate::app_config::Config;
use crate::errors::SyncError;
use crate::file_utils::FileManager;
use crate::markup::MarkupBuilder;
use crate::orchestrator::{cancellable, PollSettings, SynthesisOrchestrator, SynthesisRequest};
use crate::providers::{AudioFormat, SynthesisProvider, VoiceConfig};
use crate::script::ScriptDocument;
use crate::segmenter::{TextSegmenter, DEFAULT_MAX_CHUNK_CHARS};
use crate::subtitle_processor::SubtitleWriter;

/// Settings of the synchronization engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub max_chunk_chars: usize,
    pub voice: VoiceConfig,
    pub audio_format: AudioFormat,
    /// Key prefix under which attempt prefixes are created
    pub key_prefix: String,
    pub poll: PollSettings,
    /// Time added after the last word to close the last caption
    pub trailing_buffer: Duration,
    pub audio_dir: PathBuf,
    pub subtitles_dir: PathBuf,
    /// Overall limit of one attempt
    pub timeout: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: DEFAULT_MAX_CHUNK_CHARS,
            voice: VoiceConfig {
                voice_id: "Matthew".to_string(),
                engine: "neural".to_string(),
            },
            audio_format: AudioFormat::default(),
            key_prefix: "polly-output".to_string(),
            poll: PollSettings::default(),
            trailing_buffer: DEFAULT_TRAILING_BUFFER,
            audio_dir: PathBuf::from("audio"),
            subtitles_dir: PathBuf::from("audio").join("subtitles"),
            timeout: None,
        }
    }
}

impl EngineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_chunk_chars: config.segmentation.max_chunk_chars,
            voice: config.synthesis.voice(),
            audio_format: config.synthesis.audio_format,
            key_prefix: config.synthesis.key_prefix.clone(),
            poll: PollSettings {
                interval: config.synthesis.poll_interval(),
                retry_budget: config.synthesis.poll_retry_budget,
            },
            trailing_buffer: DEFAULT_TRAILING_BUFFER,
            audio_dir: config.output.audio_dir.clone(),
            subtitles_dir: config.output.subtitles_dir.clone(),
            timeout: config.synthesis.attempt_timeout(),
        }
    }

    /// Where the audio of a document is written
    pub fn audio_path(&self, document_name: &str) -> PathBuf {
        self.audio_dir.join(format!(
            "{}.{}",
            FileManager::sanitize_document_name(document_name),
            self.audio_format.extension()
        ))
    }

    /// Where the subtitles of a document are written
    pub fn subtitle_path(&self, document_name: &str) -> PathBuf {
        self.subtitles_dir
            .join(format!("{}.srt", FileManager::sanitize_document_name(document_name)))
    }
}

/// Artifacts of a successful attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutput {
    pub audio_path: PathBuf,
    pub subtitle_path: PathBuf,
    pub segment_count: usize,
}

/// Narration to audio plus timed subtitles
pub struct SegmentSyncEngine {
    provider: Arc<dyn SynthesisProvider>,
    config: EngineConfig,
    segmenter: TextSegmenter,
    aligner: MarkAligner,
    orchestrator: SynthesisOrchestrator,
}

impl SegmentSyncEngine {
    pub fn new(provider: Arc<dyn SynthesisProvider>, config: EngineConfig) -> Self {
        Self {
            segmenter: TextSegmenter::new(config.max_chunk_chars),
            aligner: MarkAligner::new(config.trailing_buffer),
            orchestrator: SynthesisOrchestrator::new(Arc::clone(&provider), config.poll),
            provider,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Load a script document and synchronize its narration
    pub async fn process_script<P: AsRef<Path>>(&self, path: P, cancel: &CancellationToken) -> Result<SyncOutput, SyncError> {
        let path = path.as_ref();
        let document = ScriptDocument::load(path)?;
        let narration = document.narration(path)?;
        self.synchronize(narration, &ScriptDocument::document_name(path), cancel).await
    }

    /// Run one synchronization attempt
    ///
    /// # Arguments
    /// * `text` - Raw narration
    /// * `document_name` - Name used for the artifact files and the provider key prefix
    /// * `cancel` - Cancels the attempt; no artifact is written once it fires
    ///
    /// # Returns
    /// * Paths of both artifacts, both written
    /// * Any `SyncError`, with neither artifact written
    pub async fn synchronize(
        &self,
        text: &str,
        document_name: &str,
        cancel: &CancellationToken,
    ) -> Result<SyncOutput, SyncError> {
        let attempt = cancel.child_token();
        let timer = self.config.timeout.map(|timeout| {
            let token = attempt.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                token.cancel();
            })
        });

        let result = self.run_attempt(text, document_name, &attempt).await;

        if let Some(timer) = timer {
            timer.abort();
        }

        match (result, self.config.timeout) {
            (Err(SyncError::Cancelled(_)), Some(timeout)) if !cancel.is_cancelled() => {
                warn!("Synchronization of '{}' timed out after {:?}", document_name, timeout);
                Err(SyncError::Cancelled(format!("attempt timed out after {:?}", timeout)))
            }
            (result, _) => result,
        }
    }

    /// Key prefix of a new attempt: `<prefix>/<name>_<unix millis>_<8 hex chars>`
    fn attempt_key_prefix(&self, document_name: &str) -> String {
        let nonce = Uuid::new_v4().simple().to_string();
        format!(
            "{}/{}_{}_{}",
            self.config.key_prefix.trim_end_matches('/'),
            FileManager::sanitize_document_name(document_name),
            Utc::now().timestamp_millis(),
            &nonce[..8]
        )
    }

    async fn run_attempt(
        &self,
        text: &str,
        document_name: &str,
        cancel: &CancellationToken,
    ) -> Result<SyncOutput, SyncError> {
        let segments = self.segmenter.segment(text)?;
        let markup = MarkupBuilder::build(&segments);

        let request = SynthesisRequest {
            voice: self.config.voice.clone(),
            audio_format: self.config.audio_format,
            key_prefix: self.attempt_key_prefix(document_name),
        };
        info!("Synchronizing '{}': {} segments under {}", document_name, segments.len(), request.key_prefix);

        let outcome = self.orchestrator.synthesize(&markup, &request, cancel).await?;

        let raw_marks = cancellable(cancel, self.provider.fetch_marks(outcome.marks_location())).await??;
        let events = parse_marks(&raw_marks)?;
        debug!("Received {} timing events", events.len());
        let aligned = self.aligner.align(&segments, &events)?;

        let audio = cancellable(cancel, self.provider.fetch_audio(outcome.audio_location())).await??;

        let subtitle_path = self.config.subtitle_path(document_name);
        let audio_path = self.config.audio_path(document_name);
        let staged_subtitles = SubtitleWriter::stage(&aligned, &subtitle_path)?;
        let staged_audio = FileManager::stage_bytes(&audio_path, &audio)?;

        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled("synchronization cancelled".to_string()));
        }

        let audio_path = staged_audio.commit()?;
        let subtitle_path = match staged_subtitles.commit() {
            Ok(path) => path,
            Err(e) => {
                if let Err(remove_error) = fs::remove_file(&audio_path) {
                    warn!("Failed to remove {}: {}", audio_path.display(), remove_error);
                }
                return Err(SyncError::Io(e));
            }
        };

        info!(
            "Wrote {} ({} bytes) and {} ({} captions)",
            audio_path.display(),
            audio.len(),
            subtitle_path.display(),
            aligned.len()
        );

        Ok(SyncOutput {
            audio_path,
            subtitle_path,
            segment_count: aligned.len(),
        })
    }
}
