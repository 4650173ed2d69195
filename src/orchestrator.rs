/*!
 * Dual-job synthesis orchestration.
 *
 * One attempt submits two jobs from the same markup: an audio render and a
 * timing-mark render. Both are polled in the same round until both complete;
 * either failing aborts the attempt. Every wait and provider call races the
 * caller's cancellation token.
 */

use log::{debug, error, info, warn};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::errors::SyncError;
use crate::markup::MarkupDocument;
use crate::providers::{
    AudioFormat, JobKind, JobStatus, OutputFormat, SpeechMarkType, SubmitRequest, SynthesisJob,
    SynthesisProvider, VoiceConfig,
};

/// Suffix appended to the key prefix of the marks job
pub const MARKS_PREFIX_SUFFIX: &str = "_marks";

/// Polling cadence and tolerance
#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    /// Delay between poll rounds
    pub interval: Duration,
    /// Consecutive transient poll failures tolerated per job
    pub retry_budget: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            retry_budget: 3,
        }
    }
}

/// Per-attempt submission parameters
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    pub voice: VoiceConfig,
    pub audio_format: AudioFormat,
    /// Unique key prefix of this attempt
    pub key_prefix: String,
}

impl SynthesisRequest {
    fn submit_request(&self, kind: JobKind, markup: &MarkupDocument) -> SubmitRequest {
        let (output_format, output_key_prefix) = match kind {
            JobKind::Audio => (OutputFormat::Audio(self.audio_format), self.key_prefix.clone()),
            JobKind::Marks => (
                OutputFormat::SpeechMarks(vec![SpeechMarkType::Ssml, SpeechMarkType::Word]),
                format!("{}{}", self.key_prefix, MARKS_PREFIX_SUFFIX),
            ),
        };

        SubmitRequest {
            kind,
            markup: markup.as_str().to_string(),
            output_format,
            voice: self.voice.clone(),
            output_key_prefix,
        }
    }
}

/// Both completed jobs of an attempt
#[derive(Debug, Clone)]
pub struct SynthesisOutcome {
    pub audio: SynthesisJob,
    pub marks: SynthesisJob,
}

impl SynthesisOutcome {
    pub fn audio_location(&self) -> &str {
        self.audio.output_location.as_deref().unwrap_or_default()
    }

    pub fn marks_location(&self) -> &str {
        self.marks.output_location.as_deref().unwrap_or_default()
    }
}

/// Polling state of one job
#[derive(Debug)]
struct JobTrack {
    job: SynthesisJob,
    consecutive_failures: u32,
}

impl JobTrack {
    fn new(job_id: String, kind: JobKind) -> Self {
        Self {
            job: SynthesisJob::submitted(job_id, kind),
            consecutive_failures: 0,
        }
    }

    fn is_completed(&self) -> bool {
        self.job.status == JobStatus::Completed
    }
}

/// Race a future against the cancellation token
pub(crate) async fn cancellable<F>(cancel: &CancellationToken, future: F) -> Result<F::Output, SyncError>
where
    F: Future,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SyncError::Cancelled("synchronization cancelled".to_string())),
        output = future => Ok(output),
    }
}

/// Drives the audio and marks jobs of one attempt
pub struct SynthesisOrchestrator {
    provider: Arc<dyn SynthesisProvider>,
    settings: PollSettings,
}

impl SynthesisOrchestrator {
    pub fn new(provider: Arc<dyn SynthesisProvider>, settings: PollSettings) -> Self {
        Self { provider, settings }
    }

    /// Submit both jobs, wait for both, and resolve their output locations
    ///
    /// # Returns
    /// * Both jobs with their output locations once both completed
    /// * `SubmitRejected` when either submission fails (no retry)
    /// * `SynthesisFailed` when either job fails
    /// * `SynthesisUnavailable` when a job's polls keep failing past the retry budget
    /// * `Cancelled` when the token fires first
    pub async fn synthesize(
        &self,
        markup: &MarkupDocument,
        request: &SynthesisRequest,
        cancel: &CancellationToken,
    ) -> Result<SynthesisOutcome, SyncError> {
        let audio_id = self.submit(JobKind::Audio, markup, request, cancel).await?;
        let mut audio = JobTrack::new(audio_id, JobKind::Audio);

        let marks_id = match self.submit(JobKind::Marks, markup, request, cancel).await {
            Ok(id) => id,
            Err(e) => {
                self.abandon(&[&audio]).await;
                return Err(e);
            }
        };
        let mut marks = JobTrack::new(marks_id, JobKind::Marks);

        info!(
            "Submitted {} audio job {} and marks job {} under {}",
            self.provider.name(),
            audio.job.job_id,
            marks.job.job_id,
            request.key_prefix
        );

        if let Err(e) = self.wait_for_completion(&mut audio, &mut marks, cancel).await {
            self.abandon(&[&audio, &marks]).await;
            return Err(e);
        }

        for track in [&mut audio, &mut marks] {
            let location = cancellable(cancel, self.provider.resolve_output(&track.job.job_id)).await??;
            debug!("{} job {} output at {}", track.job.kind, track.job.job_id, location);
            track.job.output_location = Some(location);
        }

        Ok(SynthesisOutcome {
            audio: audio.job,
            marks: marks.job,
        })
    }

    async fn submit(
        &self,
        kind: JobKind,
        markup: &MarkupDocument,
        request: &SynthesisRequest,
        cancel: &CancellationToken,
    ) -> Result<String, SyncError> {
        let submit_request = request.submit_request(kind, markup);
        cancellable(cancel, self.provider.submit(&submit_request))
            .await?
            .map_err(|source| {
                error!("Submitting the {} job failed: {}", kind, source);
                SyncError::SubmitRejected { kind, source }
            })
    }

    async fn wait_for_completion(
        &self,
        audio: &mut JobTrack,
        marks: &mut JobTrack,
        cancel: &CancellationToken,
    ) -> Result<(), SyncError> {
        let mut round = 0u64;
        loop {
            round += 1;
            let (audio_result, marks_result) =
                cancellable(cancel, async { tokio::join!(self.poll_track(audio), self.poll_track(marks)) }).await?;
            audio_result?;
            marks_result?;

            if audio.is_completed() && marks.is_completed() {
                debug!("Both jobs completed after {} poll rounds", round);
                return Ok(());
            }

            cancellable(cancel, tokio::time::sleep(self.settings.interval)).await?;
        }
    }

    /// Poll one job unless it already completed
    async fn poll_track(&self, track: &mut JobTrack) -> Result<(), SyncError> {
        if track.is_completed() {
            return Ok(());
        }

        match self.provider.poll_status(&track.job.job_id).await {
            Ok(status) => {
                track.consecutive_failures = 0;
                debug!("{} job {} is {:?}", track.job.kind, track.job.job_id, status);
                track.job.status = status.clone();

                if let JobStatus::Failed { reason } = status {
                    let reason = reason.unwrap_or_else(|| "no reason given".to_string());
                    error!("{} job {} failed: {}", track.job.kind, track.job.job_id, reason);
                    return Err(SyncError::SynthesisFailed {
                        kind: track.job.kind,
                        reason,
                    });
                }
                Ok(())
            }
            Err(e) if e.is_transient() => {
                track.consecutive_failures += 1;
                if track.consecutive_failures > self.settings.retry_budget {
                    error!(
                        "Giving up on {} job {} after {} failed polls",
                        track.job.kind, track.job.job_id, track.consecutive_failures
                    );
                    return Err(SyncError::SynthesisUnavailable {
                        kind: track.job.kind,
                        attempts: track.consecutive_failures,
                        last_error: e.to_string(),
                    });
                }
                warn!(
                    "Polling {} job {} failed ({}/{}): {}",
                    track.job.kind,
                    track.job.job_id,
                    track.consecutive_failures,
                    self.settings.retry_budget,
                    e
                );
                Ok(())
            }
            Err(e) => Err(SyncError::Provider(e)),
        }
    }

    /// Ask the provider to drop every job that has not reached a final status
    async fn abandon(&self, tracks: &[&JobTrack]) {
        for track in tracks.iter().filter(|t| !t.job.status.is_terminal()) {
            debug!("Abandoning {} job {}", track.job.kind, track.job.job_id);
            if let Err(e) = self.provider.cancel(&track.job.job_id).await {
                warn!("Failed to cancel {} job {}: {}", track.job.kind, track.job.job_id, e);
            }
        }
    }
}
