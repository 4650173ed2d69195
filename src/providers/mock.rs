/*!
 * Scripted in-process synthesis provider.
 *
 * Used by tests and by `--provider mock` dry runs. Behaviours:
 * - `MockProvider::working()` - both jobs complete and marks are derived from the markup
 * - `MockProvider::failing_job(kind)` - one job reaches a failed status
 * - `MockProvider::rejecting(kind)` - one job is refused at submission
 * - `MockProvider::flaky_polls(n)` - the first `n` polls of every job fail with a 503
 * - `MockProvider::never_completes()` - jobs stay in progress forever
 */

use async_trait::async_trait;
use bytes::Bytes;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::errors::ProviderError;
use crate::providers::{JobKind, JobStatus, OutputFormat, SubmitRequest, SynthesisProvider};

static MARK_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r#"<mark name="([^"]+)"/>"#).unwrap());
static TAG_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());

/// Location scheme of mock outputs
const LOCATION_SCHEME: &str = "mock://";

/// Behavior mode for the mock provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Both jobs complete
    Working,
    /// Jobs of this kind end in a failed status
    FailingJob(JobKind),
    /// Submitting a job of this kind fails
    RejectSubmit(JobKind),
    /// The first `failures` polls of each job fail with a transient error
    FlakyPolls { failures: usize },
    /// Every poll fails with an authentication error
    Unauthorized,
    /// Jobs never leave the in-progress state
    NeverCompletes,
}

#[derive(Debug, Clone)]
struct MockJob {
    kind: JobKind,
    markup: String,
    key_prefix: String,
    extension: &'static str,
    polls: usize,
}

/// Mock provider for exercising the synchronization flow
#[derive(Debug)]
pub struct MockProvider {
    behavior: MockBehavior,
    /// In-progress polls before a job reaches its final status
    polls_until_complete: usize,
    /// Simulated speaking rate for generated marks
    ms_per_char: u64,
    /// Explicit marks stream returned instead of generated marks
    marks: Option<String>,
    /// Explicit audio returned instead of placeholder bytes
    audio: Option<Bytes>,
    jobs: Arc<Mutex<HashMap<String, MockJob>>>,
    submitted: Arc<Mutex<Vec<SubmitRequest>>>,
    cancelled: Arc<Mutex<Vec<String>>>,
    poll_count: Arc<AtomicUsize>,
}

impl MockProvider {
    /// Create a new mock provider with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            polls_until_complete: 1,
            ms_per_char: 60,
            marks: None,
            audio: None,
            jobs: Arc::new(Mutex::new(HashMap::new())),
            submitted: Arc::new(Mutex::new(Vec::new())),
            cancelled: Arc::new(Mutex::new(Vec::new())),
            poll_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    pub fn failing_job(kind: JobKind) -> Self {
        Self::new(MockBehavior::FailingJob(kind))
    }

    pub fn rejecting(kind: JobKind) -> Self {
        Self::new(MockBehavior::RejectSubmit(kind))
    }

    pub fn flaky_polls(failures: usize) -> Self {
        Self::new(MockBehavior::FlakyPolls { failures })
    }

    pub fn unauthorized() -> Self {
        Self::new(MockBehavior::Unauthorized)
    }

    pub fn never_completes() -> Self {
        Self::new(MockBehavior::NeverCompletes)
    }

    /// Number of in-progress polls before the final status
    pub fn with_polls_until_complete(mut self, polls: usize) -> Self {
        self.polls_until_complete = polls;
        self
    }

    /// Serve this marks stream instead of generating one
    pub fn with_marks(mut self, marks: impl Into<String>) -> Self {
        self.marks = Some(marks.into());
        self
    }

    /// Serve these audio bytes instead of a placeholder
    pub fn with_audio(mut self, audio: impl Into<Bytes>) -> Self {
        self.audio = Some(audio.into());
        self
    }

    pub fn with_ms_per_char(mut self, ms_per_char: u64) -> Self {
        self.ms_per_char = ms_per_char;
        self
    }

    /// Requests received so far, in submission order
    pub fn submitted_requests(&self) -> Vec<SubmitRequest> {
        self.submitted.lock().clone()
    }

    /// Job ids the caller asked to cancel
    pub fn cancelled_jobs(&self) -> Vec<String> {
        self.cancelled.lock().clone()
    }

    pub fn poll_count(&self) -> usize {
        self.poll_count.load(Ordering::SeqCst)
    }

    /// Generate a newline-delimited speech marks stream for SSML markup
    ///
    /// Each boundary marker becomes an `ssml` event at the current offset and each
    /// spoken word a `word` event; the offset advances by `ms_per_char` for every
    /// character of a word plus its trailing space.
    pub fn simulate_marks(markup: &str, ms_per_char: u64) -> String {
        let mut lines = Vec::new();
        let mut offset = 0u64;
        let mut last_end = 0;

        for captures in MARK_REGEX.captures_iter(markup) {
            let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            push_word_marks(&markup[last_end..whole.start()], ms_per_char, &mut offset, &mut lines);
            lines.push(json!({ "time": offset, "type": "ssml", "value": name.as_str() }).to_string());
            last_end = whole.end();
        }
        push_word_marks(&markup[last_end..], ms_per_char, &mut offset, &mut lines);

        lines.join("\n")
    }

    fn job_id_from_location(location: &str) -> Result<&str, ProviderError> {
        location
            .strip_prefix(LOCATION_SCHEME)
            .and_then(|rest| rest.rsplit('/').next())
            .and_then(|file| file.split('.').next())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ProviderError::ParseError(format!("Not a mock output location: {}", location)))
    }

    fn job(&self, job_id: &str) -> Result<MockJob, ProviderError> {
        self.jobs.lock().get(job_id).cloned().ok_or_else(|| ProviderError::ApiError {
            status_code: 404,
            message: format!("Unknown synthesis task: {}", job_id),
        })
    }
}

fn push_word_marks(markup: &str, ms_per_char: u64, offset: &mut u64, lines: &mut Vec<String>) {
    let spoken = TAG_REGEX.replace_all(markup, " ");
    for word in spoken.split_whitespace() {
        lines.push(json!({ "time": *offset, "type": "word", "value": word }).to_string());
        *offset += (word.chars().count() as u64 + 1) * ms_per_char;
    }
}

impl Clone for MockProvider {
    fn clone(&self) -> Self {
        Self {
            behavior: self.behavior,
            polls_until_complete: self.polls_until_complete,
            ms_per_char: self.ms_per_char,
            marks: self.marks.clone(),
            audio: self.audio.clone(),
            jobs: Arc::clone(&self.jobs),
            submitted: Arc::clone(&self.submitted),
            cancelled: Arc::clone(&self.cancelled),
            poll_count: Arc::clone(&self.poll_count),
        }
    }
}

#[async_trait]
impl SynthesisProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn submit(&self, request: &SubmitRequest) -> Result<String, ProviderError> {
        self.submitted.lock().push(request.clone());

        if self.behavior == MockBehavior::RejectSubmit(request.kind) {
            return Err(ProviderError::ApiError {
                status_code: 400,
                message: format!("Simulated rejection of the {} job", request.kind),
            });
        }

        let extension = match &request.output_format {
            OutputFormat::Audio(format) => format.extension(),
            OutputFormat::SpeechMarks(_) => "marks",
        };

        let job_id = uuid::Uuid::new_v4().to_string();
        self.jobs.lock().insert(
            job_id.clone(),
            MockJob {
                kind: request.kind,
                markup: request.markup.clone(),
                key_prefix: request.output_key_prefix.clone(),
                extension,
                polls: 0,
            },
        );

        Ok(job_id)
    }

    async fn poll_status(&self, job_id: &str) -> Result<JobStatus, ProviderError> {
        self.poll_count.fetch_add(1, Ordering::SeqCst);

        let (kind, polls) = {
            let mut jobs = self.jobs.lock();
            let job = jobs.get_mut(job_id).ok_or_else(|| ProviderError::ApiError {
                status_code: 404,
                message: format!("Unknown synthesis task: {}", job_id),
            })?;
            job.polls += 1;
            (job.kind, job.polls)
        };

        match self.behavior {
            MockBehavior::Unauthorized => {
                return Err(ProviderError::AuthenticationError("Simulated invalid credentials".to_string()));
            }
            MockBehavior::NeverCompletes => return Ok(JobStatus::InProgress),
            MockBehavior::FlakyPolls { failures } if polls <= failures => {
                return Err(ProviderError::ApiError {
                    status_code: 503,
                    message: format!("Simulated outage (poll #{} of {})", polls, job_id),
                });
            }
            _ => {}
        }

        let flaky_polls = match self.behavior {
            MockBehavior::FlakyPolls { failures } => failures,
            _ => 0,
        };
        if polls - flaky_polls <= self.polls_until_complete {
            return Ok(JobStatus::InProgress);
        }

        if self.behavior == MockBehavior::FailingJob(kind) {
            return Ok(JobStatus::Failed {
                reason: Some("Simulated synthesis failure".to_string()),
            });
        }

        Ok(JobStatus::Completed)
    }

    async fn resolve_output(&self, job_id: &str) -> Result<String, ProviderError> {
        let job = self.job(job_id)?;
        Ok(format!("{}{}/{}.{}", LOCATION_SCHEME, job.key_prefix, job_id, job.extension))
    }

    async fn fetch_marks(&self, location: &str) -> Result<String, ProviderError> {
        let job = self.job(Self::job_id_from_location(location)?)?;
        if let Some(marks) = &self.marks {
            return Ok(marks.clone());
        }
        Ok(Self::simulate_marks(&job.markup, self.ms_per_char))
    }

    async fn fetch_audio(&self, location: &str) -> Result<Bytes, ProviderError> {
        let job_id = Self::job_id_from_location(location)?;
        self.job(job_id)?;
        if let Some(audio) = &self.audio {
            return Ok(audio.clone());
        }
        Ok(Bytes::from(format!("mock audio for {}", job_id)))
    }

    async fn cancel(&self, job_id: &str) -> Result<(), ProviderError> {
        self.cancelled.lock().push(job_id.to_string());
        Ok(())
    }
}
