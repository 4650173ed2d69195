/*!
 * # narrasync - narration audio with synchronized subtitles
 *
 * A Rust library that turns narration text into speech audio plus an SRT file
 * whose captions follow the voice.
 *
 * ## Features
 *
 * - Caption-sized segmentation of markdown-flavoured narration
 * - One SSML payload with a boundary marker per caption
 * - Audio and speech-mark jobs driven together against a synthesis provider
 * - Caption timing derived from the provider's speech marks
 * - Atomic artifact writes: audio and subtitles land together or not at all
 * - Cancellation and an optional per-attempt timeout
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `segmenter`: Narration normalization and greedy caption packing
 * - `markup`: SSML construction with boundary markers
 * - `orchestrator`: Dual-job submission and polling
 * - `aligner`: Speech-mark parsing and interval computation
 * - `subtitle_processor`: SRT rendering, writing and parsing
 * - `engine`: The synchronization façade composing the above
 * - `providers`: The synthesis provider trait and its implementations:
 *   - `providers::http`: Task-based synthesis REST API client
 *   - `providers::mock`: Scripted in-process provider
 * - `script`: Script document input
 * - `app_config`: Configuration management
 * - `file_utils`: File system operations
 * - `app_controller`: Main application controller
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod aligner;
pub mod app_config;
pub mod app_controller;
pub mod engine;
pub mod errors;
pub mod file_utils;
pub mod markup;
pub mod orchestrator;
pub mod providers;
pub mod script;
pub mod segmenter;
pub mod subtitle_processor;

// Re-export main types for easier usage
pub use aligner::{parse_marks, AlignedSegment, MarkAligner, TimingEvent, TimingEventKind};
pub use app_config::Config;
pub use engine::{EngineConfig, SegmentSyncEngine, SyncOutput};
pub use errors::{AppError, ProviderError, SyncError};
pub use markup::{MarkupBuilder, MarkupDocument};
pub use orchestrator::{PollSettings, SynthesisOrchestrator, SynthesisOutcome, SynthesisRequest};
pub use providers::{JobKind, JobStatus, SynthesisJob, SynthesisProvider};
pub use segmenter::{Segment, TextSegmenter};
pub use subtitle_processor::{SubtitleEntry, SubtitleFile, SubtitleWriter};
