use anyhow::{anyhow, Context, Result};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::app_config::Config;
use crate::engine::{EngineConfig, SegmentSyncEngine, SyncOutput};
use crate::file_utils::FileManager;
use crate::providers::{build_provider, SynthesisProvider};
use crate::script::ScriptDocument;
use crate::segmenter::{Segment, TextSegmenter};
use crate::subtitle_processor::SubtitleFile;

// @module: Application controller for script synchronization

/// What happened to one script
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Both artifacts were written
    Processed(SyncOutput),
    /// Subtitles already existed and overwriting was not requested
    Skipped(PathBuf),
}

/// Totals of a run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

impl RunSummary {
    fn record(&mut self, outcome: &RunOutcome) {
        match outcome {
            RunOutcome::Processed(_) => self.processed += 1,
            RunOutcome::Skipped(_) => self.skipped += 1,
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} processed, {} skipped, {} errors in {}",
            self.processed,
            self.skipped,
            self.failed,
            Controller::format_duration(self.elapsed)
        )
    }
}

/// Main application controller
pub struct Controller {
    // @field: App configuration
    config: Config,
    engine: SegmentSyncEngine,
    /// Configuration file, never treated as a script in folder runs
    config_path: Option<PathBuf>,
}

impl Controller {
    // @method: Create a controller with the provider selected in the configuration
    pub fn with_config(config: Config) -> Result<Self> {
        let provider = build_provider(&config.synthesis)?;
        Ok(Self::with_provider(config, provider))
    }

    /// Create a controller around an existing provider
    pub fn with_provider(config: Config, provider: Arc<dyn SynthesisProvider>) -> Self {
        let engine = SegmentSyncEngine::new(provider, EngineConfig::from_config(&config));
        Self { config, engine, config_path: None }
    }

    /// Remember where the configuration was loaded from
    pub fn with_config_path(mut self, config_path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(config_path.into());
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn is_config_file(&self, path: &Path) -> bool {
        let Some(config_path) = &self.config_path else {
            return false;
        };
        match (path.canonicalize(), config_path.canonicalize()) {
            (Ok(path), Ok(config_path)) => path == config_path,
            _ => false,
        }
    }

    /// Scripts of a folder run, without the config file
    ///
    /// Scripts whose names sanitize to the same artifact name as an earlier one
    /// are reported and dropped so they cannot overwrite each other.
    fn collect_scripts(&self, input_dir: &Path) -> Result<(Vec<PathBuf>, usize)> {
        let mut claimed: HashMap<String, PathBuf> = HashMap::new();
        let mut scripts = Vec::new();
        let mut collisions = 0;

        for path in FileManager::find_files(input_dir, "json")? {
            if self.is_config_file(&path) {
                info!("Skipping configuration file {}", path.display());
                continue;
            }

            let name = FileManager::sanitize_document_name(&ScriptDocument::document_name(&path));
            if let Some(first) = claimed.get(&name) {
                warn!(
                    "Skipping {}: its artifacts would collide with {} (both named '{}')",
                    path.display(),
                    first.display(),
                    name
                );
                collisions += 1;
                continue;
            }

            claimed.insert(name, path.clone());
            scripts.push(path);
        }

        Ok((scripts, collisions))
    }

    /// Run a script file, or every script in a folder
    pub async fn run(&self, input_path: PathBuf, force_overwrite: bool, cancel: &CancellationToken) -> Result<RunSummary> {
        if FileManager::dir_exists(&input_path) {
            return self.run_folder(input_path, force_overwrite, cancel).await;
        }

        let start_time = Instant::now();
        let mut summary = RunSummary::default();
        let outcome = self.run_file(&input_path, force_overwrite, &MultiProgress::new(), cancel).await?;
        summary.record(&outcome);
        summary.elapsed = start_time.elapsed();
        Ok(summary)
    }

    /// Synchronize one script file unless its subtitles already exist
    pub async fn run_file(
        &self,
        input_file: &Path,
        force_overwrite: bool,
        multi_progress: &MultiProgress,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome> {
        if !FileManager::file_exists(input_file) {
            return Err(anyhow!("Input file does not exist: {:?}", input_file));
        }

        let document_name = ScriptDocument::document_name(input_file);
        let subtitle_path = self.engine.config().subtitle_path(&document_name);
        if subtitle_path.exists() && !force_overwrite {
            warn!(
                "Skipping {}, subtitles already exist at {} (use -f to force overwrite)",
                input_file.display(),
                subtitle_path.display()
            );
            return Ok(RunOutcome::Skipped(subtitle_path));
        }

        let spinner = multi_progress.add(ProgressBar::new_spinner());
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        spinner.set_style(style);
        spinner.set_message(format!("Synthesizing {}", document_name));
        spinner.enable_steady_tick(Duration::from_millis(120));

        let result = self.engine.process_script(input_file, cancel).await;
        spinner.finish_and_clear();

        let output = result.with_context(|| format!("Failed to synchronize {}", input_file.display()))?;
        info!("Success: {} + {}", output.audio_path.display(), output.subtitle_path.display());
        Ok(RunOutcome::Processed(output))
    }

    /// Run every `*.json` script in a folder; one failing script does not stop the others
    pub async fn run_folder(&self, input_dir: PathBuf, force_overwrite: bool, cancel: &CancellationToken) -> Result<RunSummary> {
        let start_time = Instant::now();

        if !FileManager::dir_exists(&input_dir) {
            return Err(anyhow!("Input directory does not exist: {:?}", input_dir));
        }

        let (scripts, collisions) = self.collect_scripts(&input_dir)?;
        if scripts.is_empty() {
            return Err(anyhow!("No script files found in directory: {:?}", input_dir));
        }

        let multi_progress = MultiProgress::new();
        let folder_pb = multi_progress.add(ProgressBar::new(scripts.len() as u64));
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} scripts ({percent}%) {msg}")
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        folder_pb.set_style(style.progress_chars("█▓▒░"));

        let mut summary = RunSummary {
            skipped: collisions,
            ..RunSummary::default()
        };
        for script in &scripts {
            let file_name = script
                .file_name()
                .map(|f| f.to_string_lossy().to_string())
                .unwrap_or_else(|| "unknown".to_string());
            folder_pb.set_message(format!("Processing: {}", file_name));

            match self.run_file(script, force_overwrite, &multi_progress, cancel).await {
                Ok(outcome) => summary.record(&outcome),
                Err(e) => {
                    error!("Error processing file {}: {:#}", file_name, e);
                    summary.failed += 1;
                }
            }
            folder_pb.inc(1);

            if cancel.is_cancelled() {
                folder_pb.abandon_with_message("Cancelled");
                return Err(anyhow!("Folder processing cancelled after {}", file_name));
            }
        }

        folder_pb.finish_with_message("Folder processing complete");
        summary.elapsed = start_time.elapsed();
        info!("Folder processing completed: {}", summary);
        Ok(summary)
    }

    /// Segments of a script, without contacting any provider
    pub fn segment_preview(&self, input_file: &Path) -> Result<Vec<Segment>> {
        let document = ScriptDocument::load(input_file)?;
        let narration = document.narration(input_file)?;
        let segmenter = TextSegmenter::new(self.config.segmentation.max_chunk_chars);
        Ok(segmenter.segment(narration)?)
    }

    /// Read back a subtitle file
    pub fn inspect(srt_file: &Path) -> Result<SubtitleFile> {
        SubtitleFile::from_srt_file(srt_file)
    }

    // Format duration in a human-readable format
    pub fn format_duration(duration: Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}.{:03}s", seconds, duration.subsec_millis())
        }
    }
}
