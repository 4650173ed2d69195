use anyhow::{anyhow, Context, Result};
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::aligner::AlignedSegment;
use crate::errors::SyncError;
use crate::file_utils::{FileManager, StagedFile};

// @module: SRT rendering and parsing

// @const: SRT timestamp regex
static TIMESTAMP_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{2,}):(\d{2}):(\d{2}),(\d{3}) --> (\d{2,}):(\d{2}):(\d{2}),(\d{3})").unwrap()
});

// @struct: Single subtitle entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleEntry {
    // @field: Sequence number, 1-based
    pub seq_num: usize,

    // @field: Start time in ms
    pub start_time_ms: u64,

    // @field: End time in ms
    pub end_time_ms: u64,

    // @field: Subtitle text
    pub text: String,
}

impl SubtitleEntry {
    pub fn new(seq_num: usize, start_time_ms: u64, end_time_ms: u64, text: String) -> Self {
        SubtitleEntry {
            seq_num,
            start_time_ms,
            end_time_ms,
            text,
        }
    }

    // @creates: Entry whose interval moves forward
    pub fn new_validated(seq_num: usize, start_time_ms: u64, end_time_ms: u64, text: String) -> Result<Self, SyncError> {
        if end_time_ms <= start_time_ms {
            return Err(SyncError::InvalidInterval {
                index: seq_num,
                start_ms: start_time_ms,
                end_ms: end_time_ms,
            });
        }

        Ok(Self::new(seq_num, start_time_ms, end_time_ms, text))
    }

    /// Parse an SRT timestamp (HH:MM:SS,mmm) to milliseconds
    pub fn parse_timestamp(timestamp: &str) -> Result<u64> {
        let parts: Vec<&str> = timestamp.trim().split(&[':', ',', '.'][..]).collect();

        if parts.len() != 4 {
            return Err(anyhow!("Invalid timestamp format: {}", timestamp));
        }

        let hours: u64 = parts[0].parse().context("Failed to parse hours")?;
        let minutes: u64 = parts[1].parse().context("Failed to parse minutes")?;
        let seconds: u64 = parts[2].parse().context("Failed to parse seconds")?;
        let millis: u64 = parts[3].parse().context("Failed to parse milliseconds")?;

        if minutes >= 60 || seconds >= 60 || millis >= 1000 {
            return Err(anyhow!("Invalid time components in timestamp: {}", timestamp));
        }

        Ok(hours * 3_600_000 + minutes * 60_000 + seconds * 1_000 + millis)
    }

    pub fn format_start_time(&self) -> String {
        Self::format_timestamp(self.start_time_ms)
    }

    pub fn format_end_time(&self) -> String {
        Self::format_timestamp(self.end_time_ms)
    }

    /// Format milliseconds as HH:MM:SS,mmm, hours padded to at least two digits
    pub fn format_timestamp(ms: u64) -> String {
        let hours = ms / 3_600_000;
        let minutes = (ms % 3_600_000) / 60_000;
        let seconds = (ms % 60_000) / 1_000;
        let millis = ms % 1_000;

        format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, millis)
    }
}

impl fmt::Display for SubtitleEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}", self.seq_num)?;
        writeln!(f, "{} --> {}", self.format_start_time(), self.format_end_time())?;
        writeln!(f, "{}", self.text)?;
        writeln!(f)
    }
}

/// Ordered SRT blocks for one narration
#[derive(Debug, Clone, Default)]
pub struct SubtitleFile {
    pub entries: Vec<SubtitleEntry>,
}

impl SubtitleFile {
    /// Build numbered entries from aligned segments
    pub fn from_aligned(aligned: &[AlignedSegment]) -> Result<Self, SyncError> {
        let entries = aligned
            .iter()
            .enumerate()
            .map(|(i, segment)| {
                SubtitleEntry::new_validated(i + 1, segment.start_ms(), segment.end_ms(), segment.text().to_string())
            })
            .collect::<Result<Vec<_>, SyncError>>()?;

        Ok(Self { entries })
    }

    /// Read an SRT file
    pub fn from_srt_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read subtitle file: {}", path.display()))?;
        Ok(Self {
            entries: Self::parse_srt_string(&content)?,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Milliseconds from the first start to the last end
    pub fn total_span_ms(&self) -> u64 {
        let start = self.entries.iter().map(|e| e.start_time_ms).min();
        let end = self.entries.iter().map(|e| e.end_time_ms).max();
        match (start, end) {
            (Some(start), Some(end)) => end.saturating_sub(start),
            _ => 0,
        }
    }

    /// Render the whole file
    pub fn render(&self) -> String {
        self.entries.iter().map(|entry| entry.to_string()).collect()
    }

    /// Write the file atomically, replacing any previous content
    pub fn write_to_srt<P: AsRef<Path>>(&self, path: P) -> Result<PathBuf, SyncError> {
        Ok(self.stage(path)?.commit()?)
    }

    /// Write to a temp file next to `path` without committing
    pub fn stage<P: AsRef<Path>>(&self, path: P) -> Result<StagedFile, SyncError> {
        let staged = FileManager::stage_bytes(path.as_ref(), self.render().as_bytes())?;
        debug!("Staged {} subtitle blocks for {}", self.entries.len(), path.as_ref().display());
        Ok(staged)
    }

    /// Parse SRT format string into subtitle entries
    pub fn parse_srt_string(content: &str) -> Result<Vec<SubtitleEntry>> {
        let mut entries = Vec::new();

        let mut current_seq_num: Option<usize> = None;
        let mut current_times: Option<(u64, u64)> = None;
        let mut current_text = String::new();

        let mut flush = |seq_num: Option<usize>, times: Option<(u64, u64)>, text: &mut String| {
            if let (Some(seq_num), Some((start_ms, end_ms))) = (seq_num, times) {
                if text.trim().is_empty() {
                    warn!("Skipping empty subtitle entry {}", seq_num);
                } else {
                    match SubtitleEntry::new_validated(seq_num, start_ms, end_ms, text.trim().to_string()) {
                        Ok(entry) => entries.push(entry),
                        Err(e) => warn!("Skipping invalid subtitle entry {}: {}", seq_num, e),
                    }
                }
            }
            text.clear();
        };

        for (line_number, line) in content.lines().enumerate() {
            let trimmed = line.trim().trim_start_matches('\u{feff}');

            if trimmed.is_empty() {
                if current_times.is_some() && !current_text.is_empty() {
                    flush(current_seq_num.take(), current_times.take(), &mut current_text);
                }
                continue;
            }

            if current_seq_num.is_none() && current_text.is_empty() {
                if let Ok(num) = trimmed.parse::<usize>() {
                    current_seq_num = Some(num);
                    continue;
                }
            }

            if current_seq_num.is_some() && current_times.is_none() {
                if let Some(caps) = TIMESTAMP_REGEX.captures(trimmed) {
                    current_times = Some((Self::captured_ms(&caps, 1)?, Self::captured_ms(&caps, 5)?));
                    continue;
                }
            }

            if current_times.is_some() {
                if !current_text.is_empty() {
                    current_text.push('\n');
                }
                current_text.push_str(trimmed);
            } else {
                warn!("Unexpected text at line {} before sequence number or timestamp: {}", line_number + 1, trimmed);
            }
        }
        flush(current_seq_num, current_times, &mut current_text);

        if entries.is_empty() {
            return Err(anyhow!("No valid subtitle entries were found in the SRT content"));
        }

        Ok(entries)
    }

    fn captured_ms(caps: &regex::Captures, start_idx: usize) -> Result<u64> {
        let timestamp = format!(
            "{}:{}:{},{}",
            &caps[start_idx],
            &caps[start_idx + 1],
            &caps[start_idx + 2],
            &caps[start_idx + 3]
        );
        SubtitleEntry::parse_timestamp(&timestamp)
    }
}

impl fmt::Display for SubtitleFile {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Blocks: {}", self.entries.len())?;
        writeln!(f, "Span: {}", SubtitleEntry::format_timestamp(self.total_span_ms()))
    }
}

/// Renders aligned segments into SRT files
pub struct SubtitleWriter;

impl SubtitleWriter {
    /// Write aligned segments to `destination`
    ///
    /// # Returns
    /// * The destination path once the file is in place
    /// * `SyncError::InvalidInterval` for a segment with `end <= start`; nothing is written
    /// * `SyncError::Io` when the file cannot be written; no partial file is left
    pub fn write<P: AsRef<Path>>(aligned: &[AlignedSegment], destination: P) -> Result<PathBuf, SyncError> {
        SubtitleFile::from_aligned(aligned)?.write_to_srt(destination)
    }

    /// Render aligned segments to a temp file next to `destination`
    pub fn stage<P: AsRef<Path>>(aligned: &[AlignedSegment], destination: P) -> Result<StagedFile, SyncError> {
        SubtitleFile::from_aligned(aligned)?.stage(destination)
    }
}
