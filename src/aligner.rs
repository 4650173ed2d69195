/*!
 * Speech-mark alignment.
 *
 * Parses the provider's newline-delimited timing events and turns them into one
 * `[start, end)` interval per segment. A segment starts at its boundary marker
 * and ends where the next one starts; the last segment ends a short buffer after
 * the last spoken word.
 */

use log::{debug, warn};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::errors::SyncError;
use crate::markup::marker_name;
use crate::segmenter::Segment;

/// Pseudo-marker reported when the stream has no word events to close the last segment
pub const END_OF_SPEECH_MARKER: &str = "end_of_speech";

/// Time added after the last word to close the last segment
pub const DEFAULT_TRAILING_BUFFER: Duration = Duration::from_millis(1000);

/// Kind of timing event kept for alignment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimingEventKind {
    /// Echo of a `<mark/>` in the markup
    Boundary,
    /// Start of a spoken word
    Word,
}

/// One timestamped event from the marks stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingEvent {
    pub kind: TimingEventKind,
    /// Marker name for boundaries, the spoken word for words
    pub label: Option<String>,
    /// Milliseconds from the start of the audio
    pub offset_ms: u64,
}

impl TimingEvent {
    pub fn boundary(label: impl Into<String>, offset_ms: u64) -> Self {
        Self { kind: TimingEventKind::Boundary, label: Some(label.into()), offset_ms }
    }

    pub fn word(label: impl Into<String>, offset_ms: u64) -> Self {
        Self { kind: TimingEventKind::Word, label: Some(label.into()), offset_ms }
    }
}

/// A segment with its time interval
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignedSegment {
    pub segment: Segment,
    pub start: Duration,
    pub end: Duration,
}

impl AlignedSegment {
    pub fn start_ms(&self) -> u64 {
        self.start.as_millis() as u64
    }

    pub fn end_ms(&self) -> u64 {
        self.end.as_millis() as u64
    }

    pub fn text(&self) -> &str {
        &self.segment.text
    }
}

#[derive(Debug, Deserialize)]
struct RawMark {
    #[serde(rename = "type")]
    mark_type: String,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    label: Option<String>,
    time: u64,
}

impl RawMark {
    /// `value` wins when both name fields are present
    fn into_label(self) -> Option<String> {
        self.value.or(self.label)
    }
}

/// Parse a newline-delimited JSON speech marks stream
///
/// Keeps `ssml` and `word` events and skips any other mark type.
pub fn parse_marks(raw: &str) -> Result<Vec<TimingEvent>, SyncError> {
    let mut events = Vec::new();

    for (i, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mark: RawMark = serde_json::from_str(line).map_err(|e| SyncError::MalformedMarks {
            line: i + 1,
            reason: e.to_string(),
        })?;

        let kind = match mark.mark_type.as_str() {
            "ssml" => TimingEventKind::Boundary,
            "word" => TimingEventKind::Word,
            other => {
                debug!("Skipping '{}' speech mark on line {}", other, i + 1);
                continue;
            }
        };

        let offset_ms = mark.time;
        events.push(TimingEvent {
            kind,
            label: mark.into_label(),
            offset_ms,
        });
    }

    Ok(events)
}

/// Computes segment intervals from timing events
#[derive(Debug, Clone)]
pub struct MarkAligner {
    trailing_buffer: Duration,
}

impl Default for MarkAligner {
    fn default() -> Self {
        Self { trailing_buffer: DEFAULT_TRAILING_BUFFER }
    }
}

impl MarkAligner {
    pub fn new(trailing_buffer: Duration) -> Self {
        Self { trailing_buffer }
    }

    /// Assign an interval to every segment
    ///
    /// The last segment closes at the largest word offset plus the trailing
    /// buffer, so a word event delivered out of order still counts. For a
    /// monotonic stream this is the last word event in the stream. Offsets
    /// near `u64::MAX` saturate instead of overflowing.
    ///
    /// # Arguments
    /// * `segments` - Segments in index order
    /// * `events` - Timing events in any order
    ///
    /// # Returns
    /// * One aligned segment per input segment, in the same order
    /// * `SyncError::MissingBoundary` when a segment's marker or every word event is absent
    pub fn align(&self, segments: &[Segment], events: &[TimingEvent]) -> Result<Vec<AlignedSegment>, SyncError> {
        if segments.is_empty() {
            return Ok(Vec::new());
        }

        let mut boundaries: HashMap<&str, u64> = HashMap::new();
        let mut last_word: Option<u64> = None;
        for event in events {
            match event.kind {
                TimingEventKind::Boundary => {
                    let Some(label) = event.label.as_deref() else {
                        debug!("Ignoring unlabelled boundary event at {}ms", event.offset_ms);
                        continue;
                    };
                    boundaries
                        .entry(label)
                        .and_modify(|offset| *offset = (*offset).min(event.offset_ms))
                        .or_insert(event.offset_ms);
                }
                TimingEventKind::Word => {
                    last_word = Some(last_word.map_or(event.offset_ms, |last| last.max(event.offset_ms)));
                }
            }
        }

        let starts = segments
            .iter()
            .map(|segment| {
                let marker = marker_name(segment.index);
                boundaries
                    .get(marker.as_str())
                    .copied()
                    .ok_or(SyncError::MissingBoundary { marker })
            })
            .collect::<Result<Vec<u64>, SyncError>>()?;

        let trailing_ms = u64::try_from(self.trailing_buffer.as_millis()).unwrap_or(u64::MAX);
        let speech_end = last_word
            .ok_or_else(|| SyncError::MissingBoundary {
                marker: END_OF_SPEECH_MARKER.to_string(),
            })?
            .saturating_add(trailing_ms);

        let aligned = segments
            .iter()
            .enumerate()
            .map(|(i, segment)| {
                let mut start = starts[i];
                let mut end = starts.get(i + 1).copied().unwrap_or(speech_end);
                if end <= start {
                    // A start at u64::MAX leaves no room after it
                    start = start.min(u64::MAX - 1);
                    warn!(
                        "Segment {} ends at {}ms, not after its start {}ms; clamping to {}ms",
                        segment.index,
                        end,
                        start,
                        start + 1
                    );
                    end = start + 1;
                }

                AlignedSegment {
                    segment: segment.clone(),
                    start: Duration::from_millis(start),
                    end: Duration::from_millis(end),
                }
            })
            .collect();

        Ok(aligned)
    }
}
