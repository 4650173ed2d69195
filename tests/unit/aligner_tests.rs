/*!
 * Tests for speech-mark alignment
 */

use std::time::Duration;

use narrasync::aligner::{parse_marks, MarkAligner, TimingEvent, END_OF_SPEECH_MARKER};
use narrasync::errors::SyncError;
use narrasync::markup::MarkupBuilder;
use narrasync::providers::mock::MockProvider;
use narrasync::segmenter::{segment, Segment};
use crate::common::SAMPLE_NARRATION;

/// Intervals derived from simulated marks tile the timeline without gaps
#[test]
fn test_align_withSimulatedMarks_shouldProduceContiguousIntervals() {
    let segments = segment(SAMPLE_NARRATION, 12).unwrap();
    let markup = MarkupBuilder::build(&segments);
    let events = parse_marks(&MockProvider::simulate_marks(markup.as_str(), 50)).unwrap();

    let aligned = MarkAligner::default().align(&segments, &events).unwrap();

    assert_eq!(aligned.len(), segments.len());
    assert_eq!(aligned[0].start_ms(), 0);
    for pair in aligned.windows(2) {
        assert_eq!(pair[0].end, pair[1].start);
        assert!(pair[0].start < pair[0].end);
    }
    for (a, s) in aligned.iter().zip(&segments) {
        assert_eq!(&a.segment, s);
    }

    let last_word = events
        .iter()
        .filter(|e| e.label.is_some() && e.kind == narrasync::TimingEventKind::Word)
        .map(|e| e.offset_ms)
        .max()
        .unwrap();
    assert_eq!(aligned.last().unwrap().end_ms(), last_word + 1000);
}

/// The trailing buffer is configurable
#[test]
fn test_align_withCustomTrailingBuffer_shouldCloseLastSegmentWithIt() {
    let segments = vec![Segment::new(0, "Hi.")];
    let events = vec![TimingEvent::boundary("segment_0", 10), TimingEvent::word("Hi", 15)];

    let aligned = MarkAligner::new(Duration::from_millis(250)).align(&segments, &events).unwrap();
    assert_eq!((aligned[0].start_ms(), aligned[0].end_ms()), (10, 265));
}

/// Boundary events without a label cannot be matched and are ignored
#[test]
fn test_align_withUnlabelledBoundary_shouldIgnoreIt() {
    let raw = "{\"type\":\"ssml\",\"time\":5}\n\
               {\"type\":\"ssml\",\"value\":\"segment_0\",\"time\":20}\n\
               {\"type\":\"word\",\"value\":\"Hi\",\"time\":30}";
    let events = parse_marks(raw).unwrap();
    assert_eq!(events.len(), 3);

    let aligned = MarkAligner::default().align(&[Segment::new(0, "Hi.")], &events).unwrap();
    assert_eq!(aligned[0].start_ms(), 20);
}

/// Markers for unknown segments are harmless
#[test]
fn test_align_withExtraMarkers_shouldIgnoreThem() {
    let events = vec![
        TimingEvent::boundary("segment_0", 0),
        TimingEvent::boundary("segment_7", 500),
        TimingEvent::boundary("intro", 900),
        TimingEvent::word("Hi", 100),
    ];
    let aligned = MarkAligner::default().align(&[Segment::new(0, "Hi.")], &events).unwrap();
    assert_eq!((aligned[0].start_ms(), aligned[0].end_ms()), (0, 1100));
}

/// A stream with boundaries but no words has nothing to close the last caption
#[test]
fn test_align_withBoundariesOnly_shouldReportEndOfSpeech() {
    let segments = vec![Segment::new(0, "A."), Segment::new(1, "B.")];
    let events = vec![TimingEvent::boundary("segment_0", 0), TimingEvent::boundary("segment_1", 400)];

    match MarkAligner::default().align(&segments, &events) {
        Err(SyncError::MissingBoundary { marker }) => assert_eq!(marker, END_OF_SPEECH_MARKER),
        other => panic!("expected MissingBoundary, got {:?}", other),
    }
}

/// An empty stream parses to no events
#[test]
fn test_parseMarks_withBlankStream_shouldYieldNothing() {
    assert!(parse_marks("").unwrap().is_empty());
    assert!(parse_marks("\n\n  \n").unwrap().is_empty());
}
