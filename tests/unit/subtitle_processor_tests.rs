/*!
 * Tests for SRT rendering, writing and parsing
 */

use anyhow::Result;
use std::fs;
use std::time::Duration;

use narrasync::aligner::AlignedSegment;
use narrasync::errors::SyncError;
use narrasync::segmenter::Segment;
use narrasync::subtitle_processor::{SubtitleEntry, SubtitleFile, SubtitleWriter};
use crate::common;

fn aligned(index: usize, text: &str, start_ms: u64, end_ms: u64) -> AlignedSegment {
    AlignedSegment {
        segment: Segment::new(index, text),
        start: Duration::from_millis(start_ms),
        end: Duration::from_millis(end_ms),
    }
}

/// Test timestamp formatting across unit boundaries
#[test]
fn test_format_timestamp_withVariousValues_shouldZeroPad() {
    assert_eq!(SubtitleEntry::format_timestamp(0), "00:00:00,000");
    assert_eq!(SubtitleEntry::format_timestamp(1_200), "00:00:01,200");
    assert_eq!(SubtitleEntry::format_timestamp(61_001), "00:01:01,001");
    assert_eq!(SubtitleEntry::format_timestamp(3_723_456), "01:02:03,456");
}

/// Test timestamp parsing
#[test]
fn test_parse_timestamp_withValidAndInvalidInput_shouldParseOrFail() {
    assert_eq!(SubtitleEntry::parse_timestamp("01:02:03,456").unwrap(), 3_723_456);
    assert_eq!(SubtitleEntry::parse_timestamp("00:00:02,800").unwrap(), 2_800);
    assert!(SubtitleEntry::parse_timestamp("01:02:03").is_err());
    assert!(SubtitleEntry::parse_timestamp("aa:bb:cc,ddd").is_err());
}

/// Entries are numbered from 1 in segment order
#[test]
fn test_from_aligned_withSegments_shouldNumberFromOne() -> Result<()> {
    let file = SubtitleFile::from_aligned(&[aligned(0, "Hello world.", 0, 1200), aligned(1, "Bye.", 1200, 2800)])?;

    assert_eq!(file.len(), 2);
    assert_eq!(file.entries[0].seq_num, 1);
    assert_eq!(file.entries[1].seq_num, 2);
    assert_eq!(file.total_span_ms(), 2800);
    Ok(())
}

/// An interval that does not move forward is rejected
#[test]
fn test_from_aligned_withZeroLengthInterval_shouldFail() {
    let result = SubtitleFile::from_aligned(&[aligned(0, "A.", 0, 10), aligned(1, "B.", 500, 500)]);

    match result {
        Err(SyncError::InvalidInterval { index, start_ms, end_ms }) => {
            assert_eq!((index, start_ms, end_ms), (2, 500, 500));
        }
        other => panic!("expected InvalidInterval, got {:?}", other),
    }
}

/// Writing then parsing gives back the same blocks
#[test]
fn test_writer_withAlignedSegments_shouldProduceParseableFile() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("nested").join("talk.srt");

    let written = SubtitleWriter::write(&[aligned(0, "Hello world.", 0, 1200), aligned(1, "Bye.", 1200, 2800)], &path)?;
    assert_eq!(written, path);

    let content = fs::read_to_string(&path)?;
    assert_eq!(
        content,
        "1\n00:00:00,000 --> 00:00:01,200\nHello world.\n\n2\n00:00:01,200 --> 00:00:02,800\nBye.\n\n"
    );

    let parsed = SubtitleFile::from_srt_file(&path)?;
    assert_eq!(parsed.len(), 2);
    assert_eq!(parsed.entries[1].text, "Bye.");
    assert_eq!(parsed.to_string(), "Blocks: 2\nSpan: 00:00:02,800\n");
    Ok(())
}

/// A staged file is invisible until committed
#[test]
fn test_stage_beforeCommit_shouldLeaveDestinationUntouched() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("talk.srt");
    fs::write(&path, "old")?;

    let staged = SubtitleWriter::stage(&[aligned(0, "New.", 0, 500)], &path)?;
    assert_eq!(fs::read_to_string(&path)?, "old");

    staged.commit()?;
    assert!(fs::read_to_string(&path)?.contains("New."));
    Ok(())
}

/// Dropping a staged file removes its temp file
#[test]
fn test_stage_whenDropped_shouldLeaveNoFiles() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("talk.srt");

    let staged = SubtitleWriter::stage(&[aligned(0, "New.", 0, 500)], &path)?;
    drop(staged);

    assert!(!path.exists());
    assert_eq!(fs::read_dir(temp_dir.path())?.count(), 0);
    Ok(())
}

/// Parsing skips broken blocks and keeps multi-line text
#[test]
fn test_parse_srt_string_withMixedBlocks_shouldKeepValidOnes() -> Result<()> {
    let content = "\u{feff}1\n00:00:01,000 --> 00:00:02,000\nFirst line\nsecond line\n\n\
                   2\n00:00:05,000 --> 00:00:04,000\nBackwards\n\n\
                   3\n00:00:06,000 --> 00:00:07,500\nLast\n";

    let entries = SubtitleFile::parse_srt_string(content)?;
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].text, "First line\nsecond line");
    assert_eq!(entries[1].seq_num, 3);
    assert_eq!(entries[1].end_time_ms, 7_500);
    Ok(())
}

/// Content without any block is an error
#[test]
fn test_parse_srt_string_withNoBlocks_shouldFail() {
    assert!(SubtitleFile::parse_srt_string("just some text\n").is_err());
    assert!(SubtitleFile::parse_srt_string("").is_err());
}
