/*!
 * Speech markup construction.
 *
 * Wraps segments into one SSML document, placing a `<mark name="segment_<i>"/>`
 * boundary marker in front of every segment. The synthesizer echoes those markers
 * back as timing events, which is how segments are timed later on.
 */

use crate::segmenter::Segment;

/// Prefix of every boundary marker name
pub const MARKER_PREFIX: &str = "segment_";

/// Boundary marker name for a segment index
pub fn marker_name(index: usize) -> String {
    format!("{}{}", MARKER_PREFIX, index)
}

/// Escape the characters SSML reserves
pub fn escape_markup(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// A complete, immutable SSML payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupDocument {
    ssml: String,
    segment_count: usize,
}

impl MarkupDocument {
    pub fn as_str(&self) -> &str {
        &self.ssml
    }

    /// Number of boundary markers in the document
    pub fn segment_count(&self) -> usize {
        self.segment_count
    }

    /// Marker names in index order
    pub fn marker_names(&self) -> impl Iterator<Item = String> + '_ {
        (0..self.segment_count).map(marker_name)
    }
}

/// Builds the SSML payload shared by both synthesis jobs
pub struct MarkupBuilder;

impl MarkupBuilder {
    /// Build the markup for segments already in index order
    pub fn build(segments: &[Segment]) -> MarkupDocument {
        let body_len: usize = segments.iter().map(|s| s.text.len() + 32).sum();
        let mut ssml = String::with_capacity(body_len + 16);

        ssml.push_str("<speak>");
        for segment in segments {
            ssml.push_str("<mark name=\"");
            ssml.push_str(&marker_name(segment.index));
            ssml.push_str("\"/>");
            ssml.push_str(&escape_markup(&segment.text));
            ssml.push(' ');
        }
        ssml.push_str("</speak>");

        MarkupDocument {
            ssml,
            segment_count: segments.len(),
        }
    }
}
