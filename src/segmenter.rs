/*!
 * Narration segmentation.
 *
 * Turns raw narration text into caption-sized segments. Normalization runs as an
 * ordered list of small rules so each step can be tested on its own:
 * 1. expand escaped newlines
 * 2. strip emphasis delimiters (`**`, `*`, `` ` ``)
 * 3. terminate every line as a sentence and join the lines
 *
 * Segments are then packed greedily, sentence by sentence.
 */

use log::debug;

use crate::errors::SyncError;

/// Default caption budget in characters
pub const DEFAULT_MAX_CHUNK_CHARS: usize = 12;

/// Emphasis delimiters, stripped in this order
const EMPHASIS_DELIMITERS: [&str; 3] = ["**", "*", "`"];

/// One caption-sized piece of narration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// 0-based position across the whole document
    pub index: usize,

    /// Caption text
    pub text: String,
}

impl Segment {
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self { index, text: text.into() }
    }
}

/// Greedy caption segmenter
#[derive(Debug, Clone)]
pub struct TextSegmenter {
    max_chunk_chars: usize,
}

impl Default for TextSegmenter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CHUNK_CHARS)
    }
}

impl TextSegmenter {
    /// Create a segmenter; a zero budget is raised to one character
    pub fn new(max_chunk_chars: usize) -> Self {
        Self { max_chunk_chars: max_chunk_chars.max(1) }
    }

    pub fn max_chunk_chars(&self) -> usize {
        self.max_chunk_chars
    }

    /// Split narration into ordered segments
    ///
    /// # Arguments
    /// * `text` - Raw narration, possibly with markdown emphasis and escaped newlines
    ///
    /// # Returns
    /// * Non-empty segments with global, sequential indices
    /// * `SyncError::EmptyInput` when nothing speakable remains
    pub fn segment(&self, text: &str) -> Result<Vec<Segment>, SyncError> {
        let normalized = normalize(text);
        if normalized.trim().is_empty() {
            return Err(SyncError::EmptyInput);
        }

        let mut chunks = Vec::new();
        for sentence in split_sentences(&normalized) {
            self.pack_sentence(sentence, &mut chunks);
        }

        if chunks.is_empty() {
            return Err(SyncError::EmptyInput);
        }

        debug!("Split narration into {} segments (budget {} chars)", chunks.len(), self.max_chunk_chars);

        Ok(chunks
            .into_iter()
            .enumerate()
            .map(|(index, text)| Segment { index, text })
            .collect())
    }

    /// Pack the words of one sentence into chunks
    ///
    /// A chunk's rendered length (words plus single separators) never exceeds the budget,
    /// except for a lone word that is longer than the budget by itself.
    fn pack_sentence(&self, sentence: &str, chunks: &mut Vec<String>) {
        let mut chunk: Vec<&str> = Vec::new();
        let mut chunk_chars = 0;

        for word in sentence.split_whitespace() {
            let word_chars = word.chars().count();

            if word_chars > self.max_chunk_chars {
                if !chunk.is_empty() {
                    chunks.push(chunk.join(" "));
                    chunk.clear();
                    chunk_chars = 0;
                }
                chunks.push(word.to_string());
                continue;
            }

            // chunk.len() separators once this word is appended
            if !chunk.is_empty() && chunk_chars + word_chars + chunk.len() > self.max_chunk_chars {
                chunks.push(chunk.join(" "));
                chunk.clear();
                chunk_chars = 0;
            }

            chunk.push(word);
            chunk_chars += word_chars;
        }

        if !chunk.is_empty() {
            chunks.push(chunk.join(" "));
        }
    }
}

/// Split narration with the given budget
pub fn segment(text: &str, max_chunk_chars: usize) -> Result<Vec<Segment>, SyncError> {
    TextSegmenter::new(max_chunk_chars).segment(text)
}

/// Apply every normalization rule in order
pub fn normalize(text: &str) -> String {
    let text = expand_escaped_newlines(text);
    let text = strip_emphasis(&text);
    terminate_sentences(&text)
}

/// Replace literal `\n` escape sequences with real newlines
pub fn expand_escaped_newlines(text: &str) -> String {
    text.replace("\\n\\n", "\n").replace("\\n", "\n")
}

/// Remove paired emphasis delimiters, keeping the text between them
pub fn strip_emphasis(text: &str) -> String {
    EMPHASIS_DELIMITERS
        .iter()
        .fold(text.to_string(), |acc, delimiter| strip_delimited(&acc, delimiter))
}

/// Remove one kind of delimiter pair
///
/// A pair closes at the nearest following delimiter on the same line. An opening
/// delimiter with no partner on its line is kept as-is.
fn strip_delimited(text: &str, delimiter: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find(delimiter) {
        let inner_start = open + delimiter.len();
        let after_open = &rest[inner_start..];

        match after_open.find(delimiter) {
            Some(close) if !after_open[..close].contains('\n') => {
                out.push_str(&rest[..open]);
                out.push_str(&after_open[..close]);
                rest = &after_open[close + delimiter.len()..];
            }
            _ => {
                out.push_str(&rest[..inner_start]);
                rest = after_open;
            }
        }
    }

    out.push_str(rest);
    out
}

/// Trim every line, end it with terminal punctuation, and join with spaces
pub fn terminate_sentences(text: &str) -> String {
    text.split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            if line.ends_with(['.', '!', '?']) {
                line.to_string()
            } else {
                format!("{}.", line)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Break text after `.`, `!` or `?` followed by whitespace
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut previous: Option<char> = None;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if c.is_whitespace() && matches!(previous, Some('.' | '!' | '?')) {
            sentences.push(&text[start..i]);
            while chars.peek().is_some_and(|&(_, next)| next.is_whitespace()) {
                chars.next();
            }
            start = chars.peek().map_or(text.len(), |&(j, _)| j);
            previous = None;
            continue;
        }
        previous = Some(c);
    }

    if start < text.len() {
        sentences.push(&text[start..]);
    }

    sentences.retain(|s| !s.trim().is_empty());
    sentences
}
