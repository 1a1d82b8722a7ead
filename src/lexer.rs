//! Lexical analysis of a raw command line into positioned segments.
//!
//! A [`Segment`] is one lexical unit sliced directly from the input,
//! including surrounding quote characters when quoted. Extraction is done by
//! one of two interchangeable strategies: [`DefaultSegmentStrategy`] for bare
//! tokens and [`QuotedSegmentStrategy`] for quoted ones. The parser picks the
//! strategy based on the next significant character.

use thiserror::Error;

const QUOTE: char = '"';

/// One lexical token with its value and starting position.
///
/// Offsets count characters, not bytes. The value always has length >= 1 and
/// is never mutated after extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    value: String,
    begin_offset: usize,
}

impl Segment {
    fn new(value: String, begin_offset: usize) -> Self {
        Segment {
            value,
            begin_offset,
        }
    }

    /// The literal text of the token, quotes included for quoted segments.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Character offset of the first character of the token.
    pub fn begin_offset(&self) -> usize {
        self.begin_offset
    }

    /// Character offset one past the last character of the token.
    pub fn end_offset(&self) -> usize {
        self.begin_offset + self.value.chars().count()
    }
}

/// Error raised when no segment can be extracted at the current position.
///
/// Carries the character offset of the offending position and the input text
/// that was handed to the strategy, verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid segment at offset {error_offset} in {input:?}")]
pub struct SegmentError {
    /// Character offset of the offending position.
    pub error_offset: usize,
    /// The input the strategy was extracting from.
    pub input: String,
}

/// A segment extraction strategy.
///
/// `remaining` is the not-yet-consumed tail of the input and `offset` is the
/// character position of its first character within the overall input.
pub trait SegmentStrategy {
    fn extract_segment(&self, offset: usize, remaining: &str) -> Result<Segment, SegmentError>;
}

/// Extracts a bare token: everything up to the next whitespace or
/// end-of-input.
///
/// Quote characters are illegal here. A leading quote means the caller should
/// have chosen [`QuotedSegmentStrategy`]; a quote anywhere later inside the
/// token has no valid meaning. Both cases fail with a [`SegmentError`]
/// pointing at the quote.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultSegmentStrategy;

impl SegmentStrategy for DefaultSegmentStrategy {
    fn extract_segment(&self, offset: usize, remaining: &str) -> Result<Segment, SegmentError> {
        let mut value = String::new();

        for (position, ch) in remaining.chars().enumerate() {
            if ch.is_whitespace() {
                break;
            }
            if ch == QUOTE {
                return Err(SegmentError {
                    error_offset: offset + position,
                    input: remaining.to_owned(),
                });
            }
            value.push(ch);
        }

        Ok(Segment::new(value, offset))
    }
}

/// Extracts a quoted token: from the opening quote through the matching
/// closing quote, both retained in the value.
///
/// A quote only closes the segment when it is immediately followed by
/// whitespace or end-of-input; any other quote is ordinary content, so
/// embedded spaces survive inside one segment. Running off the end of the
/// input without a valid closing quote fails with an error offset one past
/// the last character.
#[derive(Debug, Default, Clone, Copy)]
pub struct QuotedSegmentStrategy;

impl SegmentStrategy for QuotedSegmentStrategy {
    fn extract_segment(&self, offset: usize, remaining: &str) -> Result<Segment, SegmentError> {
        let chars: Vec<char> = remaining.chars().collect();

        if chars.first() != Some(&QUOTE) {
            return Err(SegmentError {
                error_offset: offset,
                input: remaining.to_owned(),
            });
        }

        for position in 1..chars.len() {
            if chars[position] != QUOTE {
                continue;
            }
            let at_boundary = chars
                .get(position + 1)
                .is_none_or(|next| next.is_whitespace());
            if at_boundary {
                let value: String = chars[..=position].iter().collect();
                return Ok(Segment::new(value, offset));
            }
        }

        Err(SegmentError {
            error_offset: chars.len(),
            input: remaining.to_owned(),
        })
    }
}
