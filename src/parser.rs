//! Turns a raw command line into a command name plus an ordered list of
//! decoded `(name, value)` argument pairs.
//!
//! The parser walks the input, skipping whitespace and handing the remainder
//! to a segment extraction strategy: [`QuotedSegmentStrategy`] when the next
//! significant character is a quote, [`DefaultSegmentStrategy`] otherwise.
//! Extracted segments are then paired up: a dash-prefixed token names an
//! argument and the following token (when present and not itself a flag)
//! supplies its value.

use crate::lexer::{
    DefaultSegmentStrategy, QuotedSegmentStrategy, Segment, SegmentError, SegmentStrategy,
};

/// A decoded argument pair produced by the parser.
///
/// The sequence returned by [`parse_arguments`] preserves the order of
/// appearance on the command line; mapping is by name, so the order only
/// matters for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argument {
    pub name: String,
    pub value: String,
}

impl Argument {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Argument {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Returns the first whitespace-delimited token of `input`, unquoted: the
/// command name.
pub fn extract_command_name(input: &str) -> String {
    let token = input.split_whitespace().next().unwrap_or_default();
    unquote(token).to_owned()
}

/// Decodes the argument pairs of a full command line, skipping the leading
/// command name.
pub fn extract_arguments(input: &str) -> Result<Vec<Argument>, SegmentError> {
    let trimmed = input.trim_start();
    let rest = match trimmed.find(char::is_whitespace) {
        Some(end_of_name) => &trimmed[end_of_name..],
        None => "",
    };
    let consumed = input.chars().count() - rest.chars().count();

    split_segments(rest, consumed).map(pair_arguments)
}

/// Decodes argument pairs from input that carries no command name.
pub fn parse_arguments(input: &str) -> Result<Vec<Argument>, SegmentError> {
    split_segments(input, 0).map(pair_arguments)
}

fn split_segments(input: &str, base_offset: usize) -> Result<Vec<Segment>, SegmentError> {
    let mut segments = Vec::new();
    let mut byte_pos = 0;
    let mut char_pos = base_offset;

    while byte_pos < input.len() {
        let remaining = &input[byte_pos..];
        let Some(next) = remaining.chars().next() else {
            break;
        };
        if next.is_whitespace() {
            byte_pos += next.len_utf8();
            char_pos += 1;
            continue;
        }

        let strategy: &dyn SegmentStrategy = if next == '"' {
            &QuotedSegmentStrategy
        } else {
            &DefaultSegmentStrategy
        };
        let segment = strategy.extract_segment(char_pos, remaining)?;

        char_pos += segment.value().chars().count();
        byte_pos += segment.value().len();
        segments.push(segment);
    }

    Ok(segments)
}

/// Pairs a flat segment sequence into named arguments.
///
/// A flag immediately followed by another flag, or by end-of-input, yields an
/// argument with an empty value; boolean mapping turns that into `true`. A
/// token with no preceding flag has no name to attach to and is skipped.
fn pair_arguments(segments: Vec<Segment>) -> Vec<Argument> {
    let mut arguments = Vec::new();
    let mut pending: Option<String> = None;

    for segment in segments {
        if is_flag(segment.value()) {
            if let Some(name) = pending.take() {
                arguments.push(Argument::new(name, ""));
            }
            pending = Some(strip_dashes(segment.value()).to_owned());
        } else if let Some(name) = pending.take() {
            arguments.push(Argument::new(name, unquote(segment.value())));
        }
    }
    if let Some(name) = pending {
        arguments.push(Argument::new(name, ""));
    }

    arguments
}

fn is_flag(value: &str) -> bool {
    value.starts_with('-')
}

fn strip_dashes(value: &str) -> &str {
    value.trim_start_matches('-')
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(value)
}
