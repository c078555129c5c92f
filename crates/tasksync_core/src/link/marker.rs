//! Link marker micro-format.
//!
//! A marker is `<label> <value>` embedded in a free-text field. Target notes
//! carry a [`MarkerLabel::Source`] marker, source remarks carry a
//! [`MarkerLabel::Target`] marker.
//!
//! # Invariants
//! - The value is the text after the label, horizontal whitespace skipped, up
//!   to the next line break or end of string, trailing whitespace trimmed.
//! - The first marker in a field is authoritative.
//! - `parse(format(value)) == value` for values without line breaks or
//!   surrounding whitespace.

use crate::model::task::{SourceId, TargetId};
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const SOURCE_MARKER_LABEL: &str = "Source Task ID:";
pub const TARGET_MARKER_LABEL: &str = "Target Task ID:";

static SOURCE_MARKER_RE: Lazy<Regex> = Lazy::new(|| marker_regex(SOURCE_MARKER_LABEL));
static TARGET_MARKER_RE: Lazy<Regex> = Lazy::new(|| marker_regex(TARGET_MARKER_LABEL));

fn marker_regex(label: &str) -> Regex {
    Regex::new(&format!(r"{}[ \t]*([^\r\n]*)", regex::escape(label)))
        .expect("valid marker regex")
}

/// Which identifier a marker encodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerLabel {
    /// Source identifier, written into target notes.
    Source,
    /// Target identifier, written into source remarks.
    Target,
}

impl MarkerLabel {
    pub fn label(self) -> &'static str {
        match self {
            Self::Source => SOURCE_MARKER_LABEL,
            Self::Target => TARGET_MARKER_LABEL,
        }
    }

    fn regex(self) -> &'static Regex {
        match self {
            Self::Source => &SOURCE_MARKER_RE,
            Self::Target => &TARGET_MARKER_RE,
        }
    }
}

/// Marker parse failure. Never fatal: callers treat it as "no link".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkParseError {
    /// The field carries no marker label at all.
    MissingLabel(MarkerLabel),
    /// The label is present but no value follows it on the same line.
    EmptyValue(MarkerLabel),
}

impl Display for LinkParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingLabel(label) => write!(f, "marker `{}` not found", label.label()),
            Self::EmptyValue(label) => write!(f, "marker `{}` has no value", label.label()),
        }
    }
}

impl Error for LinkParseError {}

/// Extracts the first marker value for `label` from `text`.
pub fn parse_marker(text: &str, label: MarkerLabel) -> Result<&str, LinkParseError> {
    let captures = label
        .regex()
        .captures(text)
        .ok_or(LinkParseError::MissingLabel(label))?;
    let value = captures.get(1).map_or("", |m| m.as_str()).trim_end();
    if value.is_empty() {
        return Err(LinkParseError::EmptyValue(label));
    }
    Ok(value)
}

/// Renders one marker line.
pub fn format_marker(label: MarkerLabel, value: &str) -> String {
    format!("{} {}", label.label(), value)
}

/// Source id encoded in a target task's notes.
pub fn parse_source_id(notes: &str) -> Result<SourceId, LinkParseError> {
    parse_marker(notes, MarkerLabel::Source).map(SourceId::from)
}

/// Target id encoded in a source record's remark.
pub fn parse_target_id(remark: &str) -> Result<TargetId, LinkParseError> {
    parse_marker(remark, MarkerLabel::Target).map(TargetId::from)
}

pub fn source_marker(source_id: &SourceId) -> String {
    format_marker(MarkerLabel::Source, source_id.as_str())
}

pub fn target_marker(target_id: &TargetId) -> String {
    format_marker(MarkerLabel::Target, target_id.as_str())
}

/// Replaces the first source marker in `notes` with one for `source_id`,
/// appending a marker line when none exists. Other text is preserved.
pub fn rewrite_source_marker(notes: &str, source_id: &SourceId) -> String {
    let marker = source_marker(source_id);
    if let Some(found) = MarkerLabel::Source.regex().find(notes) {
        let mut rewritten = String::with_capacity(notes.len() + marker.len());
        rewritten.push_str(&notes[..found.start()]);
        rewritten.push_str(&marker);
        rewritten.push_str(&notes[found.end()..]);
        return rewritten;
    }

    if notes.trim().is_empty() {
        marker
    } else {
        format!("{}\n{marker}", notes.trim_end())
    }
}

#[cfg(test)]
mod tests {
    use super::{
        format_marker, parse_marker, parse_source_id, parse_target_id, rewrite_source_marker,
        LinkParseError, MarkerLabel,
    };
    use crate::model::task::SourceId;

    #[test]
    fn parses_value_up_to_line_break() {
        let notes = "Source Task ID: abc-123\nbring receipts";
        assert_eq!(parse_marker(notes, MarkerLabel::Source), Ok("abc-123"));

        let crlf = "Source Task ID:abc-123\r\nmore";
        assert_eq!(parse_marker(crlf, MarkerLabel::Source), Ok("abc-123"));
    }

    #[test]
    fn marker_may_follow_other_text() {
        let remark = "moved from inbox\nTarget Task ID:   t-9   ";
        assert_eq!(parse_target_id(remark).unwrap().as_str(), "t-9");
    }

    #[test]
    fn missing_and_empty_markers_are_distinct_errors() {
        assert_eq!(
            parse_source_id("just some notes"),
            Err(LinkParseError::MissingLabel(MarkerLabel::Source))
        );
        assert_eq!(
            parse_source_id("Source Task ID:   \nnext line"),
            Err(LinkParseError::EmptyValue(MarkerLabel::Source))
        );
        assert_eq!(
            parse_source_id(""),
            Err(LinkParseError::MissingLabel(MarkerLabel::Source))
        );
    }

    #[test]
    fn labels_do_not_cross_match() {
        assert!(parse_source_id("Target Task ID: t-1").is_err());
        assert!(parse_target_id("Source Task ID: s-1").is_err());
    }

    #[test]
    fn first_marker_wins() {
        let notes = "Source Task ID: first\nSource Task ID: second";
        assert_eq!(parse_source_id(notes).unwrap().as_str(), "first");
    }

    #[test]
    fn format_then_parse_returns_value() {
        for value in ["a", "0c9e6f1e-54a4-4b6d-9a55-4a0b1b1c2d3e", "MTIzNDU2Nzg5"] {
            let text = format_marker(MarkerLabel::Target, value);
            assert_eq!(parse_marker(&text, MarkerLabel::Target), Ok(value));
        }
    }

    #[test]
    fn rewrite_replaces_only_the_marker_line() {
        let source_id = SourceId::new("s-2");
        assert_eq!(
            rewrite_source_marker("keep this\nSource Task ID: \nand this", &source_id),
            "keep this\nSource Task ID: s-2\nand this"
        );
        assert_eq!(
            rewrite_source_marker("free text only\n", &source_id),
            "free text only\nSource Task ID: s-2"
        );
        assert_eq!(rewrite_source_marker("", &source_id), "Source Task ID: s-2");
    }
}
