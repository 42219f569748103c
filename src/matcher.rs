//! Forward-only pattern matching over a [`LineBuffer`].

use crate::line_buffer::LineBuffer;
use regex::Regex;

/// A line that satisfied a wait pattern, with its capture groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Found {
    line: String,
    groups: Vec<Option<String>>,
}

impl Found {
    fn from_captures(line: &str, captures: regex::Captures<'_>) -> Self {
        Self {
            line: line.to_string(),
            groups: captures
                .iter()
                .map(|group| group.map(|m| m.as_str().to_string()))
                .collect(),
        }
    }

    /// The line text the pattern was matched against.
    pub fn line(&self) -> &str {
        &self.line
    }

    /// The matched text (group 0).
    pub fn matched(&self) -> &str {
        self.get(0).unwrap_or_default()
    }

    /// Capture group `index`, if it participated in the match.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.groups.get(index)?.as_deref()
    }

    /// Number of groups including group 0.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Consume unread lines until one matches `pattern`.
///
/// Lines passed over are gone for good: a later call never sees them again.
/// When the completed lines run out, the unread part of the unterminated
/// last line is tried too and consumed only if it matches.
/// Returns `None` when nothing unread matches.
pub fn find(buffer: &mut LineBuffer, pattern: &Regex) -> Option<Found> {
    while let Some(line) = buffer.take_next() {
        if let Some(captures) = pattern.captures(line) {
            return Some(Found::from_captures(line, captures));
        }
    }
    let partial = buffer.unread_partial()?;
    let found = Found::from_captures(partial, pattern.captures(partial)?);
    buffer.consume_partial();
    Some(found)
}

/// Render a pattern the way failure messages show it.
pub(crate) fn display_pattern(pattern: &Regex) -> String {
    format!("/{}/", pattern.as_str())
}
