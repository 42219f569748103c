//! Reassembles raw session output into discrete lines.

/// How a completed line was terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineBreak {
    /// `\n`
    Lf,
    /// `\r\n`, what a PTY emits.
    CrLf,
}

impl LineBreak {
    pub fn as_str(self) -> &'static str {
        match self {
            LineBreak::Lf => "\n",
            LineBreak::CrLf => "\r\n",
        }
    }
}

/// Append-only line store fed by session output chunks.
///
/// Chunks do not have to line up with line breaks: the unterminated tail of
/// one chunk is carried in [`partial`](Self::partial) and completed by the next.
/// Lines are stored without their break; the break itself is kept in
/// [`breaks`](Self::breaks), so lines, breaks and the partial tail rebuild the
/// received output exactly.
///
/// The read cursor never moves backwards and lines are never mutated once
/// completed. The partial tail can be read before it is completed (a prompt
/// rarely ends in a newline); what was read of it is remembered, so the
/// completed line only yields the text that arrived afterwards.
#[derive(Debug, Default)]
pub struct LineBuffer {
    lines: Vec<String>,
    breaks: Vec<LineBreak>,
    partial: String,
    cursor: usize,
    // Bytes of the line at `cursor` (or of `partial`) already read.
    consumed: usize,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a chunk of output.
    pub fn append(&mut self, chunk: &str) {
        let mut segments = chunk.split('\n');
        if let Some(head) = segments.next() {
            self.partial.push_str(head);
        }
        for segment in segments {
            let mut line = std::mem::replace(&mut self.partial, segment.to_string());
            let line_break = if line.ends_with('\r') {
                line.pop();
                LineBreak::CrLf
            } else {
                LineBreak::Lf
            };
            self.lines.push(line);
            self.breaks.push(line_break);
        }
    }

    /// Whether any completed line has not been taken yet.
    pub fn has_unread(&self) -> bool {
        match self.lines.len() - self.cursor {
            0 => false,
            1 => !self.fully_read(self.cursor),
            _ => true,
        }
    }

    /// Return the next unread completed line and advance the cursor past it.
    ///
    /// If the line was partly read while it was still the partial tail, only
    /// the rest is returned; a line read to its end that way is skipped.
    pub fn take_next(&mut self) -> Option<&str> {
        while self.cursor < self.lines.len() {
            let index = self.cursor;
            let skip = self.fully_read(index);
            let start = self.consumed.min(self.lines[index].len());
            self.consumed = 0;
            self.cursor += 1;
            if !skip {
                return Some(&self.lines[index][start..]);
            }
        }
        None
    }

    /// The not yet read part of the partial tail, once every completed line
    /// has been taken. Does not move the cursor.
    pub fn unread_partial(&self) -> Option<&str> {
        if self.cursor < self.lines.len() {
            return None;
        }
        let rest = self.partial.get(self.consumed..)?;
        (!rest.is_empty()).then_some(rest)
    }

    /// Mark everything received so far on the partial tail as read.
    pub fn consume_partial(&mut self) {
        if self.cursor == self.lines.len() {
            self.consumed = self.partial.len();
        }
    }

    /// All completed lines, read or not, without their breaks.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// The break that ended each line in [`lines`](Self::lines).
    pub fn breaks(&self) -> &[LineBreak] {
        &self.breaks
    }

    /// Output received after the last line break.
    pub fn partial(&self) -> &str {
        &self.partial
    }

    /// Index of the next unread line.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    fn fully_read(&self, index: usize) -> bool {
        index == self.cursor && self.consumed > 0 && self.consumed >= self.lines[index].len()
    }
}
