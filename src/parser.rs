//! Script parser for ttychain script files.
//!
//! The top-level entry points are [`parse_str`] and [`parse_file`].

use crate::action::Action;
use anyhow::{Context as _, Result, anyhow};
use regex::Regex;
use std::path::Path;
use std::time::Duration;

/// Parse a script from a string slice and return its actions in order.
///
/// Lines that are empty or start with `#` are ignored. Inline comments (` # …`)
/// are stripped while preserving `#` characters inside quoted strings.
///
/// # Errors
///
/// Returns an error if any line contains an unknown command, a malformed
/// argument, an invalid regex, or an unclosed quoted string.
///
/// # Example
///
/// ```
/// use ttychain::parse_str;
///
/// let actions = parse_str("wait \"^ready$\"\nsendline \"go\"\n").unwrap();
/// assert_eq!(actions.len(), 2);
/// ```
pub fn parse_str(content: &str) -> Result<Vec<Action>> {
    let mut actions = Vec::new();
    for (line_num, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = strip_inline_comment(line);
        let action = parse_line(line)
            .with_context(|| format!("Failed to parse line {}: {}", line_num + 1, line))?;
        actions.push(action);
    }
    Ok(actions)
}

/// Parse a script from a file.
///
/// Reads the entire file into memory and delegates to [`parse_str`].
///
/// # Errors
///
/// Returns an error if the file cannot be read or if the script is malformed.
pub fn parse_file(path: impl AsRef<Path>) -> Result<Vec<Action>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read script file: {}", path.display()))?;
    parse_str(&content)
}

type ParseFn = fn(&str) -> Result<Action>;

static REGISTRY: &[(&str, ParseFn)] = &[
    (Action::WAIT, parse_wait),
    (Action::SEND, parse_send),
    ("sendline", parse_sendline),
];

/// Dispatch a single non-empty, non-comment line to the matching command's parser.
fn parse_line(line: &str) -> Result<Action> {
    let (name, args) = line.split_once(' ').unwrap_or((line, ""));
    REGISTRY
        .iter()
        .find(|(cmd_name, _)| *cmd_name == name)
        .map(|(_, parse)| parse(args))
        .unwrap_or_else(|| Err(anyhow!("Unknown command: {}", name)))
}

/// `wait "<regex>"`
fn parse_wait(args: &str) -> Result<Action> {
    let source = parse_quoted_string(args)?;
    let pattern =
        Regex::new(&source).with_context(|| format!("Invalid wait pattern: {}", source))?;
    Ok(Action::wait(pattern))
}

/// `send "<text>"`, written verbatim.
fn parse_send(args: &str) -> Result<Action> {
    Ok(Action::send(parse_quoted_string(args)?))
}

/// `sendline "<text>"`, written with a trailing newline.
fn parse_sendline(args: &str) -> Result<Action> {
    let mut text = parse_quoted_string(args)?;
    text.push('\n');
    Ok(Action::send(text))
}

/// Strip inline comments from a line, preserving `#` inside quoted strings.
fn strip_inline_comment(line: &str) -> &str {
    let mut in_quotes = false;
    let mut escaped = false;
    for (i, ch) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        if ch == '\\' {
            escaped = true;
            continue;
        }
        if ch == '"' {
            in_quotes = !in_quotes;
            continue;
        }
        if ch == '#' && !in_quotes {
            return line[..i].trim();
        }
    }
    line
}

/// Parse a duration string: `1s`, `500ms`, `1.5s`.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if let Some(ms_str) = s.strip_suffix("ms") {
        let ms: u64 = ms_str
            .trim()
            .parse()
            .context("Invalid milliseconds value")?;
        Ok(Duration::from_millis(ms))
    } else if let Some(s_str) = s.strip_suffix('s') {
        let secs: f64 = s_str.trim().parse().context("Invalid seconds value")?;
        Duration::try_from_secs_f64(secs).context("Invalid seconds value")
    } else {
        Err(anyhow!("Duration must end with 's' or 'ms', got: {}", s))
    }
}

/// Parse a double-quoted string, processing `\n`, `\r`, `\t`, `\"`, and `\\`.
///
/// Any other backslash sequence is kept as written, so regex escapes like
/// `\d` survive.
pub(crate) fn parse_quoted_string(s: &str) -> Result<String> {
    let s = s.trim();
    let inner = s
        .strip_prefix('"')
        .ok_or_else(|| anyhow!("Expected string to start with '\"'"))?;
    let inner = inner
        .strip_suffix('"')
        .filter(|_| !ends_with_escaped_quote(s))
        .ok_or_else(|| anyhow!("Expected string to end with '\"'"))?;

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    Ok(out)
}

/// Whether the final `"` of `s` is escaped by an odd run of backslashes.
fn ends_with_escaped_quote(s: &str) -> bool {
    let body = &s[..s.len() - 1];
    let backslashes = body.chars().rev().take_while(|&c| c == '\\').count();
    backslashes % 2 == 1
}
