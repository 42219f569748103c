//! Scripted steps and the ordered chain they run from.

use crate::error::{Error, Result};
use crate::matcher::{Found, display_pattern};
use regex::Regex;
use std::fmt;

/// Callback handed the line a wait step matched.
pub type MatchCallback = Box<dyn FnMut(&Found)>;

/// Text a send step writes to the session.
pub enum Input {
    /// Written as-is.
    Text(String),
    /// Called when the step runs, not when it is scripted.
    Producer(Box<dyn FnMut() -> String>),
}

impl Input {
    /// Produce the text to write.
    pub fn resolve(&mut self) -> String {
        match self {
            Input::Text(text) => text.clone(),
            Input::Producer(produce) => produce(),
        }
    }
}

impl fmt::Debug for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Input::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Input::Producer(_) => f.write_str("Producer(..)"),
        }
    }
}

/// One scripted step.
pub enum Action {
    /// Hold the chain until an output line matches `pattern`.
    Wait {
        pattern: Regex,
        on_match: Option<MatchCallback>,
    },
    /// Write input to the session.
    Send(Input),
}

impl Action {
    pub const WAIT: &'static str = "wait";
    pub const SEND: &'static str = "send";

    pub fn wait(pattern: Regex) -> Self {
        Action::Wait {
            pattern,
            on_match: None,
        }
    }

    pub fn send(text: impl Into<String>) -> Self {
        Action::Send(Input::Text(text.into()))
    }

    /// Keyword used in scripts and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Action::Wait { .. } => Self::WAIT,
            Action::Send(_) => Self::SEND,
        }
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Wait { pattern, on_match } => f
                .debug_struct("Wait")
                .field("pattern", &display_pattern(pattern))
                .field("on_match", &on_match.is_some())
                .finish(),
            Action::Send(input) => f.debug_tuple("Send").field(input).finish(),
        }
    }
}

/// Ordered, append-only list of actions with a single read cursor.
///
/// Actions are appended while scripting and taken one by one while running;
/// the two phases never overlap.
#[derive(Debug, Default)]
pub struct ActionChain {
    actions: Vec<Action>,
    cursor: usize,
}

impl ActionChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, action: Action) -> &mut Self {
        self.actions.push(action);
        self
    }

    pub fn has_next(&self) -> bool {
        self.cursor < self.actions.len()
    }

    /// Take the next action, advancing the cursor by one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChainExhausted`] when no action is left.
    pub fn take_next(&mut self) -> Result<&mut Action> {
        let action = self
            .actions
            .get_mut(self.cursor)
            .ok_or(Error::ChainExhausted)?;
        self.cursor += 1;
        Ok(action)
    }

    /// The action most recently returned by [`take_next`](Self::take_next).
    pub fn current_mut(&mut self) -> Option<&mut Action> {
        let index = self.cursor.checked_sub(1)?;
        self.actions.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Number of actions already taken.
    pub fn position(&self) -> usize {
        self.cursor
    }
}
