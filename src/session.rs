//! The capability an [`Interaction`](crate::Interaction) drives.
//!
//! A session is split in two halves: a [`Session`] handle the engine writes to
//! and destroys, and a stream of [`SessionEvent`]s the engine listens on.
//! [`PtySession`](crate::PtySession) is the real implementation; tests plug in
//! scripted fakes.

use crate::error::Result;

/// Something the session reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Output text. Chunk boundaries do not follow line breaks.
    Data(String),
    /// The process terminated. Sent once, as the last event.
    Exit(u32),
}

/// Control half of an interactive session.
pub trait Session {
    /// Feed input to the running process.
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Force-terminate the process. The exit is still reported through the
    /// event stream.
    fn destroy(&mut self) -> Result<()>;
}
