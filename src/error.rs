//! Error types for ttychain interactions.

use thiserror::Error;

/// Failure outcome of an [`Interaction`](crate::Interaction) or one of its parts.
#[derive(Debug, Error)]
pub enum Error {
    /// A wait step did not see its pattern before the timeout ran out.
    /// `pattern` is rendered in `/regex/` form.
    #[error("Waiting '{pattern}' was too long")]
    WaitTimeout { pattern: String },

    /// The session exited while the script still had steps left.
    #[error("Session exited with code {code} before the script finished")]
    UnexpectedExit { code: u32 },

    /// The session event stream ended without an exit notification.
    #[error("Session closed without reporting an exit code")]
    SessionClosed,

    /// `take_next` was called on a chain with no actions left.
    #[error("Action chain is exhausted")]
    ChainExhausted,

    /// The interaction options cannot drive a chain.
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    /// PTY setup or control failed
    #[error("PTY error: {0}")]
    Pty(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
