//! # ttychain
//!
//! Drive interactive programs through scripted wait/send chains.
//!
//! An [`Interaction`] launches a program inside a shell running in a PTY, then
//! works through its actions one at a time: a *wait* holds the chain until an
//! output line matches a regex, a *send* writes input. The interaction
//! succeeds with the session's exit code once every action ran, and fails as
//! soon as a wait times out or the session exits early.
//!
//! ## Quick start
//!
//! ```no_run
//! use regex::Regex;
//! use ttychain::{Interaction, InteractionOptions};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let code = Interaction::new("python3 -q", InteractionOptions::default())
//!         .wait(Regex::new(r"^>>> ")?)
//!         .send("print(6 * 7)\n")
//!         .wait(Regex::new(r"^42$")?)
//!         .start()
//!         .await?;
//!     println!("exited with {code}");
//!     Ok(())
//! }
//! ```
//!
//! ## Matching
//!
//! Output is split into lines and each wait consumes lines front to back up to
//! and including the first line its pattern matches. Lines a wait passes over
//! are never offered to a later wait.
//!
//! Once every completed line has been read, a wait also tries the
//! unterminated last line, so prompts like `>>> ` or `Password: ` match
//! without a trailing newline. A match there consumes what has arrived of
//! that line so far; when the line is later completed, only the text after
//! the matched part is offered again.
//!
//! A wait is checked every [`InteractionOptions::poll_interval`] and fails
//! with [`Error::WaitTimeout`] once it has used up
//! [`InteractionOptions::timeout`] worth of intervals without a match.
//!
//! ## Deferred input and match callbacks
//!
//! ```no_run
//! use regex::Regex;
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use ttychain::{Interaction, InteractionOptions};
//!
//! # async fn run() -> ttychain::Result<u32> {
//! let token = Rc::new(RefCell::new(String::new()));
//! let sink = token.clone();
//!
//! Interaction::new("./login", InteractionOptions::default())
//!     .wait_with(Regex::new(r"token: (\w+)").unwrap(), move |found| {
//!         *sink.borrow_mut() = found.get(1).unwrap_or_default().to_string();
//!     })
//!     .send_with(move || format!("{}\n", token.borrow()))
//!     .start()
//!     .await
//! # }
//! ```
//!
//! ## Scripts
//!
//! [`parse_str`] and [`parse_file`] read the line-oriented script format used
//! by the `ttychain` binary:
//!
//! | Command | Description |
//! |---------|-------------|
//! | `wait "regex"` | Wait until an output line matches `regex` |
//! | `send "text"` | Write `text` as-is (`\n`, `\r`, `\t` escapes allowed) |
//! | `sendline "text"` | Write `text` followed by a newline |
//! | `# comment` | Full-line or inline comment |
//!
//! ## Custom sessions
//!
//! Anything implementing [`Session`] can be driven with
//! [`Interaction::start_with`], paired with the receiver its
//! [`SessionEvent`]s arrive on.

pub mod action;
pub mod engine;
pub mod error;
pub mod line_buffer;
pub mod matcher;
pub mod parser;
pub(crate) mod pty;
pub(crate) mod pty_reader;
pub mod session;

pub use action::{Action, ActionChain, Input};
pub use engine::{Interaction, InteractionOptions};
pub use error::{Error, Result};
pub use line_buffer::{LineBreak, LineBuffer};
pub use matcher::Found;
pub use parser::{parse_duration, parse_file, parse_str};
pub use pty::PtySession;
pub use session::{Session, SessionEvent};
