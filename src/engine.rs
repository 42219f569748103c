use crate::action::{Action, ActionChain, Input};
use crate::error::{Error, Result};
use crate::line_buffer::LineBuffer;
use crate::matcher::{self, Found, display_pattern};
use crate::pty::PtySession;
use crate::session::{Session, SessionEvent};
use regex::Regex;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, trace, warn};

/// Lifecycle of an [`Interaction`]. Leaves `Pending` exactly once.
///
/// Internal to the driver; callers only see the outcome of `start`.
///
/// ```compile_fail
/// use ttychain::engine::State;
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum State {
    Pending,
    /// Every action ran.
    Fulfilled,
    /// A wait timed out or the session could not be driven.
    Rejected,
}

/// Timing and shell settings for an [`Interaction`].
#[derive(Debug, Clone)]
pub struct InteractionOptions {
    /// How long a wait step may stay unmatched, counted in poll intervals.
    pub timeout: Duration,
    /// Delay between match attempts of a wait step.
    pub poll_interval: Duration,
    /// Shell the program invocation is typed into by [`Interaction::start`].
    pub shell: String,
}

impl Default for InteractionOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(2000),
            poll_interval: Duration::from_millis(500),
            shell: "bash".to_string(),
        }
    }
}

impl InteractionOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Reject settings no interaction can run with.
    ///
    /// A zero poll interval would re-poll a pending wait without ever
    /// sleeping, so the timeout could never elapse.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(Error::InvalidOptions(
                "poll interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// What the driver is parked on until the next transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// A send just went out; continue after one scheduler tick.
    Yield,
    /// Try the current wait pattern at `at`. `elapsed` is the poll time this
    /// wait has already used.
    Poll { at: Instant, elapsed: Duration },
    /// Terminal state reached; only the exit notification is left.
    Settled,
}

/// One scripted run against one session.
///
/// Script it with [`wait`](Self::wait) and [`send`](Self::send), then drive it
/// with [`start`](Self::start) or [`start_with`](Self::start_with). Starting
/// consumes the interaction, so it runs at most once.
pub struct Interaction {
    program: String,
    options: InteractionOptions,
    state: State,
    failure: Option<Error>,
    chain: ActionChain,
    buffer: LineBuffer,
}

impl Interaction {
    /// `program` is the line typed into the shell to launch the program.
    pub fn new(program: impl Into<String>, options: InteractionOptions) -> Self {
        Self {
            program: program.into(),
            options,
            state: State::Pending,
            failure: None,
            chain: ActionChain::new(),
            buffer: LineBuffer::new(),
        }
    }

    /// Hold the script until an output line matches `pattern`.
    pub fn wait(self, pattern: Regex) -> Self {
        debug!("Scheduled wait: {}", display_pattern(&pattern));
        self.push(Action::wait(pattern))
    }

    /// Like [`wait`](Self::wait), handing the matched line to `on_match`.
    pub fn wait_with(self, pattern: Regex, on_match: impl FnMut(&Found) + 'static) -> Self {
        debug!("Scheduled wait: {}", display_pattern(&pattern));
        self.push(Action::Wait {
            pattern,
            on_match: Some(Box::new(on_match)),
        })
    }

    /// Write `text` to the session. No newline is added.
    pub fn send(self, text: impl Into<String>) -> Self {
        let text = text.into();
        debug!("Scheduled send: {:?}", text);
        self.push(Action::Send(Input::Text(text)))
    }

    /// Write whatever `produce` returns when the step runs.
    pub fn send_with(self, produce: impl FnMut() -> String + 'static) -> Self {
        debug!("Scheduled send: <deferred>");
        self.push(Action::Send(Input::Producer(Box::new(produce))))
    }

    /// Append an already built action.
    pub fn push(mut self, action: Action) -> Self {
        self.chain.push(action);
        self
    }

    /// Spawn the configured shell in a PTY and run the script against it.
    ///
    /// Resolves with the session's exit code once every action ran, or with
    /// the error that stopped the script.
    pub async fn start(self) -> Result<u32> {
        self.options.validate()?;
        let (session, events) = PtySession::spawn(&self.options.shell, &[])?;
        self.start_with(session, events).await
    }

    /// Run the script against an already spawned session.
    pub async fn start_with<S: Session>(
        mut self,
        mut session: S,
        mut events: UnboundedReceiver<SessionEvent>,
    ) -> Result<u32> {
        if let Err(err) = self.options.validate() {
            destroy(&mut session);
            return Err(err);
        }

        info!(
            "Starting interaction: program='{}' actions={}",
            self.program,
            self.chain.len()
        );

        let launch = format!("{}\n", self.program);
        let mut step = match session.write(launch.as_bytes()) {
            Ok(()) => self.advance(&mut session),
            Err(err) => self.reject(&mut session, err),
        };

        loop {
            tokio::select! {
                biased;

                event = events.recv() => match event {
                    Some(SessionEvent::Data(chunk)) => {
                        trace!("Session output: {:?}", chunk);
                        self.buffer.append(&chunk);
                    }
                    Some(SessionEvent::Exit(code)) => return self.settle(code),
                    None => {
                        warn!("Session event stream closed without an exit code");
                        return Err(Error::SessionClosed);
                    }
                },

                () = wake(step) => {
                    step = self.resume(step, &mut session);
                }
            }
        }
    }

    /// Run the next action, or fulfil the interaction when none is left.
    fn advance<S: Session>(&mut self, session: &mut S) -> Step {
        if self.state != State::Pending {
            return Step::Settled;
        }

        if !self.chain.has_next() {
            info!("All {} actions completed", self.chain.len());
            self.state = State::Fulfilled;
            destroy(session);
            return Step::Settled;
        }

        let index = self.chain.position();
        let poll_interval = self.options.poll_interval;
        let action = match self.chain.take_next() {
            Ok(action) => action,
            Err(err) => return self.reject(session, err),
        };

        match action {
            Action::Send(input) => {
                let text = input.resolve();
                debug!("Executing action {}: send {:?}", index, text);
                match session.write(text.as_bytes()) {
                    Ok(()) => Step::Yield,
                    Err(err) => self.reject(session, err),
                }
            }
            Action::Wait { pattern, .. } => {
                debug!(
                    "Executing action {}: wait {} (first check in {:?})",
                    index,
                    display_pattern(pattern),
                    poll_interval
                );
                Step::Poll {
                    at: Instant::now() + poll_interval,
                    elapsed: Duration::ZERO,
                }
            }
        }
    }

    /// Handle the wake-up the previous step asked for.
    fn resume<S: Session>(&mut self, step: Step, session: &mut S) -> Step {
        match step {
            Step::Yield => self.advance(session),
            Step::Poll { elapsed, .. } => self.poll(session, elapsed),
            Step::Settled => Step::Settled,
        }
    }

    /// One match attempt for the wait in flight.
    fn poll<S: Session>(&mut self, session: &mut S, elapsed: Duration) -> Step {
        let Some(Action::Wait { pattern, on_match }) = self.chain.current_mut() else {
            return self.reject(session, Error::ChainExhausted);
        };

        match matcher::find(&mut self.buffer, pattern) {
            Some(found) => {
                debug!("Output matched {}: {:?}", display_pattern(pattern), found.line());
                if let Some(on_match) = on_match {
                    on_match(&found);
                }
                self.advance(session)
            }
            None if elapsed < self.options.timeout => {
                trace!(
                    "No match for {} after {:?}",
                    display_pattern(pattern),
                    elapsed
                );
                let poll_interval = self.options.poll_interval;
                Step::Poll {
                    at: Instant::now() + poll_interval,
                    elapsed: elapsed + poll_interval,
                }
            }
            None => {
                let pattern = display_pattern(pattern);
                self.reject(session, Error::WaitTimeout { pattern })
            }
        }
    }

    fn reject<S: Session>(&mut self, session: &mut S, err: Error) -> Step {
        warn!("Interaction failed: {}", err);
        self.state = State::Rejected;
        self.failure = Some(err);
        destroy(session);
        Step::Settled
    }

    /// Turn the session exit into the interaction outcome.
    ///
    /// A fulfilled script succeeds with whatever code the session reports.
    fn settle(&mut self, code: u32) -> Result<u32> {
        info!("Session exited with code {} (state: {:?})", code, self.state);
        match self.state {
            State::Fulfilled => Ok(code),
            State::Rejected => Err(self
                .failure
                .take()
                .unwrap_or(Error::UnexpectedExit { code })),
            State::Pending => {
                self.state = State::Rejected;
                Err(Error::UnexpectedExit { code })
            }
        }
    }
}

async fn wake(step: Step) {
    match step {
        Step::Yield => tokio::task::yield_now().await,
        Step::Poll { at, .. } => sleep_until(at).await,
        Step::Settled => std::future::pending().await,
    }
}

fn destroy<S: Session>(session: &mut S) {
    if let Err(err) = session.destroy() {
        warn!("Failed to destroy session: {}", err);
    }
}
