use regex::Regex;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::time::Instant;
use ttychain::{Error, Interaction, InteractionOptions, Result, Session, SessionEvent};

#[derive(Debug, Default)]
struct Record {
    writes: Vec<String>,
    destroyed: usize,
}

/// Fake session that answers specific writes with canned output and reports
/// an exit when destroyed.
struct ScriptedSession {
    events: UnboundedSender<SessionEvent>,
    replies: Vec<(String, String)>,
    exit_on_destroy: Option<u32>,
    record: Rc<RefCell<Record>>,
}

impl ScriptedSession {
    fn new() -> (Self, UnboundedReceiver<SessionEvent>, Rc<RefCell<Record>>) {
        let (events, rx) = unbounded_channel();
        let record = Rc::new(RefCell::new(Record::default()));
        let session = Self {
            events,
            replies: Vec::new(),
            exit_on_destroy: Some(0),
            record: record.clone(),
        };
        (session, rx, record)
    }

    fn emit(&self, chunk: &str) {
        self.events
            .send(SessionEvent::Data(chunk.to_string()))
            .unwrap();
    }

    fn reply(mut self, input: &str, output: &str) -> Self {
        self.replies.push((input.to_string(), output.to_string()));
        self
    }

    fn exit_on_destroy(mut self, code: Option<u32>) -> Self {
        self.exit_on_destroy = code;
        self
    }

    fn sender(&self) -> UnboundedSender<SessionEvent> {
        self.events.clone()
    }
}

impl Session for ScriptedSession {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        let text = String::from_utf8_lossy(data).into_owned();
        for (input, output) in &self.replies {
            if *input == text {
                self.emit(output);
            }
        }
        self.record.borrow_mut().writes.push(text);
        Ok(())
    }

    fn destroy(&mut self) -> Result<()> {
        self.record.borrow_mut().destroyed += 1;
        if let Some(code) = self.exit_on_destroy.take() {
            let _ = self.events.send(SessionEvent::Exit(code));
        }
        Ok(())
    }
}

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap()
}

fn options() -> InteractionOptions {
    InteractionOptions::default()
        .with_timeout(Duration::from_millis(2000))
        .with_poll_interval(Duration::from_millis(500))
}

#[tokio::test(start_paused = true)]
async fn test_wait_send_wait_fulfills_with_exit_code() {
    let (session, events, record) = ScriptedSession::new();
    let session = session.reply("go\n", "done\r\n");
    session.emit("starting\r\nready\r\n");

    let code = Interaction::new("prog", options())
        .wait(re("ready"))
        .send("go\n")
        .wait(re("done"))
        .start_with(session, events)
        .await
        .unwrap();

    assert_eq!(code, 0);
    let record = record.borrow();
    assert_eq!(record.writes, vec!["prog\n", "go\n"]);
    assert_eq!(record.destroyed, 1);
}

#[tokio::test(start_paused = true)]
async fn test_wait_timeout_rejects_and_destroys() {
    let (session, events, record) = ScriptedSession::new();
    let session = session.exit_on_destroy(Some(129));
    let started = Instant::now();

    let err = Interaction::new("prog", options())
        .wait(re("ready"))
        .start_with(session, events)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::WaitTimeout { .. }));
    assert_eq!(err.to_string(), "Waiting '/ready/' was too long");
    assert_eq!(record.borrow().destroyed, 1);

    // Timeout is counted in whole poll intervals and may overshoot by one.
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(2000), "{elapsed:?}");
    assert!(elapsed <= Duration::from_millis(2500), "{elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn test_exit_before_match_rejects() {
    let (session, events, record) = ScriptedSession::new();
    session.emit("nothing here\r\n");
    session.sender().send(SessionEvent::Exit(1)).unwrap();

    let err = Interaction::new("prog", options())
        .wait(re("x"))
        .start_with(session, events)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::UnexpectedExit { code: 1 }));
    assert_eq!(record.borrow().destroyed, 0);
}

#[tokio::test(start_paused = true)]
async fn test_fulfilled_script_succeeds_with_any_exit_code() {
    let (session, events, _record) = ScriptedSession::new();
    let session = session.exit_on_destroy(Some(137));

    let code = Interaction::new("prog", options())
        .send("quit\n")
        .start_with(session, events)
        .await
        .unwrap();

    assert_eq!(code, 137);
}

#[tokio::test(start_paused = true)]
async fn test_lines_are_consumed_only_once() {
    let (session, events, _record) = ScriptedSession::new();
    session.emit("ready\r\n");

    let err = Interaction::new("prog", options())
        .wait(re("ready"))
        .wait(re("ready"))
        .start_with(session, events)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::WaitTimeout { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_unmatched_earlier_output_stays_available() {
    let (session, events, record) = ScriptedSession::new();
    session.emit("alpha\r\nbeta\r\n");

    Interaction::new("prog", options())
        .wait(re("^alpha$"))
        .send("x\n")
        .wait(re("^beta$"))
        .start_with(session, events)
        .await
        .unwrap();

    assert_eq!(record.borrow().writes, vec!["prog\n", "x\n"]);
}

#[tokio::test(start_paused = true)]
async fn test_output_arriving_mid_wait_is_matched() {
    let (session, events, _record) = ScriptedSession::new();
    let late = session.sender();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(1200)).await;
        late.send(SessionEvent::Data("rea".to_string())).unwrap();
        late.send(SessionEvent::Data("dy\r\n".to_string())).unwrap();
    });
    let started = Instant::now();

    Interaction::new("prog", options())
        .wait(re("^ready$"))
        .start_with(session, events)
        .await
        .unwrap();

    // Seen by the poll at 1500ms, not earlier.
    assert_eq!(started.elapsed(), Duration::from_millis(1500));
}

#[tokio::test(start_paused = true)]
async fn test_prompt_without_newline_is_matched() {
    let (session, events, record) = ScriptedSession::new();
    let session = session.reply("print(6 * 7)\n", "print(6 * 7)\r\n42\r\n>>> ");
    session.emit("Python 3.12.1\r\n>>> ");

    Interaction::new("python3 -q", options())
        .wait(re(r"^>>> "))
        .send("print(6 * 7)\n")
        .wait(re(r"^42$"))
        .wait(re(r"^>>> "))
        .start_with(session, events)
        .await
        .unwrap();

    assert_eq!(record.borrow().writes, vec!["python3 -q\n", "print(6 * 7)\n"]);
}

#[tokio::test(start_paused = true)]
async fn test_zero_poll_interval_is_rejected() {
    let (session, events, record) = ScriptedSession::new();
    session.emit("ready\r\n");

    let err = Interaction::new("prog", options().with_poll_interval(Duration::ZERO))
        .wait(re("never"))
        .start_with(session, events)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidOptions(_)));
    let record = record.borrow();
    assert!(record.writes.is_empty());
    assert_eq!(record.destroyed, 1);
}

#[tokio::test(start_paused = true)]
async fn test_callback_feeds_deferred_send() {
    let (session, events, record) = ScriptedSession::new();
    session.emit("token: abc123\r\n");

    let token = Rc::new(RefCell::new(String::new()));
    let sink = token.clone();

    Interaction::new("login", options())
        .wait_with(re(r"token: (\w+)"), move |found| {
            *sink.borrow_mut() = found.get(1).unwrap_or_default().to_string();
        })
        .send_with(move || format!("{}\n", token.borrow()))
        .start_with(session, events)
        .await
        .unwrap();

    assert_eq!(record.borrow().writes, vec!["login\n", "abc123\n"]);
}

struct SilentSession;

impl Session for SilentSession {
    fn write(&mut self, _data: &[u8]) -> Result<()> {
        Ok(())
    }

    fn destroy(&mut self) -> Result<()> {
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn test_closed_event_stream_is_an_error() {
    let (events, rx) = unbounded_channel::<SessionEvent>();
    drop(events);

    let err = Interaction::new("prog", options())
        .start_with(SilentSession, rx)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::SessionClosed));
}
