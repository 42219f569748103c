use crate::error::{Error, Result};
use crate::pty_reader::spawn_reader;
use crate::session::{Session, SessionEvent};
use portable_pty::{ChildKiller, CommandBuilder, MasterPty, PtySize};
use std::io::{ErrorKind, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info};

/// A shell running inside a PTY.
///
/// Output and the exit notification arrive on the receiver returned by
/// [`spawn`](Self::spawn).
pub struct PtySession {
    // Dropping the master closes the PTY under the child.
    #[allow(dead_code)]
    master: Box<dyn MasterPty + Send>,
    killer: Box<dyn ChildKiller + Send + Sync>,
    writer: Box<dyn Write + Send>,
    // Raised by the reader thread once the child is reaped.
    exited: Arc<AtomicBool>,
}

impl PtySession {
    /// Spawn `command` in a fresh 24x80 PTY.
    pub fn spawn(
        command: &str,
        args: &[String],
    ) -> Result<(Self, UnboundedReceiver<SessionEvent>)> {
        info!("Spawning PTY: command='{}' args={:?}", command, args);
        let pty_system = portable_pty::native_pty_system();

        let pty_size = PtySize {
            rows: 24,
            cols: 80,
            pixel_width: 0,
            pixel_height: 0,
        };

        let pair = pty_system
            .openpty(pty_size)
            .map_err(|e| Error::Pty(format!("Failed to open PTY: {e}")))?;

        let mut cmd = CommandBuilder::new(command);
        for arg in args {
            cmd.arg(arg);
        }

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| Error::Pty(format!("Failed to spawn '{command}': {e}")))?;
        let killer = child.clone_killer();

        let writer = pair
            .master
            .take_writer()
            .map_err(|e| Error::Pty(format!("Failed to get PTY writer: {e}")))?;

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| Error::Pty(format!("Failed to get PTY reader: {e}")))?;

        let exited = Arc::new(AtomicBool::new(false));
        let events = spawn_reader(reader, child, exited.clone());

        let session = PtySession {
            master: pair.master,
            killer,
            writer,
            exited,
        };

        Ok((session, events))
    }
}

impl Session for PtySession {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.writer.write_all(data)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Kill the child. A child that already exited counts as destroyed.
    fn destroy(&mut self) -> Result<()> {
        if self.exited.load(Ordering::Acquire) {
            debug!("PTY child already exited, nothing to kill");
            return Ok(());
        }
        debug!("Killing PTY child");
        match self.killer.kill() {
            Ok(()) => Ok(()),
            // Reaped between the check and the kill.
            Err(err) if self.exited.load(Ordering::Acquire) || err.kind() == ErrorKind::NotFound => {
                debug!("PTY child gone before kill: {}", err);
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_destroy_after_exit_succeeds() {
        let args = vec!["-c".to_string(), "exit 3".to_string()];
        let (mut session, mut events) = PtySession::spawn("sh", &args).unwrap();

        let code = tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                match events.recv().await {
                    Some(SessionEvent::Exit(code)) => return code,
                    Some(SessionEvent::Data(_)) => continue,
                    None => panic!("event stream closed without an exit"),
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(code, 3);
        session.destroy().unwrap();
        // Repeated teardown stays quiet too.
        session.destroy().unwrap();
    }

    #[tokio::test]
    async fn test_destroy_kills_running_child() {
        let args = vec!["-c".to_string(), "sleep 30".to_string()];
        let (mut session, mut events) = PtySession::spawn("sh", &args).unwrap();

        session.destroy().unwrap();

        let exited = tokio::time::timeout(Duration::from_secs(10), async {
            while let Some(event) = events.recv().await {
                if let SessionEvent::Exit(_) = event {
                    return true;
                }
            }
            false
        })
        .await
        .unwrap();
        assert!(exited);
    }
}
