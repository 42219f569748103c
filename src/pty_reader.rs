use crate::session::SessionEvent;
use portable_pty::Child;
use std::io::Read;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{debug, warn};

/// Spawns a background thread that forwards PTY output as [`SessionEvent::Data`]
/// and, once the PTY hits EOF, reaps `child` and sends [`SessionEvent::Exit`].
///
/// `exited` is raised as soon as the child has been reaped.
pub fn spawn_reader<R>(
    mut reader: R,
    mut child: Box<dyn Child + Send + Sync>,
    exited: Arc<AtomicBool>,
) -> UnboundedReceiver<SessionEvent>
where
    R: Read + Send + 'static,
{
    let (tx, rx) = unbounded_channel();

    thread::spawn(move || {
        let mut buffer = [0u8; 4096];
        let mut pending = Vec::new();
        loop {
            match reader.read(&mut buffer) {
                Ok(0) => break, // EOF
                Ok(n) => {
                    pending.extend_from_slice(&buffer[..n]);
                    let text = take_text(&mut pending);
                    if !text.is_empty() && tx.send(SessionEvent::Data(text)).is_err() {
                        break; // Receiver dropped
                    }
                }
                // EIO once the child side closes on Linux
                Err(err) => {
                    debug!("PTY read ended: {}", err);
                    break;
                }
            }
        }

        if !pending.is_empty() {
            let _ = tx.send(SessionEvent::Data(
                String::from_utf8_lossy(&pending).into_owned(),
            ));
        }

        let status = child.wait().map(|status| status.exit_code());
        exited.store(true, Ordering::Release);
        send_exit(&tx, status);
    });

    rx
}

fn send_exit(tx: &UnboundedSender<SessionEvent>, status: std::io::Result<u32>) {
    let code = match status {
        Ok(code) => code,
        Err(err) => {
            warn!("Failed to reap PTY child: {}", err);
            1
        }
    };
    debug!("PTY child exited with code {}", code);
    let _ = tx.send(SessionEvent::Exit(code));
}

/// Drain the decodable prefix of `pending` as text.
///
/// An incomplete UTF-8 sequence at the end stays in `pending` for the next
/// read; invalid bytes are replaced.
fn take_text(pending: &mut Vec<u8>) -> String {
    let keep = match std::str::from_utf8(pending) {
        Ok(_) => 0,
        Err(err) if err.error_len().is_none() => pending.len() - err.valid_up_to(),
        Err(_) => 0,
    };
    let tail = pending.split_off(pending.len() - keep);
    let text = String::from_utf8_lossy(pending).into_owned();
    *pending = tail;
    text
}
