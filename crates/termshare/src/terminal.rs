//! Local terminal handling.
//!
//! Raw mode setup with guaranteed restore, window size queries, and a
//! background reader that turns blocking stdin into a channel of byte
//! chunks.

use std::io::Read;

use protocol::wire::CHUNK_SIZE;
use tokio::sync::mpsc;

/// Fallback terminal size when the real one cannot be queried,
/// e.g. when stdout is not a TTY.
const FALLBACK_SIZE: (u16, u16) = (80, 24);

/// Puts the local terminal into raw mode and restores it on drop.
///
/// Raw mode is required so that keystrokes (including control
/// characters) pass through to the remote shell byte-for-byte. Restore
/// happens in `Drop` so the terminal comes back even on early returns
/// and panics.
pub struct RawModeGuard {
    active: bool,
}

impl RawModeGuard {
    /// Enables raw mode on the controlling terminal.
    pub fn enable() -> std::io::Result<Self> {
        crossterm::terminal::enable_raw_mode()?;
        tracing::debug!("Raw mode enabled");
        Ok(Self { active: true })
    }

    /// Restores the terminal early, before drop.
    pub fn restore(&mut self) {
        if self.active {
            if let Err(e) = crossterm::terminal::disable_raw_mode() {
                tracing::warn!("Failed to restore terminal: {}", e);
            }
            self.active = false;
        }
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        self.restore();
    }
}

/// Returns the current terminal size as (cols, rows), falling back to
/// 80x24 when the query fails.
pub fn window_size() -> (u16, u16) {
    match crossterm::terminal::size() {
        Ok((cols, rows)) => (cols, rows),
        Err(e) => {
            tracing::debug!("Could not query terminal size ({}), using fallback", e);
            FALLBACK_SIZE
        }
    }
}

/// Spawns a blocking reader over stdin and returns a channel of chunks.
///
/// The channel closes when stdin reaches EOF or errors. Reads happen on
/// the blocking pool because stdin has no async interface that honors
/// raw mode byte-at-a-time delivery.
pub fn spawn_stdin_reader() -> mpsc::Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel(64);

    tokio::task::spawn_blocking(move || {
        let mut stdin = std::io::stdin();
        let mut buffer = vec![0u8; CHUNK_SIZE];

        loop {
            match stdin.read(&mut buffer) {
                Ok(0) => {
                    tracing::debug!("stdin EOF");
                    break;
                }
                Ok(n) => {
                    if tx.blocking_send(buffer[..n].to_vec()).is_err() {
                        // Receiver dropped, the session is over.
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!("stdin read error: {}", e);
                    break;
                }
            }
        }
    });

    rx
}
