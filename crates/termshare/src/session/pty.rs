//! PTY spawning and I/O.
//!
//! This module provides the core PTY functionality: spawning the shell
//! at the host terminal's size, writing input, and pumping output into
//! a channel one chunk at a time.

use std::io::{Read, Write};
use std::sync::Arc;

use bytes::Bytes;
use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use protocol::wire::CHUNK_SIZE;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};

/// Errors that can occur during session operations.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Failed to spawn the PTY or the shell inside it.
    #[error("failed to spawn PTY: {0}")]
    SpawnFailed(String),

    /// Failed to write to the PTY.
    #[error("failed to write to PTY: {0}")]
    WriteFailed(String),

    /// The shell's process ID was not available after spawning.
    #[error("shell process ID unavailable")]
    NoPid,
}

/// Channel capacity for PTY output chunks.
const OUTPUT_CAPACITY: usize = 256;

/// A shell process attached to a pseudo-terminal.
///
/// Output arrives on the channel returned by [`TerminalSession::spawn`];
/// the channel closing means the PTY reached EOF and the shell side is
/// gone. Input goes through [`TerminalSession::write`].
pub struct TerminalSession {
    /// The PTY master handle. Held so the PTY stays open for the
    /// lifetime of the session.
    _master: Box<dyn MasterPty + Send>,

    /// The child handle. Held but never waited on; reaping goes through
    /// `waitpid` so signal deaths stay distinguishable.
    _child: Box<dyn Child + Send + Sync>,

    /// The writer for the PTY.
    writer: Arc<Mutex<Box<dyn Write + Send>>>,

    /// Process ID of the shell.
    pid: u32,
}

impl TerminalSession {
    /// Spawns a shell inside a new PTY sized to the given dimensions.
    ///
    /// # Arguments
    /// * `shell` - Optional shell command. If None, uses $SHELL or /bin/sh.
    /// * `cols` - Terminal width in columns.
    /// * `rows` - Terminal height in rows.
    ///
    /// # Returns
    /// The session and a receiver for output chunks.
    pub fn spawn(
        shell: Option<String>,
        cols: u16,
        rows: u16,
    ) -> Result<(Self, mpsc::Receiver<Bytes>), SessionError> {
        let shell_cmd = detect_shell(shell);

        let pty_system = native_pty_system();

        let pair = pty_system
            .openpty(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| SessionError::SpawnFailed(e.to_string()))?;

        let cmd = CommandBuilder::new(&shell_cmd);
        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| SessionError::SpawnFailed(e.to_string()))?;

        let pid = child.process_id().ok_or(SessionError::NoPid)?;

        let writer = pair
            .master
            .take_writer()
            .map_err(|e| SessionError::SpawnFailed(e.to_string()))?;

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| SessionError::SpawnFailed(e.to_string()))?;

        let (output_tx, output_rx) = mpsc::channel(OUTPUT_CAPACITY);
        spawn_output_pump(reader, output_tx);

        tracing::info!(shell = %shell_cmd, pid = pid, "Spawned shell session");

        let session = TerminalSession {
            _master: pair.master,
            _child: child,
            writer: Arc::new(Mutex::new(writer)),
            pid,
        };

        Ok((session, output_rx))
    }

    /// Returns the process ID of the shell.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Writes data to the PTY (shell stdin).
    pub async fn write(&self, data: &[u8]) -> Result<(), SessionError> {
        let mut writer = self.writer.lock().await;
        writer
            .write_all(data)
            .map_err(|e| SessionError::WriteFailed(e.to_string()))?;
        writer
            .flush()
            .map_err(|e| SessionError::WriteFailed(e.to_string()))?;
        Ok(())
    }
}

/// Spawns the blocking read loop that pumps PTY output into a channel.
///
/// The channel closes at EOF. Linux reports EIO on the master once the
/// slave side closes at teardown; that counts as EOF, not an error.
fn spawn_output_pump(reader: Box<dyn Read + Send>, output_tx: mpsc::Sender<Bytes>) {
    tokio::task::spawn_blocking(move || {
        let mut reader = reader;
        let mut buffer = vec![0u8; CHUNK_SIZE];

        loop {
            match reader.read(&mut buffer) {
                Ok(0) => {
                    tracing::debug!("PTY EOF");
                    break;
                }
                Ok(n) => {
                    let chunk = Bytes::copy_from_slice(&buffer[..n]);
                    if output_tx.blocking_send(chunk).is_err() {
                        // Receiver dropped, the session is shutting down.
                        break;
                    }
                }
                Err(e) if e.raw_os_error() == Some(nix::libc::EIO) => {
                    tracing::debug!("PTY closed (EIO)");
                    break;
                }
                Err(e) => {
                    tracing::warn!("PTY read error: {}", e);
                    break;
                }
            }
        }
    });
}

/// Detects the shell to use.
///
/// Returns the shell in this order of preference:
/// 1. The provided shell if Some and non-empty
/// 2. The $SHELL environment variable
/// 3. /bin/sh as fallback
fn detect_shell(shell: Option<String>) -> String {
    if let Some(s) = shell {
        if !s.is_empty() {
            return s;
        }
    }

    std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string())
}
