//! Guest event loop.
//!
//! A guest connects to a host over TLS pinned to the invite's
//! certificate and then relays bytes in both directions: server output
//! to the local terminal, local keystrokes to the server. There is no
//! local shell; typing the EOT byte (Ctrl-D) travels to the host and
//! ends the guest's membership there.

use anyhow::{Context, Result};
use protocol::wire::{CHUNK_SIZE, SENTINEL_DISCONNECT};
use protocol::Invite;
use rustls::pki_types::ServerName;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::terminal::{self, RawModeGuard};
use crate::tls;

/// Runs a guest session to completion.
///
/// Returns Ok when the host closes the connection; that is the normal
/// end of a session. Connection and handshake failures are fatal.
pub async fn run(invite: Invite) -> Result<()> {
    let connector = tls::connector(invite.cert_der);

    let server_name = ServerName::try_from(invite.host.clone())
        .with_context(|| format!("Invalid host name: {}", invite.host))?;

    let tcp = TcpStream::connect((invite.host.as_str(), invite.port))
        .await
        .with_context(|| format!("Failed to connect to {}:{}", invite.host, invite.port))?;

    let stream = connector
        .connect(server_name, tcp)
        .await
        .context("TLS handshake failed; the host certificate does not match the invite")?;

    tracing::info!(host = %invite.host, port = invite.port, "Connected to host");

    let (mut read_half, mut write_half) = tokio::io::split(stream);
    let mut stdin_rx = terminal::spawn_stdin_reader();

    let mut guard = RawModeGuard::enable().context("Failed to enable raw mode")?;
    let mut stdout = tokio::io::stdout();

    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut stdin_open = true;

    let result = loop {
        tokio::select! {
            read = read_half.read(&mut buffer) => {
                match read {
                    Ok(0) => {
                        // Host closed the connection; the session is over.
                        tracing::info!("Host closed the session");
                        break Ok(());
                    }
                    Ok(n) => {
                        stdout
                            .write_all(&buffer[..n])
                            .await
                            .context("Failed to write to terminal")?;
                        let _ = stdout.flush().await;
                    }
                    Err(e) => {
                        break Err(e).context("Connection to host lost");
                    }
                }
            }

            data = stdin_rx.recv(), if stdin_open => {
                match data {
                    Some(data) => {
                        if let Err(e) = write_half.write_all(&data).await {
                            break Err(e).context("Failed to send input to host");
                        }
                        let _ = write_half.flush().await;
                    }
                    None => {
                        // Local stdin ended; tell the host we are done
                        // and wait for it to hang up.
                        stdin_open = false;
                        let _ = write_half.write_all(&[SENTINEL_DISCONNECT]).await;
                        let _ = write_half.flush().await;
                    }
                }
            }
        }
    };

    guard.restore();
    result
}
