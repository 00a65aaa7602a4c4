//! Host event loop.
//!
//! The host spawns the shell, prints an invite, and then runs a single
//! coordinator task multiplexing four sources: shell exit, new guest
//! connections, PTY output, and input from the operator or a guest.
//! The coordinator exclusively owns the PTY writer and the guest
//! registry, so all ordering decisions happen in one place.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use protocol::invite;
use protocol::wire::{split_at_sentinel, CHUNK_SIZE, GREETING};
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_rustls::server::TlsStream;
use uuid::Uuid;

use crate::registry::{GuestConnection, GuestRegistry};
use crate::session::{watch_child, ExitOutcome, TerminalSession};
use crate::terminal::{self, RawModeGuard};
use crate::tls;

/// Options for running a host session.
pub struct HostOptions {
    /// Port to listen on.
    pub port: u16,

    /// Address hint embedded in the printed invite.
    pub advertise_host: String,

    /// Shell override. None means $SHELL or /bin/sh.
    pub shell: Option<String>,
}

/// Events delivered to the coordinator by auxiliary tasks.
enum HostEvent {
    /// A guest finished its TLS handshake.
    GuestReady {
        peer: SocketAddr,
        stream: TlsStream<TcpStream>,
    },

    /// A guest sent input bytes.
    GuestInput { id: Uuid, data: Vec<u8> },

    /// A guest's connection ended.
    GuestGone { id: Uuid },
}

/// Runs a host session to completion.
///
/// Returns how the shell terminated. The terminal is restored and all
/// guest connections are torn down before returning.
pub async fn run(opts: HostOptions) -> Result<ExitOutcome> {
    // Fresh certificate per run; the scratch directory disappears with
    // the session.
    let cert_dir = tempfile::tempdir().context("Failed to create certificate directory")?;
    let (cert_path, key_path) = tls::generate_self_signed(cert_dir.path()).await?;
    let identity = tls::load_identity(&cert_path, &key_path)?;
    let acceptor = identity.acceptor()?;

    // Printed before raw mode so the lines render normally.
    let invite_line = invite::encode(&opts.advertise_host, opts.port, identity.leaf_der());
    println!("Run this on the guest machine:");
    println!();
    println!("  {invite_line}");
    println!();
    println!(
        "Certificate fingerprint (SHA-256): {}",
        invite::fingerprint(identity.leaf_der())
    );
    println!();

    let listener = TcpListener::bind(("0.0.0.0", opts.port))
        .await
        .with_context(|| format!("Failed to bind port {}", opts.port))?;
    tracing::info!(port = opts.port, "Listening for guests");

    let (cols, rows) = terminal::window_size();
    let (session, mut output_rx) = TerminalSession::spawn(opts.shell, cols, rows)?;
    let mut exit_rx = watch_child(session.pid()).context("Failed to register SIGCHLD handler")?;
    let mut stdin_rx = terminal::spawn_stdin_reader();

    let (events_tx, mut events_rx) = mpsc::channel::<HostEvent>(64);

    let mut guard = RawModeGuard::enable().context("Failed to enable raw mode")?;
    let mut registry = GuestRegistry::new();
    let mut stdout = tokio::io::stdout();

    let mut output_open = true;
    let mut stdin_open = true;

    let outcome = loop {
        tokio::select! {
            changed = exit_rx.changed() => {
                match changed {
                    Ok(()) => {
                        if let Some(outcome) = *exit_rx.borrow_and_update() {
                            break outcome;
                        }
                    }
                    Err(_) => {
                        tracing::warn!("Exit watcher ended without an outcome");
                        break ExitOutcome::Exited(1);
                    }
                }
            }

            accepted = listener.accept() => {
                match accepted {
                    Ok((tcp, peer)) => {
                        tracing::debug!(peer = %peer, "Guest connecting");
                        spawn_handshake(acceptor.clone(), tcp, peer, events_tx.clone());
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Accept failed");
                    }
                }
            }

            chunk = output_rx.recv(), if output_open => {
                match chunk {
                    Some(data) => {
                        if let Err(e) = stdout.write_all(&data).await {
                            tracing::warn!(error = %e, "stdout write failed");
                        }
                        let _ = stdout.flush().await;
                        registry.broadcast(&data).await;
                    }
                    None => {
                        // The shell side of the PTY is gone; the exit
                        // watcher delivers the outcome shortly.
                        tracing::debug!("PTY output closed");
                        output_open = false;
                    }
                }
            }

            data = stdin_rx.recv(), if stdin_open => {
                match data {
                    Some(data) => {
                        if let Err(e) = session.write(&data).await {
                            tracing::warn!(error = %e, "PTY write from stdin failed");
                        }
                    }
                    None => {
                        // Guests can keep driving the session after the
                        // operator's stdin ends.
                        stdin_open = false;
                    }
                }
            }

            Some(event) = events_rx.recv() => {
                handle_event(event, &session, &mut registry, &events_tx).await;
            }
        }
    };

    registry.shutdown_all().await;
    guard.restore();

    Ok(outcome)
}

/// Runs one guest's TLS handshake off the coordinator.
///
/// A guest that stalls mid-handshake must not block the listener or
/// the session.
fn spawn_handshake(
    acceptor: tokio_rustls::TlsAcceptor,
    tcp: TcpStream,
    peer: SocketAddr,
    events_tx: mpsc::Sender<HostEvent>,
) {
    tokio::spawn(async move {
        match acceptor.accept(tcp).await {
            Ok(stream) => {
                let _ = events_tx.send(HostEvent::GuestReady { peer, stream }).await;
            }
            Err(e) => {
                tracing::warn!(peer = %peer, error = %e, "TLS handshake failed");
            }
        }
    });
}

/// Applies one coordinator event.
async fn handle_event(
    event: HostEvent,
    session: &TerminalSession,
    registry: &mut GuestRegistry,
    events_tx: &mpsc::Sender<HostEvent>,
) {
    match event {
        HostEvent::GuestReady { peer, stream } => {
            let id = Uuid::new_v4();
            let (read_half, mut write_half) = tokio::io::split(stream);

            let greeted = async {
                write_half.write_all(GREETING).await?;
                write_half.flush().await
            }
            .await;

            if let Err(e) = greeted {
                tracing::warn!(peer = %peer, error = %e, "Guest dropped before greeting");
                return;
            }

            let reader_task = spawn_guest_reader(id, read_half, events_tx.clone());
            registry.add(GuestConnection::new(id, peer, Box::new(write_half), reader_task));
        }

        HostEvent::GuestInput { id, data } => {
            let (prefix, disconnect) = split_at_sentinel(&data);

            if !prefix.is_empty() {
                if let Err(e) = session.write(prefix).await {
                    tracing::warn!(guest_id = %id, error = %e, "PTY write from guest failed");
                }
            }

            if disconnect {
                tracing::info!(guest_id = %id, "Guest requested disconnect");
                registry.remove(id).await;
            }
        }

        HostEvent::GuestGone { id } => {
            registry.remove(id).await;
        }
    }
}

/// Pumps a guest's inbound bytes to the coordinator.
fn spawn_guest_reader(
    id: Uuid,
    mut read_half: ReadHalf<TlsStream<TcpStream>>,
    events_tx: mpsc::Sender<HostEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut buffer = vec![0u8; CHUNK_SIZE];

        loop {
            match read_half.read(&mut buffer).await {
                Ok(0) => {
                    let _ = events_tx.send(HostEvent::GuestGone { id }).await;
                    break;
                }
                Ok(n) => {
                    let data = buffer[..n].to_vec();
                    if events_tx.send(HostEvent::GuestInput { id, data }).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!(guest_id = %id, error = %e, "Guest read ended");
                    let _ = events_tx.send(HostEvent::GuestGone { id }).await;
                    break;
                }
            }
        }
    })
}
