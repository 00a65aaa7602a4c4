//! Connected-guest bookkeeping.
//!
//! The registry is plain single-owner state: the host coordinator task
//! holds it exclusively, so additions, removals, and broadcasts never
//! race. Each guest owns a write half and the task pumping its inbound
//! bytes; removing a guest tears both down.

use std::net::SocketAddr;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// One connected guest.
pub struct GuestConnection {
    /// Unique guest identifier, used in logs and removal.
    pub id: Uuid,

    /// The guest's remote address.
    pub peer: SocketAddr,

    /// Write half of the guest's TLS stream.
    writer: Box<dyn AsyncWrite + Send + Unpin>,

    /// Task pumping the guest's inbound bytes to the coordinator.
    reader_task: JoinHandle<()>,
}

impl GuestConnection {
    /// Wraps a freshly accepted guest stream.
    pub fn new(
        id: Uuid,
        peer: SocketAddr,
        writer: Box<dyn AsyncWrite + Send + Unpin>,
        reader_task: JoinHandle<()>,
    ) -> Self {
        Self {
            id,
            peer,
            writer,
            reader_task,
        }
    }
}

/// All currently connected guests, in join order.
#[derive(Default)]
pub struct GuestRegistry {
    guests: Vec<GuestConnection>,
}

impl GuestRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of connected guests.
    pub fn len(&self) -> usize {
        self.guests.len()
    }

    /// Returns whether no guests are connected.
    pub fn is_empty(&self) -> bool {
        self.guests.is_empty()
    }

    /// Returns the guest IDs in join order.
    pub fn ids(&self) -> Vec<Uuid> {
        self.guests.iter().map(|g| g.id).collect()
    }

    /// Registers a guest.
    pub fn add(&mut self, guest: GuestConnection) {
        tracing::info!(guest_id = %guest.id, peer = %guest.peer, "Guest joined");
        self.guests.push(guest);
    }

    /// Removes a guest, tearing down its pump task and write half.
    ///
    /// Returns false if the guest was already gone; removal can race
    /// benignly between an eviction and the guest hanging up on its
    /// own.
    pub async fn remove(&mut self, id: Uuid) -> bool {
        let Some(index) = self.guests.iter().position(|g| g.id == id) else {
            return false;
        };

        let mut guest = self.guests.remove(index);
        guest.reader_task.abort();
        let _ = guest.writer.shutdown().await;

        tracing::info!(guest_id = %id, peer = %guest.peer, "Guest removed");
        true
    }

    /// Writes a chunk to every guest.
    ///
    /// Guests whose write fails are evicted and their IDs returned; the
    /// remaining guests still receive the chunk. One slow or dead guest
    /// must not take the session down.
    pub async fn broadcast(&mut self, data: &[u8]) -> Vec<Uuid> {
        let mut evicted = Vec::new();

        for guest in &mut self.guests {
            let result = async {
                guest.writer.write_all(data).await?;
                guest.writer.flush().await
            }
            .await;

            if let Err(e) = result {
                tracing::warn!(guest_id = %guest.id, peer = %guest.peer, error = %e, "Guest write failed, evicting");
                evicted.push(guest.id);
            }
        }

        for id in &evicted {
            self.remove(*id).await;
        }

        evicted
    }

    /// Tears down every guest connection.
    pub async fn shutdown_all(&mut self) {
        for id in self.ids() {
            self.remove(id).await;
        }
    }
}
