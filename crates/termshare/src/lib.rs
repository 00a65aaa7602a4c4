//! # Termshare
//!
//! This crate provides the host and guest sides of termshare, a tool for
//! sharing one shell session with several viewers over a TLS channel
//! pinned to a self-signed certificate.
//!
//! ## Overview
//!
//! A host spawns a shell inside a pseudo-terminal and listens for TLS
//! connections. Every connected guest sees the same terminal output and
//! can type into the same shell. Trust is established entirely out of
//! band: the host prints an invite line carrying its certificate, and a
//! guest accepts exactly that certificate and nothing else.
//!
//! - **Session**: shell in a PTY plus child exit classification
//! - **TLS**: certificate generation, pinned verification, accept/connect
//! - **Registry**: tracked guest connections with broadcast and eviction
//! - **Host/Guest**: the two top-level event loops
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────── host ────────────────────────────┐
//! │                                                              │
//! │  stdin ──┐                                         ┌─ guest  │
//! │          ├─► coordinator ─► PTY shell ─► output ───┼─ guest  │
//! │  guests ─┘   (one task)                  + stdout  └─ guest  │
//! │                                                              │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! A single coordinator task owns the PTY writer and the guest
//! registry. Auxiliary tasks only move bytes into and out of channels,
//! so ordering and registration decisions happen in exactly one place.
//!
//! ## Modules
//!
//! - [`config`]: TOML configuration loading and defaults
//! - [`session`]: PTY spawning, output pump, child exit reaping
//! - [`tls`]: certificate generation, identity loading, pinned trust
//! - [`registry`]: connected-guest bookkeeping and broadcast
//! - [`terminal`]: raw mode guard and stdin capture
//! - [`host`]: host event loop
//! - [`guest`]: guest event loop

pub mod config;
pub mod guest;
pub mod host;
pub mod registry;
pub mod session;
pub mod terminal;
pub mod tls;

// Re-export protocol for convenience
pub use protocol;

// Re-export config types for convenience
pub use config::Config;

// Re-export session types for convenience
pub use session::{ExitOutcome, SessionError, TerminalSession};

// Re-export TLS types for convenience
pub use tls::{TlsIdentity, TransportError};

// Re-export registry types for convenience
pub use registry::{GuestConnection, GuestRegistry};
