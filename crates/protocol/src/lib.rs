//! # Termshare Protocol Library
//!
//! This crate provides the invite codec and wire protocol definitions
//! for the termshare shared-shell system.
//!
//! ## Overview
//!
//! The protocol crate is the foundation of termshare's peering model,
//! providing:
//!
//! - **Invite Codec**: encoding and strict decoding of the out-of-band
//!   invite string a host hands to its guests
//! - **Wire Constants**: the single in-band control byte, the I/O chunk
//!   bound, and the greeting payload sent to freshly connected guests
//! - **Certificate Fingerprints**: a human-checkable SHA-256 rendering
//!   of the pinned certificate
//!
//! Everything in this crate is pure and synchronous. The transport and
//! session machinery lives in the `termshare` crate.
//!
//! ## Example Usage
//!
//! ```rust
//! use protocol::invite;
//!
//! let cert_der = vec![0x30, 0x82, 0x01, 0x0a];
//! let line = invite::encode("203.0.113.7", 8443, &cert_der);
//!
//! let args: Vec<String> = line.split_whitespace().skip(2).map(String::from).collect();
//! let decoded = invite::decode(&args).unwrap();
//! assert_eq!(decoded.cert_der, cert_der);
//! ```
//!
//! ## Modules
//!
//! - [`invite`]: invite string encoding/decoding and fingerprints
//! - [`wire`]: wire-level constants and the sentinel scan
//! - [`error`]: error types

pub mod error;
pub mod invite;
pub mod wire;

pub use error::{ProtocolError, Result};
pub use invite::Invite;
pub use wire::{split_at_sentinel, CHUNK_SIZE, GREETING, SENTINEL_DISCONNECT};
