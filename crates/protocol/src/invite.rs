//! Invite string encoding and decoding.
//!
//! An invite is the single line of text a host hands to a guest out of
//! band. It carries everything a guest needs to join: an address hint,
//! a port, and the host's self-signed certificate in URL-safe base64.
//! The certificate bytes are the guest's entire trust store, so the
//! codec is byte-exact and the decoder is deliberately strict.

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use sha2::{Digest, Sha256};

use crate::error::{ProtocolError, Result};

/// Number of positional fields a guest invite carries.
const INVITE_FIELDS: usize = 3;

/// A decoded invite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invite {
    /// Host address the guest should connect to.
    pub host: String,

    /// TCP port the host is listening on.
    pub port: u16,

    /// DER-encoded X.509 certificate to pin as the sole trust anchor.
    pub cert_der: Vec<u8>,
}

/// Encodes an invite line for the given host address, port, and
/// DER-encoded certificate.
///
/// The line is directly runnable: `termshare guest <host> <port>
/// <payload>`. The payload is URL-safe base64 with standard padding.
pub fn encode(host: &str, port: u16, cert_der: &[u8]) -> String {
    format!(
        "termshare guest {} {} {}",
        host,
        port,
        URL_SAFE.encode(cert_der)
    )
}

/// Decodes the three positional invite fields: host, port, payload.
///
/// Any other field count, a non-numeric port, or a malformed base64
/// payload is rejected outright. There is no lenient parsing: a
/// mangled invite means a mangled trust anchor.
pub fn decode(args: &[String]) -> Result<Invite> {
    let [host, port, payload] = args else {
        return Err(ProtocolError::InviteFormat(format!(
            "expected {} fields (host, port, certificate), got {}",
            INVITE_FIELDS,
            args.len()
        )));
    };

    if host.is_empty() {
        return Err(ProtocolError::InviteFormat("empty host field".to_string()));
    }

    let port: u16 = port
        .parse()
        .map_err(|_| ProtocolError::InviteFormat(format!("invalid port: {port}")))?;

    let cert_der = URL_SAFE
        .decode(payload)
        .map_err(|e| ProtocolError::InviteFormat(format!("invalid certificate payload: {e}")))?;

    if cert_der.is_empty() {
        return Err(ProtocolError::InviteFormat(
            "empty certificate payload".to_string(),
        ));
    }

    Ok(Invite {
        host: host.clone(),
        port,
        cert_der,
    })
}

/// Renders the SHA-256 fingerprint of a DER certificate as
/// colon-separated hex, for operator display and logs.
pub fn fingerprint(cert_der: &[u8]) -> String {
    let digest = Sha256::digest(cert_der);
    digest
        .iter()
        .map(|b| hex::encode([*b]))
        .collect::<Vec<_>>()
        .join(":")
}
