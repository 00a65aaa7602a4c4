//! TLS transport.
//!
//! Certificate generation, identity loading, and the two config
//! builders: a server-side acceptor for the host and a pinned
//! connector for guests.

pub mod ca;
pub mod pin;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use thiserror::Error;
use tokio_rustls::{TlsAcceptor, TlsConnector};

pub use ca::generate_self_signed;
pub use pin::PinnedCertVerifier;

/// Errors from certificate handling and TLS setup.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Certificate generation failed.
    #[error("certificate generation failed: {0}")]
    CertGen(String),

    /// The certificate file contained no certificates.
    #[error("no certificate found in {0}")]
    NoCertificate(String),

    /// The key file contained no private key.
    #[error("no private key found in {0}")]
    NoPrivateKey(String),

    /// TLS configuration was rejected.
    #[error("TLS configuration error: {0}")]
    Tls(#[from] rustls::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The host's certificate chain and private key.
pub struct TlsIdentity {
    chain: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
}

impl TlsIdentity {
    /// Returns the DER bytes of the leaf certificate, the value that
    /// invites carry and guests pin.
    pub fn leaf_der(&self) -> &[u8] {
        self.chain[0].as_ref()
    }

    /// Builds a TLS acceptor serving this identity.
    pub fn acceptor(&self) -> Result<TlsAcceptor, TransportError> {
        let config = rustls::ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(self.chain.clone(), self.key.clone_key())?;

        Ok(TlsAcceptor::from(Arc::new(config)))
    }
}

/// Loads a PEM certificate and private key from disk.
pub fn load_identity(cert_path: &Path, key_path: &Path) -> Result<TlsIdentity, TransportError> {
    let mut cert_reader = BufReader::new(File::open(cert_path)?);
    let chain: Vec<CertificateDer<'static>> =
        rustls_pemfile::certs(&mut cert_reader).collect::<Result<_, _>>()?;

    if chain.is_empty() {
        return Err(TransportError::NoCertificate(
            cert_path.display().to_string(),
        ));
    }

    let mut key_reader = BufReader::new(File::open(key_path)?);
    let key = rustls_pemfile::private_key(&mut key_reader)?
        .ok_or_else(|| TransportError::NoPrivateKey(key_path.display().to_string()))?;

    Ok(TlsIdentity { chain, key })
}

/// Builds a TLS connector that trusts exactly the given certificate.
pub fn connector(pinned_der: Vec<u8>) -> TlsConnector {
    let config = rustls::ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(PinnedCertVerifier::new(pinned_der)))
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}
