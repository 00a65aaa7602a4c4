//! Certificate pinning.
//!
//! Guests trust exactly one certificate, the one carried by the invite.
//! There is no chain building and no name checking; the pinned DER
//! bytes either match the presented leaf or the handshake fails.

use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{CertificateError, DigitallySignedStruct, Error as TlsError, SignatureScheme};

/// Verifier that accepts a single pinned certificate.
///
/// Handshake signatures are still verified against the presented
/// certificate's key, so a peer must hold the matching private key and
/// not merely replay the certificate bytes.
#[derive(Debug)]
pub struct PinnedCertVerifier {
    pinned: CertificateDer<'static>,
    provider: Arc<CryptoProvider>,
}

impl PinnedCertVerifier {
    /// Creates a verifier pinned to the given DER-encoded certificate.
    pub fn new(pinned_der: Vec<u8>) -> Self {
        Self {
            pinned: CertificateDer::from(pinned_der),
            provider: Arc::new(rustls::crypto::ring::default_provider()),
        }
    }
}

impl ServerCertVerifier for PinnedCertVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, TlsError> {
        if end_entity.as_ref() == self.pinned.as_ref() {
            Ok(ServerCertVerified::assertion())
        } else {
            tracing::warn!("Peer presented a certificate that does not match the pinned one");
            Err(TlsError::InvalidCertificate(
                CertificateError::ApplicationVerificationFailure,
            ))
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verify(verifier: &PinnedCertVerifier, presented: &[u8]) -> Result<ServerCertVerified, TlsError> {
        let cert = CertificateDer::from(presented.to_vec());
        let name = ServerName::try_from("example.test").unwrap();
        verifier.verify_server_cert(&cert, &[], &name, &[], UnixTime::now())
    }

    #[test]
    fn test_accepts_matching_certificate() {
        let der = vec![0x30, 0x82, 0x01, 0x02, 0x03];
        let verifier = PinnedCertVerifier::new(der.clone());
        assert!(verify(&verifier, &der).is_ok());
    }

    #[test]
    fn test_rejects_different_certificate() {
        let verifier = PinnedCertVerifier::new(vec![0x30, 0x82, 0x01]);
        let result = verify(&verifier, &[0x30, 0x82, 0x02]);
        assert!(matches!(
            result,
            Err(TlsError::InvalidCertificate(
                CertificateError::ApplicationVerificationFailure
            ))
        ));
    }

    #[test]
    fn test_rejects_truncated_certificate() {
        let der = vec![0x30, 0x82, 0x01, 0x02];
        let verifier = PinnedCertVerifier::new(der.clone());
        assert!(verify(&verifier, &der[..3]).is_err());
    }

    #[test]
    fn test_advertises_verify_schemes() {
        let verifier = PinnedCertVerifier::new(vec![1]);
        assert!(!verifier.supported_verify_schemes().is_empty());
    }
}
