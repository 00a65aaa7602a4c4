//! Self-signed certificate generation.
//!
//! Certificates come from the `openssl` command line tool rather than
//! an in-process library. The host generates a fresh short-lived
//! keypair on every run; nothing is ever reused or enrolled anywhere.

use std::path::{Path, PathBuf};

use tokio::process::Command;

use super::TransportError;

/// RSA key size in bits.
const KEY_BITS: u32 = 4096;

/// Certificate validity in days. Invites are for one sitting, not for
/// standing infrastructure.
const CERT_DAYS: u32 = 1;

/// Subject for the self-signed certificate. Guests pin the exact bytes,
/// so the name carries no trust.
const CERT_SUBJECT: &str = "/CN=termshare";

/// Generates a fresh RSA key and self-signed certificate in `dir`.
///
/// Returns the paths of the certificate and key files. The key file is
/// restricted to owner read/write.
pub async fn generate_self_signed(dir: &Path) -> Result<(PathBuf, PathBuf), TransportError> {
    let key_path = dir.join("ssl.priv.key");
    let cert_path = dir.join("ssl.crt");

    run_openssl(&[
        "genrsa",
        "-out",
        path_arg(&key_path)?,
        &KEY_BITS.to_string(),
    ])
    .await?;

    restrict_key_permissions(&key_path)?;

    run_openssl(&[
        "req",
        "-key",
        path_arg(&key_path)?,
        "-out",
        path_arg(&cert_path)?,
        "-new",
        "-x509",
        "-days",
        &CERT_DAYS.to_string(),
        "-subj",
        CERT_SUBJECT,
    ])
    .await?;

    tracing::debug!(cert = %cert_path.display(), key = %key_path.display(), "Generated certificate");

    Ok((cert_path, key_path))
}

/// Runs one `openssl` invocation and checks its exit status.
async fn run_openssl(args: &[&str]) -> Result<(), TransportError> {
    let output = Command::new("openssl")
        .args(args)
        .output()
        .await
        .map_err(|e| TransportError::CertGen(format!("failed to run openssl: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(TransportError::CertGen(format!(
            "openssl {} failed: {}",
            args.first().unwrap_or(&""),
            stderr.trim()
        )));
    }

    Ok(())
}

/// Renders a path as a &str argument, rejecting non-UTF-8 paths.
fn path_arg(path: &Path) -> Result<&str, TransportError> {
    path.to_str()
        .ok_or_else(|| TransportError::CertGen(format!("non-UTF-8 path: {}", path.display())))
}

#[cfg(unix)]
fn restrict_key_permissions(key_path: &Path) -> Result<(), TransportError> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(key_path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_key_permissions(_key_path: &Path) -> Result<(), TransportError> {
    Ok(())
}
