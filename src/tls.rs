//! TLS configuration with a pinned CA root certificate.
//!
//! Market data servers inside a private network usually present a chain
//! signed by an internal CA. When `MBP_CA_FILE` names a PEM bundle, the
//! feed connection trusts only the certificates in it; otherwise the
//! public web PKI roots are used.

use std::path::Path;
use std::sync::Arc;

use rustls::ClientConfig;
use tracing::info;

use crate::Result;
use crate::error::ReplicaError;

/// Builds a [`ClientConfig`] whose root store contains only the CA
/// certificates found in the PEM file at `ca_file`.
///
/// # Errors
///
/// Returns [`ReplicaError::Tls`] if the file cannot be read, is not valid
/// PEM, or holds no usable certificate.
pub fn build_tls_config(ca_file: &Path) -> Result<Arc<ClientConfig>> {
    let pem = std::fs::read(ca_file)
        .map_err(|e| ReplicaError::Tls(format!("failed to read {}: {e}", ca_file.display())))?;

    let certs: Vec<_> = rustls_pemfile::certs(&mut pem.as_slice())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| ReplicaError::Tls(format!("failed to parse CA PEM: {e}")))?;

    let mut root_store = rustls::RootCertStore::empty();
    let (added, ignored) = root_store.add_parsable_certificates(certs);
    if added == 0 {
        return Err(ReplicaError::Tls(format!(
            "no usable CA certificate in {}",
            ca_file.display()
        )));
    }
    info!(ca_file = %ca_file.display(), added, ignored, "Pinned CA roots loaded");

    let config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Ok(Arc::new(config))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn missing_file_is_tls_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = build_tls_config(&dir.path().join("absent.pem"));
        assert!(matches!(result, Err(ReplicaError::Tls(_))));
    }

    #[test]
    fn file_without_certificates_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not a certificate").unwrap();

        let result = build_tls_config(file.path());
        assert!(matches!(result, Err(ReplicaError::Tls(msg)) if msg.contains("no usable")));
    }
}
