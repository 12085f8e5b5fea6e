//! TLS termination from PEM certificate and key files

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;
use tokio_rustls::TlsAcceptor;

pub fn load_certs(path: &str) -> anyhow::Result<Vec<CertificateDer<'static>>> {
    let file = File::open(path)
        .map_err(|e| anyhow::anyhow!("Failed to open certificate file {}: {}", path, e))?;
    let mut reader = BufReader::new(file);
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| anyhow::anyhow!("Failed to parse certificates from {}: {}", path, e))?;

    if certs.is_empty() {
        anyhow::bail!("No certificates found in {}", path);
    }

    Ok(certs)
}

pub fn load_key(path: &str) -> anyhow::Result<PrivateKeyDer<'static>> {
    let file = File::open(path)
        .map_err(|e| anyhow::anyhow!("Failed to open key file {}: {}", path, e))?;
    let mut reader = BufReader::new(file);

    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| anyhow::anyhow!("Failed to parse key from {}: {}", path, e))?
        .ok_or_else(|| anyhow::anyhow!("No private key found in {}", path))
}

/// Build an acceptor that offers HTTP/2 and HTTP/1.1 via ALPN
pub fn acceptor_from_files(cert_path: &str, key_path: &str) -> anyhow::Result<TlsAcceptor> {
    let certs = load_certs(cert_path)?;
    let key = load_key(key_path)?;

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let mut config = rustls::ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| anyhow::anyhow!("TLS configuration error: {}", e))?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| anyhow::anyhow!("TLS configuration error: {}", e))?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(TlsAcceptor::from(Arc::new(config)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcgen::{generate_simple_self_signed, CertifiedKey};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn self_signed() -> (NamedTempFile, NamedTempFile) {
        let CertifiedKey { cert, key_pair } =
            generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        (write_temp(&cert.pem()), write_temp(&key_pair.serialize_pem()))
    }

    #[test]
    fn test_load_cert_and_key() {
        let (cert, key) = self_signed();
        let cert_path = cert.path().to_str().unwrap();
        let key_path = key.path().to_str().unwrap();

        assert_eq!(load_certs(cert_path).unwrap().len(), 1);
        assert!(load_key(key_path).is_ok());
        assert!(acceptor_from_files(cert_path, key_path).is_ok());
    }

    #[test]
    fn test_empty_files_rejected() {
        let empty = write_temp("");
        let path = empty.path().to_str().unwrap();

        let err = load_certs(path).unwrap_err().to_string();
        assert!(err.contains("No certificates found"));

        let err = load_key(path).unwrap_err().to_string();
        assert!(err.contains("No private key found"));
    }

    #[test]
    fn test_missing_file() {
        let err = load_certs("/nonexistent/cert.pem").unwrap_err().to_string();
        assert!(err.contains("Failed to open certificate file"));
    }
}
