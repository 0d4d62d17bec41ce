//! TLS material: loading the server's cert/key into a `rustls::ServerConfig`,
//! and computing the pinned-pubkey fingerprint embedded in generated curl
//! commands (spec §4.4, §9.1 of `SPEC_FULL.md`).

use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use clipshare_core::error::{Error, Result};
use sha2::{Digest, Sha256};

/// `sha256//<base64>` of the leaf certificate's SubjectPublicKeyInfo, in the
/// exact format `curl --pinnedpubkey` expects.
#[derive(Debug, Clone)]
pub struct PinnedCert {
    spki_sha256_b64: String,
}

impl PinnedCert {
    /// Computes the pin from the same PEM file used to serve TLS.
    pub fn from_cert_file(path: &Path) -> Result<Self> {
        let pem = std::fs::read(path)
            .map_err(|e| Error::Internal(format!("reading cert file {}: {e}", path.display())))?;
        let mut reader = BufReader::new(pem.as_slice());
        let cert = rustls_pemfile::certs(&mut reader)
            .next()
            .ok_or_else(|| Error::Internal("cert file has no certificates".into()))?
            .map_err(|e| Error::Internal(format!("parsing cert file: {e}")))?;

        let (_, parsed) = x509_parser::parse_x509_certificate(cert.as_ref())
            .map_err(|e| Error::Internal(format!("parsing x509 certificate: {e}")))?;
        let spki_der = parsed.tbs_certificate.subject_pki.raw;

        let digest = Sha256::digest(spki_der);
        Ok(Self {
            spki_sha256_b64: B64.encode(digest),
        })
    }

    /// The value to pass to curl's `--pinnedpubkey`.
    pub fn curl_pin(&self) -> String {
        format!("sha256//{}", self.spki_sha256_b64)
    }
}

/// Loads a `rustls::ServerConfig` from a PEM certificate chain and key file.
pub fn load_server_config(cert_file: &Path, key_file: &Path) -> Result<Arc<rustls::ServerConfig>> {
    let certs = load_certs(cert_file)?;
    let key = load_key(key_file)?;

    let config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| Error::Internal(format!("building TLS config: {e}")))?;

    Ok(Arc::new(config))
}

fn load_certs(path: &Path) -> Result<Vec<rustls_pki_types::CertificateDer<'static>>> {
    let pem = std::fs::read(path)
        .map_err(|e| Error::Internal(format!("reading cert file {}: {e}", path.display())))?;
    let mut reader = BufReader::new(pem.as_slice());
    rustls_pemfile::certs(&mut reader)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::Internal(format!("parsing cert file: {e}")))
}

fn load_key(path: &Path) -> Result<rustls_pki_types::PrivateKeyDer<'static>> {
    let pem = std::fs::read(path)
        .map_err(|e| Error::Internal(format!("reading key file {}: {e}", path.display())))?;
    let mut reader = BufReader::new(pem.as_slice());
    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| Error::Internal(format!("parsing key file: {e}")))?
        .ok_or_else(|| Error::Internal("key file has no private key".into()))
}
