//! TLS configuration for the peer listener.
//!
//! The server certificate and key live in one PEM file (the deployment
//! convention for scheduler certs). When a CA bundle is configured, peers
//! must present a certificate signed by it.

use std::path::Path;
use std::sync::Arc;

use rustls::server::AllowAnyAuthenticatedClient;
use rustls::{Certificate, PrivateKey, RootCertStore, ServerConfig};
use tokio_rustls::TlsAcceptor;
use tracing::info;

use crate::error::NetError;

/// Build a TLS acceptor from a combined cert+key PEM and an optional CA
/// bundle for client verification.
pub fn acceptor(cert_path: &Path, ca_path: Option<&Path>) -> Result<TlsAcceptor, NetError> {
    let pem = std::fs::read(cert_path)?;

    let certs: Vec<Certificate> = rustls_pemfile::certs(&mut &pem[..])?
        .into_iter()
        .map(Certificate)
        .collect();
    if certs.is_empty() {
        return Err(NetError::Tls(format!(
            "no certificate found in {}",
            cert_path.display()
        )));
    }

    let mut keys = rustls_pemfile::pkcs8_private_keys(&mut &pem[..])?;
    if keys.is_empty() {
        keys = rustls_pemfile::rsa_private_keys(&mut &pem[..])?;
    }
    let key = PrivateKey(keys.into_iter().next().ok_or_else(|| {
        NetError::Tls(format!("no private key found in {}", cert_path.display()))
    })?);

    let builder = ServerConfig::builder().with_safe_defaults();
    let config = match ca_path {
        Some(ca) => {
            let ca_pem = std::fs::read(ca)?;
            let mut roots = RootCertStore::empty();
            for der in rustls_pemfile::certs(&mut &ca_pem[..])? {
                roots.add(&Certificate(der))?;
            }
            if roots.is_empty() {
                return Err(NetError::Tls(format!(
                    "no CA certificate found in {}",
                    ca.display()
                )));
            }
            info!(ca = %ca.display(), "client certificate verification enabled");
            builder
                .with_client_cert_verifier(AllowAnyAuthenticatedClient::new(roots).boxed())
                .with_single_cert(certs, key)?
        }
        None => builder.with_no_client_auth().with_single_cert(certs, key)?,
    };

    Ok(TlsAcceptor::from(Arc::new(config)))
}
