// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! TLS bootstrap.
//!
//! Turns the certificate material fetched from a Secret into a
//! [`TlsAcceptor`] for the HTTPS frontend. The PEM bytes are parsed directly
//! in memory; nothing touches the filesystem.

#[cfg(test)]
mod tests;

use std::sync::Arc;

use tokio_rustls::TlsAcceptor;
use tokio_rustls::rustls::ServerConfig as RustlsServerConfig;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};

use crate::core::ProxyError;
use crate::kube::TlsMaterial;

/// Build a TLS acceptor from in-memory PEM cert and key bytes.
pub fn acceptor_from_pem(material: &TlsMaterial) -> Result<TlsAcceptor, ProxyError> {
    let certs = parse_certs(&material.cert_pem)?;
    if certs.is_empty() {
        return Err(ProxyError::TlsSecret(
            "certificate PEM contains no certificates".to_string(),
        ));
    }
    let key = parse_private_key(&material.key_pem)?;

    let config = RustlsServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| ProxyError::TlsSecret(format!("invalid certificate/key pair: {e}")))?;

    Ok(TlsAcceptor::from(Arc::new(config)))
}

fn parse_certs(pem: &[u8]) -> Result<Vec<CertificateDer<'static>>, ProxyError> {
    rustls_pemfile::certs(&mut &pem[..])
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ProxyError::TlsSecret(format!("failed to parse certificate PEM: {e}")))
}

fn parse_private_key(pem: &[u8]) -> Result<PrivateKeyDer<'static>, ProxyError> {
    rustls_pemfile::private_key(&mut &pem[..])
        .map_err(|e| ProxyError::TlsSecret(format!("failed to parse private key PEM: {e}")))?
        .ok_or_else(|| ProxyError::TlsSecret("no private key found in PEM".to_string()))
}
