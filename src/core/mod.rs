// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Core primitives: backend descriptors, routing rules and the error
//! taxonomy.
//!
//! Everything here is plain data; the matching logic lives in `router` and
//! the IO in `server` / `forward`.


use std::fmt;
use thiserror::Error;

/// Errors that can occur during proxy operations.
#[derive(Error, Debug)]
pub enum ProxyError {
    /// HTTP client error
    #[error("HTTP client error: {0}")]
    ClientError(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Missing configuration or a failed initial fetch. Fatal: the process
    /// exits before serving traffic.
    #[error("initialization error: {0}")]
    Initialization(String),

    /// A re-fetch of the routing resource failed. The previously published
    /// snapshot keeps serving.
    #[error("failed to fetch routing resource: {0}")]
    ConfigFetch(String),

    /// The TLS secret could not be fetched or materialized. The HTTPS
    /// listener is skipped; plaintext serving is unaffected.
    #[error("TLS secret error: {0}")]
    TlsSecret(String),

    /// No host rule, path rule or default backend matched a request.
    #[error("no backend found for host '{host}' path '{path}'")]
    NoBackendFound { host: String, path: String },

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<crate::config::ConfigError> for ProxyError {
    fn from(err: crate::config::ConfigError) -> Self {
        ProxyError::Initialization(err.to_string())
    }
}

/// A routing target: a service identity plus port.
///
/// Identity is value-based; two descriptors with equal fields are
/// interchangeable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Backend {
    /// Name of the backing service.
    pub service: String,
    /// Namespace the service lives in (the namespace of the owning Ingress).
    pub namespace: String,
    /// Service port to forward to.
    pub port: u16,
}

impl Backend {
    /// The cache key for this backend.
    pub fn key(&self) -> BackendKey {
        BackendKey(format!("{}/{}:{}", self.namespace, self.service, self.port))
    }

    /// The cluster-DNS address requests are forwarded to.
    pub fn target_url(&self) -> String {
        format!(
            "http://{}.{}.svc.cluster.local:{}",
            self.service, self.namespace, self.port
        )
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.namespace, self.service, self.port)
    }
}

/// Identity of a backend in the forwarding cache.
///
/// The namespace is part of the key, so identically named services in two
/// namespaces never share a handler.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BackendKey(String);

impl fmt::Display for BackendKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A single prefix-path rule under a host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathRule {
    /// Prefix the request path must start with. Never empty; an empty
    /// declaration is normalized to `/` at compile time.
    pub prefix: String,
    /// Backend receiving the matched traffic.
    pub backend: Backend,
}

/// All path rules declared for one host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostRule {
    /// Host name, stored lowercased. Comparison against the request host is
    /// case-insensitive.
    pub host: String,
    /// Path rules in declaration order. Order only breaks ties between
    /// equal-length prefixes; matching itself is longest-prefix.
    pub paths: Vec<PathRule>,
}
