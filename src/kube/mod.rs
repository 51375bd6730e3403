// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Kubernetes API surface.
//!
//! Wire types for the two resources the proxy consumes (the Ingress that
//! declares the routing rules and the Secret that carries TLS material),
//! plus the [`ControlPlaneClient`] / [`SecretClient`] traits at the fetch
//! boundary and a [`ApiClient`] implementation speaking the REST API
//! directly over `reqwest`.
//!
//! The wire types mirror `networking.k8s.io/v1`. They derive `PartialEq`
//! because the reconciler detects changes by structural deep-equality
//! between consecutive fetches.


use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::core::ProxyError;

/// Conventional mount point of the pod's service-account credentials.
const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

/// Secret data key holding the certificate chain.
const TLS_CERT_KEY: &str = "tls.crt";
/// Secret data key holding the private key.
const TLS_PRIVATE_KEY_KEY: &str = "tls.key";

/// Object metadata, reduced to the fields the proxy reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ObjectMeta {
    pub name: String,
    pub namespace: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
}

/// An `networking.k8s.io/v1` Ingress resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Ingress {
    pub metadata: ObjectMeta,
    pub spec: IngressSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IngressSpec {
    /// Backend serving anything no rule matches.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_backend: Option<IngressBackend>,
    pub tls: Vec<IngressTls>,
    pub rules: Vec<IngressRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IngressTls {
    pub hosts: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IngressRule {
    pub host: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http: Option<HttpIngressRuleValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpIngressRuleValue {
    pub paths: Vec<HttpIngressPath>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpIngressPath {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_type: Option<String>,
    pub backend: IngressBackend,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IngressBackend {
    pub service: IngressServiceBackend,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IngressServiceBackend {
    pub name: String,
    pub port: ServiceBackendPort,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceBackendPort {
    pub number: u16,
}

impl Ingress {
    /// Name of the secret declared by the first TLS entry, if any.
    pub fn tls_secret_name(&self) -> Option<&str> {
        self.spec
            .tls
            .first()
            .and_then(|t| t.secret_name.as_deref())
    }
}

/// A `v1` Secret, reduced to its data map. Values are base64 on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Secret {
    pub metadata: ObjectMeta,
    pub data: BTreeMap<String, String>,
}

/// Decoded certificate material extracted from a TLS secret.
#[derive(Debug, Clone)]
pub struct TlsMaterial {
    pub cert_pem: Vec<u8>,
    pub key_pem: Vec<u8>,
}

impl Secret {
    /// Decode the `tls.crt` / `tls.key` pair.
    pub fn tls_material(&self) -> Result<TlsMaterial, ProxyError> {
        let cert_pem = self.decode_field(TLS_CERT_KEY)?;
        let key_pem = self.decode_field(TLS_PRIVATE_KEY_KEY)?;
        Ok(TlsMaterial { cert_pem, key_pem })
    }

    fn decode_field(&self, key: &str) -> Result<Vec<u8>, ProxyError> {
        let raw = self.data.get(key).ok_or_else(|| {
            ProxyError::TlsSecret(format!(
                "secret '{}' has no '{}' entry",
                self.metadata.name, key
            ))
        })?;
        BASE64.decode(raw).map_err(|e| {
            ProxyError::TlsSecret(format!(
                "secret '{}' field '{}' is not valid base64: {}",
                self.metadata.name, key, e
            ))
        })
    }
}

/// Fetch-by-name access to the routing resource.
#[async_trait]
pub trait ControlPlaneClient: Send + Sync {
    async fn fetch_ingress(&self, name: &str, namespace: &str) -> Result<Ingress, ProxyError>;
}

/// Fetch-by-name access to certificate material.
#[async_trait]
pub trait SecretClient: Send + Sync {
    async fn fetch_secret(&self, name: &str, namespace: &str) -> Result<Secret, ProxyError>;
}

/// REST client for the Kubernetes API server.
#[derive(Debug)]
pub struct ApiClient {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl ApiClient {
    /// Create a client against an explicit API endpoint.
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self, ProxyError> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            base_url: base_url.into(),
            token,
            client,
        })
    }

    /// Create a client from the pod's own service account.
    ///
    /// Uses the `KUBERNETES_SERVICE_HOST` / `KUBERNETES_SERVICE_PORT`
    /// environment the kubelet injects, the mounted bearer token, and the
    /// cluster CA bundle.
    pub fn in_cluster() -> Result<Self, ProxyError> {
        let host = env::var("KUBERNETES_SERVICE_HOST").map_err(|_| {
            ProxyError::Initialization(
                "KUBERNETES_SERVICE_HOST is not set; not running in a cluster?".to_string(),
            )
        })?;
        let port = env::var("KUBERNETES_SERVICE_PORT").map_err(|_| {
            ProxyError::Initialization("KUBERNETES_SERVICE_PORT is not set".to_string())
        })?;

        let sa_dir = Path::new(SERVICE_ACCOUNT_DIR);
        let token = fs::read_to_string(sa_dir.join("token"))
            .map_err(|e| {
                ProxyError::Initialization(format!("cannot read service-account token: {e}"))
            })?
            .trim()
            .to_string();
        let ca_pem = fs::read(sa_dir.join("ca.crt")).map_err(|e| {
            ProxyError::Initialization(format!("cannot read cluster CA bundle: {e}"))
        })?;
        let ca = reqwest::Certificate::from_pem(&ca_pem)
            .map_err(|e| ProxyError::Initialization(format!("invalid cluster CA bundle: {e}")))?;

        let client = reqwest::Client::builder()
            .add_root_certificate(ca)
            .build()?;

        Ok(Self {
            base_url: format!("https://{host}:{port}"),
            token: Some(token),
            client,
        })
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response, reqwest::Error> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {url}");

        let mut builder = self.client.get(&url);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        builder.send().await?.error_for_status()
    }
}

#[async_trait]
impl ControlPlaneClient for ApiClient {
    async fn fetch_ingress(&self, name: &str, namespace: &str) -> Result<Ingress, ProxyError> {
        let path = format!("/apis/networking.k8s.io/v1/namespaces/{namespace}/ingresses/{name}");
        let response = self
            .get(&path)
            .await
            .map_err(|e| ProxyError::ConfigFetch(format!("ingress '{namespace}/{name}': {e}")))?;
        response
            .json()
            .await
            .map_err(|e| ProxyError::ConfigFetch(format!("ingress '{namespace}/{name}': {e}")))
    }
}

#[async_trait]
impl SecretClient for ApiClient {
    async fn fetch_secret(&self, name: &str, namespace: &str) -> Result<Secret, ProxyError> {
        let path = format!("/api/v1/namespaces/{namespace}/secrets/{name}");
        let response = self
            .get(&path)
            .await
            .map_err(|e| ProxyError::TlsSecret(format!("secret '{namespace}/{name}': {e}")))?;
        response
            .json()
            .await
            .map_err(|e| ProxyError::TlsSecret(format!("secret '{namespace}/{name}': {e}")))
    }
}
