// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! High-level entry point wiring the pieces together.
//!
//! [`IngressProxy::init`] performs the fatal part of startup: reading the
//! Ingress resource once and publishing the first routing snapshot.
//! [`IngressProxy::start`] then spawns the long-lived tasks: the HTTP
//! frontend, the TLS bootstrap plus HTTPS frontend, and the reconciler.
//!
//! TLS bootstrap failures are non-fatal by design: they are logged, the
//! HTTPS listener is skipped, and plaintext serving continues.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use log::{error, info, warn};
use tokio::task::JoinSet;

use crate::config::ProxyConfig;
use crate::core::ProxyError;
use crate::forward::ForwardingCache;
use crate::kube::{ControlPlaneClient, SecretClient};
use crate::router::{RoutingSnapshot, SharedSnapshot};
use crate::reconcile::Reconciler;
use crate::server::Frontend;
use crate::tls;

/// A fully initialized ingress proxy, ready to serve.
pub struct IngressProxy {
    config: ProxyConfig,
    control_plane: Arc<dyn ControlPlaneClient>,
    secrets: Arc<dyn SecretClient>,
    snapshot: Arc<SharedSnapshot>,
    cache: Arc<ForwardingCache>,
}

impl IngressProxy {
    /// Fetch the Ingress resource and publish the initial snapshot.
    ///
    /// Every failure here is an initialization error; the caller is expected
    /// to exit rather than serve traffic without routing rules.
    pub async fn init(
        config: ProxyConfig,
        control_plane: Arc<dyn ControlPlaneClient>,
        secrets: Arc<dyn SecretClient>,
    ) -> Result<Self, ProxyError> {
        let ingress = control_plane
            .fetch_ingress(&config.ingress_name, &config.ingress_namespace)
            .await
            .map_err(|e| ProxyError::Initialization(e.to_string()))?;

        info!(
            "serving ingress '{}/{}' with {} host rule(s)",
            config.ingress_namespace,
            config.ingress_name,
            ingress.spec.rules.len()
        );

        let snapshot = Arc::new(SharedSnapshot::new(RoutingSnapshot::compile(ingress)));
        let cache = Arc::new(ForwardingCache::new()?);

        Ok(Self {
            config,
            control_plane,
            secrets,
            snapshot,
            cache,
        })
    }

    /// The currently published routing snapshot cell.
    pub fn snapshot(&self) -> Arc<SharedSnapshot> {
        self.snapshot.clone()
    }

    /// Spawn the listeners and the reconciliation loop, then wait forever.
    ///
    /// Returns only if one of the daemon tasks exits, which is itself an
    /// error condition.
    pub async fn start(self) -> Result<(), ProxyError> {
        let frontend = Frontend::new(self.snapshot.clone(), self.cache.clone());
        let mut daemons = JoinSet::new();

        // Plaintext listener.
        let http_frontend = frontend.clone();
        let http_addr = any_addr(self.config.http_port);
        daemons.spawn(async move {
            if let Err(e) = http_frontend.serve_http(http_addr).await {
                error!("HTTP listener failed: {e}");
            }
        });

        // TLS bootstrap + HTTPS listener.
        let https_frontend = frontend;
        let https_addr = any_addr(self.config.https_port);
        let secrets = self.secrets.clone();
        let snapshot = self.snapshot.clone();
        let namespace = self.config.ingress_namespace.clone();
        daemons.spawn(async move {
            match bootstrap_tls(&*secrets, &snapshot, &namespace).await {
                Ok(acceptor) => {
                    if let Err(e) = https_frontend.serve_https(https_addr, acceptor).await {
                        error!("HTTPS listener failed: {e}");
                    }
                }
                Err(e) => {
                    // HTTP serving is unaffected; run without TLS.
                    warn!("TLS bootstrap failed, not starting HTTPS listener: {e}");
                }
            }
        });

        // Config watcher.
        let reconciler = Reconciler::new(
            self.control_plane.clone(),
            self.config.ingress_name.clone(),
            self.config.ingress_namespace.clone(),
            self.config.poll_interval,
            self.snapshot.clone(),
        );
        daemons.spawn(reconciler.run());

        while let Some(result) = daemons.join_next().await {
            if let Err(e) = result {
                error!("daemon task panicked: {e}");
            }
        }

        Err(ProxyError::Other("all daemon tasks exited".to_string()))
    }
}

/// Fetch the secret named by the resource's first TLS entry and build an
/// acceptor from it, entirely in memory.
async fn bootstrap_tls(
    secrets: &dyn SecretClient,
    snapshot: &SharedSnapshot,
    namespace: &str,
) -> Result<tokio_rustls::TlsAcceptor, ProxyError> {
    let current = snapshot.load().await;
    let secret_name = current
        .source()
        .tls_secret_name()
        .ok_or_else(|| ProxyError::TlsSecret("ingress declares no TLS secret".to_string()))?
        .to_string();
    drop(current);

    let secret = secrets.fetch_secret(&secret_name, namespace).await?;
    let material = secret.tls_material()?;
    tls::acceptor_from_pem(&material)
}

fn any_addr(port: u16) -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port)
}
