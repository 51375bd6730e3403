// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-backend forwarding handlers.
//!
//! A [`Forwarder`] is the single-host forwarding primitive: it relays one
//! request/response exchange to a fixed backend address, streaming both
//! bodies. The [`ForwardingCache`] memoizes one `Forwarder` per backend
//! identity for the lifetime of the process.
//!
//! There is deliberately no eviction: the set of distinct backends is
//! bounded by the size of the Ingress resource, not by traffic, so a
//! backend that disappears from the rules merely leaves an idle handler
//! behind.


use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use tokio::sync::RwLock;

use crate::core::{Backend, BackendKey, ProxyError};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Forwards requests to one backend over a shared connection pool.
#[derive(Debug)]
pub struct Forwarder {
    target: String,
    client: reqwest::Client,
}

impl Forwarder {
    fn new(backend: &Backend, client: reqwest::Client) -> Self {
        Self {
            target: backend.target_url(),
            client,
        }
    }

    /// Base URL this handler forwards to.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Relay a single exchange. The request body streams in, the response
    /// body streams out; nothing is buffered here.
    pub async fn forward(
        &self,
        method: reqwest::Method,
        path_and_query: &str,
        headers: reqwest::header::HeaderMap,
        body: reqwest::Body,
    ) -> Result<reqwest::Response, ProxyError> {
        let url = format!("{}{}", self.target, path_and_query);

        let response = self
            .client
            .request(method, &url)
            .headers(headers)
            .body(body)
            .send()
            .await?;

        Ok(response)
    }
}

/// Lazily built, never-evicted map of backend identity to handler.
#[derive(Debug)]
pub struct ForwardingCache {
    /// Shared outbound client; individual handlers only pin a target URL.
    client: reqwest::Client,
    handlers: RwLock<HashMap<BackendKey, Arc<Forwarder>>>,
}

impl ForwardingCache {
    pub fn new() -> Result<Self, ProxyError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            handlers: RwLock::new(HashMap::new()),
        })
    }

    /// Return the handler for `backend`, constructing it on first use.
    ///
    /// Construction happens under the write lock, so concurrent first
    /// requests for the same backend still end up sharing one handler. The
    /// lock is never held across an actual forward.
    pub async fn get_or_create(&self, backend: &Backend) -> Arc<Forwarder> {
        let key = backend.key();

        if let Some(handler) = self.handlers.read().await.get(&key) {
            return handler.clone();
        }

        let mut handlers = self.handlers.write().await;
        handlers
            .entry(key)
            .or_insert_with(|| {
                debug!("creating forwarding handler for backend {backend}");
                Arc::new(Forwarder::new(backend, self.client.clone()))
            })
            .clone()
    }

    /// Number of handlers built so far.
    pub async fn len(&self) -> usize {
        self.handlers.read().await.len()
    }
}
