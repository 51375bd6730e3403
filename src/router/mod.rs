// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Routing state and the resolution algorithm.
//!
//! A [`RoutingSnapshot`] is a compiled, immutable view of one Ingress
//! resource. Request handlers read the currently published snapshot from a
//! [`SharedSnapshot`] and call [`RoutingSnapshot::resolve`], a pure function:
//!
//! 1. find the first host rule equal to the request host (case-insensitive);
//! 2. within it, pick the matching path rule with the **longest** prefix,
//!    where ties keep the first-declared rule;
//! 3. fall back to the resource's default backend, which may be absent.
//!
//! Snapshots are replaced wholesale by the reconciler, never mutated, so
//! resolution is safe from any number of concurrent readers.

#[cfg(test)]
mod tests;

use std::sync::Arc;
use tokio::sync::RwLock;

use crate::core::{Backend, HostRule, PathRule};
use crate::kube::{Ingress, IngressBackend};

/// An immutable, fully-resolved set of routing rules.
#[derive(Debug)]
pub struct RoutingSnapshot {
    /// The resource this snapshot was compiled from. Kept for structural
    /// comparison against the next fetch.
    source: Ingress,
    /// Namespace owning the resource; backends resolve inside it.
    namespace: String,
    /// Backend serving requests no rule matches.
    default_backend: Option<Backend>,
    /// Host rules in declaration order.
    host_rules: Vec<HostRule>,
}

impl RoutingSnapshot {
    /// Compile an Ingress resource into an immutable snapshot.
    ///
    /// Hosts are lowercased and empty path prefixes normalized to `/` here,
    /// so `resolve` never has to. Rules without an HTTP section contribute
    /// nothing. Duplicate host declarations are kept as-is; the first one
    /// that yields a path match wins at resolution time.
    pub fn compile(ingress: Ingress) -> Self {
        let namespace = ingress.metadata.namespace.clone();

        let default_backend = ingress
            .spec
            .default_backend
            .as_ref()
            .map(|b| resolve_backend(b, &namespace));

        let host_rules = ingress
            .spec
            .rules
            .iter()
            .map(|rule| HostRule {
                host: rule.host.to_lowercase(),
                paths: rule
                    .http
                    .iter()
                    .flat_map(|http| &http.paths)
                    .map(|p| PathRule {
                        prefix: if p.path.is_empty() {
                            "/".to_string()
                        } else {
                            p.path.clone()
                        },
                        backend: resolve_backend(&p.backend, &namespace),
                    })
                    .collect(),
            })
            .collect();

        Self {
            source: ingress,
            namespace,
            default_backend,
            host_rules,
        }
    }

    /// The resource underlying this snapshot.
    pub fn source(&self) -> &Ingress {
        &self.source
    }

    /// Namespace the snapshot's backends resolve in.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Resolve a request to a backend, or `None` when neither a rule nor a
    /// default backend covers it.
    ///
    /// `host` is expected to be the bare host name (no port); the frontend
    /// strips it from the Host header before calling.
    pub fn resolve(&self, host: &str, path: &str) -> Option<&Backend> {
        for rule in &self.host_rules {
            if !rule.host.eq_ignore_ascii_case(host) {
                continue;
            }

            let mut best: Option<&Backend> = None;
            let mut best_len = 0;

            for path_rule in &rule.paths {
                // Strict '>' keeps the first-declared rule on equal lengths.
                if path.starts_with(&path_rule.prefix) && path_rule.prefix.len() > best_len {
                    best_len = path_rule.prefix.len();
                    best = Some(&path_rule.backend);
                }
            }

            if best.is_some() {
                return best;
            }
        }

        self.default_backend.as_ref()
    }
}

/// The currently published routing snapshot.
///
/// Written only by the reconciler, read by every request task. Readers take
/// the lock just long enough to clone the `Arc`, so they always observe a
/// complete snapshot and never block on one under construction.
#[derive(Debug)]
pub struct SharedSnapshot {
    current: RwLock<Arc<RoutingSnapshot>>,
}

impl SharedSnapshot {
    pub fn new(snapshot: RoutingSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// The snapshot requests are currently routed against.
    pub async fn load(&self) -> Arc<RoutingSnapshot> {
        self.current.read().await.clone()
    }

    /// Publish a replacement snapshot wholesale.
    pub async fn store(&self, snapshot: RoutingSnapshot) {
        *self.current.write().await = Arc::new(snapshot);
    }
}

fn resolve_backend(backend: &IngressBackend, namespace: &str) -> Backend {
    Backend {
        service: backend.service.name.clone(),
        namespace: namespace.to_string(),
        port: backend.service.port.number,
    }
}
