// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Kingress - a small Kubernetes ingress proxy.
//!
//! Kingress watches a single Ingress resource and serves it: inbound HTTP(S)
//! traffic is matched against the resource's host/path rules and forwarded to
//! the backing cluster services. The resource is polled on a fixed cadence
//! and routing state is republished atomically, so rule changes take effect
//! without a restart.
//!
//! # Architecture
//!
//! - [`kube`]: wire types for the Ingress and Secret resources plus the
//!   API client that fetches them.
//! - [`router`]: the compiled, immutable [`RoutingSnapshot`] and the
//!   host/path resolution algorithm; [`SharedSnapshot`] is the atomically
//!   swapped "current rules" cell.
//! - [`forward`]: per-backend forwarding handlers, memoized in a
//!   [`ForwardingCache`] keyed by backend identity.
//! - [`reconcile`]: the poll/compare/swap loop that keeps the snapshot in
//!   sync with the control plane.
//! - [`tls`]: turns fetched certificate material into a TLS acceptor,
//!   entirely in memory.
//! - [`server`]: the HTTP and HTTPS frontends.
//! - [`proxy`]: ties everything together behind [`IngressProxy`].
//!
//! # Failure policy
//!
//! Only startup failures (missing configuration, failed initial fetch) are
//! fatal. Everything else degrades: a failed re-fetch keeps the previous
//! rules serving, a failed TLS bootstrap skips the HTTPS listener, and an
//! unroutable request gets a `503`.

pub mod config;
pub mod core;
pub mod forward;
pub mod kube;
pub mod logging;
pub mod proxy;
pub mod reconcile;
pub mod router;
pub mod server;
pub mod tls;

// Re-export key types at the crate root for convenience
pub use config::{ConfigError, ProxyConfig};
pub use core::{Backend, BackendKey, HostRule, PathRule, ProxyError};
pub use forward::{Forwarder, ForwardingCache};
pub use kube::{ApiClient, ControlPlaneClient, Ingress, Secret, SecretClient, TlsMaterial};
pub use proxy::IngressProxy;
pub use reconcile::Reconciler;
pub use router::{RoutingSnapshot, SharedSnapshot};
pub use server::Frontend;
