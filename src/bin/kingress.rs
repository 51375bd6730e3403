// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Stand-alone ingress proxy binary.
//!
//! Reads `INGRESS_NAME` (required) and `INGRESS_NAMESPACE` (optional) from
//! the environment, talks to the API server with the pod's service account,
//! and serves until killed. Startup failures exit non-zero before any
//! traffic is accepted.

use std::error::Error;
use std::sync::Arc;

use kingress::{ApiClient, IngressProxy, ProxyConfig, logging};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    logging::init(None);

    let config = ProxyConfig::from_env()?;

    let api = Arc::new(ApiClient::in_cluster()?);
    let proxy = IngressProxy::init(config, api.clone(), api).await?;

    proxy.start().await?;
    Ok(())
}
