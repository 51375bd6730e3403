// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HTTP(S) frontends.
//!
//! Thin wrappers around **hyper-util**: each listener owns its socket and
//! dispatches every accepted connection onto its own task, so request
//! handling is inherently parallel. The same connection transparently
//! handles HTTP/1.1 and HTTP/2 via `hyper_util::server::conn::auto`.
//!
//! Per request the [`Frontend`] stamps the diagnostic response header,
//! resolves a backend against the currently published snapshot, pulls the
//! forwarding handler out of the cache and delegates the exchange. Bodies
//! stream through in both directions; nothing is buffered here.


use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::TryStreamExt;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as AutoBuilder;
use log::{debug, error, info, warn};
use reqwest::Body;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

use crate::core::ProxyError;
use crate::forward::ForwardingCache;
use crate::router::SharedSnapshot;

/// Diagnostic marker set on every response the proxy produces.
pub const PROXY_HEADER: &str = "X-KubeIngressProxy";
const PROXY_HEADER_VALUE: &str = concat!("kingress/", env!("CARGO_PKG_VERSION"));

/// The request entry point shared by the HTTP and HTTPS listeners.
#[derive(Debug, Clone)]
pub struct Frontend {
    snapshot: Arc<SharedSnapshot>,
    cache: Arc<ForwardingCache>,
}

impl Frontend {
    pub fn new(snapshot: Arc<SharedSnapshot>, cache: Arc<ForwardingCache>) -> Self {
        Self { snapshot, cache }
    }

    /// Serve plaintext HTTP on `addr`. Runs until the process exits.
    pub async fn serve_http(self, addr: SocketAddr) -> Result<(), ProxyError> {
        let listener = bind(addr).await?;
        info!("listening for HTTP on {addr}");

        loop {
            match listener.accept().await {
                Ok((stream, remote_addr)) => {
                    let frontend = self.clone();
                    tokio::spawn(async move {
                        serve_connection(TokioIo::new(stream), frontend, remote_addr).await;
                    });
                }
                Err(e) => error!("accept error: {e}"),
            }
        }
    }

    /// Serve TLS-terminated HTTPS on `addr`. Runs until the process exits.
    ///
    /// The handshake happens on the per-connection task so a slow client
    /// cannot stall the accept loop.
    pub async fn serve_https(self, addr: SocketAddr, acceptor: TlsAcceptor) -> Result<(), ProxyError> {
        let listener = bind(addr).await?;
        info!("listening for HTTPS on {addr}");

        loop {
            match listener.accept().await {
                Ok((stream, remote_addr)) => {
                    let frontend = self.clone();
                    let acceptor = acceptor.clone();
                    tokio::spawn(async move {
                        match acceptor.accept(stream).await {
                            Ok(tls_stream) => {
                                serve_connection(TokioIo::new(tls_stream), frontend, remote_addr)
                                    .await;
                            }
                            Err(e) => warn!("TLS handshake failed from {remote_addr}: {e}"),
                        }
                    });
                }
                Err(e) => error!("accept error: {e}"),
            }
        }
    }

    /// Route one request and relay the exchange.
    async fn handle(&self, req: Request<Incoming>) -> Result<Response<Body>, Infallible> {
        let method = req.method().clone();
        let host = request_host(&req);
        let path = req.uri().path().to_owned();

        info!("host={host} path={path} method={method}");

        let snapshot = self.snapshot.load().await;
        let backend = match snapshot.resolve(&host, &path) {
            Some(backend) => backend.clone(),
            None => {
                let err = ProxyError::NoBackendFound { host, path };
                warn!("code=503 msg={err}");
                return Ok(error_response(503, &err.to_string()));
            }
        };
        // The snapshot may be replaced mid-flight; this request keeps the
        // backend it resolved, the next one sees the new rules.
        drop(snapshot);

        let handler = self.cache.get_or_create(&backend).await;

        let path_and_query = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_owned())
            .unwrap_or(path);
        let headers = req.headers().clone();
        let body = inbound_body(req);

        match handler.forward(method, &path_and_query, headers, body).await {
            Ok(upstream) => Ok(outbound_response(upstream)),
            Err(e) => {
                error!("forwarding to {backend} failed: {e}");
                Ok(error_response(502, "Bad Gateway"))
            }
        }
    }
}

async fn bind(addr: SocketAddr) -> Result<TcpListener, ProxyError> {
    TcpListener::bind(addr)
        .await
        .map_err(|e| ProxyError::Other(format!("failed to bind {addr}: {e}")))
}

/// Drive one accepted connection to completion.
async fn serve_connection<I>(io: I, frontend: Frontend, remote_addr: SocketAddr)
where
    I: hyper::rt::Read + hyper::rt::Write + Unpin + Send + 'static,
{
    debug!("new connection from {remote_addr}");

    let service = service_fn(move |req: Request<Incoming>| {
        let frontend = frontend.clone();
        async move { frontend.handle(req).await }
    });

    let builder = {
        let mut b = AutoBuilder::new(TokioExecutor::new());
        b.http1();
        b.http2();
        b
    };

    if let Err(e) = builder.serve_connection(io, service).await {
        let msg = e.to_string();
        if !msg.contains("connection closed") && !msg.contains("connection reset") {
            error!("connection error from {remote_addr}: {e}");
        }
    }
}

/// The bare request host: the Host header (or `:authority` for HTTP/2) with
/// any port stripped, lowercasing left to the resolver.
fn request_host(req: &Request<Incoming>) -> String {
    if let Some(host) = req
        .headers()
        .get(hyper::header::HOST)
        .and_then(|v| v.to_str().ok())
    {
        return host_without_port(host).to_string();
    }

    // uri.host() already excludes the port
    req.uri().host().unwrap_or("").to_string()
}

/// Strip a trailing `:port` from a Host header value, leaving IPv6 literals
/// intact.
pub(crate) fn host_without_port(host: &str) -> &str {
    if let Some(end) = host.rfind(']') {
        return &host[..=end];
    }
    match host.rsplit_once(':') {
        Some((bare, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => bare,
        _ => host,
    }
}

/// Inbound hyper body as a streaming reqwest body.
fn inbound_body(req: Request<Incoming>) -> Body {
    let stream = req.into_body().into_data_stream().map_ok(Bytes::from);
    Body::wrap_stream(stream)
}

/// Map the upstream response back onto the client connection, streaming the
/// body and stamping the diagnostic header.
fn outbound_response(upstream: reqwest::Response) -> Response<Body> {
    let status = upstream.status();
    let headers = upstream.headers().clone();
    let stream = upstream.bytes_stream().map_err(std::io::Error::other);

    let mut response = Response::new(Body::wrap_stream(stream));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    stamp(&mut response);
    response
}

/// A synthetic error response produced by the proxy itself.
fn error_response(status: u16, message: &str) -> Response<Body> {
    let mut response = Response::new(Body::from(message.to_string()));
    *response.status_mut() =
        hyper::StatusCode::from_u16(status).unwrap_or(hyper::StatusCode::INTERNAL_SERVER_ERROR);
    stamp(&mut response);
    response
}

fn stamp(response: &mut Response<Body>) {
    response.headers_mut().insert(
        hyper::header::HeaderName::from_static("x-kubeingressproxy"),
        hyper::header::HeaderValue::from_static(PROXY_HEADER_VALUE),
    );
}
