//! HTTP and HTTPS listeners for the exporter router.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use hyper::Request;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use rustls::ServerConfig;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_rustls::TlsAcceptor;
use tower::ServiceExt;
use tracing::{debug, info, warn};

/// Serve plain HTTP until shutdown.
pub async fn serve_plain(
    listener: TcpListener,
    router: Router,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
            info!("HTTP listener shutting down");
        })
        .await
        .context("HTTP server failed")
}

/// Pause before retrying a failed `accept`.
const ACCEPT_BACKOFF: Duration = Duration::from_secs(1);

/// Limit for a client to finish the TLS handshake.
const TLS_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Serve HTTPS until shutdown.
///
/// Spawns a task per connection: TLS handshake, then HTTP/1.1.
pub async fn serve_tls(
    listener: TcpListener,
    router: Router,
    tls: Arc<ServerConfig>,
    shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    serve_tls_with_timeout(listener, router, tls, TLS_HANDSHAKE_TIMEOUT, shutdown).await
}

async fn serve_tls_with_timeout(
    listener: TcpListener,
    router: Router,
    tls: Arc<ServerConfig>,
    handshake_timeout: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let acceptor = TlsAcceptor::from(tls);
    let listener = &listener;

    loop {
        tokio::select! {
            (stream, peer_addr) = accept_with_backoff(|| listener.accept()) => {
                let acceptor = acceptor.clone();
                let router = router.clone();

                tokio::spawn(async move {
                    let stream = match tokio::time::timeout(handshake_timeout, acceptor.accept(stream)).await {
                        Ok(Ok(s)) => s,
                        Ok(Err(e)) => {
                            debug!(%peer_addr, error = %e, "TLS handshake failed");
                            return;
                        }
                        Err(_) => {
                            debug!(%peer_addr, "TLS handshake timed out");
                            return;
                        }
                    };

                    let svc = service_fn(move |req: Request<Incoming>| router.clone().oneshot(req));
                    if let Err(e) = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), svc)
                        .await
                    {
                        debug!(%peer_addr, error = %e, "connection error");
                    }
                });
            }
            _ = shutdown.changed() => {
                info!("HTTPS listener shutting down");
                break;
            }
        }
    }

    Ok(())
}

/// Retry `accept` until it succeeds, sleeping [`ACCEPT_BACKOFF`] after
/// each error. Errors such as EMFILE repeat immediately otherwise.
async fn accept_with_backoff<F, Fut, T>(mut accept: F) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<T>>,
{
    loop {
        match accept().await {
            Ok(accepted) => return accepted,
            Err(e) => {
                warn!(error = %e, "accept failed");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
        }
    }
}
