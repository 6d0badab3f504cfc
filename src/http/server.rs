//! HTTP server implementation.

use axum::Router;
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::error::{GateError, Result};

/// HTTP server for the admission service.
pub struct HttpServer {
    /// Address to bind to
    addr: SocketAddr,
    /// Routes to serve
    router: Router,
}

impl HttpServer {
    pub fn new(addr: SocketAddr, router: Router) -> Self {
        Self { addr, router }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Start the HTTP server.
    ///
    /// This method will block until the server fails.
    pub async fn serve(self) -> Result<()> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    /// Start the HTTP server with graceful shutdown.
    ///
    /// The server will shut down when the provided signal resolves. Peer
    /// addresses are made available to handlers as `ConnectInfo`.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.addr).await.map_err(|e| {
            error!(addr = %self.addr, error = %e, "Failed to bind HTTP listener");
            GateError::Io(e)
        })?;

        info!(
            addr = %listener.local_addr()?,
            "Starting HTTP server with graceful shutdown"
        );

        axum::serve(
            listener,
            self.router
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(signal)
        .await
        .map_err(|e| {
            error!(error = %e, "HTTP server failed");
            GateError::Io(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{router, KeyExtractor};
    use crate::ratelimit::{Policy, RateLimiter};
    use std::sync::Arc;

    #[test]
    fn test_server_creation() {
        let addr: SocketAddr = "127.0.0.1:8080".parse().unwrap();
        let rate_limiter = Arc::new(RateLimiter::new(Policy::default()));
        let server = HttpServer::new(addr, router(rate_limiter, KeyExtractor::peer_ip()));
        assert_eq!(server.addr(), addr);
    }

    #[tokio::test]
    async fn test_shutdown_signal_stops_server() {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let rate_limiter = Arc::new(RateLimiter::new(Policy::default()));
        let server = HttpServer::new(addr, router(rate_limiter, KeyExtractor::peer_ip()));

        let result = server.serve_with_shutdown(async {}).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_bind_failure_is_io_error() {
        let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = occupied.local_addr().unwrap();
        let rate_limiter = Arc::new(RateLimiter::new(Policy::default()));
        let server = HttpServer::new(addr, router(rate_limiter, KeyExtractor::peer_ip()));

        let result = server.serve_with_shutdown(async {}).await;
        assert!(matches!(result, Err(GateError::Io(_))));
    }
}
