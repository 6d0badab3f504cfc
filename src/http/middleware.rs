//! Admission and request logging middleware.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderName, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{GateError, Result};
use crate::ratelimit::{AdmissionControl, ClientKey, Decision};

/// Body returned with every 429 response.
pub const REJECTION_BODY: &str = "Rate limit exceeded. Try again later.";

/// Derives the [`ClientKey`] a request is counted against.
///
/// By default the key is the peer IP address of the connection. With a
/// header configured, the first comma-separated value of that header is
/// used when present, falling back to the peer IP.
#[derive(Debug, Clone, Default)]
pub struct KeyExtractor {
    header: Option<HeaderName>,
}

impl KeyExtractor {
    /// Key requests by the connection's peer IP address.
    pub fn peer_ip() -> Self {
        Self { header: None }
    }

    /// Key requests by the given header, e.g. `x-forwarded-for`.
    pub fn from_header(name: &str) -> Result<Self> {
        let header = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| GateError::Config(format!("Invalid key header {:?}: {}", name, e)))?;
        Ok(Self {
            header: Some(header),
        })
    }

    /// Extract the client key for a request.
    pub fn extract<B>(&self, request: &axum::http::Request<B>) -> ClientKey {
        if let Some(name) = &self.header {
            let forwarded = request
                .headers()
                .get(name)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.split(',').next())
                .map(str::trim)
                .filter(|value| !value.is_empty());

            if let Some(value) = forwarded {
                return ClientKey::from(value);
            }
        }

        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| ClientKey::from(*addr))
            .unwrap_or_else(ClientKey::unknown)
    }
}

/// State shared by the admission middleware.
pub struct AdmissionState<A> {
    controller: Arc<A>,
    extractor: KeyExtractor,
}

impl<A> AdmissionState<A> {
    pub fn new(controller: Arc<A>, extractor: KeyExtractor) -> Self {
        Self {
            controller,
            extractor,
        }
    }
}

impl<A> Clone for AdmissionState<A> {
    fn clone(&self) -> Self {
        Self {
            controller: Arc::clone(&self.controller),
            extractor: self.extractor.clone(),
        }
    }
}

/// Admit or reject a request before it reaches the wrapped handler.
///
/// Rejected requests are answered with 429 and never run the handler.
pub async fn admission<A>(
    State(state): State<AdmissionState<A>>,
    request: Request,
    next: Next,
) -> Response
where
    A: AdmissionControl + 'static,
{
    let key = state.extractor.extract(&request);

    match state.controller.check(&key) {
        Decision::Admit => next.run(request).await,
        Decision::Reject => {
            debug!(
                key = %key,
                method = %request.method(),
                uri = %request.uri(),
                "Request rejected by rate limit"
            );
            too_many_requests()
        }
    }
}

/// The response sent for a rejected request.
pub fn too_many_requests() -> Response {
    (StatusCode::TOO_MANY_REQUESTS, REJECTION_BODY).into_response()
}

/// Wrap every route of `router` in the admission middleware.
pub fn protect<A, S>(
    router: Router<S>,
    controller: Arc<A>,
    extractor: KeyExtractor,
) -> Router<S>
where
    A: AdmissionControl + 'static,
    S: Clone + Send + Sync + 'static,
{
    let state = AdmissionState::new(controller, extractor);
    router.layer(middleware::from_fn_with_state(state, admission::<A>))
}

/// Log each request on arrival and on completion.
pub async fn log_requests(request: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4();
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    info!(
        request_id = %request_id,
        method = %method,
        uri = %uri,
        "Incoming request"
    );

    let response = next.run(request).await;

    info!(
        request_id = %request_id,
        method = %method,
        uri = %uri,
        status = response.status().as_u16(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Request completed"
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::{ManualClock, Policy, RateLimiter};
    use axum::body::{to_bytes, Body};
    use axum::routing::get;
    use std::time::Duration;
    use tower::ServiceExt;

    fn limiter(max_requests: usize) -> Arc<RateLimiter<ManualClock>> {
        let policy = Policy::new(max_requests, Duration::from_secs(10)).unwrap();
        Arc::new(RateLimiter::with_clock(policy, ManualClock::new()))
    }

    fn app(limiter: Arc<RateLimiter<ManualClock>>, extractor: KeyExtractor) -> Router {
        let router = Router::new().route("/books", get(|| async { "books" }));
        protect(router, limiter, extractor)
    }

    fn request_from(peer: &str) -> axum::http::Request<Body> {
        let mut request = axum::http::Request::builder()
            .uri("/books")
            .body(Body::empty())
            .unwrap();
        let addr: SocketAddr = peer.parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));
        request
    }

    #[test]
    fn test_extract_peer_ip() {
        let extractor = KeyExtractor::peer_ip();
        let request = request_from("10.1.2.3:4567");
        assert_eq!(extractor.extract(&request), ClientKey::from("10.1.2.3"));
    }

    #[test]
    fn test_extract_from_header() {
        let extractor = KeyExtractor::from_header("x-forwarded-for").unwrap();
        let mut request = request_from("10.1.2.3:4567");
        request
            .headers_mut()
            .insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());

        assert_eq!(extractor.extract(&request), ClientKey::from("203.0.113.7"));
    }

    #[test]
    fn test_extract_header_falls_back_to_peer() {
        let extractor = KeyExtractor::from_header("x-forwarded-for").unwrap();
        let request = request_from("10.1.2.3:4567");
        assert_eq!(extractor.extract(&request), ClientKey::from("10.1.2.3"));
    }

    #[test]
    fn test_extract_without_origin_is_unknown() {
        let extractor = KeyExtractor::peer_ip();
        let request = axum::http::Request::builder()
            .uri("/")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extractor.extract(&request), ClientKey::unknown());
    }

    #[test]
    fn test_invalid_header_name() {
        let err = KeyExtractor::from_header("bad header").unwrap_err();
        assert!(matches!(err, GateError::Config(_)));
    }

    #[tokio::test]
    async fn test_admitted_request_reaches_handler() {
        let app = app(limiter(2), KeyExtractor::peer_ip());

        let response = app.oneshot(request_from("10.0.0.1:1000")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"books");
    }

    #[tokio::test]
    async fn test_rejected_request_gets_429() {
        let limiter = limiter(2);
        let app = app(Arc::clone(&limiter), KeyExtractor::peer_ip());

        for _ in 0..2 {
            let response = app.clone().oneshot(request_from("10.0.0.1:1000")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app.clone().oneshot(request_from("10.0.0.1:1001")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], REJECTION_BODY.as_bytes());

        // Another client is unaffected
        let response = app.oneshot(request_from("10.0.0.2:1000")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // The rejected request was not recorded
        assert_eq!(limiter.request_count(&ClientKey::from("10.0.0.1")), Some(2));
    }

    #[tokio::test]
    async fn test_rejected_request_skips_handler() {
        let limiter = limiter(1);
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let router = Router::new().route(
            "/books",
            get(move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    "books"
                }
            }),
        );
        let app = protect(router, limiter, KeyExtractor::peer_ip());

        app.clone().oneshot(request_from("10.0.0.1:1000")).await.unwrap();
        let response = app.oneshot(request_from("10.0.0.1:1000")).await.unwrap();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_log_requests_passes_response_through() {
        let app = Router::new()
            .route("/missing", get(|| async { StatusCode::NOT_FOUND }))
            .layer(middleware::from_fn(log_requests));

        let request = axum::http::Request::builder()
            .uri("/missing")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
