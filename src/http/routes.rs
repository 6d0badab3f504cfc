//! Routes served by the windowgate binary.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use super::middleware::{log_requests, protect, KeyExtractor};
use crate::ratelimit::{AdmissionControl, ClientKey, Decision};

/// Body of a decision response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionResponse {
    pub key: String,
    pub decision: Decision,
}

/// Build the service router.
///
/// - `POST /v1/decisions/:key` evaluates an explicit key on behalf of a
///   trusted caller and answers 200 or 429 with a JSON body.
/// - `GET /v1/admit` evaluates the caller itself through the admission
///   middleware and answers 204 or 429. Suited to reverse-proxy
///   subrequests that forward the client address in a header.
/// - `GET /healthz` answers `ok`.
pub fn router<A>(controller: Arc<A>, extractor: KeyExtractor) -> Router
where
    A: AdmissionControl + 'static,
{
    let gated = protect(
        Router::new().route("/v1/admit", get(admitted)),
        Arc::clone(&controller),
        extractor,
    );

    let decisions = Router::new()
        .route("/v1/decisions/:key", post(decide::<A>))
        .with_state(controller);

    Router::new()
        .route("/healthz", get(healthz))
        .merge(gated)
        .merge(decisions)
        .layer(middleware::from_fn(log_requests))
}

async fn decide<A>(State(controller): State<Arc<A>>, Path(key): Path<String>) -> Response
where
    A: AdmissionControl + 'static,
{
    let key = ClientKey::from(key);
    let decision = controller.check(&key);
    debug!(key = %key, decision = %decision, "Decision requested");

    let status = match decision {
        Decision::Admit => StatusCode::OK,
        Decision::Reject => StatusCode::TOO_MANY_REQUESTS,
    };
    let body = DecisionResponse {
        key: key.to_string(),
        decision,
    };

    (status, Json(body)).into_response()
}

async fn admitted() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn healthz() -> &'static str {
    "ok"
}
