//! HTTP surface: admission middleware, service routes and server.

mod middleware;
mod routes;
mod server;

pub use middleware::{
    admission, log_requests, protect, too_many_requests, AdmissionState, KeyExtractor,
    REJECTION_BODY,
};
pub use routes::{router, DecisionResponse};
pub use server::HttpServer;
