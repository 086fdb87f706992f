//! HTTP API application wiring (Axum router + shared state).
//!
//! - `services.rs`: shared state (credential store, token codec, clock)
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs and input validation
//! - `errors.rs`: consistent response envelopes

use axum::{
    Extension, Router,
    http::{HeaderName, Method, header},
    middleware::{from_fn_with_state, map_response},
    routing::get,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::{AppState, Clock, build_state};

const ALLOWED_HEADERS: [HeaderName; 4] = [
    header::ORIGIN,
    header::CONTENT_TYPE,
    header::ACCEPT,
    header::AUTHORIZATION,
];

/// Build the full HTTP router (public entrypoint used by `main.rs` and the
/// black-box tests).
///
/// Request flow for protected routes: session resolver, then (for gated
/// routes) the trial gate, then the handler.
pub fn build_app(state: AppState) -> Router {
    let gated = routes::gated_router()
        .route_layer(from_fn_with_state(state.clone(), middleware::trial_gate));

    // `route_layer` so unmatched paths stay 404 instead of 401.
    let protected = routes::account_router()
        .merge(gated)
        .route_layer(from_fn_with_state(state.clone(), middleware::session_resolver));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(ALLOWED_HEADERS);

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::public_router())
        .merge(protected)
        .fallback(routes::system::route_not_found)
        .layer(map_response(routes::system::method_not_allowed))
        .layer(Extension(state))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
}
