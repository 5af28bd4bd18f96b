use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::handlers::health::health;
use crate::handlers::profiles::{
    create_profile, delete_profile, get_profile, list_profiles, update_profile,
};
use crate::handlers::reports::run_rows_page;
use crate::handlers::runs::{delete_run, get_run, list_runs, trigger_run};
use crate::handlers::scorers::{
    create_scorer, delete_scorer, get_scorer, list_scorers, update_scorer,
};
use crate::handlers::upload::{upload_dataset, MAX_UPLOAD_BYTES};
use crate::middleware::{log_request, rate_limit, security_headers};
use crate::state::AppState;

fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true);
    match HeaderValue::from_str(origin) {
        Ok(origin) => layer.allow_origin(origin),
        Err(_) => {
            warn!(%origin, "invalid CORS origin, cross-origin requests disabled");
            layer
        }
    }
}

/// Evaluation API, mounted under `/api/eval`.
fn eval_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/scorers", get(list_scorers).post(create_scorer))
        .route(
            "/scorers/:id",
            get(get_scorer).put(update_scorer).delete(delete_scorer),
        )
        .route("/profiles", get(list_profiles).post(create_profile))
        .route(
            "/profiles/:id",
            get(get_profile).put(update_profile).delete(delete_profile),
        )
        .route(
            "/upload",
            post(upload_dataset).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/runs", get(list_runs).post(trigger_run))
        .route("/runs/:id", get(get_run).delete(delete_run))
        .route("/reports/:id/rows", get(run_rows_page))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit))
}

pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/eval", eval_routes(&state))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(security_headers))
                .layer(cors_layer(cors_origin))
                .layer(middleware::from_fn(log_request)),
        )
}
