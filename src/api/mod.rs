pub mod health;
pub mod quotes;

use crate::db::QuoteStore;
use crate::orchestration::Orchestrator;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    pub fn new(store: Arc<dyn QuoteStore>) -> Self {
        Self {
            orchestrator: Arc::new(Orchestrator::new(store)),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/quotes/preview", post(quotes::preview))
        .route("/v1/quotes/validate", post(quotes::validate))
        .route("/v1/quotes", get(quotes::list).post(quotes::create))
        .route("/v1/quotes/:id", get(quotes::get).put(quotes::update))
        .route("/v1/quotes/:id/recalculate", post(quotes::recalculate))
        .route("/v1/quotes/:id/duplicate", post(quotes::duplicate))
        .route(
            "/v1/quotes/:id/revisions",
            get(quotes::list_revisions).post(quotes::create_revision),
        )
        .layer(cors)
        .with_state(state)
}
