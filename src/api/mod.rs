pub mod health;
pub mod reports;
pub mod summarize;

use crate::config::Config;
use crate::dates::DateReference;
use crate::store::ReportStore;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ReportStore>,
    pub config: Config,
    pub dates: Arc<dyn DateReference>,
}

impl AppState {
    pub fn new(store: Arc<dyn ReportStore>, config: Config, dates: Arc<dyn DateReference>) -> Self {
        Self {
            store,
            config,
            dates,
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
        .route("/v1/reports/:scope/costs", get(reports::get_report_costs))
        .route("/v1/summarize", post(summarize::post_summarize))
        .layer(cors)
        .with_state(state)
}
