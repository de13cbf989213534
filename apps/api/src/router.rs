use std::sync::Arc;

use axum::{routing::get, Router};

use doctor_cell::router::doctor_routes;
use scheduling_cell::router::scheduling_routes;
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "Teleclinic scheduling API is running!" }))
        .nest("/appointments", scheduling_routes(state.clone()))
        .nest("/doctors", doctor_routes(state.clone()))
}
