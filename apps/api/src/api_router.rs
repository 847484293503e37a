use axum::Router;
use axum::routing::get;
use shipyard_core::AppError;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

mod cors;

pub fn build_router(
    app_state: AppState,
    cors_allowed_origin: Option<&str>,
) -> Result<Router, AppError> {
    let cors_layer = cors::build_cors_layer(cors_allowed_origin)?;

    Ok(Router::new()
        .route("/health", get(handlers::health::health_handler))
        .route("/logs/{deployment_id}", get(handlers::logs::get_logs_handler))
        .route("/socket", get(handlers::socket::socket_handler))
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state))
}
