use shipyard_application::LogQueryService;
use sqlx::PgPool;

use crate::fanout::FanoutGateway;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub log_query_service: LogQueryService,
    pub fanout: FanoutGateway,
    pub postgres_pool: PgPool,
    pub redis_client: Option<redis::Client>,
}
