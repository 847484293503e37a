use axum::Json;
use axum::extract::{Path, State};

use crate::dto::{LogEventResponse, LogsResponse};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn get_logs_handler(
    State(state): State<AppState>,
    Path(deployment_id): Path<String>,
) -> ApiResult<Json<LogsResponse>> {
    let events = state
        .log_query_service
        .get_logs(deployment_id.as_str())
        .await?;

    Ok(Json(LogsResponse {
        logs: events.into_iter().map(LogEventResponse::from).collect(),
    }))
}
