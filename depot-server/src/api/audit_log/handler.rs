//! Audit Log Handler

use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};

use crate::core::ServerState;
use crate::domain::Event;
use crate::utils::{AppError, AppResult};

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    pub limit: Option<i64>,
    pub cursor: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct LogsPage {
    pub logs: Vec<Event>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<i64>,
}

/// Keyset-paginated audit event listing, newest first
pub async fn get_logs(
    State(state): State<ServerState>,
    Query(query): Query<LogsQuery>,
) -> AppResult<Json<LogsPage>> {
    let limit = match query.limit {
        None => 10,
        Some(l) if l >= 1 => l,
        Some(_) => return Err(AppError::Validation("invalid limit format".into())),
    };

    let (logs, cursor) = state
        .audit_tasks
        .get_logs(limit, query.cursor)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(Json(LogsPage { logs, cursor }))
}
