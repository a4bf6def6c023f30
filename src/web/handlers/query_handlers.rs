// src/web/handlers/query_handlers.rs
use rocket::serde::json::Json;
use rocket::State;
use tracing::{info, warn};

use crate::error::InsightError;
use crate::query::{HistoryScope, QueryExecutionRecord, QueryRequest, QueryResponse};
use crate::types::CallerContext;
use crate::web::services::AppState;
use crate::web::types::{ApiError, ApiResult, ClearHistoryResponse, FollowUpsResponse};

const FOLLOW_UP_CONTEXT: u32 = 5;

/// `?scope=global` selects platform-wide history. Anything else but the
/// caller's own scope is rejected.
fn wants_global(scope: Option<&str>) -> Result<bool, ApiError> {
    match scope.map(str::trim) {
        None | Some("") | Some("mine") => Ok(false),
        Some("global") => Ok(true),
        Some(other) => Err(InsightError::InvalidParameters(format!(
            "Unknown history scope '{}', expected 'mine' or 'global'",
            other
        ))
        .into()),
    }
}

pub async fn execute_query_handler(
    request: Json<QueryRequest>,
    caller: CallerContext,
    state: &State<AppState>,
) -> ApiResult<QueryResponse> {
    info!(
        "Query from {} ({}): template={:?}",
        caller.user_id, caller.role, request.template_id
    );
    let response = state.queries.run(&request, &caller).await?;
    Ok(Json(response))
}

pub async fn list_history_handler(
    limit: Option<u32>,
    scope: Option<String>,
    caller: CallerContext,
    state: &State<AppState>,
) -> ApiResult<Vec<QueryExecutionRecord>> {
    let global = wants_global(scope.as_deref())?;
    let records = state.queries.history(&caller, global, limit).await?;
    Ok(Json(records))
}

pub async fn clear_history_handler(
    scope: Option<String>,
    caller: CallerContext,
    state: &State<AppState>,
) -> ApiResult<ClearHistoryResponse> {
    let global = wants_global(scope.as_deref())?;
    let deleted_count = state.queries.clear_history(&caller, global).await?;
    info!(
        "{} ({}) cleared {} history records (global: {})",
        caller.user_id, caller.role, deleted_count, global
    );
    Ok(Json(ClearHistoryResponse { deleted_count }))
}

pub async fn follow_ups_handler(caller: CallerContext, state: &State<AppState>) -> Json<FollowUpsResponse> {
    let recent: Vec<String> = match state
        .history
        .list_recent(&HistoryScope::for_caller(&caller), Some(FOLLOW_UP_CONTEXT))
        .await
    {
        Ok(records) => records.into_iter().filter_map(|r| r.query_text).collect(),
        Err(e) => {
            warn!("Could not load recent queries for follow-ups: {:#}", e);
            Vec::new()
        }
    };

    let suggestions = state.follow_ups.suggest(caller.role, &recent).await;
    Json(FollowUpsResponse { suggestions })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_parsing() {
        assert!(!wants_global(None).unwrap());
        assert!(!wants_global(Some("mine")).unwrap());
        assert!(wants_global(Some("global")).unwrap());
        assert!(wants_global(Some("everyone")).is_err());
    }
}
