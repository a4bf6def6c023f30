// src/web/handlers/suggestion_handlers.rs
use rocket::serde::json::Json;
use rocket::State;

use crate::types::CallerContext;
use crate::web::services::AppState;
use crate::web::types::{ApiResult, SuggestionsResponse};

pub async fn get_suggestions_handler(caller: CallerContext, state: &State<AppState>) -> ApiResult<SuggestionsResponse> {
    let suggestions = state.suggestions.generate(&caller).await?;
    Ok(Json(SuggestionsResponse { suggestions }))
}
