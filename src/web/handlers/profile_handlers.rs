// src/web/handlers/profile_handlers.rs
use rocket::serde::json::Json;
use rocket::State;
use tracing::info;

use crate::error::{InsightError, InsightResult};
use crate::types::{CallerContext, Role};
use crate::web::services::AppState;
use crate::web::types::{ApiResult, ProfileGapsResponse};

/// Student id of the caller, or the error the profile routes return.
pub(crate) fn require_student(caller: &CallerContext, feature: &str) -> InsightResult<String> {
    if caller.role != Role::Student {
        return Err(InsightError::Forbidden(format!("{} is only available for students", feature)));
    }
    caller
        .student_id()
        .map(str::to_string)
        .ok_or_else(|| InsightError::NotFound("Student profile not found".to_string()))
}

pub async fn get_profile_gaps_handler(caller: CallerContext, state: &State<AppState>) -> ApiResult<ProfileGapsResponse> {
    let student_id = require_student(&caller, "Profile analysis")?;
    let report = state.profile_gaps.analyze(&student_id).await?;
    Ok(Json(ProfileGapsResponse::cached_or_generated(report)))
}

pub async fn refresh_profile_gaps_handler(
    caller: CallerContext,
    state: &State<AppState>,
) -> ApiResult<ProfileGapsResponse> {
    let student_id = require_student(&caller, "Profile analysis")?;
    info!("Forced profile gap refresh for student {}", student_id);
    let report = state.profile_gaps.refresh(&student_id).await?;
    Ok(Json(ProfileGapsResponse::refreshed(report)))
}
