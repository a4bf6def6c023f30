// src/web/handlers/ats_handlers.rs
use rocket::serde::json::Json;
use rocket::State;
use tracing::info;

use super::profile_handlers::require_student;
use crate::types::CallerContext;
use crate::web::services::AppState;
use crate::web::types::{ApiResult, AtsScanRequest, AtsScanResponse, QuickScoreResponse};

pub async fn ats_scan_handler(
    request: Json<AtsScanRequest>,
    caller: CallerContext,
    state: &State<AppState>,
) -> ApiResult<AtsScanResponse> {
    let student_id = require_student(&caller, "ATS scanning")?;
    info!(
        "ATS scan for student {} (targeted: {})",
        student_id,
        request.job_description.is_some()
    );
    let analysis = state
        .ats
        .analyze_resume(&request.resume_url, request.job_description.as_deref())
        .await?;
    Ok(Json(analysis))
}

pub async fn ats_quick_score_handler(
    request: Json<AtsScanRequest>,
    caller: CallerContext,
    state: &State<AppState>,
) -> ApiResult<QuickScoreResponse> {
    require_student(&caller, "ATS scanning")?;
    let score = state.ats.quick_score(&request.resume_url).await;
    Ok(Json(QuickScoreResponse { score }))
}
