// src/web/types.rs
use rocket::http::Status;
use rocket::response::{self, Responder};
use rocket::serde::json::Json;
use rocket::serde::{Deserialize, Serialize};
use rocket::Request;

use crate::ats::AtsAnalysis;
use crate::error::InsightError;
use crate::profile::{GapReport, ProfileGap};
use crate::query::templates::QueryTemplate;
use crate::suggestions::Suggestion;

#[derive(Serialize)]
#[serde(crate = "rocket::serde", rename_all = "lowercase")]
pub enum ResponseType {
    Error,
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct StandardErrorResponse {
    #[serde(rename = "type")]
    pub response_type: ResponseType,
    pub success: bool,
    pub error: String,
    pub error_code: String,
    pub suggestions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl StandardErrorResponse {
    pub fn new(error: String, error_code: String, suggestions: Vec<String>) -> Self {
        Self {
            response_type: ResponseType::Error,
            success: false,
            error,
            error_code,
            suggestions,
            retry_after: None,
        }
    }
}

impl From<&InsightError> for StandardErrorResponse {
    fn from(err: &InsightError) -> Self {
        Self {
            retry_after: err.retry_after(),
            ..Self::new(err.to_string(), err.code().to_string(), err.suggestions())
        }
    }
}

/// Domain error rendered as the standard error body with a matching status.
#[derive(Debug)]
pub struct ApiError(pub InsightError);

impl From<InsightError> for ApiError {
    fn from(err: InsightError) -> Self {
        Self(err)
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        let status = Status::from_code(self.0.http_status()).unwrap_or(Status::InternalServerError);
        let mut response = (status, Json(StandardErrorResponse::from(&self.0))).respond_to(req)?;
        if let Some(secs) = self.0.retry_after() {
            response.set_raw_header("Retry-After", secs.to_string());
        }
        Ok(response)
    }
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct TemplatesResponse {
    pub templates: Vec<QueryTemplate>,
    pub categories: Vec<&'static str>,
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde", rename_all = "camelCase")]
pub struct ClearHistoryResponse {
    pub deleted_count: u64,
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct SuggestionsResponse {
    pub suggestions: Vec<Suggestion>,
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct FollowUpsResponse {
    pub suggestions: Vec<String>,
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde", rename_all = "camelCase")]
pub struct ProfileGapsResponse {
    pub suggestions: Vec<ProfileGap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_cache: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refreshed: Option<bool>,
    pub last_generated: String,
}

impl ProfileGapsResponse {
    pub fn cached_or_generated(report: GapReport) -> Self {
        Self {
            from_cache: Some(report.from_cache()),
            refreshed: None,
            last_generated: report.last_generated.to_rfc3339(),
            suggestions: report.suggestions,
        }
    }

    pub fn refreshed(report: GapReport) -> Self {
        Self {
            from_cache: None,
            refreshed: Some(report.refreshed()),
            last_generated: report.last_generated.to_rfc3339(),
            suggestions: report.suggestions,
        }
    }
}

#[derive(Deserialize)]
#[serde(crate = "rocket::serde", rename_all = "camelCase")]
pub struct AtsScanRequest {
    #[serde(default)]
    pub resume_url: String,
    #[serde(default)]
    pub job_description: Option<String>,
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct QuickScoreResponse {
    pub score: i64,
}

pub type AtsScanResponse = AtsAnalysis;
