// src/web/mod.rs
pub mod handlers;
pub mod services;
pub mod types;

pub use services::{AppState, ServiceSettings};
pub use types::*;

use crate::auth::{AuthConfig, AuthFailure};
use crate::config::AppConfig;
use crate::core::{Database, LlmClient, SystemClock};
use crate::query::{QueryExecutionRecord, QueryRequest, QueryResponse};
use crate::types::CallerContext;
use anyhow::Result;
use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::{Header, Status};
use rocket::serde::json::Json;
use rocket::{catchers, delete, get, options, post, routes, Build, Request, Response, Rocket, State};
use std::sync::Arc;
use tracing::info;

// CORS Fairing
pub struct Cors;

#[rocket::async_trait]
impl Fairing for Cors {
    fn info(&self) -> Info {
        Info {
            name: "Add CORS headers to responses",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, _request: &'r Request<'_>, response: &mut Response<'r>) {
        response.set_header(Header::new("Access-Control-Allow-Origin", "*"));
        response.set_header(Header::new(
            "Access-Control-Allow-Methods",
            "POST, GET, DELETE, OPTIONS",
        ));
        response.set_header(Header::new("Access-Control-Allow-Headers", "*"));
        response.set_header(Header::new("Access-Control-Allow-Credentials", "true"));
    }
}

#[post("/query", data = "<request>")]
pub async fn execute_query(
    request: Json<QueryRequest>,
    caller: CallerContext,
    state: &State<AppState>,
) -> ApiResult<QueryResponse> {
    handlers::execute_query_handler(request, caller, state).await
}

#[get("/query?<limit>&<scope>")]
pub async fn list_history(
    limit: Option<u32>,
    scope: Option<String>,
    caller: CallerContext,
    state: &State<AppState>,
) -> ApiResult<Vec<QueryExecutionRecord>> {
    handlers::list_history_handler(limit, scope, caller, state).await
}

#[delete("/query?<scope>")]
pub async fn clear_history(
    scope: Option<String>,
    caller: CallerContext,
    state: &State<AppState>,
) -> ApiResult<ClearHistoryResponse> {
    handlers::clear_history_handler(scope, caller, state).await
}

#[get("/query/follow-ups")]
pub async fn follow_ups(caller: CallerContext, state: &State<AppState>) -> Json<FollowUpsResponse> {
    handlers::follow_ups_handler(caller, state).await
}

#[get("/templates")]
pub async fn get_templates(caller: CallerContext, state: &State<AppState>) -> Json<TemplatesResponse> {
    handlers::get_templates_handler(caller, state).await
}

#[get("/suggestions")]
pub async fn get_suggestions(caller: CallerContext, state: &State<AppState>) -> ApiResult<SuggestionsResponse> {
    handlers::get_suggestions_handler(caller, state).await
}

#[get("/profile-suggestions")]
pub async fn get_profile_gaps(caller: CallerContext, state: &State<AppState>) -> ApiResult<ProfileGapsResponse> {
    handlers::get_profile_gaps_handler(caller, state).await
}

#[post("/profile-suggestions")]
pub async fn refresh_profile_gaps(
    caller: CallerContext,
    state: &State<AppState>,
) -> ApiResult<ProfileGapsResponse> {
    handlers::refresh_profile_gaps_handler(caller, state).await
}

#[post("/ats-scan", data = "<request>")]
pub async fn ats_scan(
    request: Json<AtsScanRequest>,
    caller: CallerContext,
    state: &State<AppState>,
) -> ApiResult<AtsScanResponse> {
    handlers::ats_scan_handler(request, caller, state).await
}

#[post("/ats-scan/quick", data = "<request>")]
pub async fn ats_quick_score(
    request: Json<AtsScanRequest>,
    caller: CallerContext,
    state: &State<AppState>,
) -> ApiResult<QuickScoreResponse> {
    handlers::ats_quick_score_handler(request, caller, state).await
}

#[get("/health")]
pub async fn health(database: &State<Database>) -> Result<Json<&'static str>, Status> {
    handlers::health_handler(database).await
}

#[options("/<_..>")]
pub async fn options() -> Status {
    Status::Ok
}

fn error_body(error: &str, code: &str, suggestions: &[&str]) -> Json<StandardErrorResponse> {
    Json(StandardErrorResponse::new(
        error.to_string(),
        code.to_string(),
        suggestions.iter().map(|s| s.to_string()).collect(),
    ))
}

fn auth_failure(req: &Request<'_>) -> Option<crate::auth::AuthError> {
    req.local_cache(AuthFailure::default).0
}

// Error catchers
#[rocket::catch(400)]
pub fn bad_request() -> Json<StandardErrorResponse> {
    error_body(
        "Invalid request format",
        "BAD_REQUEST",
        &["Check your request JSON format", "Verify all required fields are present"],
    )
}

#[rocket::catch(401)]
pub fn unauthorized(req: &Request) -> Json<StandardErrorResponse> {
    let message = auth_failure(req).map_or("Authentication required", |e| e.message());
    error_body(message, "UNAUTHORIZED", &["Login is required"])
}

#[rocket::catch(403)]
pub fn forbidden() -> Json<StandardErrorResponse> {
    error_body(
        "Access denied",
        "FORBIDDEN",
        &["This action is not available for your role"],
    )
}

#[rocket::catch(404)]
pub fn not_found(req: &Request) -> Json<StandardErrorResponse> {
    let message = auth_failure(req).map_or("Resource not found", |e| e.message());
    error_body(message, "NOT_FOUND", &["Check the URL and try again"])
}

#[rocket::catch(422)]
pub fn unprocessable() -> Json<StandardErrorResponse> {
    error_body(
        "Request body could not be parsed",
        "INVALID_PARAMETERS",
        &["Check field names and value types in the request body"],
    )
}

#[rocket::catch(500)]
pub fn internal_error() -> Json<StandardErrorResponse> {
    error_body(
        "Internal server error",
        "INTERNAL_ERROR",
        &["Try again in a few moments", "Contact support if the problem persists"],
    )
}

/// Assemble the application without launching it.
pub fn build_rocket(figment: rocket::figment::Figment, state: AppState, auth: AuthConfig, database: Database) -> Rocket<Build> {
    rocket::custom(figment)
        .attach(Cors)
        .manage(state)
        .manage(auth)
        .manage(database)
        .register(
            "/",
            catchers![bad_request, unauthorized, forbidden, not_found, unprocessable, internal_error],
        )
        .mount(
            "/api",
            routes![
                execute_query,
                list_history,
                clear_history,
                follow_ups,
                get_templates,
                get_suggestions,
                get_profile_gaps,
                refresh_profile_gaps,
                ats_scan,
                ats_quick_score,
                health,
                options,
            ],
        )
}

// Main server start function
pub async fn start_web_server(config: AppConfig) -> Result<()> {
    let database = Database::new(&config.database_path).await?;
    let generator = Arc::new(LlmClient::new(&config.llm)?);
    let settings = ServiceSettings {
        query_timeout: std::time::Duration::from_secs(config.query_timeout_secs),
        profile_gap_ttl: chrono::Duration::hours(config.profile_gap_ttl_hours),
    };
    let state = AppState::new(&database, generator, Arc::new(SystemClock), &settings);

    info!("Starting placement insights API server");
    info!("Database: {}", config.database_path.display());
    info!("Generation endpoint: {} ({})", config.llm.base_url, config.llm.model);
    info!("Server: http://0.0.0.0:{}", config.port);

    let figment = rocket::Config::figment()
        .merge(("address", "0.0.0.0"))
        .merge(("port", config.port));

    build_rocket(figment, state, AuthConfig::new(&config.jwt_secret), database)
        .launch()
        .await
        .map_err(|e| anyhow::anyhow!("Rocket server failed: {}", e))?;

    Ok(())
}
