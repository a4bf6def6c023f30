// src/web/handlers/template_handlers.rs
use rocket::serde::json::Json;
use rocket::State;
use tracing::debug;

use crate::types::CallerContext;
use crate::web::services::AppState;
use crate::web::types::TemplatesResponse;

pub async fn get_templates_handler(caller: CallerContext, state: &State<AppState>) -> Json<TemplatesResponse> {
    let templates: Vec<_> = state
        .templates
        .templates_for_role(caller.role)
        .into_iter()
        .cloned()
        .collect();
    let categories = state.templates.categories(caller.role).into_iter().collect();

    debug!("Listing {} templates for {}", templates.len(), caller.role);
    Json(TemplatesResponse { templates, categories })
}
