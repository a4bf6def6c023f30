// src/web/handlers/system_handlers.rs
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;
use tracing::error;

use crate::core::Database;

pub async fn health_handler(database: &State<Database>) -> Result<Json<&'static str>, Status> {
    match database.health_check().await {
        Ok(()) => Ok(Json("OK")),
        Err(e) => {
            error!("Health check failed: {:#}", e);
            Err(Status::ServiceUnavailable)
        }
    }
}
