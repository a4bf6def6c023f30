//! Natural-language analytics over placement portal data: role-scoped query
//! templates, plan translation and validation, execution with history,
//! suggestions and student profile gap analysis.

pub mod ats;
pub mod auth;
pub mod config;
pub mod core;
pub mod error;
pub mod profile;
pub mod query;
pub mod suggestions;
pub mod types;
pub mod web;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::AppConfig;
pub use error::{InsightError, InsightResult};
pub use types::{CallerContext, Role};
pub use web::{build_rocket, start_web_server, AppState, ServiceSettings};
