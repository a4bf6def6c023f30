// src/error.rs
//! Error taxonomy shared by the query engine and its HTTP boundary.

use std::fmt::Display;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InsightError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("{0}")]
    Unanswerable(String),

    #[error("AI service quota exceeded, please try again later")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Unsafe query plan: {0}")]
    UnsafePlan(String),

    /// Carries a message that is safe to show to callers. Internal detail is
    /// logged where the error is created, see [`InsightError::execution`].
    #[error("{0}")]
    ExecutionError(String),
}

pub type InsightResult<T> = Result<T, InsightError>;

impl InsightError {
    /// Log the internal cause and return an `ExecutionError` with a public message.
    pub fn execution(public_message: &str, cause: impl Display) -> Self {
        error!("{}: {}", public_message, cause);
        InsightError::ExecutionError(public_message.to_string())
    }

    /// Seconds the caller should wait before retrying, when known.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            InsightError::RateLimited { retry_after_secs } => *retry_after_secs,
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            InsightError::Unauthorized => "UNAUTHORIZED",
            InsightError::Forbidden(_) => "FORBIDDEN",
            InsightError::NotFound(_) => "NOT_FOUND",
            InsightError::InvalidParameters(_) => "INVALID_PARAMETERS",
            InsightError::Unanswerable(_) => "UNANSWERABLE",
            InsightError::RateLimited { .. } => "RATE_LIMITED",
            InsightError::UnsafePlan(_) => "UNSAFE_PLAN",
            InsightError::ExecutionError(_) => "EXECUTION_ERROR",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            InsightError::Unauthorized => 401,
            InsightError::Forbidden(_) => 403,
            InsightError::NotFound(_) => 404,
            InsightError::InvalidParameters(_) => 400,
            InsightError::Unanswerable(_) | InsightError::UnsafePlan(_) => 422,
            InsightError::RateLimited { .. } => 429,
            InsightError::ExecutionError(_) => 500,
        }
    }

    /// Hints for the caller on how to correct the request.
    pub fn suggestions(&self) -> Vec<String> {
        let hints: &[&str] = match self {
            InsightError::Unauthorized => &["Login is required"],
            InsightError::Forbidden(_) => &["This action is not available for your role"],
            InsightError::NotFound(_) => &["Check the identifier and try again"],
            InsightError::InvalidParameters(_) => &[
                "Provide either a question or a template id",
                "Check the template parameter list for required fields and types",
            ],
            InsightError::Unanswerable(_) => &[
                "Ask about students, companies, jobs or applications",
                "Try one of the predefined templates",
            ],
            InsightError::UnsafePlan(_) => &["Try rephrasing your question"],
            InsightError::RateLimited { .. } => &[
                "Wait a moment before sending another question",
                "Predefined templates keep working while the AI service is throttled",
            ],
            InsightError::ExecutionError(_) => &[
                "Try again in a few moments",
                "Try a simpler question if the problem persists",
            ],
        };
        hints.iter().map(|h| h.to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_statuses_are_stable() {
        let cases = [
            (InsightError::Unauthorized, "UNAUTHORIZED", 401),
            (InsightError::Forbidden("x".into()), "FORBIDDEN", 403),
            (InsightError::NotFound("x".into()), "NOT_FOUND", 404),
            (InsightError::InvalidParameters("x".into()), "INVALID_PARAMETERS", 400),
            (InsightError::Unanswerable("x".into()), "UNANSWERABLE", 422),
            (InsightError::UnsafePlan("x".into()), "UNSAFE_PLAN", 422),
            (InsightError::RateLimited { retry_after_secs: Some(30) }, "RATE_LIMITED", 429),
            (InsightError::ExecutionError("x".into()), "EXECUTION_ERROR", 500),
        ];
        for (err, code, status) in cases {
            assert_eq!(err.code(), code);
            assert_eq!(err.http_status(), status);
            assert!(!err.suggestions().is_empty());
        }
    }

    #[test]
    fn test_execution_hides_cause() {
        let err = InsightError::execution("Query failed", "no such column: secret_internal");
        assert_eq!(err.to_string(), "Query failed");
    }
}
