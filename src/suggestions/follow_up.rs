// src/suggestions/follow_up.rs
use serde::Deserialize;
use std::sync::Arc;
use tracing::warn;

use super::MAX_SUGGESTIONS;
use crate::core::llm_client::{generate_structured, GenerationCapability, GenerationRequest};
use crate::types::Role;

const MAX_RECENT_QUERIES: usize = 5;

#[derive(Deserialize)]
struct FollowUpResponse {
    #[serde(default)]
    suggestions: Vec<String>,
}

/// Follow-up questions based on a caller's recent queries. Returns an empty
/// list whenever generation fails.
pub struct FollowUpGenerator {
    generator: Arc<dyn GenerationCapability>,
}

impl FollowUpGenerator {
    pub fn new(generator: Arc<dyn GenerationCapability>) -> Self {
        Self { generator }
    }

    pub async fn suggest(&self, role: Role, recent_queries: &[String]) -> Vec<String> {
        let recent = recent_queries
            .iter()
            .take(MAX_RECENT_QUERIES)
            .map(|q| format!("- {}", q))
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            "Based on the user's role and recent queries, suggest 3-5 relevant follow-up questions \
they might want to ask about placement data.\n\n\
USER ROLE: {}\n\
RECENT QUERIES:\n{}\n\n\
Suggestions should be short, natural questions answerable from jobs, applications, students \
and companies data visible to this role.",
            role,
            if recent.is_empty() { "(none)" } else { recent.as_str() }
        );

        let request = GenerationRequest::new(
            "follow_ups",
            prompt,
            r#"{"suggestions": ["question 1", "question 2", "question 3"]}"#,
        )
        .with_temperature(0.8);

        match generate_structured::<FollowUpResponse>(self.generator.as_ref(), &request).await {
            Ok(response) => response
                .suggestions
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .take(MAX_SUGGESTIONS)
                .collect(),
            Err(e) => {
                warn!("Follow-up generation failed: {}", e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::llm_client::GenerationError;
    use crate::test_support::ScriptedGeneration;
    use serde_json::json;

    #[tokio::test]
    async fn test_suggestions_are_trimmed_and_capped() {
        let generator = Arc::new(ScriptedGeneration::new().respond(
            "follow_ups",
            json!({"suggestions": ["a?", " ", "b?", "c?", "d?", "e?", "f?"]}),
        ));
        let out = FollowUpGenerator::new(generator.clone())
            .suggest(Role::Student, &["How many applications?".to_string()])
            .await;
        assert_eq!(out, vec!["a?", "b?", "c?", "d?", "e?"]);
        assert_eq!(generator.calls("follow_ups"), 1);
    }

    #[tokio::test]
    async fn test_failure_yields_empty_list() {
        let generator = Arc::new(ScriptedGeneration::new().fail("follow_ups", GenerationError::RateLimited { retry_after_secs: None }));
        assert!(FollowUpGenerator::new(generator).suggest(Role::Admin, &[]).await.is_empty());
    }
}
