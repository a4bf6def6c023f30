// src/suggestions/mod.rs
//! Role-aware suggestions derived from rules over bounded data snapshots.

pub mod follow_up;
pub mod heuristics;
pub mod snapshot;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::core::clock::Clock;
use crate::error::{InsightError, InsightResult};
use crate::types::{CallerContext, Role};
use snapshot::SnapshotReader;

pub use follow_up::FollowUpGenerator;

pub const MAX_SUGGESTIONS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionType {
    Insight,
    Action,
    Recommendation,
}

/// Declaration order is sort order: high sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    #[serde(rename = "type")]
    pub kind: SuggestionType,
    pub title: String,
    pub description: String,
    pub priority: Priority,
}

impl Suggestion {
    pub fn new(
        kind: SuggestionType,
        title: impl Into<String>,
        description: impl Into<String>,
        priority: Priority,
    ) -> Self {
        Self {
            kind,
            title: title.into(),
            description: description.into(),
            priority,
        }
    }
}

pub struct SuggestionGenerator {
    reader: SnapshotReader,
    clock: Arc<dyn Clock>,
}

impl SuggestionGenerator {
    pub fn new(reader: SnapshotReader, clock: Arc<dyn Clock>) -> Self {
        Self { reader, clock }
    }

    pub async fn generate(&self, caller: &CallerContext) -> InsightResult<Vec<Suggestion>> {
        let suggestions = match caller.role {
            Role::Student => {
                let student_id = caller
                    .student_id()
                    .ok_or_else(|| InsightError::NotFound("Student profile not found".to_string()))?;
                let snapshot = self
                    .reader
                    .student(student_id)
                    .await
                    .map_err(load_failure)?
                    .ok_or_else(|| InsightError::NotFound("Student profile not found".to_string()))?;
                heuristics::student_suggestions(&snapshot)
            }
            Role::Company => {
                let company_id = caller
                    .company_id()
                    .ok_or_else(|| InsightError::NotFound("Company profile not found".to_string()))?;
                let snapshot = self
                    .reader
                    .company(company_id)
                    .await
                    .map_err(load_failure)?
                    .ok_or_else(|| InsightError::NotFound("Company profile not found".to_string()))?;
                heuristics::company_suggestions(&snapshot, self.clock.now())
            }
            Role::Admin => {
                let snapshot = self.reader.admin(self.clock.now()).await.map_err(load_failure)?;
                heuristics::admin_suggestions(&snapshot)
            }
        };

        debug!("Generated {} suggestions for {} {}", suggestions.len(), caller.role, caller.user_id);
        Ok(suggestions)
    }
}

fn load_failure(e: anyhow::Error) -> InsightError {
    InsightError::execution("Failed to generate suggestions", format!("{:#}", e))
}
