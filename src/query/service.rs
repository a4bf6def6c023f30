// src/query/service.rs
//! Request pipeline: translate, execute, describe, record.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use super::executor::{QueryExecutor, Row};
use super::history::{HistoryScope, HistoryStore, QueryExecutionRecord};
use super::insights::InsightWriter;
use super::translator::{QueryTranslator, TranslationInput};
use super::visualization::VisualizationHint;
use crate::core::clock::Clock;
use crate::error::{InsightError, InsightResult};
use crate::types::{CallerContext, Role};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub template_id: Option<String>,
    #[serde(default)]
    pub params: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub query_id: String,
    pub rows: Vec<Row>,
    pub visualization: VisualizationHint,
    pub row_count: usize,
    pub truncated: bool,
    pub insights: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    pub execution_ms: u64,
}

pub struct QueryService {
    translator: QueryTranslator,
    executor: QueryExecutor,
    insights: InsightWriter,
    history: HistoryStore,
    clock: Arc<dyn Clock>,
}

impl QueryService {
    pub fn new(
        translator: QueryTranslator,
        executor: QueryExecutor,
        insights: InsightWriter,
        history: HistoryStore,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            translator,
            executor,
            insights,
            history,
            clock,
        }
    }

    pub async fn run(&self, request: &QueryRequest, caller: &CallerContext) -> InsightResult<QueryResponse> {
        let input = TranslationInput {
            free_text: request.query.clone(),
            template_id: request
                .template_id
                .as_ref()
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty()),
            params: request.params.clone(),
        };

        let translated = self.translator.translate(&input, caller).await?;
        let result = self
            .executor
            .execute(&translated.plan, caller, translated.chart_type)
            .await?;

        let insights = self
            .insights
            .write(&translated.label, &result.rows, result.visualization.chart_type)
            .await;

        let record = QueryExecutionRecord {
            id: Uuid::new_v4().to_string(),
            requested_by: caller.user_id.clone(),
            requested_by_role: caller.role,
            query_text: Some(translated.label.clone()),
            template_id: translated.template_id.clone(),
            resolved_plan: serde_json::to_value(&translated.plan).unwrap_or(Value::Null),
            row_count: result.row_count as u64,
            chart_type: result.visualization.chart_type,
            insights: Some(insights.clone()),
            execution_ms: result.execution_ms,
            created_at: self.clock.now(),
        };

        if let Err(e) = self.history.record(&record).await {
            error!("Failed to record query {}: {:#}", record.id, e);
        }

        info!(
            "Query {} by {} ({}) returned {} rows",
            record.id, caller.user_id, caller.role, result.row_count
        );

        Ok(QueryResponse {
            query_id: record.id,
            rows: result.rows,
            visualization: result.visualization,
            row_count: result.row_count,
            truncated: result.truncated,
            insights,
            explanation: translated.explanation,
            execution_ms: result.execution_ms,
        })
    }

    pub async fn history(
        &self,
        caller: &CallerContext,
        global: bool,
        limit: Option<u32>,
    ) -> InsightResult<Vec<QueryExecutionRecord>> {
        let scope = history_scope(caller, global)?;
        self.history
            .list_recent(&scope, limit)
            .await
            .map_err(|e| InsightError::execution("Failed to load query history", format!("{:#}", e)))
    }

    pub async fn clear_history(&self, caller: &CallerContext, global: bool) -> InsightResult<u64> {
        let scope = history_scope(caller, global)?;
        self.history
            .clear_all(&scope)
            .await
            .map_err(|e| InsightError::execution("Failed to clear query history", format!("{:#}", e)))
    }
}

fn history_scope(caller: &CallerContext, global: bool) -> InsightResult<HistoryScope> {
    match (global, caller.role) {
        (false, _) => Ok(HistoryScope::for_caller(caller)),
        (true, Role::Admin) => Ok(HistoryScope::Global),
        (true, _) => Err(InsightError::Forbidden(
            "Only admins can access platform-wide history".to_string(),
        )),
    }
}
