// src/query/history.rs
//! Execution history: one immutable record per successful query.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::SqlitePool;
use tracing::info;

use super::visualization::ChartType;
use crate::types::{CallerContext, Role};

pub const DEFAULT_HISTORY_LIMIT: u32 = 10;
pub const MAX_HISTORY_LIMIT: u32 = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryExecutionRecord {
    pub id: String,
    pub requested_by: String,
    pub requested_by_role: Role,
    pub query_text: Option<String>,
    pub template_id: Option<String>,
    pub resolved_plan: Value,
    pub row_count: u64,
    pub chart_type: ChartType,
    pub insights: Option<String>,
    pub execution_ms: u64,
    pub created_at: DateTime<Utc>,
}

/// Which records a list or clear operation covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryScope {
    /// Records requested by one user.
    Caller(String),
    /// Every record on the platform.
    Global,
}

impl HistoryScope {
    pub fn for_caller(caller: &CallerContext) -> Self {
        HistoryScope::Caller(caller.user_id.clone())
    }
}

pub fn clamp_limit(limit: Option<u32>) -> u32 {
    limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT)
}

#[derive(sqlx::FromRow)]
struct HistoryRow {
    id: String,
    requested_by: String,
    requested_by_role: String,
    query_text: Option<String>,
    template_id: Option<String>,
    resolved_plan: String,
    row_count: i64,
    chart_type: String,
    insights: Option<String>,
    execution_ms: i64,
    created_at: i64,
}

impl TryFrom<HistoryRow> for QueryExecutionRecord {
    type Error = anyhow::Error;

    fn try_from(row: HistoryRow) -> Result<Self> {
        Ok(Self {
            resolved_plan: serde_json::from_str(&row.resolved_plan)
                .with_context(|| format!("Corrupt plan in history record {}", row.id))?,
            requested_by_role: row.requested_by_role.parse()?,
            chart_type: row.chart_type.parse()?,
            created_at: DateTime::from_timestamp_micros(row.created_at)
                .with_context(|| format!("Invalid timestamp in history record {}", row.id))?,
            id: row.id,
            requested_by: row.requested_by,
            query_text: row.query_text,
            template_id: row.template_id,
            row_count: row.row_count.max(0) as u64,
            insights: row.insights,
            execution_ms: row.execution_ms.max(0) as u64,
        })
    }
}

#[derive(Clone)]
pub struct HistoryStore {
    pool: SqlitePool,
}

impl HistoryStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn record(&self, record: &QueryExecutionRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO query_history (
                id, requested_by, requested_by_role, query_text, template_id,
                resolved_plan, row_count, chart_type, insights, execution_ms, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.requested_by)
        .bind(record.requested_by_role.as_str())
        .bind(&record.query_text)
        .bind(&record.template_id)
        .bind(record.resolved_plan.to_string())
        .bind(record.row_count as i64)
        .bind(record.chart_type.as_str())
        .bind(&record.insights)
        .bind(record.execution_ms as i64)
        .bind(record.created_at.timestamp_micros())
        .execute(&self.pool)
        .await
        .context("Failed to record query execution")?;

        Ok(())
    }

    /// Newest first; equal timestamps fall back to insertion order.
    pub async fn list_recent(
        &self,
        scope: &HistoryScope,
        limit: Option<u32>,
    ) -> Result<Vec<QueryExecutionRecord>> {
        let limit = clamp_limit(limit) as i64;

        let rows: Vec<HistoryRow> = match scope {
            HistoryScope::Caller(user_id) => {
                sqlx::query_as(
                    "SELECT * FROM query_history WHERE requested_by = ? \
                     ORDER BY created_at DESC, seq DESC LIMIT ?",
                )
                .bind(user_id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
            HistoryScope::Global => {
                sqlx::query_as("SELECT * FROM query_history ORDER BY created_at DESC, seq DESC LIMIT ?")
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .context("Failed to load query history")?;

        rows.into_iter().map(QueryExecutionRecord::try_from).collect()
    }

    pub async fn clear_all(&self, scope: &HistoryScope) -> Result<u64> {
        let result = match scope {
            HistoryScope::Caller(user_id) => {
                sqlx::query("DELETE FROM query_history WHERE requested_by = ?")
                    .bind(user_id)
                    .execute(&self.pool)
                    .await
            }
            HistoryScope::Global => sqlx::query("DELETE FROM query_history").execute(&self.pool).await,
        }
        .context("Failed to clear query history")?;

        let deleted = result.rows_affected();
        info!("Cleared {} history records ({:?})", deleted, scope);
        Ok(deleted)
    }
}
