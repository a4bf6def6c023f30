// src/query/executor.rs
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};

use super::compile::{compile, CompiledQuery};
use super::plan::QueryPlan;
use super::schema::ColumnType;
use super::validate::{validate_plan, ValidatedPlan};
use super::visualization::{infer, ChartType, VisualizationHint};
use crate::error::{InsightError, InsightResult};
use crate::types::CallerContext;

pub type Row = Map<String, Value>;

/// Read-only access to the domain data.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn fetch_rows(&self, query: &CompiledQuery) -> anyhow::Result<Vec<Row>>;
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub rows: Vec<Row>,
    pub visualization: VisualizationHint,
    pub row_count: usize,
    pub truncated: bool,
    pub execution_ms: u64,
}

pub struct QueryExecutor {
    source: Arc<dyn DataSource>,
    timeout: Duration,
}

impl QueryExecutor {
    pub fn new(source: Arc<dyn DataSource>, timeout: Duration) -> Self {
        Self { source, timeout }
    }

    /// Validate, compile and run `plan` for `caller`. Failures are never retried.
    pub async fn execute(
        &self,
        plan: &QueryPlan,
        caller: &CallerContext,
        chart_type: Option<ChartType>,
    ) -> InsightResult<QueryResult> {
        let validated = validate_plan(plan, caller.role).map_err(|violation| {
            error!(target: "plan_defect", "Rejected plan at execution: {}", violation);
            InsightError::UnsafePlan(violation.to_string())
        })?;

        let compiled = compile(&validated, caller);
        let started = Instant::now();

        let mut rows = match tokio::time::timeout(self.timeout, self.source.fetch_rows(&compiled)).await {
            Ok(Ok(rows)) => rows,
            Ok(Err(e)) => return Err(InsightError::execution("Query execution failed", format!("{:#}", e))),
            Err(_) => {
                return Err(InsightError::execution(
                    "Query timed out",
                    format!("no result after {:?}", self.timeout),
                ))
            }
        };

        let limit = validated.limit as usize;
        let truncated = rows.len() > limit;
        rows.truncate(limit);
        shape_rows(&validated, &mut rows);

        let execution_ms = started.elapsed().as_millis() as u64;
        let visualization = infer(&validated, rows.len(), chart_type);

        info!(
            "Executed plan on {} for {}: {} rows in {}ms",
            validated.root.name,
            caller.role,
            rows.len(),
            execution_ms
        );

        Ok(QueryResult {
            row_count: rows.len(),
            rows,
            visualization,
            truncated,
            execution_ms,
        })
    }
}

/// Restore declared types SQLite does not keep: booleans and JSON lists.
fn shape_rows(plan: &ValidatedPlan, rows: &mut [Row]) {
    for output in &plan.outputs {
        if output.is_aggregate() {
            continue;
        }
        for row in rows.iter_mut() {
            let Some(value) = row.get_mut(&output.name) else {
                continue;
            };
            match (output.ty, &*value) {
                (ColumnType::Boolean, Value::Number(n)) => {
                    *value = Value::Bool(n.as_i64().unwrap_or(0) != 0);
                }
                (ColumnType::JsonList, Value::String(s)) => {
                    if let Ok(parsed @ Value::Array(_)) = serde_json::from_str::<Value>(s) {
                        *value = parsed;
                    }
                }
                _ => {}
            }
        }
    }
}
