// src/query/translator.rs
//! Turns a caller's question (free text or template + params) into a
//! whitelist-validated [`QueryPlan`].

use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::plan::QueryPlan;
use super::schema::describe_for_role;
use super::templates::TemplateRegistry;
use super::validate::validate_plan;
use super::visualization::ChartType;
use crate::core::llm_client::{
    generate_structured, GenerationCapability, GenerationError, GenerationRequest,
};
use crate::error::{InsightError, InsightResult};
use crate::types::{CallerContext, Role};

pub const MAX_QUESTION_LEN: usize = 1000;

const CLASSIFY_SCHEMA: &str = r#"{"answerable": boolean, "reason": string}"#;

const PLAN_SCHEMA: &str = r#"{
  "plan": {
    "targetEntities": [string],
    "projections": [{"column"?: "table.column", "aggregate"?: "COUNT" | "AVG" | "SUM" | "MIN" | "MAX", "bucket"?: "day" | "week" | "month", "alias"?: string}],
    "filters": [{"column": "table.column", "operator": "eq" | "neq" | "gt" | "gte" | "lt" | "lte" | "in" | "between" | "contains", "value": any}],
    "groupBy": [{"column": "table.column", "bucket"?: "day" | "week" | "month"}],
    "orderBy": [{"key": string, "direction": "asc" | "desc"}],
    "limit"?: number
  },
  "explanation": string,
  "chartType"?: "bar" | "line" | "pie" | "radar" | "table" | "metric" | "funnel"
}"#;

#[derive(Debug, Clone, Default)]
pub struct TranslationInput {
    pub free_text: Option<String>,
    pub template_id: Option<String>,
    pub params: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedQuery {
    pub plan: QueryPlan,
    pub chart_type: Option<ChartType>,
    pub explanation: Option<String>,
    /// What to show as the question in history.
    pub label: String,
    pub template_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Classification {
    answerable: bool,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeneratedPlan {
    plan: QueryPlan,
    #[serde(default)]
    explanation: Option<String>,
    #[serde(default)]
    chart_type: Option<ChartType>,
}

pub struct QueryTranslator {
    registry: Arc<TemplateRegistry>,
    generator: Arc<dyn GenerationCapability>,
}

impl QueryTranslator {
    pub fn new(registry: Arc<TemplateRegistry>, generator: Arc<dyn GenerationCapability>) -> Self {
        Self {
            registry,
            generator,
        }
    }

    /// A template id takes precedence over free text; the text then only
    /// serves as the display label.
    pub async fn translate(
        &self,
        input: &TranslationInput,
        caller: &CallerContext,
    ) -> InsightResult<TranslatedQuery> {
        let free_text = input
            .free_text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty());

        match (&input.template_id, free_text) {
            (Some(template_id), text) => self.from_template(template_id, &input.params, text, caller),
            (None, Some(text)) => self.from_free_text(text, caller).await,
            (None, None) => Err(InsightError::InvalidParameters("Query is required".to_string())),
        }
    }

    fn from_template(
        &self,
        template_id: &str,
        raw_params: &Map<String, Value>,
        label: Option<&str>,
        caller: &CallerContext,
    ) -> InsightResult<TranslatedQuery> {
        let template = self
            .registry
            .get(template_id)
            .ok_or_else(|| InsightError::NotFound(format!("Template '{}' not found", template_id)))?;

        if !template.allows(caller.role) {
            return Err(InsightError::Forbidden(format!(
                "Template '{}' is not available for role {}",
                template_id, caller.role
            )));
        }

        let params = template.validate_params(raw_params)?;
        let plan = template.build_plan(&params);

        if let Err(violation) = validate_plan(&plan, caller.role) {
            error!(target: "plan_defect", "Template {} built an invalid plan: {}", template.id, violation);
            return Err(InsightError::UnsafePlan(violation.to_string()));
        }

        Ok(TranslatedQuery {
            plan,
            chart_type: template.chart_type,
            explanation: Some(template.description.to_string()),
            label: label.unwrap_or(template.label).to_string(),
            template_id: Some(template.id.to_string()),
        })
    }

    async fn from_free_text(&self, text: &str, caller: &CallerContext) -> InsightResult<TranslatedQuery> {
        if text.chars().count() > MAX_QUESTION_LEN {
            return Err(InsightError::InvalidParameters(format!(
                "Query must be at most {} characters",
                MAX_QUESTION_LEN
            )));
        }

        let request = GenerationRequest::new("classify", classify_prompt(text, caller.role), CLASSIFY_SCHEMA)
            .with_temperature(0.0);
        let classification: Classification = generate_structured(self.generator.as_ref(), &request)
            .await
            .map_err(generation_failure)?;

        if !classification.answerable {
            info!("Question classified as unanswerable for {}", caller.role);
            return Err(InsightError::Unanswerable(classification.reason.unwrap_or_else(|| {
                "This question cannot be answered from placement data".to_string()
            })));
        }

        let request = GenerationRequest::new("plan", plan_prompt(text, caller.role), PLAN_SCHEMA).with_temperature(0.1);
        let generated: GeneratedPlan = match generate_structured(self.generator.as_ref(), &request).await {
            Ok(generated) => generated,
            Err(GenerationError::Malformed(detail)) => {
                error!(target: "plan_defect", "Generated plan has an invalid shape: {}", detail);
                return Err(InsightError::UnsafePlan(
                    "the generated plan does not match the plan structure".to_string(),
                ));
            }
            Err(other) => return Err(generation_failure(other)),
        };

        if let Err(violation) = validate_plan(&generated.plan, caller.role) {
            error!(target: "plan_defect", "Generated plan rejected for {}: {}", caller.role, violation);
            return Err(InsightError::UnsafePlan(violation.to_string()));
        }

        Ok(TranslatedQuery {
            plan: generated.plan,
            chart_type: generated.chart_type,
            explanation: generated.explanation,
            label: text.to_string(),
            template_id: None,
        })
    }
}

pub(crate) fn generation_failure(err: GenerationError) -> InsightError {
    match err {
        GenerationError::RateLimited { retry_after_secs } => {
            warn!("Generation quota exceeded (retry after: {:?})", retry_after_secs);
            InsightError::RateLimited { retry_after_secs }
        }
        other => InsightError::execution("AI service unavailable", other),
    }
}

fn classify_prompt(question: &str, role: Role) -> String {
    format!(
        "Decide whether the question below can be answered with a read-only analytical query over \
the placement portal data available to a {role} user.\n\n\
{schema}\n\
Answerable questions ask for counts, lists, averages, distributions or trends over these tables. \
Requests to modify, delete or create data, questions about other systems, and questions needing \
data outside these tables are NOT answerable.\n\n\
QUESTION: \"{question}\"",
        role = role,
        schema = describe_for_role(role),
        question = question
    )
}

fn plan_prompt(question: &str, role: Role) -> String {
    format!(
        "Convert the question into a query plan for the placement portal.\n\n\
USER ROLE: {role}\n\
{schema}\n\
RULES:\n\
1. Use only the tables and columns listed above, written as table.column.\n\
2. The first target entity is the main table; every other target must join to an earlier one through a listed join.\n\
3. Aggregates: COUNT (may omit the column for COUNT(*)), AVG and SUM on numeric columns, MIN and MAX on numeric or timestamp columns.\n\
4. Timestamp columns may be bucketed by day, week or month; bucket the projection and the groupBy entry the same way.\n\
5. Every non-aggregated projection must appear in groupBy when any aggregate is used.\n\
6. Filter operators: eq, neq, gt, gte, lt, lte, in (array value), between ([low, high]), contains (text or list columns).\n\
7. Dates are written as YYYY-MM-DD.\n\
8. Rows belonging to the current user are selected automatically; do not filter by user, student or company id.\n\
9. orderBy keys are projection aliases or table.column.\n\
10. Keep results small: use a limit such as 10 or 20 for rankings.\n\n\
QUESTION: \"{question}\"",
        role = role,
        schema = describe_for_role(role),
        question = question
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::plan::Projection;
    use crate::test_support::ScriptedGeneration;
    use serde_json::json;

    fn translator(generator: Arc<ScriptedGeneration>) -> QueryTranslator {
        QueryTranslator::new(Arc::new(TemplateRegistry::builtin()), generator)
    }

    fn input(text: Option<&str>, template: Option<&str>) -> TranslationInput {
        TranslationInput {
            free_text: text.map(String::from),
            template_id: template.map(String::from),
            params: Map::new(),
        }
    }

    #[tokio::test]
    async fn test_template_path_needs_no_generation() {
        let generator = Arc::new(ScriptedGeneration::new());
        let translated = translator(generator.clone())
            .translate(&input(None, Some("jobs-count")), &CallerContext::admin("a"))
            .await
            .unwrap();

        assert_eq!(translated.plan, QueryPlan::on(&["jobs"]).project(Projection::count()));
        assert_eq!(translated.chart_type, Some(ChartType::Metric));
        assert_eq!(translated.template_id.as_deref(), Some("jobs-count"));
        assert_eq!(generator.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_template_errors() {
        let t = translator(Arc::new(ScriptedGeneration::new()));

        let err = t
            .translate(&input(None, Some("no-such-template")), &CallerContext::admin("a"))
            .await
            .unwrap_err();
        assert!(matches!(err, InsightError::NotFound(_)));

        let err = t
            .translate(&input(None, Some("jobs-count")), &CallerContext::student("u", "s"))
            .await
            .unwrap_err();
        assert!(matches!(err, InsightError::Forbidden(_)));

        let err = t
            .translate(&input(None, Some("student-eligible-jobs")), &CallerContext::student("u", "s"))
            .await
            .unwrap_err();
        assert!(matches!(err, InsightError::InvalidParameters(_)));
    }

    #[tokio::test]
    async fn test_template_wins_over_free_text() {
        let generator = Arc::new(ScriptedGeneration::new());
        let translated = translator(generator.clone())
            .translate(&input(Some("how many jobs?"), Some("jobs-count")), &CallerContext::admin("a"))
            .await
            .unwrap();
        assert_eq!(translated.label, "how many jobs?");
        assert_eq!(generator.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_question() {
        let err = translator(Arc::new(ScriptedGeneration::new()))
            .translate(&input(Some("   "), None), &CallerContext::admin("a"))
            .await
            .unwrap_err();
        assert_eq!(err, InsightError::InvalidParameters("Query is required".to_string()));
    }

    #[tokio::test]
    async fn test_unanswerable_stops_before_planning() {
        let generator = Arc::new(
            ScriptedGeneration::new()
                .respond("classify", json!({"answerable": false, "reason": "Modifying data is not supported"})),
        );
        let err = translator(generator.clone())
            .translate(&input(Some("Drop the jobs table"), None), &CallerContext::admin("a"))
            .await
            .unwrap_err();

        assert_eq!(err, InsightError::Unanswerable("Modifying data is not supported".to_string()));
        assert_eq!(generator.calls("plan"), 0);
    }

    #[tokio::test]
    async fn test_generated_plan_must_pass_whitelist() {
        let generator = Arc::new(
            ScriptedGeneration::new()
                .respond("classify", json!({"answerable": true}))
                .respond(
                    "plan",
                    json!({"plan": {"targetEntities": ["users"], "projections": [{"column": "users.email"}]}}),
                ),
        );
        let err = translator(generator)
            .translate(&input(Some("list every email"), None), &CallerContext::company("u", "c"))
            .await
            .unwrap_err();
        assert!(matches!(err, InsightError::UnsafePlan(_)));
    }

    #[tokio::test]
    async fn test_generated_raw_sql_is_rejected_by_shape() {
        let generator = Arc::new(
            ScriptedGeneration::new()
                .respond("classify", json!({"answerable": true}))
                .respond("plan", json!({"sql": "DROP TABLE jobs", "explanation": "x"})),
        );
        let err = translator(generator)
            .translate(&input(Some("Drop the jobs table"), None), &CallerContext::admin("a"))
            .await
            .unwrap_err();
        assert!(matches!(err, InsightError::UnsafePlan(_)));
    }

    #[tokio::test]
    async fn test_free_text_produces_validated_plan() {
        let generator = Arc::new(
            ScriptedGeneration::new()
                .respond("classify", json!({"answerable": true}))
                .respond(
                    "plan",
                    json!({
                        "plan": {
                            "targetEntities": ["jobs"],
                            "projections": [{"column": "jobs.title"}],
                            "filters": [{"column": "jobs.status", "operator": "eq", "value": "active"}]
                        },
                        "explanation": "Active jobs",
                        "chartType": "table"
                    }),
                ),
        );
        let translated = translator(generator)
            .translate(&input(Some("Show me all active jobs"), None), &CallerContext::company("u", "c"))
            .await
            .unwrap();
        assert_eq!(translated.chart_type, Some(ChartType::Table));
        assert_eq!(translated.explanation.as_deref(), Some("Active jobs"));
        assert_eq!(translated.label, "Show me all active jobs");
    }

    #[tokio::test]
    async fn test_generation_outage_is_execution_error() {
        let generator = Arc::new(
            ScriptedGeneration::new().fail("classify", GenerationError::Transport("connection refused".into())),
        );
        let err = translator(generator)
            .translate(&input(Some("how many jobs"), None), &CallerContext::admin("a"))
            .await
            .unwrap_err();
        assert_eq!(err, InsightError::ExecutionError("AI service unavailable".to_string()));
    }

    #[tokio::test]
    async fn test_quota_exhaustion_keeps_retry_hint() {
        let generator = Arc::new(ScriptedGeneration::new().fail(
            "classify",
            GenerationError::RateLimited {
                retry_after_secs: Some(12),
            },
        ));
        let err = translator(generator)
            .translate(&input(Some("how many jobs"), None), &CallerContext::admin("a"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            InsightError::RateLimited {
                retry_after_secs: Some(12)
            }
        );
        assert_eq!(err.http_status(), 429);
    }

    #[tokio::test]
    async fn test_overlong_question_rejected() {
        let long = "a".repeat(MAX_QUESTION_LEN + 1);
        let err = translator(Arc::new(ScriptedGeneration::new()))
            .translate(&input(Some(&long), None), &CallerContext::admin("a"))
            .await
            .unwrap_err();
        assert!(matches!(err, InsightError::InvalidParameters(_)));
    }
}
