// src/query/insights.rs
use serde::Deserialize;
use std::sync::Arc;
use tracing::warn;

use super::executor::Row;
use super::visualization::ChartType;
use crate::core::llm_client::{generate_structured, GenerationCapability, GenerationRequest};

pub const INSIGHTS_FALLBACK: &str = "Unable to generate insights at this time.";
const SAMPLE_ROWS: usize = 20;

#[derive(Deserialize)]
struct InsightsResponse {
    insights: String,
}

/// Natural-language commentary on a result set. Never fails: any generation
/// problem yields [`INSIGHTS_FALLBACK`].
pub struct InsightWriter {
    generator: Arc<dyn GenerationCapability>,
}

impl InsightWriter {
    pub fn new(generator: Arc<dyn GenerationCapability>) -> Self {
        Self { generator }
    }

    pub async fn write(&self, question: &str, rows: &[Row], chart_type: ChartType) -> String {
        let sample = &rows[..rows.len().min(SAMPLE_ROWS)];
        let data = serde_json::to_string(sample).unwrap_or_else(|_| "[]".to_string());
        let note = if rows.len() > SAMPLE_ROWS {
            " (showing first 20 rows)"
        } else {
            ""
        };

        let prompt = format!(
            "Analyze the following data and provide 3-5 key insights in natural language.\n\n\
ORIGINAL QUERY: \"{}\"\n\
CHART TYPE: {}\n\
DATA: {}{}\n\n\
Insights should be specific and actionable, point out notable patterns or trends, and be \
relevant to the person who asked. Format as markdown bullet points, at most 200 words.",
            question, chart_type, data, note
        );

        let request = GenerationRequest::new("insights", prompt, r#"{"insights": "markdown formatted insights"}"#)
            .with_temperature(0.7);

        match generate_structured::<InsightsResponse>(self.generator.as_ref(), &request).await {
            Ok(response) if !response.insights.trim().is_empty() => response.insights,
            Ok(_) => INSIGHTS_FALLBACK.to_string(),
            Err(e) => {
                warn!("Insight generation failed: {}", e);
                INSIGHTS_FALLBACK.to_string()
            }
        }
    }
}
