// src/query/visualization.rs
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::validate::ValidatedPlan;

/// Results with more rows than this are shown as a table.
pub const TABLE_ROW_THRESHOLD: usize = 50;
pub const PIE_MAX_SLICES: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    Bar,
    Line,
    Pie,
    Radar,
    Table,
    Metric,
    Funnel,
}

impl ChartType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartType::Bar => "bar",
            ChartType::Line => "line",
            ChartType::Pie => "pie",
            ChartType::Radar => "radar",
            ChartType::Table => "table",
            ChartType::Metric => "metric",
            ChartType::Funnel => "funnel",
        }
    }
}

impl fmt::Display for ChartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChartType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bar" => Ok(ChartType::Bar),
            "line" => Ok(ChartType::Line),
            "pie" => Ok(ChartType::Pie),
            "radar" => Ok(ChartType::Radar),
            "table" => Ok(ChartType::Table),
            "metric" => Ok(ChartType::Metric),
            "funnel" => Ok(ChartType::Funnel),
            other => anyhow::bail!("Unknown chart type: {}", other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualizationHint {
    pub chart_type: ChartType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x_axis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y_axis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_by: Option<String>,
}

/// Pick a chart for a result. An explicit chart type always wins; otherwise
/// rules are checked in order: metric, table, pie, line, bar.
pub fn infer(plan: &ValidatedPlan, row_count: usize, explicit: Option<ChartType>) -> VisualizationHint {
    let dimensions: Vec<&str> = plan
        .outputs
        .iter()
        .filter(|o| !o.is_aggregate())
        .map(|o| o.name.as_str())
        .collect();
    let numeric: Vec<&str> = plan
        .outputs
        .iter()
        .filter(|o| o.ty.is_numeric())
        .map(|o| o.name.as_str())
        .collect();

    let chart_type = explicit.unwrap_or_else(|| {
        let all_numeric_aggregates = plan
            .outputs
            .iter()
            .all(|o| o.is_aggregate() && o.ty.is_numeric());

        if row_count == 1 && plan.group_by.is_empty() && all_numeric_aggregates {
            ChartType::Metric
        } else if plan.outputs.len() > 2 || row_count > TABLE_ROW_THRESHOLD {
            ChartType::Table
        } else if !plan.group_by.is_empty() && row_count <= PIE_MAX_SLICES && numeric.len() == 1 {
            ChartType::Pie
        } else if plan.group_by.iter().any(|g| g.is_temporal()) {
            ChartType::Line
        } else {
            ChartType::Bar
        }
    });

    VisualizationHint {
        chart_type,
        x_axis: dimensions.first().map(|d| d.to_string()),
        y_axis: numeric.first().map(|n| n.to_string()),
        group_by: dimensions.get(1).map(|d| d.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::plan::{AggregateFn, GroupKey, Projection, QueryPlan, TimeGranularity};
    use crate::query::validate::validate_plan;
    use crate::types::Role;

    fn validated(plan: QueryPlan) -> ValidatedPlan {
        validate_plan(&plan, Role::Admin).unwrap()
    }

    fn status_counts() -> ValidatedPlan {
        validated(
            QueryPlan::on(&["applications"])
                .project(Projection::column("applications.status"))
                .project(Projection::count())
                .group(GroupKey::column("applications.status")),
        )
    }

    #[test]
    fn test_single_aggregate_row_is_metric() {
        let plan = validated(QueryPlan::on(&["jobs"]).project(Projection::count()));
        let hint = infer(&plan, 1, None);
        assert_eq!(hint.chart_type, ChartType::Metric);
        assert_eq!(hint.y_axis.as_deref(), Some("count"));
        assert_eq!(hint.x_axis, None);
    }

    #[test]
    fn test_small_grouped_result_is_pie() {
        let hint = infer(&status_counts(), 4, None);
        assert_eq!(hint.chart_type, ChartType::Pie);
        assert_eq!(hint.x_axis.as_deref(), Some("status"));
        assert_eq!(hint.y_axis.as_deref(), Some("count"));
    }

    #[test]
    fn test_large_grouped_result_is_bar_then_table() {
        assert_eq!(infer(&status_counts(), 9, None).chart_type, ChartType::Bar);
        assert_eq!(infer(&status_counts(), 51, None).chart_type, ChartType::Table);
    }

    fn monthly_counts() -> ValidatedPlan {
        validated(
            QueryPlan::on(&["jobs"])
                .project(Projection::bucket(TimeGranularity::Month, "jobs.created_at"))
                .project(Projection::count())
                .group(GroupKey::bucket(TimeGranularity::Month, "jobs.created_at")),
        )
    }

    #[test]
    fn test_temporal_grouping_is_line() {
        assert_eq!(infer(&monthly_counts(), 12, None).chart_type, ChartType::Line);
    }

    #[test]
    fn test_few_temporal_buckets_are_pie() {
        assert_eq!(infer(&monthly_counts(), 3, None).chart_type, ChartType::Pie);
    }

    #[test]
    fn test_ungrouped_timestamp_column_is_bar() {
        let plan = validated(
            QueryPlan::on(&["jobs"])
                .project(Projection::column("jobs.title"))
                .project(Projection::column("jobs.created_at")),
        );
        assert_eq!(infer(&plan, 5, None).chart_type, ChartType::Bar);
    }

    #[test]
    fn test_wide_projection_is_table() {
        let plan = validated(
            QueryPlan::on(&["jobs"])
                .project(Projection::column("jobs.title"))
                .project(Projection::column("jobs.location"))
                .project(Projection::column("jobs.salary")),
        );
        assert_eq!(infer(&plan, 2, None).chart_type, ChartType::Table);
    }

    #[test]
    fn test_explicit_chart_wins() {
        let plan = validated(
            QueryPlan::on(&["jobs"]).project(Projection::aggregate(AggregateFn::Avg, "jobs.salary")),
        );
        assert_eq!(infer(&plan, 1, Some(ChartType::Radar)).chart_type, ChartType::Radar);
    }
}
