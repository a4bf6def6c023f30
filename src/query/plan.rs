// src/query/plan.rs
//! The closed query plan structure. This is the only shape that crosses the
//! boundary between generated (untrusted) content and execution.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// `table.column` or a bare `column`, serialized as a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ColumnRef {
    pub table: Option<String>,
    pub column: String,
}

impl ColumnRef {
    pub fn qualified(table: &str, column: &str) -> Self {
        Self {
            table: Some(table.to_string()),
            column: column.to_string(),
        }
    }
}

impl From<&str> for ColumnRef {
    fn from(value: &str) -> Self {
        match value.trim().split_once('.') {
            Some((table, column)) => Self {
                table: Some(table.trim().to_string()),
                column: column.trim().to_string(),
            },
            None => Self {
                table: None,
                column: value.trim().to_string(),
            },
        }
    }
}

impl From<String> for ColumnRef {
    fn from(value: String) -> Self {
        ColumnRef::from(value.as_str())
    }
}

impl From<ColumnRef> for String {
    fn from(value: ColumnRef) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.table {
            Some(table) => write!(f, "{}.{}", table, self.column),
            None => f.write_str(&self.column),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AggregateFn {
    #[serde(alias = "count")]
    Count,
    #[serde(alias = "avg")]
    Avg,
    #[serde(alias = "sum")]
    Sum,
    #[serde(alias = "min")]
    Min,
    #[serde(alias = "max")]
    Max,
}

impl AggregateFn {
    pub fn sql_name(&self) -> &'static str {
        match self {
            AggregateFn::Count => "COUNT",
            AggregateFn::Avg => "AVG",
            AggregateFn::Sum => "SUM",
            AggregateFn::Min => "MIN",
            AggregateFn::Max => "MAX",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeGranularity {
    Day,
    Week,
    Month,
}

impl TimeGranularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeGranularity::Day => "day",
            TimeGranularity::Week => "week",
            TimeGranularity::Month => "month",
        }
    }
}

/// One output column: a plain column, an aggregate, or a time bucket.
/// `COUNT(*)` is an aggregate of `Count` with no column.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Projection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<ColumnRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregate: Option<AggregateFn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<TimeGranularity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl Projection {
    pub fn column(column: &str) -> Self {
        Self {
            column: Some(column.into()),
            ..Default::default()
        }
    }

    pub fn count() -> Self {
        Self {
            aggregate: Some(AggregateFn::Count),
            ..Default::default()
        }
    }

    pub fn aggregate(func: AggregateFn, column: &str) -> Self {
        Self {
            column: Some(column.into()),
            aggregate: Some(func),
            ..Default::default()
        }
    }

    pub fn bucket(granularity: TimeGranularity, column: &str) -> Self {
        Self {
            column: Some(column.into()),
            bucket: Some(granularity),
            ..Default::default()
        }
    }

    pub fn alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.to_string());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Between,
    Contains,
}

impl FilterOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::Neq => "neq",
            FilterOp::Gt => "gt",
            FilterOp::Gte => "gte",
            FilterOp::Lt => "lt",
            FilterOp::Lte => "lte",
            FilterOp::In => "in",
            FilterOp::Between => "between",
            FilterOp::Contains => "contains",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub column: ColumnRef,
    #[serde(alias = "op")]
    pub operator: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn new(column: &str, operator: FilterOp, value: Value) -> Self {
        Self {
            column: column.into(),
            operator,
            value,
        }
    }

    pub fn eq(column: &str, value: impl Into<Value>) -> Self {
        Self::new(column, FilterOp::Eq, value.into())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "GroupKeyRepr")]
pub struct GroupKey {
    pub column: ColumnRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<TimeGranularity>,
}

/// Group keys may arrive as a bare column string or as an object.
#[derive(Deserialize)]
#[serde(untagged)]
enum GroupKeyRepr {
    Column(ColumnRef),
    Detailed {
        column: ColumnRef,
        #[serde(default)]
        bucket: Option<TimeGranularity>,
    },
}

impl From<GroupKeyRepr> for GroupKey {
    fn from(repr: GroupKeyRepr) -> Self {
        match repr {
            GroupKeyRepr::Column(column) => GroupKey {
                column,
                bucket: None,
            },
            GroupKeyRepr::Detailed { column, bucket } => GroupKey { column, bucket },
        }
    }
}

impl GroupKey {
    pub fn column(column: &str) -> Self {
        Self {
            column: column.into(),
            bucket: None,
        }
    }

    pub fn bucket(granularity: TimeGranularity, column: &str) -> Self {
        Self {
            column: column.into(),
            bucket: Some(granularity),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    #[serde(alias = "ASC")]
    Asc,
    #[serde(alias = "DESC")]
    Desc,
}

/// Sort key: an output name (alias or default name) or a column reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub key: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl OrderBy {
    pub fn asc(key: &str) -> Self {
        Self {
            key: key.to_string(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(key: &str) -> Self {
        Self {
            key: key.to_string(),
            direction: SortDirection::Desc,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPlan {
    pub target_entities: Vec<String>,
    pub projections: Vec<Projection>,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub group_by: Vec<GroupKey>,
    #[serde(default)]
    pub order_by: Vec<OrderBy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
}

impl QueryPlan {
    pub fn on(entities: &[&str]) -> Self {
        Self {
            target_entities: entities.iter().map(|e| e.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn project(mut self, projection: Projection) -> Self {
        self.projections.push(projection);
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn group(mut self, key: GroupKey) -> Self {
        self.group_by.push(key);
        self
    }

    pub fn order(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plan_deserializes_from_generated_json() {
        let plan: QueryPlan = serde_json::from_value(json!({
            "targetEntities": ["jobs"],
            "projections": [
                {"column": "jobs.status"},
                {"aggregate": "count", "alias": "total"}
            ],
            "filters": [{"column": "salary", "op": "gte", "value": 50000}],
            "groupBy": ["jobs.status"],
            "orderBy": [{"key": "total", "direction": "DESC"}],
            "limit": 20
        }))
        .unwrap();

        assert_eq!(plan.target_entities, vec!["jobs"]);
        assert_eq!(plan.projections[1].aggregate, Some(AggregateFn::Count));
        assert_eq!(plan.filters[0].column, ColumnRef::from("salary"));
        assert_eq!(plan.group_by[0], GroupKey::column("jobs.status"));
        assert_eq!(plan.order_by[0].direction, SortDirection::Desc);
        assert_eq!(plan.limit, Some(20));
    }

    #[test]
    fn test_group_key_accepts_object_form() {
        let key: GroupKey =
            serde_json::from_value(json!({"column": "jobs.created_at", "bucket": "month"})).unwrap();
        assert_eq!(key, GroupKey::bucket(TimeGranularity::Month, "jobs.created_at"));
    }

    #[test]
    fn test_unknown_operator_is_rejected_by_shape() {
        let result = serde_json::from_value::<Filter>(json!({
            "column": "jobs.title", "operator": "raw_sql", "value": "1=1"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_column_ref_display() {
        assert_eq!(ColumnRef::from("jobs.title").to_string(), "jobs.title");
        assert_eq!(ColumnRef::from("title").to_string(), "title");
    }
}
