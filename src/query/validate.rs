// src/query/validate.rs
//! Whitelist validation: resolves every name in a [`QueryPlan`] against the
//! static schema and the caller's role, and converts filter values into
//! typed bind values. Nothing reaches the compiler without passing here.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;
use thiserror::Error;

use super::plan::{
    AggregateFn, ColumnRef, FilterOp, Projection, QueryPlan, SortDirection, TimeGranularity,
};
use super::schema::{self, ColumnDef, ColumnType, Relation, TableDef};
use crate::core::clock::DB_TIMESTAMP_FORMAT;
use crate::types::Role;

pub const DEFAULT_LIMIT: u64 = 100;
pub const MAX_LIMIT: u64 = 1000;
pub const MAX_IN_VALUES: usize = 100;

const MAX_ENTITIES: usize = 4;
const MAX_PROJECTIONS: usize = 16;
const MAX_FILTERS: usize = 16;
const MAX_GROUP_KEYS: usize = 4;
const MAX_ORDER_KEYS: usize = 4;
const MAX_ALIAS_LEN: usize = 48;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanViolation {
    #[error("plan has no target entities")]
    NoTargets,

    #[error("plan has no projections")]
    NoProjections,

    #[error("unknown table '{0}'")]
    UnknownTable(String),

    #[error("table '{0}' is not available for this role")]
    TableNotPermitted(String),

    #[error("table '{0}' is listed more than once")]
    DuplicateTarget(String),

    #[error("no join path from '{0}' to the preceding entities")]
    NoJoinPath(String),

    #[error("unknown column '{0}'")]
    UnknownColumn(String),

    #[error("column '{0}' is not available for this role")]
    ForbiddenColumn(String),

    #[error("table '{0}' is not one of the plan's target entities")]
    OutsideTargets(String),

    #[error("column '{0}' is ambiguous, qualify it with a table name")]
    AmbiguousColumn(String),

    #[error("projection {index} is invalid: {reason}")]
    InvalidProjection { index: usize, reason: String },

    #[error("invalid alias '{0}'")]
    InvalidAlias(String),

    #[error("duplicate output name '{0}'")]
    DuplicateOutput(String),

    #[error("{func} cannot be applied to column '{column}'")]
    AggregateTypeMismatch { func: &'static str, column: String },

    #[error("time bucket requires a timestamp column, got '{0}'")]
    BucketOnNonTemporal(String),

    #[error("column '{0}' must appear in groupBy or inside an aggregate")]
    UngroupedColumn(String),

    #[error("invalid value for filter on '{column}': {reason}")]
    InvalidFilterValue { column: String, reason: String },

    #[error("unknown order key '{0}'")]
    UnknownOrderKey(String),

    #[error("limit must be at least 1")]
    ZeroLimit,

    #[error("too many {0}")]
    TooMany(&'static str),
}

/// A column resolved against the whitelist.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedColumn {
    pub table: &'static TableDef,
    pub column: &'static ColumnDef,
}

impl ResolvedColumn {
    pub fn ty(&self) -> ColumnType {
        self.column.ty
    }

    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.table.name, self.column.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Join {
    pub table: &'static TableDef,
    pub relation: &'static Relation,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputExpr {
    CountAll,
    Aggregate {
        func: AggregateFn,
        column: ResolvedColumn,
    },
    Bucket {
        granularity: TimeGranularity,
        column: ResolvedColumn,
    },
    Column(ResolvedColumn),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    pub name: String,
    pub expr: OutputExpr,
    pub ty: ColumnType,
}

impl Output {
    pub fn is_aggregate(&self) -> bool {
        matches!(self.expr, OutputExpr::CountAll | OutputExpr::Aggregate { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupExpr {
    pub column: ResolvedColumn,
    pub bucket: Option<TimeGranularity>,
}

impl GroupExpr {
    pub fn is_temporal(&self) -> bool {
        self.bucket.is_some() || self.column.ty().is_temporal()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Text(String),
    Integer(i64),
    Real(f64),
    Bool(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Single(BindValue),
    List(Vec<BindValue>),
    Range(BindValue, BindValue),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedFilter {
    pub column: ResolvedColumn,
    pub operator: FilterOp,
    pub value: FilterValue,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrderTarget {
    Output(usize),
    Column(ResolvedColumn),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedPlan {
    pub role: Role,
    pub root: &'static TableDef,
    pub joins: Vec<Join>,
    pub outputs: Vec<Output>,
    pub filters: Vec<ValidatedFilter>,
    pub group_by: Vec<GroupExpr>,
    pub order_by: Vec<(OrderTarget, SortDirection)>,
    pub limit: u64,
}

impl ValidatedPlan {
    pub fn tables(&self) -> impl Iterator<Item = &'static TableDef> + '_ {
        std::iter::once(self.root).chain(self.joins.iter().map(|j| j.table))
    }

    pub fn is_aggregated(&self) -> bool {
        !self.group_by.is_empty() || self.outputs.iter().any(Output::is_aggregate)
    }
}

pub fn validate_plan(plan: &QueryPlan, role: Role) -> Result<ValidatedPlan, PlanViolation> {
    if plan.target_entities.is_empty() {
        return Err(PlanViolation::NoTargets);
    }
    check_count(plan.target_entities.len(), MAX_ENTITIES, "target entities")?;
    check_count(plan.projections.len(), MAX_PROJECTIONS, "projections")?;
    check_count(plan.filters.len(), MAX_FILTERS, "filters")?;
    check_count(plan.group_by.len(), MAX_GROUP_KEYS, "group keys")?;
    check_count(plan.order_by.len(), MAX_ORDER_KEYS, "order keys")?;

    let (root, joins) = resolve_targets(&plan.target_entities, role)?;
    let scope = Scope {
        role,
        tables: std::iter::once(root).chain(joins.iter().map(|j| j.table)).collect(),
    };

    let group_by = plan
        .group_by
        .iter()
        .map(|key| {
            let column = scope.resolve(&key.column)?;
            if key.bucket.is_some() && !column.ty().is_temporal() {
                return Err(PlanViolation::BucketOnNonTemporal(column.qualified_name()));
            }
            Ok(GroupExpr {
                column,
                bucket: key.bucket,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if plan.projections.is_empty() {
        return Err(PlanViolation::NoProjections);
    }
    let mut outputs: Vec<Output> = Vec::with_capacity(plan.projections.len());
    for (index, projection) in plan.projections.iter().enumerate() {
        let (expr, ty, default_name) = resolve_projection(&scope, index, projection)?;
        let name = match &projection.alias {
            Some(alias) => {
                if !is_valid_alias(alias) {
                    return Err(PlanViolation::InvalidAlias(alias.clone()));
                }
                alias.clone()
            }
            None => default_name,
        };
        if outputs.iter().any(|o| o.name == name) {
            return Err(PlanViolation::DuplicateOutput(name));
        }
        outputs.push(Output { name, expr, ty });
    }

    let aggregated = !group_by.is_empty() || outputs.iter().any(Output::is_aggregate);
    if aggregated {
        for output in &outputs {
            let grouped = match output.expr {
                OutputExpr::CountAll | OutputExpr::Aggregate { .. } => true,
                OutputExpr::Column(column) => group_by
                    .iter()
                    .any(|g| g.bucket.is_none() && g.column == column),
                OutputExpr::Bucket {
                    granularity,
                    column,
                } => group_by
                    .iter()
                    .any(|g| g.bucket == Some(granularity) && g.column == column),
            };
            if !grouped {
                return Err(PlanViolation::UngroupedColumn(output.name.clone()));
            }
        }
    }

    let filters = plan
        .filters
        .iter()
        .map(|filter| {
            let column = scope.resolve(&filter.column)?;
            let value = convert_filter_value(column, filter.operator, &filter.value)?;
            Ok(ValidatedFilter {
                column,
                operator: filter.operator,
                value,
            })
        })
        .collect::<Result<Vec<_>, PlanViolation>>()?;

    let order_by = plan
        .order_by
        .iter()
        .map(|order| {
            if let Some(index) = outputs.iter().position(|o| o.name == order.key) {
                return Ok((OrderTarget::Output(index), order.direction));
            }
            let column = scope
                .resolve(&ColumnRef::from(order.key.as_str()))
                .map_err(|_| PlanViolation::UnknownOrderKey(order.key.clone()))?;
            if aggregated && !group_by.iter().any(|g| g.bucket.is_none() && g.column == column) {
                return Err(PlanViolation::UngroupedColumn(column.qualified_name()));
            }
            Ok((OrderTarget::Column(column), order.direction))
        })
        .collect::<Result<Vec<_>, PlanViolation>>()?;

    let limit = match plan.limit {
        None => DEFAULT_LIMIT,
        Some(0) => return Err(PlanViolation::ZeroLimit),
        Some(n) => n.min(MAX_LIMIT),
    };

    Ok(ValidatedPlan {
        role,
        root,
        joins,
        outputs,
        filters,
        group_by,
        order_by,
        limit,
    })
}

fn check_count(count: usize, max: usize, what: &'static str) -> Result<(), PlanViolation> {
    if count > max {
        Err(PlanViolation::TooMany(what))
    } else {
        Ok(())
    }
}

fn resolve_targets(
    entities: &[String],
    role: Role,
) -> Result<(&'static TableDef, Vec<Join>), PlanViolation> {
    let mut resolved: Vec<&'static TableDef> = Vec::with_capacity(entities.len());
    let mut joins = Vec::new();

    for name in entities {
        let def = schema::table(name).ok_or_else(|| PlanViolation::UnknownTable(name.clone()))?;
        if schema::permission(role, def.name).is_none() {
            return Err(PlanViolation::TableNotPermitted(def.name.to_string()));
        }
        if resolved.iter().any(|t| t.name == def.name) {
            return Err(PlanViolation::DuplicateTarget(def.name.to_string()));
        }
        if !resolved.is_empty() {
            let relation = resolved
                .iter()
                .find_map(|previous| schema::relation_between(previous.name, def.name))
                .ok_or_else(|| PlanViolation::NoJoinPath(def.name.to_string()))?;
            joins.push(Join {
                table: def,
                relation,
            });
        }
        resolved.push(def);
    }

    Ok((resolved[0], joins))
}

struct Scope {
    role: Role,
    tables: Vec<&'static TableDef>,
}

impl Scope {
    fn resolve(&self, column_ref: &ColumnRef) -> Result<ResolvedColumn, PlanViolation> {
        let resolved = match &column_ref.table {
            Some(table_name) => {
                let def = schema::table(table_name)
                    .ok_or_else(|| PlanViolation::UnknownTable(table_name.clone()))?;
                if !self.tables.iter().any(|t| t.name == def.name) {
                    return Err(PlanViolation::OutsideTargets(def.name.to_string()));
                }
                let column = def
                    .column(&column_ref.column)
                    .ok_or_else(|| PlanViolation::UnknownColumn(column_ref.to_string()))?;
                ResolvedColumn { table: def, column }
            }
            None => {
                let mut matches = self.tables.iter().copied().filter_map(|def| {
                    def.column(&column_ref.column)
                        .map(|column| ResolvedColumn { table: def, column })
                });
                let first = matches
                    .next()
                    .ok_or_else(|| PlanViolation::UnknownColumn(column_ref.to_string()))?;
                if matches.next().is_some() {
                    return Err(PlanViolation::AmbiguousColumn(column_ref.column.clone()));
                }
                first
            }
        };

        let allowed = schema::permission(self.role, resolved.table.name)
            .map(|p| p.allows_column(resolved.column.name))
            .unwrap_or(false);
        if !allowed {
            return Err(PlanViolation::ForbiddenColumn(resolved.qualified_name()));
        }

        Ok(resolved)
    }
}

fn resolve_projection(
    scope: &Scope,
    index: usize,
    projection: &Projection,
) -> Result<(OutputExpr, ColumnType, String), PlanViolation> {
    let invalid = |reason: &str| PlanViolation::InvalidProjection {
        index,
        reason: reason.to_string(),
    };

    match (projection.aggregate, projection.bucket, &projection.column) {
        (Some(_), Some(_), _) => Err(invalid("aggregate and bucket cannot be combined")),
        (Some(AggregateFn::Count), None, None) => {
            Ok((OutputExpr::CountAll, ColumnType::Integer, "count".to_string()))
        }
        (Some(_), None, None) => Err(invalid("only COUNT may omit its column")),
        (None, _, None) => Err(invalid("a column is required")),
        (Some(func), None, Some(column_ref)) => {
            let column = scope.resolve(column_ref)?;
            let ty = column.ty();
            let output_ty = match func {
                AggregateFn::Count => ColumnType::Integer,
                AggregateFn::Avg if ty.is_numeric() => ColumnType::Real,
                AggregateFn::Sum if ty.is_numeric() => ty,
                AggregateFn::Min | AggregateFn::Max if ty.is_numeric() || ty.is_temporal() => ty,
                _ => {
                    return Err(PlanViolation::AggregateTypeMismatch {
                        func: func.sql_name(),
                        column: column.qualified_name(),
                    })
                }
            };
            let name = format!("{}_{}", func.sql_name().to_lowercase(), column.column.name);
            Ok((OutputExpr::Aggregate { func, column }, output_ty, name))
        }
        (None, Some(granularity), Some(column_ref)) => {
            let column = scope.resolve(column_ref)?;
            if !column.ty().is_temporal() {
                return Err(PlanViolation::BucketOnNonTemporal(column.qualified_name()));
            }
            Ok((
                OutputExpr::Bucket {
                    granularity,
                    column,
                },
                ColumnType::Text,
                granularity.as_str().to_string(),
            ))
        }
        (None, None, Some(column_ref)) => {
            let column = scope.resolve(column_ref)?;
            Ok((
                OutputExpr::Column(column),
                column.ty(),
                column.column.name.to_string(),
            ))
        }
    }
}

pub fn is_valid_alias(alias: &str) -> bool {
    let mut chars = alias.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    alias.len() <= MAX_ALIAS_LEN
        && (first.is_ascii_lowercase() || first == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

fn convert_filter_value(
    column: ResolvedColumn,
    operator: FilterOp,
    value: &Value,
) -> Result<FilterValue, PlanViolation> {
    let invalid = |reason: String| PlanViolation::InvalidFilterValue {
        column: column.qualified_name(),
        reason,
    };
    let ty = column.ty();

    match operator {
        FilterOp::Contains => {
            if !matches!(ty, ColumnType::Text | ColumnType::JsonList) {
                return Err(invalid("contains applies to text and list columns".to_string()));
            }
            let needle = value
                .as_str()
                .filter(|s| !s.trim().is_empty())
                .ok_or_else(|| invalid("contains expects a non-empty string".to_string()))?;
            let needle = needle.trim();
            let pattern = match ty {
                // Match a whole element of the stored JSON array, not a substring of one.
                ColumnType::JsonList => like_pattern(&Value::from(needle).to_string()),
                _ => like_pattern(needle),
            };
            Ok(FilterValue::Single(BindValue::Text(pattern)))
        }
        FilterOp::In => {
            if ty == ColumnType::JsonList {
                return Err(invalid("use contains for list columns".to_string()));
            }
            let items = value
                .as_array()
                .filter(|items| !items.is_empty())
                .ok_or_else(|| invalid("in expects a non-empty array".to_string()))?;
            if items.len() > MAX_IN_VALUES {
                return Err(invalid(format!("at most {} values allowed", MAX_IN_VALUES)));
            }
            let binds = items
                .iter()
                .map(|item| coerce(item, ty).map_err(&invalid))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(FilterValue::List(binds))
        }
        FilterOp::Between => {
            if !(ty.is_numeric() || ty.is_temporal()) {
                return Err(invalid("between applies to numeric and timestamp columns".to_string()));
            }
            match value.as_array().map(Vec::as_slice) {
                Some([low, high]) => Ok(FilterValue::Range(
                    coerce(low, ty).map_err(&invalid)?,
                    coerce(high, ty).map_err(&invalid)?,
                )),
                _ => Err(invalid("between expects [low, high]".to_string())),
            }
        }
        FilterOp::Gt | FilterOp::Gte | FilterOp::Lt | FilterOp::Lte => {
            if matches!(ty, ColumnType::Boolean | ColumnType::JsonList) {
                return Err(invalid(format!("{} is not defined for this column", operator.as_str())));
            }
            Ok(FilterValue::Single(coerce(value, ty).map_err(&invalid)?))
        }
        FilterOp::Eq | FilterOp::Neq => {
            if ty == ColumnType::JsonList {
                return Err(invalid("use contains for list columns".to_string()));
            }
            Ok(FilterValue::Single(coerce(value, ty).map_err(&invalid)?))
        }
    }
}

fn coerce(value: &Value, ty: ColumnType) -> Result<BindValue, String> {
    match (ty, value) {
        (_, Value::Null) => Err("null is not a comparable value".to_string()),
        (_, Value::Array(_)) | (_, Value::Object(_)) => Err("expected a scalar value".to_string()),
        (ColumnType::Text | ColumnType::JsonList, Value::String(s)) => Ok(BindValue::Text(s.clone())),
        (ColumnType::Text, Value::Number(n)) => Ok(BindValue::Text(n.to_string())),
        (ColumnType::Integer | ColumnType::Real, Value::Number(n)) => match (ty, n.as_i64()) {
            (ColumnType::Integer, Some(i)) => Ok(BindValue::Integer(i)),
            _ => n
                .as_f64()
                .map(BindValue::Real)
                .ok_or_else(|| "number out of range".to_string()),
        },
        (ColumnType::Integer, Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(BindValue::Integer)
            .map_err(|_| format!("'{}' is not an integer", s)),
        (ColumnType::Real, Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(BindValue::Real)
            .ok_or_else(|| format!("'{}' is not a number", s)),
        (ColumnType::Boolean, Value::Bool(b)) => Ok(BindValue::Bool(*b)),
        (ColumnType::Boolean, Value::Number(n)) => match n.as_i64() {
            Some(0) => Ok(BindValue::Bool(false)),
            Some(1) => Ok(BindValue::Bool(true)),
            _ => Err("expected true or false".to_string()),
        },
        (ColumnType::Boolean, Value::String(s)) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(BindValue::Bool(true)),
            "false" | "no" | "0" => Ok(BindValue::Bool(false)),
            _ => Err("expected true or false".to_string()),
        },
        (ColumnType::Timestamp, Value::String(s)) => normalize_timestamp(s)
            .map(BindValue::Text)
            .ok_or_else(|| format!("'{}' is not a date or timestamp", s)),
        (_, other) => Err(format!("unexpected value {}", other)),
    }
}

/// Accepts `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS` and
/// RFC 3339, returning the storage format.
pub fn normalize_timestamp(input: &str) -> Option<String> {
    let input = input.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(input) {
        return Some(parsed.naive_utc().format(DB_TIMESTAMP_FORMAT).to_string());
    }
    for format in [DB_TIMESTAMP_FORMAT, "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(input, format) {
            return Some(parsed.format(DB_TIMESTAMP_FORMAT).to_string());
        }
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.format(DB_TIMESTAMP_FORMAT).to_string())
}

/// `%needle%` with LIKE wildcards in the needle escaped by `\`.
fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
