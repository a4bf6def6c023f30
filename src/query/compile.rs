// src/query/compile.rs
//! Turns a [`ValidatedPlan`] into parameterized SQLite SQL.
//!
//! Identifiers come only from the static whitelist (or from aliases already
//! checked against `[a-z_][a-z0-9_]*`); every value is a bound parameter.

use super::plan::{AggregateFn, FilterOp, SortDirection, TimeGranularity};
use super::schema::{self, ScopeRule};
use super::validate::{
    BindValue, FilterValue, OrderTarget, OutputExpr, ResolvedColumn, ValidatedPlan,
};
use crate::types::CallerContext;

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub binds: Vec<BindValue>,
}

/// Compile `plan` for `caller`. The row limit is `plan.limit + 1` so the
/// executor can tell whether the result was truncated.
pub fn compile(plan: &ValidatedPlan, caller: &CallerContext) -> CompiledQuery {
    let mut binds = Vec::new();

    let select = plan
        .outputs
        .iter()
        .map(|output| format!("{} AS {}", output_sql(&output.expr), quote(&output.name)))
        .collect::<Vec<_>>()
        .join(", ");

    let mut sql = format!("SELECT {} FROM {}", select, quote(plan.root.name));

    for join in &plan.joins {
        let rel = join.relation;
        sql.push_str(&format!(
            " JOIN {} ON {}.{} = {}.{}",
            quote(join.table.name),
            quote(rel.from_table),
            quote(rel.from_column),
            quote(rel.to_table),
            quote(rel.to_column)
        ));
    }

    let mut predicates = Vec::new();

    for table in plan.tables() {
        if let Some(predicate) = scope_predicate(plan, table.name, caller, &mut binds) {
            predicates.push(predicate);
        }
    }

    for filter in &plan.filters {
        let column = column_sql(&filter.column);
        let predicate = match (&filter.value, filter.operator) {
            (FilterValue::Single(value), FilterOp::Contains) => {
                binds.push(value.clone());
                format!("{} LIKE ? ESCAPE '\\'", column)
            }
            (FilterValue::Single(value), op) => {
                binds.push(value.clone());
                format!("{} {} ?", column, comparison(op))
            }
            (FilterValue::List(values), _) => {
                binds.extend(values.iter().cloned());
                let placeholders = vec!["?"; values.len()].join(", ");
                format!("{} IN ({})", column, placeholders)
            }
            (FilterValue::Range(low, high), _) => {
                binds.push(low.clone());
                binds.push(high.clone());
                format!("{} BETWEEN ? AND ?", column)
            }
        };
        predicates.push(predicate);
    }

    if !predicates.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&predicates.join(" AND "));
    }

    if !plan.group_by.is_empty() {
        let keys = plan
            .group_by
            .iter()
            .map(|g| match g.bucket {
                Some(granularity) => bucket_sql(granularity, &g.column),
                None => column_sql(&g.column),
            })
            .collect::<Vec<_>>()
            .join(", ");
        sql.push_str(" GROUP BY ");
        sql.push_str(&keys);
    }

    if !plan.order_by.is_empty() {
        let keys = plan
            .order_by
            .iter()
            .map(|(target, direction)| {
                let key = match target {
                    OrderTarget::Output(index) => quote(&plan.outputs[*index].name),
                    OrderTarget::Column(column) => column_sql(column),
                };
                let direction = match direction {
                    SortDirection::Asc => "ASC",
                    SortDirection::Desc => "DESC",
                };
                format!("{} {}", key, direction)
            })
            .collect::<Vec<_>>()
            .join(", ");
        sql.push_str(" ORDER BY ");
        sql.push_str(&keys);
    }

    sql.push_str(" LIMIT ?");
    binds.push(BindValue::Integer(plan.limit as i64 + 1));

    CompiledQuery { sql, binds }
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier)
}

fn column_sql(column: &ResolvedColumn) -> String {
    format!("{}.{}", quote(column.table.name), quote(column.column.name))
}

fn bucket_sql(granularity: TimeGranularity, column: &ResolvedColumn) -> String {
    let format = match granularity {
        TimeGranularity::Day => "%Y-%m-%d",
        TimeGranularity::Week => "%Y-W%W",
        TimeGranularity::Month => "%Y-%m",
    };
    format!("strftime('{}', {})", format, column_sql(column))
}

fn output_sql(expr: &OutputExpr) -> String {
    match expr {
        OutputExpr::CountAll => "COUNT(*)".to_string(),
        OutputExpr::Aggregate { func, column } => match func {
            AggregateFn::Avg => format!("ROUND(AVG({}), 2)", column_sql(column)),
            _ => format!("{}({})", func.sql_name(), column_sql(column)),
        },
        OutputExpr::Bucket {
            granularity,
            column,
        } => bucket_sql(*granularity, column),
        OutputExpr::Column(column) => column_sql(column),
    }
}

fn comparison(op: FilterOp) -> &'static str {
    match op {
        FilterOp::Eq => "=",
        FilterOp::Neq => "<>",
        FilterOp::Gt => ">",
        FilterOp::Gte => ">=",
        FilterOp::Lt => "<",
        FilterOp::Lte => "<=",
        FilterOp::In | FilterOp::Between | FilterOp::Contains => "=",
    }
}

/// Row restriction for one table. A caller without a scope identity gets a
/// predicate that matches nothing.
fn scope_predicate(
    plan: &ValidatedPlan,
    table: &'static str,
    caller: &CallerContext,
    binds: &mut Vec<BindValue>,
) -> Option<String> {
    let rule = schema::permission(plan.role, table)
        .map(|p| p.scope)
        .unwrap_or(ScopeRule::Unscoped);

    let scope_id = caller.scope_id.as_deref();

    match rule {
        ScopeRule::Unscoped => None,
        ScopeRule::Literal { column, value } => {
            binds.push(BindValue::Text(value.to_string()));
            Some(format!("{}.{} = ?", quote(table), quote(column)))
        }
        ScopeRule::CallerId { column } => Some(match scope_id {
            Some(id) => {
                binds.push(BindValue::Text(id.to_string()));
                format!("{}.{} = ?", quote(table), quote(column))
            }
            None => "1 = 0".to_string(),
        }),
        ScopeRule::JobOwnedByCaller => Some(match scope_id {
            Some(id) => {
                binds.push(BindValue::Text(id.to_string()));
                format!(
                    "{}.\"job_id\" IN (SELECT \"owned\".\"id\" FROM \"jobs\" AS \"owned\" WHERE \"owned\".\"company_id\" = ?)",
                    quote(table)
                )
            }
            None => "1 = 0".to_string(),
        }),
        ScopeRule::AppliedToCallerJobs => Some(match scope_id {
            Some(id) => {
                binds.push(BindValue::Text(id.to_string()));
                format!(
                    "{}.\"id\" IN (SELECT \"a\".\"student_id\" FROM \"applications\" AS \"a\" \
                     JOIN \"jobs\" AS \"j\" ON \"j\".\"id\" = \"a\".\"job_id\" WHERE \"j\".\"company_id\" = ?)",
                    quote(table)
                )
            }
            None => "1 = 0".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::plan::{Filter, GroupKey, OrderBy, Projection, QueryPlan};
    use crate::query::validate::validate_plan;
    use crate::types::Role;
    use serde_json::json;

    #[test]
    fn test_count_all_compiles() {
        let plan = validate_plan(&QueryPlan::on(&["jobs"]).project(Projection::count()), Role::Admin).unwrap();
        let compiled = compile(&plan, &CallerContext::admin("u"));
        assert_eq!(compiled.sql, "SELECT COUNT(*) AS \"count\" FROM \"jobs\" LIMIT ?");
        assert_eq!(compiled.binds, vec![BindValue::Integer(101)]);
    }

    #[test]
    fn test_company_scope_is_appended() {
        let plan = validate_plan(
            &QueryPlan::on(&["jobs"])
                .project(Projection::column("jobs.title"))
                .filter(Filter::eq("jobs.status", "active")),
            Role::Company,
        )
        .unwrap();
        let compiled = compile(&plan, &CallerContext::company("u", "c1"));
        assert!(compiled
            .sql
            .contains("WHERE \"jobs\".\"company_id\" = ? AND \"jobs\".\"status\" = ?"));
        assert_eq!(compiled.binds[0], BindValue::Text("c1".to_string()));
        assert_eq!(compiled.binds[1], BindValue::Text("active".to_string()));
    }

    #[test]
    fn test_missing_scope_identity_matches_nothing() {
        let plan = validate_plan(
            &QueryPlan::on(&["applications"]).project(Projection::count()),
            Role::Student,
        )
        .unwrap();
        let caller = CallerContext {
            user_id: "u".to_string(),
            role: Role::Student,
            scope_id: None,
        };
        let compiled = compile(&plan, &caller);
        assert!(compiled.sql.contains("WHERE 1 = 0"));
    }

    #[test]
    fn test_values_never_appear_in_sql() {
        let hostile = "x'; DROP TABLE jobs; --";
        let plan = validate_plan(
            &QueryPlan::on(&["jobs"])
                .project(Projection::column("jobs.title"))
                .filter(Filter::eq("jobs.title", hostile))
                .filter(Filter::new("jobs.location", FilterOp::Contains, json!("UNION SELECT"))),
            Role::Admin,
        )
        .unwrap();
        let compiled = compile(&plan, &CallerContext::admin("u"));
        assert!(!compiled.sql.contains("DROP"));
        assert!(!compiled.sql.contains("UNION"));
        assert_eq!(compiled.sql.matches('?').count(), compiled.binds.len());
    }

    #[test]
    fn test_join_group_and_order() {
        let plan = validate_plan(
            &QueryPlan::on(&["applications", "students"])
                .project(Projection::column("students.course"))
                .project(Projection::count().alias("applications"))
                .group(GroupKey::column("students.course"))
                .order(OrderBy::desc("applications"))
                .limit(10),
            Role::Company,
        )
        .unwrap();
        let compiled = compile(&plan, &CallerContext::company("u", "c1"));

        assert!(compiled.sql.starts_with(
            "SELECT \"students\".\"course\" AS \"course\", COUNT(*) AS \"applications\" FROM \"applications\" \
             JOIN \"students\" ON \"applications\".\"student_id\" = \"students\".\"id\""
        ));
        assert!(compiled.sql.contains("GROUP BY \"students\".\"course\""));
        assert!(compiled.sql.ends_with("ORDER BY \"applications\" DESC LIMIT ?"));
        // one bind per scoped table, then the limit
        assert_eq!(compiled.binds.len(), 3);
        assert_eq!(compiled.binds[2], BindValue::Integer(11));
    }
}
