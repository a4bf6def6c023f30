// tests/plan_safety.rs
use placement_insights::query::compile::compile;
use placement_insights::query::plan::{Filter, FilterOp, GroupKey, Projection, QueryPlan};
use placement_insights::query::validate::validate_plan;
use placement_insights::{CallerContext, Role};
use serde_json::json;

const OUTSIDE_WHITELIST: &[&str] = &[
    "jobs.password",
    "users.password_hash",
    "sqlite_master.sql",
    "query_history.query_text",
    "profile_gap_cache.suggestions",
    "jobs.title; DROP TABLE jobs",
    "jobs.title) UNION SELECT name FROM sqlite_master --",
    "applications.status\" OR 1=1 --",
];

const FOREIGN_TABLES: &[&str] = &["sqlite_master", "query_history", "profile_gap_cache", "jobs; DELETE FROM jobs"];

fn base_plans() -> Vec<(QueryPlan, Role)> {
    vec![
        (
            QueryPlan::on(&["jobs"])
                .project(Projection::column("jobs.title"))
                .filter(Filter::eq("jobs.status", "active")),
            Role::Company,
        ),
        (
            QueryPlan::on(&["applications"])
                .project(Projection::column("applications.status"))
                .project(Projection::count())
                .group(GroupKey::column("applications.status")),
            Role::Student,
        ),
        (QueryPlan::on(&["jobs"]).project(Projection::count()), Role::Admin),
    ]
}

fn mutate(plan: &QueryPlan, rng: &mut fastrand::Rng) -> QueryPlan {
    let mut plan = plan.clone();
    let bad_column = OUTSIDE_WHITELIST[rng.usize(..OUTSIDE_WHITELIST.len())];
    match rng.usize(..5) {
        0 => {
            let idx = rng.usize(..plan.projections.len());
            plan.projections[idx] = Projection::column(bad_column);
        }
        1 => plan.filters.push(Filter::eq(bad_column, "x")),
        2 => plan.group_by.push(GroupKey::column(bad_column)),
        3 => plan
            .target_entities
            .push(FOREIGN_TABLES[rng.usize(..FOREIGN_TABLES.len())].to_string()),
        _ => plan.projections.push(Projection::column(bad_column)),
    }
    plan
}

#[test]
fn mutated_plans_outside_whitelist_are_rejected() {
    let mut rng = fastrand::Rng::with_seed(0x5EED);
    for (plan, role) in base_plans() {
        assert!(validate_plan(&plan, role).is_ok(), "base plan must be valid");
        for _ in 0..200 {
            let mutated = mutate(&plan, &mut rng);
            assert!(
                validate_plan(&mutated, role).is_err(),
                "accepted out-of-whitelist plan: {:?}",
                mutated
            );
        }
    }
}

#[test]
fn hostile_values_never_reach_sql_text() {
    let hostile = [
        "'; DROP TABLE jobs; --",
        "x; DELETE FROM applications",
        "1 UNION SELECT password FROM users",
    ];
    let caller = CallerContext::admin("admin-1");

    for value in hostile {
        let plans = [
            QueryPlan::on(&["jobs"])
                .project(Projection::column("jobs.title"))
                .filter(Filter::eq("jobs.location", value)),
            QueryPlan::on(&["jobs"])
                .project(Projection::count())
                .filter(Filter::new("jobs.title", FilterOp::Contains, json!(value))),
            QueryPlan::on(&["jobs"])
                .project(Projection::column("jobs.title"))
                .filter(Filter::new("jobs.status", FilterOp::In, json!([value, "active"]))),
        ];

        for plan in plans {
            let validated = validate_plan(&plan, Role::Admin).unwrap();
            let compiled = compile(&validated, &caller);
            let sql = compiled.sql.to_uppercase();

            assert!(sql.trim_start().starts_with("SELECT"), "not read-only: {}", compiled.sql);
            for keyword in ["DROP", "DELETE", "UNION", "INSERT", "UPDATE", ";"] {
                assert!(!sql.contains(keyword), "{} leaked into {}", keyword, compiled.sql);
            }
        }
    }
}

#[test]
fn hostile_aliases_are_rejected() {
    let plan = QueryPlan::on(&["jobs"]).project(Projection::count().alias("n FROM users; --"));
    assert!(validate_plan(&plan, Role::Admin).is_err());
}
