// src/query/templates.rs
//! Predefined, role-scoped analytical queries.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

use super::plan::{
    AggregateFn, Filter, FilterOp, GroupKey, OrderBy, Projection, QueryPlan, TimeGranularity,
};
use super::validate::normalize_timestamp;
use super::visualization::ChartType;
use crate::error::{InsightError, InsightResult};
use crate::types::Role;

pub const APPLICATION_STATUSES: &[&str] = &["pending", "oa", "interview", "selected", "rejected"];
pub const JOB_TYPES: &[&str] = &["internship", "full-time"];
pub const JOB_STATUSES: &[&str] = &["active", "inactive"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "options", rename_all = "lowercase")]
pub enum ParamKind {
    Text,
    Integer,
    Number,
    Boolean,
    Date,
    Choice(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    pub description: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Text(String),
    Integer(i64),
    Number(f64),
    Boolean(bool),
}

impl From<&ParamValue> for Value {
    fn from(value: &ParamValue) -> Self {
        match value {
            ParamValue::Text(s) => Value::from(s.as_str()),
            ParamValue::Integer(i) => Value::from(*i),
            ParamValue::Number(n) => Value::from(*n),
            ParamValue::Boolean(b) => Value::from(*b),
        }
    }
}

/// Parameters after validation against a template's schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateParams(BTreeMap<String, ParamValue>);

impl TemplateParams {
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    pub fn value(&self, name: &str) -> Option<Value> {
        self.get(name).map(Value::from)
    }

    pub fn insert(&mut self, name: &str, value: ParamValue) {
        self.0.insert(name.to_string(), value);
    }
}

pub type PlanBuilder = fn(&TemplateParams) -> QueryPlan;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryTemplate {
    pub id: &'static str,
    pub label: &'static str,
    pub category: &'static str,
    pub description: &'static str,
    pub roles: &'static [Role],
    pub params: &'static [ParamSpec],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart_type: Option<ChartType>,
    pub sort_order: u32,
    #[serde(skip)]
    pub build: PlanBuilder,
}

impl QueryTemplate {
    pub fn allows(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// Check raw parameters against the schema: no unknown names, every
    /// required parameter present, every value of the declared type.
    pub fn validate_params(&self, raw: &Map<String, Value>) -> InsightResult<TemplateParams> {
        if let Some(unknown) = raw.keys().find(|k| !self.params.iter().any(|p| p.name == k.as_str())) {
            return Err(InsightError::InvalidParameters(format!(
                "unknown parameter '{}' for template '{}'",
                unknown, self.id
            )));
        }

        let mut params = TemplateParams::default();
        for spec in self.params {
            match raw.get(spec.name).filter(|v| !v.is_null()) {
                None if spec.required => {
                    return Err(InsightError::InvalidParameters(format!(
                        "missing required parameter '{}'",
                        spec.name
                    )))
                }
                None => {}
                Some(value) => {
                    let parsed = parse_param(spec, value).map_err(|reason| {
                        InsightError::InvalidParameters(format!("parameter '{}' {}", spec.name, reason))
                    })?;
                    params.insert(spec.name, parsed);
                }
            }
        }
        Ok(params)
    }

    pub fn build_plan(&self, params: &TemplateParams) -> QueryPlan {
        (self.build)(params)
    }
}

fn parse_param(spec: &ParamSpec, value: &Value) -> Result<ParamValue, String> {
    match (spec.kind, value) {
        (ParamKind::Text, Value::String(s)) if !s.trim().is_empty() => Ok(ParamValue::Text(s.trim().to_string())),
        (ParamKind::Integer, Value::Number(n)) => n
            .as_i64()
            .map(ParamValue::Integer)
            .ok_or_else(|| "must be an integer".to_string()),
        (ParamKind::Integer, Value::String(s)) => s
            .trim()
            .parse()
            .map(ParamValue::Integer)
            .map_err(|_| "must be an integer".to_string()),
        (ParamKind::Number, Value::Number(n)) => n
            .as_f64()
            .map(ParamValue::Number)
            .ok_or_else(|| "must be a number".to_string()),
        (ParamKind::Number, Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(ParamValue::Number)
            .ok_or_else(|| "must be a number".to_string()),
        (ParamKind::Boolean, Value::Bool(b)) => Ok(ParamValue::Boolean(*b)),
        (ParamKind::Date, Value::String(s)) => normalize_timestamp(s)
            .map(ParamValue::Text)
            .ok_or_else(|| "must be a date (YYYY-MM-DD)".to_string()),
        (ParamKind::Choice(options), Value::String(s)) => {
            let s = s.trim().to_lowercase();
            if options.contains(&s.as_str()) {
                Ok(ParamValue::Text(s))
            } else {
                Err(format!("must be one of: {}", options.join(", ")))
            }
        }
        (ParamKind::Text, _) => Err("must be a non-empty string".to_string()),
        (ParamKind::Integer, _) => Err("must be an integer".to_string()),
        (ParamKind::Number, _) => Err("must be a number".to_string()),
        (ParamKind::Boolean, _) => Err("must be true or false".to_string()),
        (ParamKind::Date, _) => Err("must be a date (YYYY-MM-DD)".to_string()),
        (ParamKind::Choice(options), _) => Err(format!("must be one of: {}", options.join(", "))),
    }
}

pub struct TemplateRegistry {
    templates: Vec<QueryTemplate>,
}

impl TemplateRegistry {
    pub fn builtin() -> Self {
        Self::new(builtin_templates())
    }

    pub fn new(mut templates: Vec<QueryTemplate>) -> Self {
        templates.sort_by_key(|t| t.sort_order);
        Self { templates }
    }

    pub fn get(&self, id: &str) -> Option<&QueryTemplate> {
        self.templates.iter().find(|t| t.id == id)
    }

    /// Templates visible to `role`, by sort order.
    pub fn templates_for_role(&self, role: Role) -> Vec<&QueryTemplate> {
        self.templates.iter().filter(|t| t.allows(role)).collect()
    }

    pub fn categories(&self, role: Role) -> BTreeSet<&'static str> {
        self.templates
            .iter()
            .filter(|t| t.allows(role))
            .map(|t| t.category)
            .collect()
    }

    pub fn templates_in_category(&self, role: Role, category: &str) -> Vec<&QueryTemplate> {
        self.templates
            .iter()
            .filter(|t| t.allows(role) && t.category == category)
            .collect()
    }
}

const ADMIN: &[Role] = &[Role::Admin];
const COMPANY: &[Role] = &[Role::Company];
const STUDENT: &[Role] = &[Role::Student];

fn optional_eq(plan: QueryPlan, params: &TemplateParams, param: &str, column: &str) -> QueryPlan {
    match params.value(param) {
        Some(value) => plan.filter(Filter::eq(column, value)),
        None => plan,
    }
}

fn builtin_templates() -> Vec<QueryTemplate> {
    vec![
        // ---- admin ----
        QueryTemplate {
            id: "jobs-count",
            label: "Total job postings",
            category: "Platform Stats",
            description: "Number of job postings on the platform",
            roles: ADMIN,
            params: &[],
            chart_type: Some(ChartType::Metric),
            sort_order: 100,
            build: |_| QueryPlan::on(&["jobs"]).project(Projection::count()),
        },
        QueryTemplate {
            id: "admin-platform-overview",
            label: "Platform overview",
            category: "Platform Stats",
            description: "Registered users by role",
            roles: ADMIN,
            params: &[],
            chart_type: Some(ChartType::Bar),
            sort_order: 110,
            build: |_| {
                QueryPlan::on(&["users"])
                    .project(Projection::column("users.role"))
                    .project(Projection::count().alias("users"))
                    .group(GroupKey::column("users.role"))
                    .order(OrderBy::desc("users"))
            },
        },
        QueryTemplate {
            id: "admin-registration-trends",
            label: "Registration trends",
            category: "Growth Analytics",
            description: "New user registrations per month",
            roles: ADMIN,
            params: &[
                ParamSpec {
                    name: "role",
                    kind: ParamKind::Choice(&["student", "company", "admin"]),
                    required: false,
                    description: "Only count users with this role",
                },
                ParamSpec {
                    name: "since",
                    kind: ParamKind::Date,
                    required: false,
                    description: "Only count registrations on or after this date",
                },
            ],
            chart_type: Some(ChartType::Line),
            sort_order: 120,
            build: |params| {
                let plan = QueryPlan::on(&["users"])
                    .project(Projection::bucket(TimeGranularity::Month, "users.created_at"))
                    .project(Projection::count().alias("registrations"))
                    .group(GroupKey::bucket(TimeGranularity::Month, "users.created_at"))
                    .order(OrderBy::asc("month"));
                let plan = optional_eq(plan, params, "role", "users.role");
                match params.value("since") {
                    Some(since) => plan.filter(Filter::new("users.created_at", FilterOp::Gte, since)),
                    None => plan,
                }
            },
        },
        QueryTemplate {
            id: "admin-job-trends",
            label: "Job posting activity",
            category: "Platform Stats",
            description: "Job postings created per month",
            roles: ADMIN,
            params: &[],
            chart_type: Some(ChartType::Line),
            sort_order: 130,
            build: |_| {
                QueryPlan::on(&["jobs"])
                    .project(Projection::bucket(TimeGranularity::Month, "jobs.created_at"))
                    .project(Projection::count().alias("jobs"))
                    .group(GroupKey::bucket(TimeGranularity::Month, "jobs.created_at"))
                    .order(OrderBy::asc("month"))
            },
        },
        QueryTemplate {
            id: "admin-success-by-course",
            label: "Selections by course",
            category: "Placement Analytics",
            description: "Selected applications per student course",
            roles: ADMIN,
            params: &[],
            chart_type: Some(ChartType::Bar),
            sort_order: 140,
            build: |_| {
                QueryPlan::on(&["applications"])
                    .project(Projection::column("applications.student_course").alias("course"))
                    .project(Projection::count().alias("selected"))
                    .filter(Filter::eq("applications.status", "selected"))
                    .group(GroupKey::column("applications.student_course"))
                    .order(OrderBy::desc("selected"))
            },
        },
        QueryTemplate {
            id: "admin-active-companies",
            label: "Most active companies",
            category: "Platform Stats",
            description: "Companies ranked by number of job postings",
            roles: ADMIN,
            params: &[ParamSpec {
                name: "limit",
                kind: ParamKind::Integer,
                required: false,
                description: "How many companies to list (default 10)",
            }],
            chart_type: Some(ChartType::Table),
            sort_order: 150,
            build: |params| {
                let limit = match params.get("limit") {
                    Some(ParamValue::Integer(n)) if *n > 0 => *n as u64,
                    _ => 10,
                };
                QueryPlan::on(&["jobs", "companies"])
                    .project(Projection::column("companies.name").alias("company"))
                    .project(Projection::count().alias("job_count"))
                    .project(Projection::aggregate(AggregateFn::Avg, "jobs.salary").alias("avg_salary"))
                    .group(GroupKey::column("companies.name"))
                    .order(OrderBy::desc("job_count"))
                    .limit(limit)
            },
        },
        QueryTemplate {
            id: "admin-cgpa-vs-success",
            label: "CGPA vs application outcome",
            category: "Placement Analytics",
            description: "Average applicant CGPA for each application status",
            roles: ADMIN,
            params: &[],
            chart_type: Some(ChartType::Bar),
            sort_order: 160,
            build: |_| {
                QueryPlan::on(&["applications"])
                    .project(Projection::column("applications.status"))
                    .project(Projection::aggregate(AggregateFn::Avg, "applications.student_cgpa").alias("avg_cgpa"))
                    .group(GroupKey::column("applications.status"))
            },
        },
        QueryTemplate {
            id: "admin-application-status-dist",
            label: "Application status distribution",
            category: "Platform Stats",
            description: "All applications by current status",
            roles: ADMIN,
            params: &[],
            chart_type: Some(ChartType::Pie),
            sort_order: 170,
            build: |_| {
                QueryPlan::on(&["applications"])
                    .project(Projection::column("applications.status"))
                    .project(Projection::count())
                    .group(GroupKey::column("applications.status"))
            },
        },
        QueryTemplate {
            id: "admin-salary-insights",
            label: "Salary by job type",
            category: "Salary Analytics",
            description: "Average, minimum and maximum salary per job type",
            roles: ADMIN,
            params: &[ParamSpec {
                name: "status",
                kind: ParamKind::Choice(JOB_STATUSES),
                required: false,
                description: "Only include jobs with this status",
            }],
            chart_type: Some(ChartType::Bar),
            sort_order: 180,
            build: |params| {
                let plan = QueryPlan::on(&["jobs"])
                    .project(Projection::column("jobs.type"))
                    .project(Projection::aggregate(AggregateFn::Avg, "jobs.salary"))
                    .project(Projection::aggregate(AggregateFn::Min, "jobs.salary"))
                    .project(Projection::aggregate(AggregateFn::Max, "jobs.salary"))
                    .group(GroupKey::column("jobs.type"));
                optional_eq(plan, params, "status", "jobs.status")
            },
        },
        // ---- company ----
        QueryTemplate {
            id: "company-application-stats",
            label: "Application statistics overview",
            category: "Hiring Analytics",
            description: "Applications received and average applicant CGPA",
            roles: COMPANY,
            params: &[ParamSpec {
                name: "job_id",
                kind: ParamKind::Text,
                required: false,
                description: "Restrict to a single job posting",
            }],
            chart_type: Some(ChartType::Metric),
            sort_order: 200,
            build: |params| {
                let plan = QueryPlan::on(&["applications"])
                    .project(Projection::count().alias("applications"))
                    .project(Projection::aggregate(AggregateFn::Avg, "applications.student_cgpa").alias("avg_cgpa"));
                optional_eq(plan, params, "job_id", "applications.job_id")
            },
        },
        QueryTemplate {
            id: "company-cgpa-distribution",
            label: "Applicant CGPA by stage",
            category: "Applicant Insights",
            description: "Average applicant CGPA at each application stage",
            roles: COMPANY,
            params: &[],
            chart_type: Some(ChartType::Bar),
            sort_order: 210,
            build: |_| {
                QueryPlan::on(&["applications"])
                    .project(Projection::column("applications.status"))
                    .project(Projection::aggregate(AggregateFn::Avg, "applications.student_cgpa").alias("avg_cgpa"))
                    .group(GroupKey::column("applications.status"))
            },
        },
        QueryTemplate {
            id: "company-conversion-funnel",
            label: "Hiring funnel analysis",
            category: "Hiring Analytics",
            description: "Applications at each stage of the hiring process",
            roles: COMPANY,
            params: &[],
            chart_type: Some(ChartType::Funnel),
            sort_order: 220,
            build: |_| {
                QueryPlan::on(&["applications"])
                    .project(Projection::column("applications.status").alias("stage"))
                    .project(Projection::count())
                    .group(GroupKey::column("applications.status"))
                    .order(OrderBy::desc("count"))
            },
        },
        QueryTemplate {
            id: "company-job-performance",
            label: "Job posting performance",
            category: "Hiring Analytics",
            description: "Applications and average applicant CGPA per job",
            roles: COMPANY,
            params: &[],
            chart_type: Some(ChartType::Table),
            sort_order: 230,
            build: |_| {
                QueryPlan::on(&["applications", "jobs"])
                    .project(Projection::column("jobs.title"))
                    .project(Projection::count().alias("applications"))
                    .project(Projection::aggregate(AggregateFn::Avg, "applications.student_cgpa").alias("avg_cgpa"))
                    .group(GroupKey::column("jobs.title"))
                    .order(OrderBy::desc("applications"))
            },
        },
        QueryTemplate {
            id: "company-course-breakdown",
            label: "Applicants by course",
            category: "Applicant Insights",
            description: "Share of applications from each course",
            roles: COMPANY,
            params: &[],
            chart_type: Some(ChartType::Pie),
            sort_order: 240,
            build: |_| {
                QueryPlan::on(&["applications"])
                    .project(Projection::column("applications.student_course").alias("course"))
                    .project(Projection::count())
                    .group(GroupKey::column("applications.student_course"))
                    .order(OrderBy::desc("count"))
            },
        },
        QueryTemplate {
            id: "jobs-by-status",
            label: "My jobs by status",
            category: "Hiring Analytics",
            description: "Job postings grouped by status",
            roles: COMPANY,
            params: &[ParamSpec {
                name: "status",
                kind: ParamKind::Choice(JOB_STATUSES),
                required: false,
                description: "Only count jobs with this status",
            }],
            chart_type: None,
            sort_order: 250,
            build: |params| {
                let plan = QueryPlan::on(&["jobs"])
                    .project(Projection::column("jobs.status"))
                    .project(Projection::count().alias("jobs"))
                    .group(GroupKey::column("jobs.status"));
                optional_eq(plan, params, "status", "jobs.status")
            },
        },
        // ---- student ----
        QueryTemplate {
            id: "student-application-status",
            label: "My application outcomes",
            category: "Application Stats",
            description: "Your applications by current status",
            roles: STUDENT,
            params: &[],
            chart_type: Some(ChartType::Pie),
            sort_order: 300,
            build: |_| {
                QueryPlan::on(&["applications"])
                    .project(Projection::column("applications.status"))
                    .project(Projection::count())
                    .group(GroupKey::column("applications.status"))
            },
        },
        QueryTemplate {
            id: "student-application-trends",
            label: "My application timeline",
            category: "Application Stats",
            description: "Applications you submitted per week",
            roles: STUDENT,
            params: &[],
            chart_type: Some(ChartType::Line),
            sort_order: 310,
            build: |_| {
                QueryPlan::on(&["applications"])
                    .project(Projection::bucket(TimeGranularity::Week, "applications.applied_at"))
                    .project(Projection::count().alias("applications"))
                    .group(GroupKey::bucket(TimeGranularity::Week, "applications.applied_at"))
                    .order(OrderBy::asc("week"))
            },
        },
        QueryTemplate {
            id: "student-cgpa-compare",
            label: "How does my CGPA compare?",
            category: "Profile Analysis",
            description: "CGPA cutoff range across open jobs",
            roles: STUDENT,
            params: &[],
            chart_type: Some(ChartType::Metric),
            sort_order: 320,
            build: |_| {
                QueryPlan::on(&["jobs"])
                    .project(Projection::aggregate(AggregateFn::Avg, "jobs.cgpa_cutoff").alias("avg_cutoff"))
                    .project(Projection::aggregate(AggregateFn::Min, "jobs.cgpa_cutoff").alias("min_cutoff"))
                    .project(Projection::aggregate(AggregateFn::Max, "jobs.cgpa_cutoff").alias("max_cutoff"))
            },
        },
        QueryTemplate {
            id: "student-job-locations",
            label: "In-demand job locations",
            category: "Market Insights",
            description: "Open jobs per location",
            roles: STUDENT,
            params: &[],
            chart_type: Some(ChartType::Bar),
            sort_order: 330,
            build: |_| {
                QueryPlan::on(&["jobs"])
                    .project(Projection::column("jobs.location"))
                    .project(Projection::count().alias("jobs"))
                    .group(GroupKey::column("jobs.location"))
                    .order(OrderBy::desc("jobs"))
                    .limit(10)
            },
        },
        QueryTemplate {
            id: "student-eligible-jobs",
            label: "Jobs within my CGPA",
            category: "Job Recommendations",
            description: "Open jobs whose CGPA cutoff is at or below the given value",
            roles: STUDENT,
            params: &[ParamSpec {
                name: "min_cgpa",
                kind: ParamKind::Number,
                required: true,
                description: "CGPA to compare job cutoffs against",
            }],
            chart_type: Some(ChartType::Table),
            sort_order: 340,
            build: |params| {
                let cgpa = params.value("min_cgpa").unwrap_or(Value::from(0.0));
                QueryPlan::on(&["jobs"])
                    .project(Projection::column("jobs.title"))
                    .project(Projection::column("jobs.location"))
                    .project(Projection::column("jobs.salary"))
                    .project(Projection::column("jobs.cgpa_cutoff"))
                    .filter(Filter::new("jobs.cgpa_cutoff", FilterOp::Lte, cgpa))
                    .order(OrderBy::desc("salary"))
            },
        },
        QueryTemplate {
            id: "student-job-matches",
            label: "Best paying open jobs",
            category: "Job Recommendations",
            description: "Open jobs ranked by salary",
            roles: STUDENT,
            params: &[ParamSpec {
                name: "job_type",
                kind: ParamKind::Choice(JOB_TYPES),
                required: false,
                description: "Only include this job type",
            }],
            chart_type: Some(ChartType::Table),
            sort_order: 350,
            build: |params| {
                let plan = QueryPlan::on(&["jobs", "companies"])
                    .project(Projection::column("jobs.title"))
                    .project(Projection::column("companies.name").alias("company"))
                    .project(Projection::column("jobs.type"))
                    .project(Projection::column("jobs.salary"))
                    .order(OrderBy::desc("salary"))
                    .limit(20);
                optional_eq(plan, params, "job_type", "jobs.type")
            },
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::validate::validate_plan;
    use serde_json::json;

    fn raw(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    fn sample_value(kind: ParamKind) -> Value {
        match kind {
            ParamKind::Text => json!("rust"),
            ParamKind::Integer => json!(3),
            ParamKind::Number => json!(7.5),
            ParamKind::Boolean => json!(true),
            ParamKind::Date => json!("2024-01-01"),
            ParamKind::Choice(options) => json!(options[0]),
        }
    }

    #[test]
    fn test_every_builtin_plan_validates_for_its_roles() {
        let registry = TemplateRegistry::builtin();
        for role in Role::ALL {
            for template in registry.templates_for_role(role) {
                let required: Map<String, Value> = template
                    .params
                    .iter()
                    .filter(|p| p.required)
                    .map(|p| (p.name.to_string(), sample_value(p.kind)))
                    .collect();
                let every: Map<String, Value> = template
                    .params
                    .iter()
                    .map(|p| (p.name.to_string(), sample_value(p.kind)))
                    .collect();

                for raw in [required, every] {
                    let params = template.validate_params(&raw).unwrap();
                    let plan = template.build_plan(&params);
                    assert!(
                        validate_plan(&plan, role).is_ok(),
                        "template {} with {:?} produced an invalid plan: {:?}",
                        template.id,
                        raw,
                        validate_plan(&plan, role)
                    );
                }
            }
        }
    }

    #[test]
    fn test_ids_are_unique() {
        let registry = TemplateRegistry::builtin();
        let ids: BTreeSet<&str> = registry.templates.iter().map(|t| t.id).collect();
        assert_eq!(ids.len(), registry.templates.len());
    }

    #[test]
    fn test_role_lookup_is_sorted_and_scoped() {
        let registry = TemplateRegistry::builtin();
        let admin = registry.templates_for_role(Role::Admin);
        assert!(admin.windows(2).all(|w| w[0].sort_order <= w[1].sort_order));
        assert!(admin.iter().all(|t| t.allows(Role::Admin)));
        assert_eq!(admin[0].id, "jobs-count");

        let categories = registry.categories(Role::Student);
        assert!(categories.contains("Application Stats"));
        assert!(!categories.contains("Platform Stats"));

        let in_category = registry.templates_in_category(Role::Company, "Applicant Insights");
        assert_eq!(in_category.len(), 2);
    }

    #[test]
    fn test_jobs_count_plan_shape() {
        let registry = TemplateRegistry::builtin();
        let plan = registry.get("jobs-count").unwrap().build_plan(&TemplateParams::default());
        assert_eq!(
            serde_json::to_value(&plan).unwrap(),
            json!({"targetEntities": ["jobs"], "projections": [{"aggregate": "COUNT"}], "filters": [], "groupBy": [], "orderBy": []})
        );
    }

    #[test]
    fn test_param_validation() {
        let registry = TemplateRegistry::builtin();
        let template = registry.get("jobs-by-status").unwrap();

        assert!(template.validate_params(&raw(json!({}))).is_ok());
        let params = template.validate_params(&raw(json!({"status": "Active"}))).unwrap();
        assert_eq!(params.get("status"), Some(&ParamValue::Text("active".to_string())));

        let cases = [
            json!({"status": "archived"}),
            json!({"status": 3}),
            json!({"colour": "red"}),
        ];
        for case in cases {
            assert!(matches!(
                template.validate_params(&raw(case)),
                Err(InsightError::InvalidParameters(_))
            ));
        }

        let eligible = registry.get("student-eligible-jobs").unwrap();
        assert!(matches!(
            eligible.validate_params(&raw(json!({}))),
            Err(InsightError::InvalidParameters(_))
        ));
        let params = eligible.validate_params(&raw(json!({"min_cgpa": "8.2"}))).unwrap();
        assert_eq!(params.get("min_cgpa"), Some(&ParamValue::Number(8.2)));
    }

    #[test]
    fn test_optional_filter_is_applied() {
        let registry = TemplateRegistry::builtin();
        let template = registry.get("jobs-by-status").unwrap();
        let params = template.validate_params(&raw(json!({"status": "active"}))).unwrap();
        let plan = template.build_plan(&params);
        assert_eq!(plan.filters, vec![Filter::eq("jobs.status", "active")]);
        assert!(template.build_plan(&TemplateParams::default()).filters.is_empty());
    }
}
