// src/query/schema.rs
//! The fixed relational whitelist and per-role access rules.
//!
//! Every identifier that ever reaches SQL comes from the statics in this
//! module. Plans refer to tables and columns by name; validation resolves
//! those names to these definitions or rejects the plan.

use crate::types::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Integer,
    Real,
    Boolean,
    /// `YYYY-MM-DD HH:MM:SS` text
    Timestamp,
    /// JSON array stored as text
    JsonList,
}

impl ColumnType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Real)
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, ColumnType::Timestamp)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Text => "text",
            ColumnType::Integer => "integer",
            ColumnType::Real => "real",
            ColumnType::Boolean => "boolean",
            ColumnType::Timestamp => "timestamp",
            ColumnType::JsonList => "list",
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub ty: ColumnType,
}

#[derive(Debug, PartialEq, Eq)]
pub struct TableDef {
    pub name: &'static str,
    pub columns: &'static [ColumnDef],
}

impl TableDef {
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Join edge `from_table.from_column = to_table.to_column`.
#[derive(Debug, PartialEq, Eq)]
pub struct Relation {
    pub from_table: &'static str,
    pub from_column: &'static str,
    pub to_table: &'static str,
    pub to_column: &'static str,
}

impl Relation {
    pub fn connects(&self, a: &str, b: &str) -> bool {
        (self.from_table == a && self.to_table == b) || (self.from_table == b && self.to_table == a)
    }
}

const fn col(name: &'static str, ty: ColumnType) -> ColumnDef {
    ColumnDef { name, ty }
}

use ColumnType::*;

pub static TABLES: &[TableDef] = &[
    TableDef {
        name: "users",
        columns: &[
            col("id", Text),
            col("name", Text),
            col("email", Text),
            col("role", Text),
            col("created_at", Timestamp),
        ],
    },
    TableDef {
        name: "students",
        columns: &[
            col("id", Text),
            col("user_id", Text),
            col("name", Text),
            col("email", Text),
            col("phone", Text),
            col("srn", Text),
            col("cgpa", Real),
            col("degree", Text),
            col("course", Text),
            col("skills", JsonList),
            col("certifications_count", Integer),
            col("projects_count", Integer),
            col("experience_count", Integer),
            col("has_resume", Boolean),
            col("status", Text),
            col("created_at", Timestamp),
        ],
    },
    TableDef {
        name: "companies",
        columns: &[
            col("id", Text),
            col("user_id", Text),
            col("name", Text),
            col("email", Text),
            col("industry", Text),
            col("size", Text),
            col("location", Text),
            col("website", Text),
            col("status", Text),
            col("created_at", Timestamp),
        ],
    },
    TableDef {
        name: "jobs",
        columns: &[
            col("id", Text),
            col("company_id", Text),
            col("title", Text),
            col("type", Text),
            col("location", Text),
            col("cgpa_cutoff", Real),
            col("eligible_courses", JsonList),
            col("eligible_degrees", JsonList),
            col("salary", Integer),
            col("skills", JsonList),
            col("status", Text),
            col("created_at", Timestamp),
        ],
    },
    TableDef {
        name: "applications",
        columns: &[
            col("id", Text),
            col("job_id", Text),
            col("student_id", Text),
            col("status", Text),
            col("student_cgpa", Real),
            col("student_course", Text),
            col("student_degree", Text),
            col("applied_at", Timestamp),
        ],
    },
];

pub static RELATIONS: &[Relation] = &[
    Relation {
        from_table: "applications",
        from_column: "job_id",
        to_table: "jobs",
        to_column: "id",
    },
    Relation {
        from_table: "applications",
        from_column: "student_id",
        to_table: "students",
        to_column: "id",
    },
    Relation {
        from_table: "jobs",
        from_column: "company_id",
        to_table: "companies",
        to_column: "id",
    },
    Relation {
        from_table: "students",
        from_column: "user_id",
        to_table: "users",
        to_column: "id",
    },
    Relation {
        from_table: "companies",
        from_column: "user_id",
        to_table: "users",
        to_column: "id",
    },
];

pub fn table(name: &str) -> Option<&'static TableDef> {
    TABLES.iter().find(|t| t.name == name)
}

pub fn relation_between(a: &str, b: &str) -> Option<&'static Relation> {
    RELATIONS.iter().find(|r| r.connects(a, b))
}

/// Row restriction the compiler appends for a table, bound to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeRule {
    Unscoped,
    /// `table.column = <caller scope id>`
    CallerId { column: &'static str },
    /// `table.column = <literal>`
    Literal {
        column: &'static str,
        value: &'static str,
    },
    /// Applications to jobs owned by the calling company.
    JobOwnedByCaller,
    /// Students who applied to at least one job of the calling company.
    AppliedToCallerJobs,
}

#[derive(Debug, PartialEq, Eq)]
pub struct TablePermission {
    pub table: &'static str,
    pub scope: ScopeRule,
    pub forbidden_columns: &'static [&'static str],
}

impl TablePermission {
    pub fn allows_column(&self, column: &str) -> bool {
        !self.forbidden_columns.contains(&column)
    }
}

static STUDENT_PERMISSIONS: &[TablePermission] = &[
    TablePermission {
        table: "students",
        scope: ScopeRule::CallerId { column: "id" },
        forbidden_columns: &[],
    },
    TablePermission {
        table: "jobs",
        scope: ScopeRule::Literal {
            column: "status",
            value: "active",
        },
        forbidden_columns: &[],
    },
    TablePermission {
        table: "applications",
        scope: ScopeRule::CallerId {
            column: "student_id",
        },
        forbidden_columns: &[],
    },
    TablePermission {
        table: "companies",
        scope: ScopeRule::Unscoped,
        forbidden_columns: &["email", "user_id"],
    },
];

static COMPANY_PERMISSIONS: &[TablePermission] = &[
    TablePermission {
        table: "companies",
        scope: ScopeRule::CallerId { column: "id" },
        forbidden_columns: &[],
    },
    TablePermission {
        table: "jobs",
        scope: ScopeRule::CallerId {
            column: "company_id",
        },
        forbidden_columns: &[],
    },
    TablePermission {
        table: "applications",
        scope: ScopeRule::JobOwnedByCaller,
        forbidden_columns: &[],
    },
    TablePermission {
        table: "students",
        scope: ScopeRule::AppliedToCallerJobs,
        forbidden_columns: &["email", "phone", "user_id"],
    },
];

static ADMIN_PERMISSIONS: &[TablePermission] = &[
    TablePermission {
        table: "users",
        scope: ScopeRule::Unscoped,
        forbidden_columns: &[],
    },
    TablePermission {
        table: "students",
        scope: ScopeRule::Unscoped,
        forbidden_columns: &[],
    },
    TablePermission {
        table: "companies",
        scope: ScopeRule::Unscoped,
        forbidden_columns: &[],
    },
    TablePermission {
        table: "jobs",
        scope: ScopeRule::Unscoped,
        forbidden_columns: &[],
    },
    TablePermission {
        table: "applications",
        scope: ScopeRule::Unscoped,
        forbidden_columns: &[],
    },
];

pub fn permissions(role: Role) -> &'static [TablePermission] {
    match role {
        Role::Student => STUDENT_PERMISSIONS,
        Role::Company => COMPANY_PERMISSIONS,
        Role::Admin => ADMIN_PERMISSIONS,
    }
}

pub fn permission(role: Role, table: &str) -> Option<&'static TablePermission> {
    permissions(role).iter().find(|p| p.table == table)
}

/// Plain-text description of what a role may query, for generation prompts.
pub fn describe_for_role(role: Role) -> String {
    let mut out = String::from("Tables:\n");

    for perm in permissions(role) {
        let Some(def) = table(perm.table) else {
            continue;
        };
        let columns: Vec<String> = def
            .columns
            .iter()
            .filter(|c| perm.allows_column(c.name))
            .map(|c| format!("{} ({})", c.name, c.ty.as_str()))
            .collect();
        out.push_str(&format!("- {}: {}\n", def.name, columns.join(", ")));
    }

    out.push_str("Joins:\n");
    for rel in RELATIONS {
        if permission(role, rel.from_table).is_some() && permission(role, rel.to_table).is_some() {
            out.push_str(&format!(
                "- {}.{} = {}.{}\n",
                rel.from_table, rel.from_column, rel.to_table, rel.to_column
            ));
        }
    }

    out
}
