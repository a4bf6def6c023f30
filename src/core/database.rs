// src/core/database.rs
//! SQLite connection management, schema migrations and the read-only data
//! source used by the query executor.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{Map, Number, Value};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row, TypeInfo, ValueRef};
use std::path::Path;
use tracing::{debug, info};

use crate::query::compile::CompiledQuery;
use crate::query::executor::DataSource;
use crate::query::validate::BindValue;

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        role TEXT NOT NULL CHECK (role IN ('student', 'company', 'admin')),
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS students (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL UNIQUE REFERENCES users(id),
        name TEXT NOT NULL,
        email TEXT NOT NULL,
        phone TEXT,
        srn TEXT,
        cgpa REAL,
        degree TEXT,
        course TEXT,
        skills TEXT NOT NULL DEFAULT '[]',
        certifications_count INTEGER NOT NULL DEFAULT 0,
        projects_count INTEGER NOT NULL DEFAULT 0,
        experience_count INTEGER NOT NULL DEFAULT 0,
        has_resume INTEGER NOT NULL DEFAULT 0,
        status TEXT NOT NULL DEFAULT 'pending',
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS companies (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL UNIQUE REFERENCES users(id),
        name TEXT NOT NULL,
        email TEXT NOT NULL,
        industry TEXT,
        size TEXT,
        location TEXT,
        website TEXT,
        status TEXT NOT NULL DEFAULT 'pending',
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS jobs (
        id TEXT PRIMARY KEY,
        company_id TEXT NOT NULL REFERENCES companies(id),
        title TEXT NOT NULL,
        type TEXT NOT NULL,
        location TEXT,
        cgpa_cutoff REAL,
        eligible_courses TEXT NOT NULL DEFAULT '[]',
        eligible_degrees TEXT NOT NULL DEFAULT '[]',
        salary INTEGER,
        skills TEXT NOT NULL DEFAULT '[]',
        status TEXT NOT NULL DEFAULT 'active',
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS applications (
        id TEXT PRIMARY KEY,
        job_id TEXT NOT NULL REFERENCES jobs(id),
        student_id TEXT NOT NULL REFERENCES students(id),
        status TEXT NOT NULL DEFAULT 'pending',
        student_cgpa REAL,
        student_course TEXT,
        student_degree TEXT,
        applied_at TEXT NOT NULL DEFAULT (datetime('now')),
        UNIQUE (job_id, student_id)
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS query_history (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        requested_by TEXT NOT NULL,
        requested_by_role TEXT NOT NULL,
        query_text TEXT,
        template_id TEXT,
        resolved_plan TEXT NOT NULL,
        row_count INTEGER NOT NULL,
        chart_type TEXT NOT NULL,
        insights TEXT,
        execution_ms INTEGER NOT NULL,
        created_at INTEGER NOT NULL
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS profile_gap_cache (
        student_id TEXT PRIMARY KEY,
        suggestions TEXT NOT NULL,
        last_generated INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    );
    "#,
    "CREATE INDEX IF NOT EXISTS idx_jobs_company ON jobs(company_id);",
    "CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);",
    "CREATE INDEX IF NOT EXISTS idx_applications_job ON applications(job_id);",
    "CREATE INDEX IF NOT EXISTS idx_applications_student ON applications(student_id);",
    "CREATE INDEX IF NOT EXISTS idx_query_history_requester ON query_history(requested_by, created_at);",
];

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the database file and run migrations.
    pub async fn new(database_path: &Path) -> Result<Self> {
        if let Some(parent) = database_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .context("Failed to create database directory")?;
            }
        }

        let database_url = format!("sqlite:{}?mode=rwc", database_path.display());
        let pool = SqlitePool::connect(&database_url).await.with_context(|| {
            format!("Failed to connect to database: {}", database_path.display())
        })?;

        info!("Database connection established: {}", database_path.display());

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Private in-memory database. A single long-lived connection keeps the
    /// data alive for the lifetime of the pool.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .context("Failed to open in-memory database")?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<()> {
        for statement in MIGRATIONS {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .with_context(|| format!("Migration failed: {}", statement.trim()))?;
        }

        info!("Database migrations completed");
        Ok(())
    }

    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("Database health check failed")?;
        Ok(())
    }
}

#[async_trait]
impl DataSource for Database {
    async fn fetch_rows(&self, query: &CompiledQuery) -> Result<Vec<Map<String, Value>>> {
        debug!("Executing compiled query: {}", query.sql);

        let mut statement = sqlx::query(&query.sql);
        for bind in &query.binds {
            statement = match bind {
                BindValue::Text(text) => statement.bind(text.as_str()),
                BindValue::Integer(number) => statement.bind(*number),
                BindValue::Real(number) => statement.bind(*number),
                BindValue::Bool(flag) => statement.bind(*flag),
            };
        }

        let rows = statement
            .fetch_all(&self.pool)
            .await
            .context("Failed to execute compiled query")?;

        rows.iter().map(row_to_json).collect()
    }
}

/// Convert a row to a JSON object keyed by output column name, using the
/// storage class of each value.
fn row_to_json(row: &SqliteRow) -> Result<Map<String, Value>> {
    let mut object = Map::new();

    for (index, column) in row.columns().iter().enumerate() {
        let raw = row.try_get_raw(index)?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            match raw.type_info().name() {
                "INTEGER" => Value::from(row.try_get::<i64, _>(index)?),
                "REAL" => Number::from_f64(row.try_get::<f64, _>(index)?)
                    .map(Value::Number)
                    .unwrap_or(Value::Null),
                "BLOB" => Value::Null,
                _ => Value::String(row.try_get::<String, _>(index)?),
            }
        };
        object.insert(column.name().to_string(), value);
    }

    Ok(object)
}
