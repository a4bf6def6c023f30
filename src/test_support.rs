// src/test_support.rs
//! Fixtures shared by the unit tests: a scripted generation capability and
//! seed helpers for the domain tables.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::core::llm_client::{GenerationCapability, GenerationError, GenerationRequest};
use crate::core::Database;

/// Answers generation requests by purpose. Unscripted purposes fail.
#[derive(Default)]
pub struct ScriptedGeneration {
    responses: HashMap<String, Result<Value, GenerationError>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl ScriptedGeneration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, purpose: &str, value: Value) -> Self {
        self.responses.insert(purpose.to_string(), Ok(value));
        self
    }

    pub fn fail(mut self, purpose: &str, error: GenerationError) -> Self {
        self.responses.insert(purpose.to_string(), Err(error));
        self
    }

    pub fn calls(&self, purpose: &str) -> usize {
        let calls = self.calls.lock().unwrap();
        calls.get(purpose).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl GenerationCapability for ScriptedGeneration {
    async fn generate_json(&self, request: &GenerationRequest) -> Result<Value, GenerationError> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(request.purpose.to_string())
            .or_default() += 1;

        match self.responses.get(request.purpose) {
            Some(response) => response.clone(),
            None => Err(GenerationError::Transport(format!(
                "no scripted response for '{}'",
                request.purpose
            ))),
        }
    }
}

pub async fn seed_user(db: &Database, user_id: &str, role: &str) {
    sqlx::query("INSERT INTO users (id, name, email, role) VALUES (?, ?, ?, ?)")
        .bind(user_id)
        .bind(format!("User {}", user_id))
        .bind(format!("{}@example.org", user_id))
        .bind(role)
        .execute(db.pool())
        .await
        .unwrap();
}

/// Pending student `id` owned by user `user-{id}`, course CSE, with a résumé.
pub async fn seed_student(db: &Database, student_id: &str, cgpa: f64, skills: &[&str]) {
    let user_id = format!("user-{}", student_id);
    seed_user(db, &user_id, "student").await;

    sqlx::query(
        "INSERT INTO students (id, user_id, name, email, phone, cgpa, degree, course, skills, projects_count, has_resume) \
         VALUES (?, ?, ?, ?, '555-0100', ?, 'B.Tech', 'CSE', ?, 1, 1)",
    )
    .bind(student_id)
    .bind(&user_id)
    .bind(format!("Student {}", student_id))
    .bind(format!("{}@campus.example.org", student_id))
    .bind(cgpa)
    .bind(serde_json::to_string(skills).unwrap())
    .execute(db.pool())
    .await
    .unwrap();
}

async fn seed_company(db: &Database, company_id: &str) {
    let user_id = format!("user-{}", company_id);
    seed_user(db, &user_id, "company").await;

    sqlx::query(
        "INSERT INTO companies (id, user_id, name, email, industry, location, status) \
         VALUES (?, ?, ?, ?, 'Software', 'Pune', 'approved')",
    )
    .bind(company_id)
    .bind(&user_id)
    .bind(format!("Company {}", company_id))
    .bind(format!("hr@{}.example.org", company_id))
    .execute(db.pool())
    .await
    .unwrap();
}

pub async fn insert_job(db: &Database, job_id: &str, company_id: &str, status: &str, skills: &[&str]) {
    sqlx::query(
        "INSERT INTO jobs (id, company_id, title, type, location, cgpa_cutoff, salary, skills, status) \
         VALUES (?, ?, ?, 'full-time', 'Bengaluru', 7.0, 1200000, ?, ?)",
    )
    .bind(job_id)
    .bind(company_id)
    .bind(format!("Engineer {}", job_id))
    .bind(serde_json::to_string(skills).unwrap())
    .bind(status)
    .execute(db.pool())
    .await
    .unwrap();
}

/// Company `company_id` (user `user-{company_id}`) with jobs
/// `{company_id}-job-{n}`, active ones first.
pub async fn seed_company_jobs(db: &Database, company_id: &str, active: usize, inactive: usize) {
    seed_company(db, company_id).await;
    for n in 0..active + inactive {
        let status = if n < active { "active" } else { "inactive" };
        insert_job(db, &format!("{}-job-{}", company_id, n), company_id, status, &["rust", "sql"]).await;
    }
}

/// `count` active jobs owned by a single seed company.
pub async fn seed_jobs(db: &Database, count: usize) {
    seed_company_jobs(db, "seed-co", count, 0).await;
}

pub async fn insert_application(db: &Database, job_id: &str, student_id: &str, status: &str, applied_at: &str) {
    sqlx::query(
        "INSERT INTO applications (id, job_id, student_id, status, student_cgpa, student_course, student_degree, applied_at) \
         SELECT ?, ?, s.id, ?, s.cgpa, s.course, s.degree, ? FROM students s WHERE s.id = ?",
    )
    .bind(format!("{}-{}", job_id, student_id))
    .bind(job_id)
    .bind(status)
    .bind(applied_at)
    .bind(student_id)
    .execute(db.pool())
    .await
    .unwrap();
}
