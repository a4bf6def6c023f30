// tests/common/mod.rs
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, Utc};
use placement_insights::auth::AuthConfig;
use placement_insights::core::clock::SystemClock;
use placement_insights::core::llm_client::{GenerationCapability, GenerationError, GenerationRequest};
use placement_insights::core::Database;
use placement_insights::{build_rocket, AppState, ServiceSettings};
use rocket::http::Header;
use rocket::local::asynchronous::Client;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub const SECRET: &str = "integration-secret";

/// Fake generation capability keyed by request purpose.
#[derive(Default)]
pub struct FakeGeneration {
    responses: Mutex<HashMap<String, Result<Value, GenerationError>>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl FakeGeneration {
    pub fn set(&self, purpose: &str, value: Value) {
        self.responses.lock().unwrap().insert(purpose.to_string(), Ok(value));
    }

    pub fn fail(&self, purpose: &str, error: GenerationError) {
        self.responses.lock().unwrap().insert(purpose.to_string(), Err(error));
    }

    pub fn calls(&self, purpose: &str) -> usize {
        self.calls.lock().unwrap().get(purpose).copied().unwrap_or(0)
    }
}

#[async_trait]
impl GenerationCapability for FakeGeneration {
    async fn generate_json(&self, request: &GenerationRequest) -> Result<Value, GenerationError> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(request.purpose.to_string())
            .or_default() += 1;
        self.responses
            .lock()
            .unwrap()
            .get(request.purpose)
            .cloned()
            .unwrap_or_else(|| Err(GenerationError::Transport("offline".to_string())))
    }
}

pub struct TestApp {
    pub client: Client,
    pub db: Database,
    pub generation: Arc<FakeGeneration>,
    auth: AuthConfig,
}

impl TestApp {
    pub async fn new() -> Self {
        let db = Database::in_memory().await.unwrap();
        let generation = Arc::new(FakeGeneration::default());
        let settings = ServiceSettings {
            query_timeout: std::time::Duration::from_secs(10),
            profile_gap_ttl: Duration::hours(24),
        };
        let state = AppState::new(&db, generation.clone(), Arc::new(SystemClock), &settings);
        let rocket = build_rocket(rocket::Config::figment(), state, AuthConfig::new(SECRET), db.clone());
        let client = Client::tracked(rocket).await.unwrap();

        Self {
            client,
            db,
            generation,
            auth: AuthConfig::new(SECRET),
        }
    }

    pub fn bearer(&self, user_id: &str) -> Header<'static> {
        let token = self.auth.issue_token(user_id, Duration::hours(1), Utc::now()).unwrap();
        Header::new("Authorization", format!("Bearer {}", token))
    }

    async fn exec(&self, sql: &str, binds: &[&str]) {
        let mut query = sqlx::query(sql);
        for b in binds {
            query = query.bind(*b);
        }
        query.execute(self.db.pool()).await.unwrap();
    }

    pub async fn user(&self, id: &str, role: &str) {
        self.exec(
            "INSERT INTO users (id, name, email, role) VALUES (?, ?, ?, ?)",
            &[id, id, &format!("{}@example.org", id), role],
        )
        .await;
    }

    /// Student `id` owned by user `user-{id}`.
    pub async fn student(&self, id: &str, cgpa: &str) {
        let user = format!("user-{}", id);
        self.user(&user, "student").await;
        self.exec(
            "INSERT INTO students (id, user_id, name, email, cgpa, degree, course, skills, has_resume) \
             VALUES (?, ?, ?, ?, CAST(? AS REAL), 'B.Tech', 'CSE', '[\"java\"]', 1)",
            &[id, &user, id, &format!("{}@campus.example.org", id), cgpa],
        )
        .await;
    }

    /// Company `id` owned by user `user-{id}` with the given job counts.
    pub async fn company(&self, id: &str, active: usize, inactive: usize) {
        let user = format!("user-{}", id);
        self.user(&user, "company").await;
        self.exec(
            "INSERT INTO companies (id, user_id, name, email, status) VALUES (?, ?, ?, ?, 'approved')",
            &[id, &user, id, &format!("hr@{}.example.org", id)],
        )
        .await;
        for n in 0..active + inactive {
            let status = if n < active { "active" } else { "inactive" };
            self.exec(
                "INSERT INTO jobs (id, company_id, title, type, cgpa_cutoff, skills, status) \
                 VALUES (?, ?, ?, 'internship', 6.5, '[\"sql\"]', ?)",
                &[&format!("{}-job-{}", id, n), id, &format!("Role {}", n), status],
            )
            .await;
        }
    }
}
