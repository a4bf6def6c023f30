// src/profile/cache.rs
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use super::ProfileGap;

#[derive(Debug, Clone, PartialEq)]
pub struct CachedGaps {
    pub suggestions: Vec<ProfileGap>,
    pub last_generated: DateTime<Utc>,
}

/// One row per student. Rows are upserted and never deleted on their own.
#[derive(Clone)]
pub struct ProfileGapCache {
    pool: SqlitePool,
}

impl ProfileGapCache {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, student_id: &str) -> Result<Option<CachedGaps>> {
        let row: Option<(String, i64)> =
            sqlx::query_as("SELECT suggestions, last_generated FROM profile_gap_cache WHERE student_id = ?")
                .bind(student_id)
                .fetch_optional(&self.pool)
                .await
                .context("Failed to read profile gap cache")?;

        let Some((suggestions, last_generated)) = row else {
            return Ok(None);
        };

        let suggestions: Vec<ProfileGap> =
            serde_json::from_str(&suggestions).context("Cached profile gaps are not valid JSON")?;
        let last_generated = DateTime::from_timestamp_micros(last_generated)
            .with_context(|| format!("Invalid cache timestamp {}", last_generated))?;

        Ok(Some(CachedGaps {
            suggestions,
            last_generated,
        }))
    }

    pub async fn upsert(&self, student_id: &str, suggestions: &[ProfileGap], generated_at: DateTime<Utc>) -> Result<()> {
        let payload = serde_json::to_string(suggestions).context("Failed to serialize profile gaps")?;
        let micros = generated_at.timestamp_micros();

        sqlx::query(
            "INSERT INTO profile_gap_cache (student_id, suggestions, last_generated, updated_at) \
             VALUES (?, ?, ?, ?) \
             ON CONFLICT(student_id) DO UPDATE SET \
             suggestions = excluded.suggestions, \
             last_generated = excluded.last_generated, \
             updated_at = excluded.updated_at",
        )
        .bind(student_id)
        .bind(payload)
        .bind(micros)
        .bind(micros)
        .execute(&self.pool)
        .await
        .context("Failed to write profile gap cache")?;

        Ok(())
    }
}
