// src/suggestions/snapshot.rs
//! Bounded read-only snapshots of the domain data used by the suggestion
//! heuristics and the profile gap analyzer.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use sqlx::SqlitePool;

use crate::core::clock::to_db_timestamp;

const MAX_SNAPSHOT_JOBS: i64 = 500;
const MAX_SNAPSHOT_APPLICATIONS: i64 = 2000;

#[derive(Debug, Clone, PartialEq)]
pub struct StudentProfile {
    pub id: String,
    pub cgpa: Option<f64>,
    pub degree: Option<String>,
    pub course: Option<String>,
    pub skills: Vec<String>,
    pub certifications_count: i64,
    pub projects_count: i64,
    pub experience_count: i64,
    pub has_resume: bool,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobSnapshot {
    pub id: String,
    pub company_id: String,
    pub cgpa_cutoff: Option<f64>,
    pub eligible_courses: Vec<String>,
    pub eligible_degrees: Vec<String>,
    pub skills: Vec<String>,
    pub status: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationSnapshot {
    pub job_id: String,
    pub student_id: String,
    pub status: String,
    pub applied_at: String,
}

#[derive(Debug, Clone)]
pub struct StudentSnapshot {
    pub profile: StudentProfile,
    pub applications: Vec<ApplicationSnapshot>,
    pub active_jobs: Vec<JobSnapshot>,
}

#[derive(Debug, Clone)]
pub struct CompanySnapshot {
    pub jobs: Vec<JobSnapshot>,
    pub applications: Vec<ApplicationSnapshot>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdminSnapshot {
    pub pending_students: i64,
    pub pending_companies: i64,
    pub total_students: i64,
    pub total_jobs: i64,
    pub active_jobs: i64,
    pub total_applications: i64,
    pub recent_applications: i64,
}

/// Market view used for profile gap prompts.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketSnapshot {
    pub active_jobs: usize,
    pub top_skills: Vec<String>,
    pub average_skill_count: usize,
}

#[derive(sqlx::FromRow)]
struct StudentRow {
    id: String,
    cgpa: Option<f64>,
    degree: Option<String>,
    course: Option<String>,
    skills: String,
    certifications_count: i64,
    projects_count: i64,
    experience_count: i64,
    has_resume: bool,
    status: String,
}

#[derive(sqlx::FromRow)]
struct JobRow {
    id: String,
    company_id: String,
    cgpa_cutoff: Option<f64>,
    eligible_courses: String,
    eligible_degrees: String,
    skills: String,
    status: String,
    created_at: String,
}

#[derive(sqlx::FromRow)]
struct ApplicationRow {
    job_id: String,
    student_id: String,
    status: String,
    applied_at: String,
}

impl From<StudentRow> for StudentProfile {
    fn from(row: StudentRow) -> Self {
        Self {
            skills: parse_list(&row.skills),
            id: row.id,
            cgpa: row.cgpa,
            degree: row.degree,
            course: row.course,
            certifications_count: row.certifications_count,
            projects_count: row.projects_count,
            experience_count: row.experience_count,
            has_resume: row.has_resume,
            status: row.status,
        }
    }
}

impl From<JobRow> for JobSnapshot {
    fn from(row: JobRow) -> Self {
        Self {
            eligible_courses: parse_list(&row.eligible_courses),
            eligible_degrees: parse_list(&row.eligible_degrees),
            skills: parse_list(&row.skills),
            id: row.id,
            company_id: row.company_id,
            cgpa_cutoff: row.cgpa_cutoff,
            status: row.status,
            created_at: row.created_at,
        }
    }
}

impl From<ApplicationRow> for ApplicationSnapshot {
    fn from(row: ApplicationRow) -> Self {
        Self {
            job_id: row.job_id,
            student_id: row.student_id,
            status: row.status,
            applied_at: row.applied_at,
        }
    }
}

/// JSON list column to strings. Entries may be plain strings or objects
/// carrying a `skill` or `name` field.
pub fn parse_list(text: &str) -> Vec<String> {
    let Ok(Value::Array(items)) = serde_json::from_str::<Value>(text) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Object(obj) => obj
                .get("skill")
                .or_else(|| obj.get("name"))
                .and_then(Value::as_str)
                .map(|s| s.trim().to_string()),
            _ => None,
        })
        .filter(|s| !s.is_empty())
        .collect()
}

#[derive(Clone)]
pub struct SnapshotReader {
    pool: SqlitePool,
}

impl SnapshotReader {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn student_profile(&self, student_id: &str) -> Result<Option<StudentProfile>> {
        let row: Option<StudentRow> = sqlx::query_as(
            "SELECT id, cgpa, degree, course, skills, certifications_count, projects_count, \
             experience_count, has_resume, status FROM students WHERE id = ?",
        )
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to load student profile")?;

        Ok(row.map(StudentProfile::from))
    }

    pub async fn active_jobs(&self) -> Result<Vec<JobSnapshot>> {
        let rows: Vec<JobRow> = sqlx::query_as(
            "SELECT id, company_id, cgpa_cutoff, eligible_courses, eligible_degrees, skills, status, created_at \
             FROM jobs WHERE status = 'active' ORDER BY created_at DESC LIMIT ?",
        )
        .bind(MAX_SNAPSHOT_JOBS)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load active jobs")?;

        Ok(rows.into_iter().map(JobSnapshot::from).collect())
    }

    pub async fn student_applications(&self, student_id: &str) -> Result<Vec<ApplicationSnapshot>> {
        let rows: Vec<ApplicationRow> = sqlx::query_as(
            "SELECT job_id, student_id, status, applied_at FROM applications \
             WHERE student_id = ? ORDER BY applied_at DESC LIMIT ?",
        )
        .bind(student_id)
        .bind(MAX_SNAPSHOT_APPLICATIONS)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load student applications")?;

        Ok(rows.into_iter().map(ApplicationSnapshot::from).collect())
    }

    pub async fn student(&self, student_id: &str) -> Result<Option<StudentSnapshot>> {
        let Some(profile) = self.student_profile(student_id).await? else {
            return Ok(None);
        };
        Ok(Some(StudentSnapshot {
            applications: self.student_applications(student_id).await?,
            active_jobs: self.active_jobs().await?,
            profile,
        }))
    }

    pub async fn company(&self, company_id: &str) -> Result<Option<CompanySnapshot>> {
        let exists: Option<(String,)> = sqlx::query_as("SELECT id FROM companies WHERE id = ?")
            .bind(company_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load company")?;
        if exists.is_none() {
            return Ok(None);
        }

        let jobs: Vec<JobRow> = sqlx::query_as(
            "SELECT id, company_id, cgpa_cutoff, eligible_courses, eligible_degrees, skills, status, created_at \
             FROM jobs WHERE company_id = ? ORDER BY created_at DESC LIMIT ?",
        )
        .bind(company_id)
        .bind(MAX_SNAPSHOT_JOBS)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load company jobs")?;

        let applications: Vec<ApplicationRow> = sqlx::query_as(
            "SELECT a.job_id, a.student_id, a.status, a.applied_at FROM applications a \
             JOIN jobs j ON j.id = a.job_id WHERE j.company_id = ? ORDER BY a.applied_at DESC LIMIT ?",
        )
        .bind(company_id)
        .bind(MAX_SNAPSHOT_APPLICATIONS)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load company applications")?;

        Ok(Some(CompanySnapshot {
            jobs: jobs.into_iter().map(JobSnapshot::from).collect(),
            applications: applications.into_iter().map(ApplicationSnapshot::from).collect(),
        }))
    }

    pub async fn admin(&self, now: DateTime<Utc>) -> Result<AdminSnapshot> {
        let week_ago = to_db_timestamp(now - Duration::days(7));

        let (pending_students, total_students): (i64, i64) = sqlx::query_as(
            "SELECT COALESCE(SUM(CASE WHEN s.status = 'pending' THEN 1 ELSE 0 END), 0), COUNT(*) \
             FROM students s JOIN users u ON u.id = s.user_id WHERE u.role <> 'admin'",
        )
        .fetch_one(&self.pool)
        .await
        .context("Failed to count students")?;

        let (pending_companies,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM companies c JOIN users u ON u.id = c.user_id \
             WHERE u.role <> 'admin' AND c.status = 'pending'",
        )
        .fetch_one(&self.pool)
        .await
        .context("Failed to count companies")?;

        let (total_jobs, active_jobs): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(CASE WHEN status = 'active' THEN 1 ELSE 0 END), 0) FROM jobs",
        )
        .fetch_one(&self.pool)
        .await
        .context("Failed to count jobs")?;

        let (total_applications, recent_applications): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(CASE WHEN applied_at > ? THEN 1 ELSE 0 END), 0) FROM applications",
        )
        .bind(&week_ago)
        .fetch_one(&self.pool)
        .await
        .context("Failed to count applications")?;

        Ok(AdminSnapshot {
            pending_students,
            pending_companies,
            total_students,
            total_jobs,
            active_jobs,
            total_applications,
            recent_applications,
        })
    }

    pub async fn market(&self) -> Result<MarketSnapshot> {
        Ok(market_from_jobs(&self.active_jobs().await?))
    }
}

const TOP_SKILLS: usize = 10;
const DEFAULT_SKILL_COUNT: usize = 5;

pub fn market_from_jobs(jobs: &[JobSnapshot]) -> MarketSnapshot {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for skill in jobs.iter().flat_map(|j| j.skills.iter()) {
        match counts.iter_mut().find(|(s, _)| s.eq_ignore_ascii_case(skill)) {
            Some((_, n)) => *n += 1,
            None => counts.push((skill.clone(), 1)),
        }
    }
    // stable sort keeps first-seen order among ties
    counts.sort_by(|a, b| b.1.cmp(&a.1));

    let total_skills: usize = jobs.iter().map(|j| j.skills.len()).sum();
    let average_skill_count = match jobs.len() {
        0 => DEFAULT_SKILL_COUNT,
        n => match (total_skills as f64 / n as f64).round() as usize {
            0 => DEFAULT_SKILL_COUNT,
            avg => avg,
        },
    };

    MarketSnapshot {
        active_jobs: jobs.len(),
        top_skills: counts.into_iter().take(TOP_SKILLS).map(|(s, _)| s).collect(),
        average_skill_count,
    }
}
