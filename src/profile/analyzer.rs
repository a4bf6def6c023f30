// src/profile/analyzer.rs
use chrono::Duration;
use dashmap::DashMap;
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::cache::{CachedGaps, ProfileGapCache};
use super::{GapCategory, GapOrigin, GapReport, ProfileGap, MAX_GAPS};
use crate::core::clock::Clock;
use crate::core::llm_client::{generate_structured, GenerationCapability, GenerationRequest};
use crate::error::{InsightError, InsightResult};
use crate::query::translator::generation_failure;
use crate::suggestions::snapshot::{MarketSnapshot, SnapshotReader, StudentProfile};
use crate::suggestions::Priority;

const PROFILE_SKILLS_SHOWN: usize = 10;

const GAPS_SCHEMA: &str = r#"{
  "gaps": [
    {
      "category": "projects|skills|certifications|experience|education",
      "title": "short gap title",
      "description": "why this matters for the student",
      "priority": "high|medium|low",
      "actionItems": ["concrete step", "concrete step"]
    }
  ]
}"#;

#[derive(Deserialize)]
struct GapsResponse {
    #[serde(default)]
    gaps: Vec<RawGap>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawGap {
    #[serde(default)]
    category: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    priority: String,
    #[serde(default)]
    action_items: Vec<String>,
}

impl RawGap {
    fn validate(self) -> Option<ProfileGap> {
        let category = GapCategory::parse(&self.category)?;
        let priority = Priority::parse(&self.priority)?;
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return None;
        }
        Some(ProfileGap {
            category,
            title,
            description: self.description.trim().to_string(),
            priority,
            action_items: self
                .action_items
                .into_iter()
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .collect(),
        })
    }
}

/// Stale/Fresh cache over generated profile gaps. Concurrent callers for the
/// same student share one generation.
pub struct ProfileGapAnalyzer {
    reader: SnapshotReader,
    cache: ProfileGapCache,
    generator: Arc<dyn GenerationCapability>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ProfileGapAnalyzer {
    pub fn new(
        reader: SnapshotReader,
        cache: ProfileGapCache,
        generator: Arc<dyn GenerationCapability>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
    ) -> Self {
        Self {
            reader,
            cache,
            generator,
            clock,
            ttl,
            locks: DashMap::new(),
        }
    }

    /// Cached gaps when fresh, otherwise regenerate and store.
    pub async fn analyze(&self, student_id: &str) -> InsightResult<GapReport> {
        if let Some(cached) = self.fresh_entry(student_id).await? {
            return Ok(cached_report(cached));
        }

        self.exclusive(student_id, async {
            // another caller may have regenerated while we waited
            if let Some(cached) = self.fresh_entry(student_id).await? {
                debug!("Profile gaps for {} regenerated by a concurrent request", student_id);
                return Ok(cached_report(cached));
            }
            self.regenerate(student_id, GapOrigin::Generated).await
        })
        .await
    }

    /// Always regenerate, ignoring freshness.
    pub async fn refresh(&self, student_id: &str) -> InsightResult<GapReport> {
        self.exclusive(student_id, self.regenerate(student_id, GapOrigin::Refreshed))
            .await
    }

    /// Run `work` holding the student's lock. The lock entry is dropped once
    /// no other caller holds or waits on it.
    async fn exclusive<T>(&self, student_id: &str, work: impl Future<Output = T>) -> T {
        let lock = self.locks.entry(student_id.to_string()).or_default().clone();
        let result = {
            let _guard = lock.lock().await;
            work.await
        };
        drop(lock);
        self.locks.remove_if(student_id, |_, m| Arc::strong_count(m) == 1);
        result
    }

    async fn fresh_entry(&self, student_id: &str) -> InsightResult<Option<CachedGaps>> {
        let cached = self.cache.get(student_id).await.map_err(|e| {
            InsightError::execution("Failed to load profile suggestions", format!("{:#}", e))
        })?;
        let now = self.clock.now();
        Ok(cached.filter(|c| now - c.last_generated < self.ttl))
    }

    async fn regenerate(&self, student_id: &str, origin: GapOrigin) -> InsightResult<GapReport> {
        let profile = self
            .reader
            .student_profile(student_id)
            .await
            .map_err(|e| InsightError::execution("Failed to load student profile", format!("{:#}", e)))?
            .ok_or_else(|| InsightError::NotFound("Student profile not found".to_string()))?;

        let applications = self
            .reader
            .student_applications(student_id)
            .await
            .map_err(|e| InsightError::execution("Failed to load student profile", format!("{:#}", e)))?
            .len();
        let market = self
            .reader
            .market()
            .await
            .map_err(|e| InsightError::execution("Failed to load job market data", format!("{:#}", e)))?;

        let request = GenerationRequest::new("profile_gaps", gap_prompt(&profile, applications, &market), GAPS_SCHEMA)
            .with_temperature(0.7);
        let response = generate_structured::<GapsResponse>(self.generator.as_ref(), &request)
            .await
            .map_err(generation_failure)?;

        let returned = response.gaps.len();
        let mut gaps: Vec<ProfileGap> = response.gaps.into_iter().filter_map(RawGap::validate).collect();
        if gaps.len() < returned {
            warn!(
                "Dropped {} profile gaps with unknown category or priority for {}",
                returned - gaps.len(),
                student_id
            );
        }
        if gaps.is_empty() {
            return Err(InsightError::execution(
                "Failed to analyze profile",
                format!("no usable gaps in generation output ({} returned)", returned),
            ));
        }
        gaps.sort_by_key(|g| g.priority);
        gaps.truncate(MAX_GAPS);

        let generated_at = self.clock.now();
        self.cache
            .upsert(student_id, &gaps, generated_at)
            .await
            .map_err(|e| InsightError::execution("Failed to save profile suggestions", format!("{:#}", e)))?;

        info!("Generated {} profile gaps for student {}", gaps.len(), student_id);

        Ok(GapReport {
            suggestions: gaps,
            origin,
            last_generated: generated_at,
        })
    }
}

fn cached_report(cached: CachedGaps) -> GapReport {
    GapReport {
        suggestions: cached.suggestions,
        origin: GapOrigin::Cache,
        last_generated: cached.last_generated,
    }
}

fn gap_prompt(profile: &StudentProfile, applications: usize, market: &MarketSnapshot) -> String {
    let skills = profile
        .skills
        .iter()
        .take(PROFILE_SKILLS_SHOWN)
        .cloned()
        .collect::<Vec<_>>()
        .join(", ");
    let or_unknown = |v: &Option<String>| v.clone().unwrap_or_else(|| "not specified".to_string());

    format!(
        "Analyze this student's profile against the current job market and identify 3-5 specific gaps \
that are limiting their placement chances.\n\n\
STUDENT PROFILE:\n\
- CGPA: {}\n\
- Degree: {}\n\
- Course: {}\n\
- Skills ({}): {}\n\
- Projects: {}\n\
- Certifications: {}\n\
- Experience entries: {}\n\
- Applications submitted: {}\n\
- Resume uploaded: {}\n\n\
JOB MARKET:\n\
- Active jobs: {}\n\
- Most requested skills: {}\n\
- Average skills per job: {}\n\
- Typical projects expected: 2\n\n\
Each gap needs a category (projects, skills, certifications, experience or education), a priority \
(high, medium or low), a short title, a description and 2-3 concrete action items.",
        profile.cgpa.map(|c| format!("{:.2}", c)).unwrap_or_else(|| "not specified".to_string()),
        or_unknown(&profile.degree),
        or_unknown(&profile.course),
        profile.skills.len(),
        if skills.is_empty() { "none".to_string() } else { skills },
        profile.projects_count,
        profile.certifications_count,
        profile.experience_count,
        applications,
        if profile.has_resume { "yes" } else { "no" },
        market.active_jobs,
        if market.top_skills.is_empty() {
            "none".to_string()
        } else {
            market.top_skills.join(", ")
        },
        market.average_skill_count,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use crate::core::llm_client::GenerationError;
    use crate::core::Database;
    use crate::test_support::{seed_company_jobs, seed_student, ScriptedGeneration};
    use chrono::{TimeZone, Utc};
    use serde_json::{json, Value};

    fn gaps_payload() -> Value {
        json!({"gaps": [
            {"category": "skills", "title": "Learn Docker", "description": "d", "priority": "low", "actionItems": ["Containerize a project"]},
            {"category": "projects", "title": "Build an API", "description": "d", "priority": "high", "actionItems": []},
            {"category": "hobbies", "title": "Ignored", "description": "d", "priority": "high"},
            {"category": "certifications", "title": "Get certified", "description": "d", "priority": "medium"}
        ]})
    }

    async fn analyzer(generator: Arc<ScriptedGeneration>) -> (ProfileGapAnalyzer, Arc<ManualClock>) {
        let db = Database::in_memory().await.unwrap();
        seed_student(&db, "s1", 7.2, &["python"]).await;
        seed_company_jobs(&db, "c1", 2, 0).await;
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()));
        let analyzer = ProfileGapAnalyzer::new(
            SnapshotReader::new(db.pool().clone()),
            ProfileGapCache::new(db.pool().clone()),
            generator,
            clock.clone(),
            Duration::hours(24),
        );
        (analyzer, clock)
    }

    #[tokio::test]
    async fn test_gaps_are_validated_and_sorted() {
        let generator = Arc::new(ScriptedGeneration::new().respond("profile_gaps", gaps_payload()));
        let (analyzer, _) = analyzer(generator).await;

        let report = analyzer.analyze("s1").await.unwrap();
        assert_eq!(report.origin, GapOrigin::Generated);
        let titles: Vec<_> = report.suggestions.iter().map(|g| g.title.as_str()).collect();
        assert_eq!(titles, vec!["Build an API", "Get certified", "Learn Docker"]);
    }

    #[tokio::test]
    async fn test_freshness_window() {
        let generator = Arc::new(ScriptedGeneration::new().respond("profile_gaps", gaps_payload()));
        let (analyzer, clock) = analyzer(generator.clone()).await;

        let first = analyzer.analyze("s1").await.unwrap();
        clock.advance(Duration::hours(23));
        let second = analyzer.analyze("s1").await.unwrap();
        assert!(second.from_cache());
        assert_eq!(second.suggestions, first.suggestions);
        assert_eq!(second.last_generated, first.last_generated);
        assert_eq!(generator.calls("profile_gaps"), 1);

        clock.advance(Duration::hours(2));
        let third = analyzer.analyze("s1").await.unwrap();
        assert!(!third.from_cache());
        assert!(third.last_generated > first.last_generated);
        assert_eq!(generator.calls("profile_gaps"), 2);
    }

    #[tokio::test]
    async fn test_refresh_always_regenerates() {
        let generator = Arc::new(ScriptedGeneration::new().respond("profile_gaps", gaps_payload()));
        let (analyzer, clock) = analyzer(generator.clone()).await;

        let first = analyzer.analyze("s1").await.unwrap();
        clock.advance(Duration::minutes(1));
        let refreshed = analyzer.refresh("s1").await.unwrap();
        assert!(refreshed.refreshed());
        assert!(refreshed.last_generated > first.last_generated);
        assert_eq!(generator.calls("profile_gaps"), 2);
        assert!(analyzer.locks.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_stale_reads_generate_once() {
        let generator = Arc::new(ScriptedGeneration::new().respond("profile_gaps", gaps_payload()));
        let (analyzer, _) = analyzer(generator.clone()).await;

        let (a, b) = tokio::join!(analyzer.analyze("s1"), analyzer.analyze("s1"));
        assert_eq!(a.unwrap().suggestions, b.unwrap().suggestions);
        assert_eq!(generator.calls("profile_gaps"), 1);
        assert!(analyzer.locks.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_student_is_not_found() {
        let generator = Arc::new(ScriptedGeneration::new().respond("profile_gaps", gaps_payload()));
        let (analyzer, _) = analyzer(generator.clone()).await;

        assert!(matches!(analyzer.analyze("nobody").await, Err(InsightError::NotFound(_))));
        assert_eq!(generator.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_generation_failure_leaves_cache_empty() {
        let generator = Arc::new(ScriptedGeneration::new().fail("profile_gaps", GenerationError::RateLimited { retry_after_secs: None }));
        let (analyzer, _) = analyzer(generator.clone()).await;

        assert!(matches!(analyzer.analyze("s1").await, Err(InsightError::RateLimited { .. })));
        assert!(analyzer.cache.get("s1").await.unwrap().is_none());
    }
}
