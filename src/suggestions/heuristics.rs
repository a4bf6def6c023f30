// src/suggestions/heuristics.rs
//! Rule-based suggestions per role. Pure functions over snapshots so they can
//! be tested without a database.

use chrono::{DateTime, Duration, Utc};

use super::snapshot::{AdminSnapshot, CompanySnapshot, JobSnapshot, StudentProfile, StudentSnapshot};
use super::{Priority, Suggestion, SuggestionType, MAX_SUGGESTIONS};
use crate::core::clock::to_db_timestamp;

const MIN_APPLICATIONS_FOR_RATE: usize = 5;
const LOW_SUCCESS_RATE: f64 = 0.10;
const HIGH_SUCCESS_RATE: f64 = 0.30;
const REACH_MARGIN: f64 = 0.5;

const LOW_APPLICATIONS_PER_JOB: f64 = 5.0;
const HIGH_CUTOFF: f64 = 8.5;
const HIGH_CUTOFF_MIN_APPLICATIONS: f64 = 3.0;
const STALE_STATUS_APPLICATIONS: usize = 10;
const POSTING_WINDOW_DAYS: i64 = 30;

const PLATFORM_LOW_APPLICATIONS_PER_JOB: f64 = 3.0;

/// A job is eligible when the CGPA meets the cutoff and the student's course
/// and degree fall inside any non-empty eligibility list.
pub fn is_eligible(profile: &StudentProfile, job: &JobSnapshot) -> bool {
    let cgpa = profile.cgpa.unwrap_or(0.0);
    let meets_cgpa = cgpa >= job.cgpa_cutoff.unwrap_or(0.0);
    let meets_course = job.eligible_courses.is_empty()
        || profile
            .course
            .as_ref()
            .is_some_and(|c| job.eligible_courses.iter().any(|e| e.eq_ignore_ascii_case(c)));
    let meets_degree = job.eligible_degrees.is_empty()
        || profile
            .degree
            .as_ref()
            .is_some_and(|d| job.eligible_degrees.iter().any(|e| e.eq_ignore_ascii_case(d)));
    meets_cgpa && meets_course && meets_degree
}

pub fn student_suggestions(snapshot: &StudentSnapshot) -> Vec<Suggestion> {
    let profile = &snapshot.profile;
    let mut out = Vec::new();

    let unapplied: Vec<&JobSnapshot> = snapshot
        .active_jobs
        .iter()
        .filter(|job| !snapshot.applications.iter().any(|a| a.job_id == job.id))
        .filter(|job| is_eligible(profile, job))
        .collect();
    if !unapplied.is_empty() {
        out.push(Suggestion::new(
            SuggestionType::Action,
            format!("{} new jobs match your profile", unapplied.len()),
            "Explore opportunities that match your CGPA and course. Apply early to increase your chances.",
            Priority::High,
        ));
    }

    let total = snapshot.applications.len();
    if total >= MIN_APPLICATIONS_FOR_RATE {
        let selected = snapshot.applications.iter().filter(|a| a.status == "selected").count();
        let rate = selected as f64 / total as f64;
        if rate < LOW_SUCCESS_RATE {
            out.push(Suggestion::new(
                SuggestionType::Insight,
                "Low selection rate detected",
                "Consider improving your resume, adding more projects, or targeting roles that better match your skills.",
                Priority::High,
            ));
        } else if rate > HIGH_SUCCESS_RATE {
            out.push(Suggestion::new(
                SuggestionType::Insight,
                "Great job! Above average success rate",
                format!(
                    "Your selection rate is {:.0}%. Keep applying to similar roles.",
                    rate * 100.0
                ),
                Priority::Low,
            ));
        }
    }

    if profile.skills.is_empty() || !profile.has_resume {
        out.push(Suggestion::new(
            SuggestionType::Action,
            "Complete your profile",
            "Add your skills and upload a resume so recruiters can evaluate you.",
            Priority::High,
        ));
    }

    if let Some(cgpa) = profile.cgpa {
        let near_miss = snapshot
            .active_jobs
            .iter()
            .filter(|job| job.cgpa_cutoff.is_some_and(|cut| cut > cgpa && cut <= cgpa + REACH_MARGIN))
            .count();
        if near_miss > 0 {
            out.push(Suggestion::new(
                SuggestionType::Insight,
                format!("{} jobs just out of reach", near_miss),
                "These roles need a slightly higher CGPA. Strong projects and certifications can offset the gap.",
                Priority::Medium,
            ));
        }
    }

    out.truncate(MAX_SUGGESTIONS);
    out
}

pub fn company_suggestions(snapshot: &CompanySnapshot, now: DateTime<Utc>) -> Vec<Suggestion> {
    if snapshot.jobs.is_empty() {
        return vec![Suggestion::new(
            SuggestionType::Action,
            "Post your first job",
            "Start attracting talented students by posting your first job opening.",
            Priority::High,
        )];
    }

    let mut out = Vec::new();
    let applications_for = |job: &JobSnapshot| snapshot.applications.iter().filter(|a| a.job_id == job.id).count();

    let per_job = snapshot.applications.len() as f64 / snapshot.jobs.len() as f64;
    if per_job < LOW_APPLICATIONS_PER_JOB {
        out.push(Suggestion::new(
            SuggestionType::Recommendation,
            "Low application rates detected",
            format!(
                "Your jobs average {:.1} applications. Consider widening eligibility or improving job descriptions.",
                per_job
            ),
            Priority::High,
        ));
    }

    let high_cutoff: Vec<&JobSnapshot> = snapshot
        .jobs
        .iter()
        .filter(|j| j.cgpa_cutoff.is_some_and(|c| c > HIGH_CUTOFF))
        .collect();
    if !high_cutoff.is_empty() {
        let avg = high_cutoff.iter().map(|j| applications_for(j)).sum::<usize>() as f64 / high_cutoff.len() as f64;
        if avg < HIGH_CUTOFF_MIN_APPLICATIONS {
            out.push(Suggestion::new(
                SuggestionType::Recommendation,
                "High CGPA cutoffs limiting applicant pool",
                format!(
                    "{} jobs with a cutoff above {} receive few applications. Consider lowering the requirement.",
                    high_cutoff.len(),
                    HIGH_CUTOFF
                ),
                Priority::Medium,
            ));
        }
    }

    let selected = snapshot.applications.iter().filter(|a| a.status == "selected").count();
    if snapshot.applications.len() > STALE_STATUS_APPLICATIONS && selected == 0 {
        out.push(Suggestion::new(
            SuggestionType::Insight,
            "Update application statuses",
            "You have applications without any selections. Keep candidates informed by updating their status.",
            Priority::Medium,
        ));
    }

    let window_start = to_db_timestamp(now - Duration::days(POSTING_WINDOW_DAYS));
    if !snapshot.jobs.iter().any(|j| j.created_at > window_start) {
        out.push(Suggestion::new(
            SuggestionType::Action,
            "Post new opportunities",
            "You haven't posted a job in the last 30 days. Fresh postings keep students engaged.",
            Priority::Low,
        ));
    }

    out.truncate(MAX_SUGGESTIONS);
    out
}

pub fn admin_suggestions(snapshot: &AdminSnapshot) -> Vec<Suggestion> {
    let mut out = Vec::new();

    let pending = snapshot.pending_students + snapshot.pending_companies;
    if pending > 0 {
        out.push(Suggestion::new(
            SuggestionType::Action,
            format!("{} pending approvals", pending),
            format!(
                "{} students and {} companies are waiting for review.",
                snapshot.pending_students, snapshot.pending_companies
            ),
            Priority::High,
        ));
    }

    if snapshot.total_jobs > 0 && snapshot.active_jobs == 0 {
        out.push(Suggestion::new(
            SuggestionType::Insight,
            "No active jobs on platform",
            "All posted jobs are inactive. Reach out to companies to open new positions.",
            Priority::High,
        ));
    } else if snapshot.active_jobs > 0 {
        let per_job = snapshot.total_applications as f64 / snapshot.total_jobs as f64;
        if per_job < PLATFORM_LOW_APPLICATIONS_PER_JOB {
            out.push(Suggestion::new(
                SuggestionType::Insight,
                "Low application rates",
                format!(
                    "Jobs average {:.1} applications. Consider promoting open positions to students.",
                    per_job
                ),
                Priority::Medium,
            ));
        }
    }

    out.push(Suggestion::new(
        SuggestionType::Insight,
        "Platform activity this week",
        format!(
            "{} applications in the last 7 days, {} students registered, {} active jobs.",
            snapshot.recent_applications, snapshot.total_students, snapshot.active_jobs
        ),
        Priority::Low,
    ));

    out.truncate(MAX_SUGGESTIONS);
    out
}
