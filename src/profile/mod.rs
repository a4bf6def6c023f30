// src/profile/mod.rs
//! Profile gap analysis for students, cached per student with a TTL.

pub mod analyzer;
pub mod cache;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::suggestions::Priority;

pub use analyzer::ProfileGapAnalyzer;
pub use cache::ProfileGapCache;

pub const MAX_GAPS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GapCategory {
    Projects,
    Skills,
    Certifications,
    Experience,
    Education,
}

impl GapCategory {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "projects" => Some(Self::Projects),
            "skills" => Some(Self::Skills),
            "certifications" => Some(Self::Certifications),
            "experience" => Some(Self::Experience),
            "education" => Some(Self::Education),
            _ => None,
        }
    }
}

impl Priority {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileGap {
    pub category: GapCategory,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    #[serde(default)]
    pub action_items: Vec<String>,
}

/// Where a report's gaps came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapOrigin {
    Cache,
    Generated,
    Refreshed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GapReport {
    pub suggestions: Vec<ProfileGap>,
    pub origin: GapOrigin,
    pub last_generated: DateTime<Utc>,
}

impl GapReport {
    pub fn from_cache(&self) -> bool {
        self.origin == GapOrigin::Cache
    }

    pub fn refreshed(&self) -> bool {
        self.origin == GapOrigin::Refreshed
    }
}
