// src/ats.rs
//! Résumé scoring against applicant tracking system conventions.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::llm_client::{generate_structured, GenerationCapability, GenerationRequest};
use crate::error::{InsightError, InsightResult};
use crate::query::translator::generation_failure;

const ATS_SCHEMA: &str = r#"{
  "score": 0-100,
  "strengths": ["..."],
  "weaknesses": ["..."],
  "keywordMatches": ["..."],
  "missingKeywords": ["..."],
  "suggestions": ["..."],
  "formatting": {"score": 0-100, "issues": ["..."]},
  "content": {"score": 0-100, "issues": ["..."]}
}"#;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionScore {
    pub score: i64,
    #[serde(default)]
    pub issues: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtsAnalysis {
    pub score: i64,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
    #[serde(default)]
    pub keyword_matches: Vec<String>,
    #[serde(default)]
    pub missing_keywords: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    pub formatting: SectionScore,
    pub content: SectionScore,
}

impl AtsAnalysis {
    fn out_of_range_score(&self) -> Option<(&'static str, i64)> {
        [
            ("score", self.score),
            ("formatting.score", self.formatting.score),
            ("content.score", self.content.score),
        ]
        .into_iter()
        .find(|(_, s)| !(0..=100).contains(s))
    }
}

#[derive(Deserialize)]
struct QuickScore {
    score: i64,
}

pub struct AtsAnalyzer {
    generator: Arc<dyn GenerationCapability>,
}

impl AtsAnalyzer {
    pub fn new(generator: Arc<dyn GenerationCapability>) -> Self {
        Self { generator }
    }

    pub async fn analyze_resume(&self, resume_url: &str, job_description: Option<&str>) -> InsightResult<AtsAnalysis> {
        let resume_url = resume_url.trim();
        if resume_url.is_empty() {
            return Err(InsightError::InvalidParameters("resumeUrl is required".to_string()));
        }

        let request = GenerationRequest::new("ats", analysis_prompt(resume_url, job_description), ATS_SCHEMA);
        let analysis = generate_structured::<AtsAnalysis>(self.generator.as_ref(), &request)
            .await
            .map_err(generation_failure)?;

        if let Some((field, score)) = analysis.out_of_range_score() {
            return Err(InsightError::execution(
                "Failed to analyze resume",
                format!("invalid ATS analysis: {} = {}", field, score),
            ));
        }

        info!("ATS analysis scored {} for {}", analysis.score, resume_url);
        Ok(analysis)
    }

    /// Overall score only. Any failure scores 0.
    pub async fn quick_score(&self, resume_url: &str) -> i64 {
        let prompt = format!(
            "Rate the resume at {} for ATS compatibility on a 0-100 scale. Consider formatting, \
keyword usage, section structure and quantified achievements. Respond with the score only.",
            resume_url
        );
        let request = GenerationRequest::new("ats_quick", prompt, r#"{"score": 0-100}"#);

        match generate_structured::<QuickScore>(self.generator.as_ref(), &request).await {
            Ok(QuickScore { score }) if (0..=100).contains(&score) => score,
            Ok(QuickScore { score }) => {
                warn!("Quick ATS score out of range: {}", score);
                0
            }
            Err(e) => {
                warn!("Quick ATS score failed: {}", e);
                0
            }
        }
    }
}

fn analysis_prompt(resume_url: &str, job_description: Option<&str>) -> String {
    let target = match job_description.map(str::trim).filter(|d| !d.is_empty()) {
        Some(description) => format!(
            "\nTARGET JOB DESCRIPTION:\n{}\n\nCompare the resume against this job: report which of its \
keywords the resume matches and which are missing.\n",
            description
        ),
        None => "\nNo job description was given. Judge keywords against common expectations for \
entry-level technical roles.\n"
            .to_string(),
    };

    format!(
        "You are an expert in applicant tracking systems (ATS). Analyze the resume at {} for ATS \
compatibility.\n{}\n\
Evaluate:\n\
- Formatting: standard section headings, simple layout, no tables or images that parsers skip\n\
- Content: quantified achievements, action verbs, relevant skills and projects\n\
- Keywords: presence of role-relevant technical terms\n\n\
Score guidelines:\n\
- 90-100: excellent, highly ATS-friendly\n\
- 75-89: good, minor improvements needed\n\
- 60-74: fair, several issues to address\n\
- below 60: poor, significant changes required\n\n\
All scores are integers between 0 and 100.",
        resume_url, target
    )
}
