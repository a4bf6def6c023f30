// src/web/services.rs
use std::sync::Arc;
use std::time::Duration;

use crate::ats::AtsAnalyzer;
use crate::core::clock::Clock;
use crate::core::llm_client::GenerationCapability;
use crate::core::Database;
use crate::profile::{ProfileGapAnalyzer, ProfileGapCache};
use crate::query::insights::InsightWriter;
use crate::query::{HistoryStore, QueryExecutor, QueryService, QueryTranslator, TemplateRegistry};
use crate::suggestions::snapshot::SnapshotReader;
use crate::suggestions::{FollowUpGenerator, SuggestionGenerator};

pub struct ServiceSettings {
    pub query_timeout: Duration,
    pub profile_gap_ttl: chrono::Duration,
}

/// Everything the route handlers need, managed as Rocket state.
pub struct AppState {
    pub queries: QueryService,
    pub templates: Arc<TemplateRegistry>,
    pub history: HistoryStore,
    pub suggestions: SuggestionGenerator,
    pub follow_ups: FollowUpGenerator,
    pub profile_gaps: ProfileGapAnalyzer,
    pub ats: AtsAnalyzer,
}

impl AppState {
    pub fn new(
        database: &Database,
        generator: Arc<dyn GenerationCapability>,
        clock: Arc<dyn Clock>,
        settings: &ServiceSettings,
    ) -> Self {
        let pool = database.pool().clone();
        let templates = Arc::new(TemplateRegistry::builtin());
        let history = HistoryStore::new(pool.clone());

        let queries = QueryService::new(
            QueryTranslator::new(templates.clone(), generator.clone()),
            QueryExecutor::new(Arc::new(database.clone()), settings.query_timeout),
            InsightWriter::new(generator.clone()),
            history.clone(),
            clock.clone(),
        );

        Self {
            queries,
            templates,
            history,
            suggestions: SuggestionGenerator::new(SnapshotReader::new(pool.clone()), clock.clone()),
            follow_ups: FollowUpGenerator::new(generator.clone()),
            profile_gaps: ProfileGapAnalyzer::new(
                SnapshotReader::new(pool.clone()),
                ProfileGapCache::new(pool),
                generator.clone(),
                clock,
                settings.profile_gap_ttl,
            ),
            ats: AtsAnalyzer::new(generator),
        }
    }
}
