// src/query/mod.rs
pub mod compile;
pub mod executor;
pub mod history;
pub mod insights;
pub mod plan;
pub mod schema;
pub mod service;
pub mod templates;
pub mod translator;
pub mod validate;
pub mod visualization;

pub use executor::{DataSource, QueryExecutor, QueryResult};
pub use history::{HistoryScope, HistoryStore, QueryExecutionRecord};
pub use plan::QueryPlan;
pub use service::{QueryRequest, QueryResponse, QueryService};
pub use templates::TemplateRegistry;
pub use translator::QueryTranslator;
pub use visualization::{ChartType, VisualizationHint};
