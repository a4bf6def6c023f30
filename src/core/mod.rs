// src/core/mod.rs
//! Storage, time and text generation shared by every component.

pub mod clock;
pub mod database;
pub mod llm_client;

pub use clock::{Clock, SystemClock};
pub use database::Database;
pub use llm_client::{GenerationCapability, LlmClient};
