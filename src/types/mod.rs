// src/types/mod.rs
pub mod response;
pub mod role;

pub use role::{CallerContext, Role};
