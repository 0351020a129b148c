pub mod classify;
pub mod config;
pub mod embeddings;
pub mod errors;
pub mod llm;
pub mod logging;
pub mod memory;
pub mod models;
pub mod rag;
pub mod route;
pub mod vector;

#[cfg(test)]
pub mod tests;

pub use config::AppConfig;
pub use errors::*;
pub use rag::ChatEngine;
