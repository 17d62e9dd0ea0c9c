//! PaperVault Common Library
//!
//! Shared code for the PaperVault services including:
//! - Database model, metadata store abstraction and repository
//! - Object storage abstraction
//! - Error types and handling
//! - Configuration management
//! - Metrics and observability

pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod storage;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::{MetadataStore, Repository};
pub use errors::{AppError, Result};
pub use storage::ObjectStore;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
