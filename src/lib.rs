pub mod commands;
pub mod config;
pub mod context;
pub mod core;
pub mod embedding;
pub mod git;
pub mod history;
pub mod indexer;
pub mod storage;
pub mod structure;
pub mod text;

pub mod telemetry;
pub mod watcher;

// Re-export core types for convenience
pub use config::AppConfig;
pub use core::NashError;
