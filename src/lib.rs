pub mod analysis;
pub mod apps;
pub mod config;
pub mod core;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod fetcher;
pub mod llm;
pub mod models;
pub mod registry;

pub use config::Config;
pub use core::orchestrator::{run_unified, RunSummary};
pub use dashboard::DashboardId;
