//! Standalone report pipelines that share the fetchers and AI backends.

pub mod compass;
pub mod hyper;
