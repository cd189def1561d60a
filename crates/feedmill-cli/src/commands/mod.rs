pub mod daemon;
pub mod feed;
pub mod group;
pub mod items;
pub mod list;
pub mod pull;
pub mod subscribe;
pub mod unsubscribe;

use std::sync::Arc;

use anyhow::Result;

use feedmill_core::{storage::Database, AppConfig, Pipeline, TracingObserver};

/// Production pipeline logging through `tracing`
pub fn pipeline(db: Database, config: &AppConfig) -> Result<Pipeline> {
    Ok(Pipeline::from_config(db, config, Arc::new(TracingObserver))?)
}
