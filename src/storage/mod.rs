// src/storage/mod.rs
pub mod memory;
pub mod postgres;
pub mod traits;

pub use memory::{FailPoint, MemoryDatastore};
pub use postgres::PostgresDatastore;
pub use traits::{ConfigRepository, Datastore, RuleEngineRepository, Transaction};

use std::sync::Arc;
use tracing::info;

use crate::config::Config;

/// Open the datastore selected by configuration.
///
/// PostgreSQL is used when a database URL is set; otherwise state lives in memory.
pub async fn connect(config: &Config) -> anyhow::Result<Arc<dyn Datastore>> {
    let Some(ref url) = config.database_url else {
        info!("No database URL configured, using in-memory datastore");
        return Ok(Arc::new(MemoryDatastore::new()));
    };

    let store = PostgresDatastore::connect(
        url,
        config.db_min_connections,
        config.db_max_connections,
        config.db_connect_timeout(),
    )
    .await?;

    if config.run_migrations {
        store.run_migrations().await?;
        info!("Database migrations applied");
    }

    Ok(Arc::new(store))
}
