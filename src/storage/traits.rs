// src/storage/traits.rs
use async_trait::async_trait;

use crate::domain::{ConfigId, EngineConfig, RuleEngine};

/// Persistence of rule engine aggregates, keyed by name.
#[async_trait]
pub trait RuleEngineRepository: Send {
    async fn find_by_name(&mut self, name: &str) -> anyhow::Result<Option<RuleEngine>>;

    /// Replace the whole engine document, inserting it if absent.
    ///
    /// The write only succeeds if the stored revision still equals
    /// `engine.revision` (zero meaning "not stored yet").
    async fn upsert(&mut self, engine: &RuleEngine) -> anyhow::Result<()>;

    /// Remove the engine document, guarded by the same revision check as `upsert`.
    async fn delete(&mut self, engine: &RuleEngine) -> anyhow::Result<()>;
}

/// Persistence of configuration records, keyed by generated identity.
#[async_trait]
pub trait ConfigRepository: Send {
    /// Store a new record and return its identity.
    async fn insert(&mut self, config: &EngineConfig) -> anyhow::Result<ConfigId>;
    async fn find_by_id(&mut self, id: ConfigId) -> anyhow::Result<Option<EngineConfig>>;
    async fn delete_by_id(&mut self, id: ConfigId) -> anyhow::Result<()>;
    /// Returns the number of records removed.
    async fn delete_by_ids(&mut self, ids: &[ConfigId]) -> anyhow::Result<u64>;
}

/// A unit of work spanning both repositories.
///
/// Nothing written through a transaction is visible to others until
/// `commit` succeeds. Dropping an uncommitted transaction discards it.
#[async_trait]
pub trait Transaction: RuleEngineRepository + ConfigRepository {
    async fn commit(&mut self) -> anyhow::Result<()>;
    async fn rollback(&mut self) -> anyhow::Result<()>;
}

/// Storage backend handing out transactions.
#[async_trait]
pub trait Datastore: Send + Sync {
    async fn begin(&self) -> anyhow::Result<Box<dyn Transaction>>;

    /// Check that the backend is reachable.
    async fn ping(&self) -> anyhow::Result<()>;

    /// Release connections. Called once at shutdown.
    async fn close(&self);

    /// Backend name for logs.
    fn kind(&self) -> &'static str;
}
