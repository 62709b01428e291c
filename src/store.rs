//! Transactional operations on rule engines and their tagged configurations.
//!
//! Every public operation runs in exactly one datastore transaction. It reads
//! the engine, checks the transition against the aggregate invariants, applies
//! the change in memory and writes the whole engine document back together
//! with any configuration record inserts or deletes. Nothing is committed
//! when any step fails.
//!
//! A single deadline of `tx_timeout` covers begin, body and commit. Names
//! and tags are taken as given; `RuleEngineService` checks their syntax.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, error, warn};

use crate::domain::{CompleteRuleEngine, EngineConfig, RuleEngine, Tag, TagView};
use crate::error::{Error, Result};
use crate::storage::{Datastore, Transaction};

/// Default bound on how long a single transaction may run.
pub const DEFAULT_TX_TIMEOUT: Duration = Duration::from_secs(5);

/// Transactional store for rule engines.
#[derive(Clone)]
pub struct TagStore {
    datastore: Arc<dyn Datastore>,
    tx_timeout: Duration,
}

impl TagStore {
    pub fn new(datastore: Arc<dyn Datastore>) -> Self {
        TagStore {
            datastore,
            tx_timeout: DEFAULT_TX_TIMEOUT,
        }
    }

    /// Set the per-transaction timeout.
    pub fn with_tx_timeout(mut self, timeout: Duration) -> Self {
        self.tx_timeout = timeout;
        self
    }

    pub fn datastore(&self) -> &Arc<dyn Datastore> {
        &self.datastore
    }

    /// Store `config` under a new, disabled `tag`, creating the engine if needed.
    pub async fn create_tagged_config(
        &self,
        name: &str,
        tag: &str,
        config: &EngineConfig,
    ) -> Result<()> {
        let deadline = self.deadline();
        let mut tx = self.begin("create_tagged_config", deadline).await?;
        let result = self
            .bounded(
                deadline,
                create_tagged_config_in(tx.as_mut(), name, tag, config),
            )
            .await;
        self.finish("create_tagged_config", deadline, tx, result).await
    }

    /// Remove an engine and every configuration record it references.
    pub async fn delete_rule_engine(&self, name: &str) -> Result<()> {
        let deadline = self.deadline();
        let mut tx = self.begin("delete_rule_engine", deadline).await?;
        let result = self
            .bounded(deadline, delete_rule_engine_in(tx.as_mut(), name))
            .await;
        self.finish("delete_rule_engine", deadline, tx, result).await
    }

    /// Remove a disabled tag and its configuration record.
    pub async fn delete_tagged_config(&self, name: &str, tag: &str) -> Result<()> {
        let deadline = self.deadline();
        let mut tx = self.begin("delete_tagged_config", deadline).await?;
        let result = self
            .bounded(deadline, delete_tagged_config_in(tx.as_mut(), name, tag))
            .await;
        self.finish("delete_tagged_config", deadline, tx, result).await
    }

    /// Point the engine's default at an existing, enabled tag.
    pub async fn set_default_tag(&self, name: &str, tag: &str) -> Result<()> {
        let deadline = self.deadline();
        let mut tx = self.begin("set_default_tag", deadline).await?;
        let result = self
            .bounded(deadline, set_default_tag_in(tx.as_mut(), name, tag))
            .await;
        self.finish("set_default_tag", deadline, tx, result).await
    }

    /// Clear the engine's default tag. Succeeds whether or not one was set.
    pub async fn remove_default_tag(&self, name: &str) -> Result<()> {
        let deadline = self.deadline();
        let mut tx = self.begin("remove_default_tag", deadline).await?;
        let result = self
            .bounded(deadline, remove_default_tag_in(tx.as_mut(), name))
            .await;
        self.finish("remove_default_tag", deadline, tx, result).await
    }

    pub async fn enable_tag(&self, name: &str, tag: &str) -> Result<()> {
        let deadline = self.deadline();
        let mut tx = self.begin("enable_tag", deadline).await?;
        let result = self
            .bounded(deadline, set_enabled_in(tx.as_mut(), name, tag, true))
            .await;
        self.finish("enable_tag", deadline, tx, result).await
    }

    /// Disable a tag. The default tag cannot be disabled.
    pub async fn disable_tag(&self, name: &str, tag: &str) -> Result<()> {
        let deadline = self.deadline();
        let mut tx = self.begin("disable_tag", deadline).await?;
        let result = self
            .bounded(deadline, set_enabled_in(tx.as_mut(), name, tag, false))
            .await;
        self.finish("disable_tag", deadline, tx, result).await
    }

    /// Read an engine with every tag's configuration resolved.
    pub async fn get_complete_rule_engine(&self, name: &str) -> Result<CompleteRuleEngine> {
        let deadline = self.deadline();
        let mut tx = self.begin("get_complete_rule_engine", deadline).await?;
        let result = self
            .bounded(deadline, get_complete_rule_engine_in(tx.as_mut(), name))
            .await;
        self.finish("get_complete_rule_engine", deadline, tx, result).await
    }

    /// Instant by which begin, body and commit must all have completed.
    fn deadline(&self) -> Instant {
        Instant::now() + self.tx_timeout
    }

    fn timed_out(&self, step: &str, op: &'static str) -> Error {
        Error::datastore(format!(
            "{step} {op}: transaction exceeded {}ms",
            self.tx_timeout.as_millis()
        ))
    }

    async fn begin(&self, op: &'static str, deadline: Instant) -> Result<Box<dyn Transaction>> {
        match timeout_at(deadline, self.datastore.begin()).await {
            Ok(Ok(tx)) => Ok(tx),
            Ok(Err(e)) => {
                error!(op, error = %e, "Failed to start transaction");
                Err(Error::datastore(format!("begin {op}: {e}")))
            }
            Err(_) => {
                error!(op, "Timed out starting transaction");
                Err(self.timed_out("begin", op))
            }
        }
    }

    /// Run a transaction body until the deadline.
    async fn bounded<T>(
        &self,
        deadline: Instant,
        body: impl std::future::Future<Output = Result<T>>,
    ) -> Result<T> {
        match timeout_at(deadline, body).await {
            Ok(result) => result,
            Err(_) => Err(Error::datastore(format!(
                "transaction exceeded {}ms",
                self.tx_timeout.as_millis()
            ))),
        }
    }

    /// Commit on success before the deadline, roll back on failure.
    async fn finish<T>(
        &self,
        op: &'static str,
        deadline: Instant,
        mut tx: Box<dyn Transaction>,
        result: Result<T>,
    ) -> Result<T> {
        match result {
            Ok(value) => match timeout_at(deadline, tx.commit()).await {
                Ok(Ok(())) => Ok(value),
                Ok(Err(e)) => {
                    error!(op, error = %e, "Transaction commit failed");
                    Err(Error::datastore(format!("commit {op}: {e}")))
                }
                // The dropped transaction is discarded by the backend.
                Err(_) => {
                    error!(op, "Timed out committing transaction");
                    Err(self.timed_out("commit", op))
                }
            },
            Err(err) => {
                // The deadline may have passed; rollback gets its own budget.
                match timeout(self.tx_timeout, tx.rollback()).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!(op, error = %e, "Transaction rollback failed"),
                    Err(_) => warn!(op, "Timed out rolling back transaction"),
                }
                match &err {
                    Error::DatastoreFailed(detail) => {
                        error!(op, error = %detail, "Transaction aborted")
                    }
                    other => debug!(op, error = %other, "Transaction rejected"),
                }
                Err(err)
            }
        }
    }
}

async fn load_engine(tx: &mut dyn Transaction, name: &str) -> Result<Option<RuleEngine>> {
    tx.find_by_name(name)
        .await
        .map_err(|e| Error::datastore(format!("find rule engine {name:?}: {e}")))
}

async fn require_engine(tx: &mut dyn Transaction, name: &str) -> Result<RuleEngine> {
    load_engine(tx, name)
        .await?
        .ok_or_else(|| Error::NotFound(name.to_string()))
}

async fn save_engine(tx: &mut dyn Transaction, engine: &mut RuleEngine) -> Result<()> {
    engine.touch();
    tx.upsert(engine)
        .await
        .map_err(|e| Error::datastore(format!("upsert rule engine {:?}: {e}", engine.name)))
}

fn tag_not_found(name: &str, tag: &str) -> Error {
    Error::TagNotFound {
        engine: name.to_string(),
        tag: tag.to_string(),
    }
}

async fn create_tagged_config_in(
    tx: &mut dyn Transaction,
    name: &str,
    tag: &str,
    config: &EngineConfig,
) -> Result<()> {
    let mut engine = load_engine(tx, name)
        .await?
        .unwrap_or_else(|| RuleEngine::new(name));

    if engine.tag(tag).is_some() {
        return Err(Error::TagAlreadyExists {
            engine: name.to_string(),
            tag: tag.to_string(),
        });
    }

    let config_ref = tx
        .insert(config)
        .await
        .map_err(|e| Error::datastore(format!("insert configuration for {name:?}/{tag:?}: {e}")))?;

    engine.tags.insert(tag.to_string(), Tag::new(tag, config_ref));
    save_engine(tx, &mut engine).await?;

    debug!(engine = name, tag, config = %config_ref, "Tagged configuration created");
    Ok(())
}

async fn delete_rule_engine_in(tx: &mut dyn Transaction, name: &str) -> Result<()> {
    let engine = require_engine(tx, name).await?;

    let refs = engine.config_refs();
    let removed = tx
        .delete_by_ids(&refs)
        .await
        .map_err(|e| Error::datastore(format!("delete configurations of {name:?}: {e}")))?;
    if removed != refs.len() as u64 {
        warn!(
            engine = name,
            expected = refs.len(),
            removed,
            "Configuration records were already missing"
        );
    }

    tx.delete(&engine)
        .await
        .map_err(|e| Error::datastore(format!("delete rule engine {name:?}: {e}")))?;

    debug!(engine = name, configs = removed, "Rule engine deleted");
    Ok(())
}

async fn delete_tagged_config_in(tx: &mut dyn Transaction, name: &str, tag: &str) -> Result<()> {
    let mut engine = require_engine(tx, name).await?;

    let existing = engine.tag(tag).ok_or_else(|| tag_not_found(name, tag))?;
    // A default tag is always enabled, so this also covers the default.
    if existing.is_enabled || engine.is_default(tag) {
        return Err(Error::TagDeleteNotAllowed {
            engine: name.to_string(),
            tag: tag.to_string(),
        });
    }
    let config_ref = existing.config_ref;

    tx.delete_by_id(config_ref)
        .await
        .map_err(|e| Error::datastore(format!("delete configuration {config_ref}: {e}")))?;

    engine.tags.remove(tag);

    if engine.tags.is_empty() {
        tx.delete(&engine)
            .await
            .map_err(|e| Error::datastore(format!("delete rule engine {name:?}: {e}")))?;
        debug!(engine = name, tag, "Last tag deleted, rule engine removed");
        return Ok(());
    }

    save_engine(tx, &mut engine).await?;
    debug!(engine = name, tag, "Tagged configuration deleted");
    Ok(())
}

async fn set_default_tag_in(tx: &mut dyn Transaction, name: &str, tag: &str) -> Result<()> {
    let invalid = || Error::DefaultTagInvalid {
        engine: name.to_string(),
        tag: tag.to_string(),
    };

    let mut engine = load_engine(tx, name).await?.ok_or_else(invalid)?;
    match engine.tag(tag) {
        Some(t) if t.is_enabled => {}
        _ => return Err(invalid()),
    }

    engine.default_tag = tag.to_string();
    save_engine(tx, &mut engine).await
}

async fn remove_default_tag_in(tx: &mut dyn Transaction, name: &str) -> Result<()> {
    let mut engine = require_engine(tx, name).await?;

    engine.default_tag.clear();
    save_engine(tx, &mut engine).await
}

async fn set_enabled_in(
    tx: &mut dyn Transaction,
    name: &str,
    tag: &str,
    enabled: bool,
) -> Result<()> {
    let mut engine = require_engine(tx, name).await?;

    let current = engine.tag(tag).ok_or_else(|| tag_not_found(name, tag))?;
    if current.is_enabled == enabled {
        return Ok(());
    }

    if !enabled && engine.is_default(tag) {
        return Err(Error::TagDisableNotAllowed {
            engine: name.to_string(),
            tag: tag.to_string(),
        });
    }

    if let Some(t) = engine.tag_mut(tag) {
        t.is_enabled = enabled;
    }
    save_engine(tx, &mut engine).await
}

async fn get_complete_rule_engine_in(
    tx: &mut dyn Transaction,
    name: &str,
) -> Result<CompleteRuleEngine> {
    let engine = require_engine(tx, name).await?;

    let mut tags = BTreeMap::new();
    for (tag_name, tag) in &engine.tags {
        let config = tx
            .find_by_id(tag.config_ref)
            .await
            .map_err(|e| Error::datastore(format!("find configuration {}: {e}", tag.config_ref)))?
            .ok_or_else(|| {
                Error::datastore(format!(
                    "configuration {} referenced by {name:?}/{tag_name:?} is missing",
                    tag.config_ref
                ))
            })?;

        tags.insert(
            tag_name.clone(),
            TagView {
                is_enabled: tag.is_enabled,
                config,
            },
        );
    }

    Ok(CompleteRuleEngine {
        name: engine.name,
        default_tag: engine.default_tag,
        tags,
    })
}
