// src/storage/memory.rs
use anyhow::bail;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::domain::{ConfigId, EngineConfig, RuleEngine};

use super::traits::{ConfigRepository, Datastore, RuleEngineRepository, Transaction};

/// Points at which a one-shot failure can be injected (for testing).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    Begin,
    FindEngine,
    UpsertEngine,
    DeleteEngine,
    InsertConfig,
    FindConfig,
    DeleteConfig,
    Commit,
}

#[derive(Debug, Clone, Default)]
struct Collections {
    engines: HashMap<String, RuleEngine>,
    configs: HashMap<ConfigId, EngineConfig>,
}

#[derive(Debug, Default)]
struct Shared {
    committed: RwLock<Arc<Collections>>,
    fail_point: Mutex<Option<FailPoint>>,
}

impl Shared {
    fn trip(&self, point: FailPoint) -> anyhow::Result<()> {
        let mut armed = self.fail_point.lock();
        if *armed == Some(point) {
            *armed = None;
            bail!("injected failure at {:?}", point);
        }
        Ok(())
    }
}

/// In-memory datastore with snapshot-isolated transactions.
///
/// Each transaction reads from the snapshot taken at `begin` and buffers
/// its writes. Commit applies them atomically, rejecting the whole
/// transaction if any engine it wrote has changed revision since.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatastore {
    shared: Arc<Shared>,
}

impl MemoryDatastore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a one-shot failure (for testing).
    pub fn fail_at(&self, point: FailPoint) {
        *self.shared.fail_point.lock() = Some(point);
    }

    /// True while an armed failure has not fired yet.
    pub fn is_armed(&self) -> bool {
        self.shared.fail_point.lock().is_some()
    }

    /// Committed state of an engine (for assertions).
    pub fn engine(&self, name: &str) -> Option<RuleEngine> {
        self.shared.committed.read().engines.get(name).cloned()
    }

    /// All committed engines (for assertions).
    pub fn engines(&self) -> Vec<RuleEngine> {
        self.shared.committed.read().engines.values().cloned().collect()
    }

    /// Committed configuration record (for assertions).
    pub fn config(&self, id: ConfigId) -> Option<EngineConfig> {
        self.shared.committed.read().configs.get(&id).cloned()
    }

    pub fn config_count(&self) -> usize {
        self.shared.committed.read().configs.len()
    }

    pub fn engine_count(&self) -> usize {
        self.shared.committed.read().engines.len()
    }

    /// Remove a configuration record behind the store's back (for testing).
    pub fn corrupt_remove_config(&self, id: ConfigId) {
        let mut committed = self.shared.committed.write();
        Arc::make_mut(&mut *committed).configs.remove(&id);
    }
}

#[async_trait]
impl Datastore for MemoryDatastore {
    async fn begin(&self) -> anyhow::Result<Box<dyn Transaction>> {
        self.shared.trip(FailPoint::Begin)?;
        let snapshot = self.shared.committed.read().clone();

        Ok(Box::new(MemoryTransaction {
            shared: self.shared.clone(),
            snapshot,
            engines: HashMap::new(),
            expected: HashMap::new(),
            configs: HashMap::new(),
            finished: false,
        }))
    }

    async fn ping(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn close(&self) {
        debug!("memory datastore closed");
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}

struct MemoryTransaction {
    shared: Arc<Shared>,
    snapshot: Arc<Collections>,
    /// Staged engine writes; `None` marks a delete
    engines: HashMap<String, Option<RuleEngine>>,
    /// Committed revision each written engine must still have at commit
    expected: HashMap<String, u64>,
    /// Staged record writes; `None` marks a delete
    configs: HashMap<ConfigId, Option<EngineConfig>>,
    finished: bool,
}

impl MemoryTransaction {
    fn ensure_open(&self) -> anyhow::Result<()> {
        if self.finished {
            bail!("transaction already finished");
        }
        Ok(())
    }

    fn visible_engine(&self, name: &str) -> Option<&RuleEngine> {
        match self.engines.get(name) {
            Some(staged) => staged.as_ref(),
            None => self.snapshot.engines.get(name),
        }
    }

    fn visible_config(&self, id: &ConfigId) -> Option<&EngineConfig> {
        match self.configs.get(id) {
            Some(staged) => staged.as_ref(),
            None => self.snapshot.configs.get(id),
        }
    }

    /// Check the caller's revision against what this transaction sees and
    /// remember what the committed state must still hold.
    fn guard_revision(&mut self, engine: &RuleEngine) -> anyhow::Result<()> {
        let visible = self.visible_engine(&engine.name).map_or(0, |e| e.revision);
        if visible != engine.revision {
            bail!(
                "stale rule engine {:?}: revision {} but {} is current",
                engine.name,
                engine.revision,
                visible
            );
        }

        let snapshot_revision = self
            .snapshot
            .engines
            .get(&engine.name)
            .map_or(0, |e| e.revision);
        self.expected
            .entry(engine.name.clone())
            .or_insert(snapshot_revision);
        Ok(())
    }
}

#[async_trait]
impl RuleEngineRepository for MemoryTransaction {
    async fn find_by_name(&mut self, name: &str) -> anyhow::Result<Option<RuleEngine>> {
        self.ensure_open()?;
        self.shared.trip(FailPoint::FindEngine)?;
        Ok(self.visible_engine(name).cloned())
    }

    async fn upsert(&mut self, engine: &RuleEngine) -> anyhow::Result<()> {
        self.ensure_open()?;
        self.shared.trip(FailPoint::UpsertEngine)?;
        self.guard_revision(engine)?;

        let mut stored = engine.clone();
        stored.revision = engine.revision + 1;
        self.engines.insert(engine.name.clone(), Some(stored));
        Ok(())
    }

    async fn delete(&mut self, engine: &RuleEngine) -> anyhow::Result<()> {
        self.ensure_open()?;
        self.shared.trip(FailPoint::DeleteEngine)?;
        self.guard_revision(engine)?;

        self.engines.insert(engine.name.clone(), None);
        Ok(())
    }
}

#[async_trait]
impl ConfigRepository for MemoryTransaction {
    async fn insert(&mut self, config: &EngineConfig) -> anyhow::Result<ConfigId> {
        self.ensure_open()?;
        self.shared.trip(FailPoint::InsertConfig)?;

        let id = ConfigId::new();
        self.configs.insert(id, Some(config.clone()));
        Ok(id)
    }

    async fn find_by_id(&mut self, id: ConfigId) -> anyhow::Result<Option<EngineConfig>> {
        self.ensure_open()?;
        self.shared.trip(FailPoint::FindConfig)?;
        Ok(self.visible_config(&id).cloned())
    }

    async fn delete_by_id(&mut self, id: ConfigId) -> anyhow::Result<()> {
        self.ensure_open()?;
        self.shared.trip(FailPoint::DeleteConfig)?;
        self.configs.insert(id, None);
        Ok(())
    }

    async fn delete_by_ids(&mut self, ids: &[ConfigId]) -> anyhow::Result<u64> {
        self.ensure_open()?;
        self.shared.trip(FailPoint::DeleteConfig)?;

        let mut removed = 0;
        for id in ids {
            if self.visible_config(id).is_some() {
                removed += 1;
            }
            self.configs.insert(*id, None);
        }
        Ok(removed)
    }
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn commit(&mut self) -> anyhow::Result<()> {
        self.ensure_open()?;
        self.finished = true;
        self.shared.trip(FailPoint::Commit)?;

        let mut committed = self.shared.committed.write();

        for (name, revision) in &self.expected {
            let current = committed.engines.get(name).map_or(0, |e| e.revision);
            if current != *revision {
                bail!(
                    "write conflict on rule engine {:?}: expected revision {}, found {}",
                    name,
                    revision,
                    current
                );
            }
        }

        let data = Arc::make_mut(&mut *committed);
        for (name, staged) in self.engines.drain() {
            match staged {
                Some(engine) => {
                    data.engines.insert(name, engine);
                }
                None => {
                    data.engines.remove(&name);
                }
            }
        }
        for (id, staged) in self.configs.drain() {
            match staged {
                Some(config) => {
                    data.configs.insert(id, config);
                }
                None => {
                    data.configs.remove(&id);
                }
            }
        }

        Ok(())
    }

    async fn rollback(&mut self) -> anyhow::Result<()> {
        self.finished = true;
        self.engines.clear();
        self.configs.clear();
        self.expected.clear();
        Ok(())
    }
}
