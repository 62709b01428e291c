//! Request-facing entry points: input validation in front of the store.

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};

use crate::definition::ConfigValidator;
use crate::domain::{CompleteRuleEngine, EngineConfig};
use crate::error::{Error, Result};
use crate::observability::MetricsRegistry;
use crate::store::TagStore;
use crate::validator;

/// Validates requests and forwards them to the [`TagStore`].
#[derive(Clone)]
pub struct RuleEngineService {
    store: TagStore,
    validator: Arc<dyn ConfigValidator>,
    metrics: Arc<MetricsRegistry>,
}

impl RuleEngineService {
    pub fn new(
        store: TagStore,
        validator: Arc<dyn ConfigValidator>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        RuleEngineService {
            store,
            validator,
            metrics,
        }
    }

    pub fn store(&self) -> &TagStore {
        &self.store
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    pub async fn create_tagged_config(
        &self,
        name: &str,
        tag: &str,
        config: &EngineConfig,
    ) -> Result<()> {
        let start = Instant::now();
        let result = async {
            check_name(name)?;
            check_tag(tag)?;
            self.validator
                .validate(config)
                .map_err(Error::InvalidConfiguration)?;
            self.store.create_tagged_config(name, tag, config).await
        }
        .await;
        self.record("create_tagged_config", start, result)
    }

    pub async fn delete_rule_engine(&self, name: &str) -> Result<()> {
        let start = Instant::now();
        let result = async {
            check_name(name)?;
            self.store.delete_rule_engine(name).await
        }
        .await;
        self.record("delete_rule_engine", start, result)
    }

    pub async fn delete_tagged_config(&self, name: &str, tag: &str) -> Result<()> {
        let start = Instant::now();
        let result = async {
            check_name(name)?;
            check_tag(tag)?;
            self.store.delete_tagged_config(name, tag).await
        }
        .await;
        self.record("delete_tagged_config", start, result)
    }

    pub async fn get_complete_rule_engine(&self, name: &str) -> Result<CompleteRuleEngine> {
        let start = Instant::now();
        let result = async {
            check_name(name)?;
            self.store.get_complete_rule_engine(name).await
        }
        .await;
        self.record("get_complete_rule_engine", start, result)
    }

    pub async fn set_default_tag(&self, name: &str, tag: &str) -> Result<()> {
        let start = Instant::now();
        let result = async {
            check_name(name)?;
            check_tag(tag)?;
            self.store.set_default_tag(name, tag).await
        }
        .await;
        self.record("set_default_tag", start, result)
    }

    pub async fn remove_default_tag(&self, name: &str) -> Result<()> {
        let start = Instant::now();
        let result = async {
            check_name(name)?;
            self.store.remove_default_tag(name).await
        }
        .await;
        self.record("remove_default_tag", start, result)
    }

    pub async fn enable_tag(&self, name: &str, tag: &str) -> Result<()> {
        let start = Instant::now();
        let result = async {
            check_name(name)?;
            check_tag(tag)?;
            self.store.enable_tag(name, tag).await
        }
        .await;
        self.record("enable_tag", start, result)
    }

    pub async fn disable_tag(&self, name: &str, tag: &str) -> Result<()> {
        let start = Instant::now();
        let result = async {
            check_name(name)?;
            check_tag(tag)?;
            self.store.disable_tag(name, tag).await
        }
        .await;
        self.record("disable_tag", start, result)
    }

    fn record<T>(&self, op: &'static str, start: Instant, result: Result<T>) -> Result<T> {
        self.metrics.record_latency(start);
        self.metrics.record_operation(result.as_ref().err());

        if let Err(ref e) = result {
            if e.is_client_error() {
                debug!(op, code = e.code().as_u16(), error = %e, "Request rejected");
            } else {
                error!(op, error = %e, "Request failed");
            }
        }
        result
    }
}

fn check_name(name: &str) -> Result<()> {
    if validator::is_valid_name(name) {
        Ok(())
    } else {
        Err(Error::InvalidName(name.to_string()))
    }
}

fn check_tag(tag: &str) -> Result<()> {
    if validator::is_valid_tag(tag) {
        Ok(())
    } else {
        Err(Error::InvalidTag(tag.to_string()))
    }
}
