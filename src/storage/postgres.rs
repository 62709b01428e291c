// src/storage/postgres.rs
use anyhow::{anyhow, bail};
use async_trait::async_trait;
use sqlx::postgres::{PgConnection, PgPoolOptions};
use sqlx::{PgPool, Postgres, Row};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::domain::{ConfigId, EngineConfig, RuleEngine};

use super::traits::{ConfigRepository, Datastore, RuleEngineRepository, Transaction};

/// PostgreSQL implementation of the Datastore trait.
pub struct PostgresDatastore {
    pool: PgPool,
}

impl PostgresDatastore {
    /// Create a new PostgresDatastore instance with a connection pool.
    pub async fn connect(
        database_url: &str,
        min_connections: u32,
        max_connections: u32,
        connect_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(min_connections)
            .max_connections(max_connections)
            .acquire_timeout(connect_timeout)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Run database migrations.
    pub async fn run_migrations(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Datastore for PostgresDatastore {
    async fn begin(&self) -> anyhow::Result<Box<dyn Transaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTransaction { tx: Some(tx) }))
    }

    async fn ping(&self) -> anyhow::Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        info!("Closing PostgreSQL pool");
        self.pool.close().await;
    }

    fn kind(&self) -> &'static str {
        "postgres"
    }
}

/// A database transaction. Rolled back by sqlx if dropped uncommitted.
struct PgTransaction {
    tx: Option<sqlx::Transaction<'static, Postgres>>,
}

impl PgTransaction {
    fn conn(&mut self) -> anyhow::Result<&mut PgConnection> {
        self.tx
            .as_deref_mut()
            .ok_or_else(|| anyhow!("transaction already finished"))
    }
}

#[async_trait]
impl RuleEngineRepository for PgTransaction {
    async fn find_by_name(&mut self, name: &str) -> anyhow::Result<Option<RuleEngine>> {
        // Row lock serializes concurrent writers of the same engine
        let row = sqlx::query(
            r#"
            SELECT name, default_tag, tags, last_update_time, revision
            FROM rule_engines
            WHERE name = $1
            FOR UPDATE
            "#,
        )
        .bind(name)
        .fetch_optional(self.conn()?)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let tags: serde_json::Value = row.try_get("tags")?;
        let revision: i64 = row.try_get("revision")?;

        Ok(Some(RuleEngine {
            name: row.try_get("name")?,
            default_tag: row.try_get("default_tag")?,
            tags: serde_json::from_value(tags)?,
            last_update_time: row.try_get("last_update_time")?,
            revision: revision as u64,
        }))
    }

    async fn upsert(&mut self, engine: &RuleEngine) -> anyhow::Result<()> {
        let tags = serde_json::to_value(&engine.tags)?;

        let result = if engine.is_persisted() {
            sqlx::query(
                r#"
                UPDATE rule_engines
                SET default_tag = $2,
                    tags = $3,
                    last_update_time = $4,
                    revision = revision + 1
                WHERE name = $1 AND revision = $5
                "#,
            )
            .bind(&engine.name)
            .bind(&engine.default_tag)
            .bind(tags)
            .bind(engine.last_update_time)
            .bind(engine.revision as i64)
            .execute(self.conn()?)
            .await?
        } else {
            sqlx::query(
                r#"
                INSERT INTO rule_engines (name, default_tag, tags, last_update_time, revision)
                VALUES ($1, $2, $3, $4, 1)
                ON CONFLICT (name) DO NOTHING
                "#,
            )
            .bind(&engine.name)
            .bind(&engine.default_tag)
            .bind(tags)
            .bind(engine.last_update_time)
            .execute(self.conn()?)
            .await?
        };

        if result.rows_affected() != 1 {
            bail!(
                "write conflict on rule engine {:?} at revision {}",
                engine.name,
                engine.revision
            );
        }

        Ok(())
    }

    async fn delete(&mut self, engine: &RuleEngine) -> anyhow::Result<()> {
        let result = sqlx::query(
            r#"
            DELETE FROM rule_engines
            WHERE name = $1 AND revision = $2
            "#,
        )
        .bind(&engine.name)
        .bind(engine.revision as i64)
        .execute(self.conn()?)
        .await?;

        if result.rows_affected() != 1 {
            bail!(
                "write conflict on rule engine {:?} at revision {}",
                engine.name,
                engine.revision
            );
        }

        Ok(())
    }
}

#[async_trait]
impl ConfigRepository for PgTransaction {
    async fn insert(&mut self, config: &EngineConfig) -> anyhow::Result<ConfigId> {
        let id = ConfigId::new();

        sqlx::query(
            r#"
            INSERT INTO engine_configs (id, config)
            VALUES ($1, $2)
            "#,
        )
        .bind(id.as_uuid())
        .bind(config.as_value())
        .execute(self.conn()?)
        .await?;

        Ok(id)
    }

    async fn find_by_id(&mut self, id: ConfigId) -> anyhow::Result<Option<EngineConfig>> {
        let config: Option<serde_json::Value> = sqlx::query_scalar(
            r#"
            SELECT config
            FROM engine_configs
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(self.conn()?)
        .await?;

        Ok(config.map(EngineConfig::new))
    }

    async fn delete_by_id(&mut self, id: ConfigId) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            DELETE FROM engine_configs
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .execute(self.conn()?)
        .await?;

        Ok(())
    }

    async fn delete_by_ids(&mut self, ids: &[ConfigId]) -> anyhow::Result<u64> {
        let ids: Vec<Uuid> = ids.iter().map(ConfigId::as_uuid).collect();

        let result = sqlx::query(
            r#"
            DELETE FROM engine_configs
            WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .execute(self.conn()?)
        .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl Transaction for PgTransaction {
    async fn commit(&mut self) -> anyhow::Result<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| anyhow!("transaction already finished"))?;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(&mut self) -> anyhow::Result<()> {
        if let Some(tx) = self.tx.take() {
            tx.rollback().await?;
        }
        Ok(())
    }
}
