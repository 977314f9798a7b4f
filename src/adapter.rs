//! Host-facing adapter.
//!
//! [`PgAdapter`] owns the entity registry and an [`Executor`], and exposes the
//! data operations (count, create, upsert, find) plus schema reconciliation.
//!
//! ```rust,ignore
//! let mut db = PgAdapter::new(PgExecutor::connect("postgres://localhost/blog").await?);
//! db.register_entity("posts", vec![Attribute::string("title")], EntityOptions::default());
//! db.reconcile_schema().await?;
//! let id = db.create("posts", &Record::new().set("title", "t")).await?;
//! ```

use tracing::debug;

use crate::ast::{Filter, Record, Value, Where};
use crate::engine::{Executor, Row};
use crate::error::{AdapterError, AdapterResult};
use crate::migrate::{self, EntityPlan, ErrorSink};
use crate::schema::{Attribute, EntityOptions, EntitySchema, PRIMARY_KEY, Registry};
use crate::transpiler::dml;

/// Host-facing adapter over an [`Executor`] and an entity [`Registry`].
pub struct PgAdapter<E> {
    executor: E,
    registry: Registry,
    sink: Option<ErrorSink>,
}

impl<E: Executor> PgAdapter<E> {
    /// An adapter with an empty registry.
    pub fn new(executor: E) -> Self {
        Self::with_registry(executor, Registry::new())
    }

    /// An adapter over entities that were registered up front, e.g. from config.
    pub fn with_registry(executor: E, registry: Registry) -> Self {
        Self {
            executor,
            registry,
            sink: None,
        }
    }

    /// Receive every error raised while reconciling, as it happens.
    pub fn with_error_sink(mut self, sink: ErrorSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// The executor every statement goes through.
    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// The registered entities.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Declare or replace an entity.
    pub fn register_entity(
        &mut self,
        name: impl Into<String>,
        attributes: Vec<Attribute>,
        options: EntityOptions,
    ) -> &EntitySchema {
        self.registry.register_entity(name, attributes, options)
    }

    fn entity(&self, name: &str) -> AdapterResult<&EntitySchema> {
        self.registry.entity(name)
    }

    /// Number of rows matching `conditions`.
    pub async fn count(&self, entity: &str, conditions: Option<&Where>) -> AdapterResult<u64> {
        let sql = dml::build_count(self.entity(entity)?, conditions)?;
        let rows = self.executor.execute(&sql).await?;
        let row = rows
            .first()
            .ok_or_else(|| AdapterError::aggregate("count: query returned no data"))?;
        row.get(dml::COUNT_COLUMN)
            .and_then(as_integer)
            .and_then(|n| u64::try_from(n).ok())
            .ok_or_else(|| AdapterError::aggregate("count: query did not return an integer"))
    }

    /// Insert a row and return its generated id.
    pub async fn create(&self, entity: &str, record: &Record) -> AdapterResult<i64> {
        let sql = dml::build_insert(self.entity(entity)?, record)?;
        let rows = self.executor.execute(&sql).await?;
        returned_id(&rows).ok_or_else(|| {
            AdapterError::aggregate(format!("create: {} insert returned no id", entity))
        })
    }

    /// Update the row with the record's id, or insert it. The returned record
    /// carries the id. A record without an id is created.
    pub async fn upsert(&self, entity: &str, record: &Record) -> AdapterResult<Record> {
        let mut saved = record.clone();
        if record.id().is_none() {
            let id = self.create(entity, record).await?;
            saved.insert(PRIMARY_KEY, id);
            return Ok(saved);
        }
        let sql = dml::build_upsert(self.entity(entity)?, record)?;
        let rows = self.executor.execute(&sql).await?;
        if let Some(id) = returned_id(&rows) {
            saved.insert(PRIMARY_KEY, id);
        }
        Ok(saved)
    }

    /// Rows matching the filter, columns keyed by attribute name.
    pub async fn find_all(&self, entity: &str, filter: &Filter) -> AdapterResult<Vec<Row>> {
        let sql = dml::build_select(self.entity(entity)?, filter)?;
        let rows = self.executor.execute(&sql).await?;
        debug!(entity, rows = rows.len(), "find_all");
        Ok(rows)
    }

    /// The row with this id, if any.
    pub async fn find(&self, entity: &str, id: impl Into<Value>) -> AdapterResult<Option<Row>> {
        let sql = dml::build_find(self.entity(entity)?, &id.into())?;
        Ok(self.executor.execute(&sql).await?.into_iter().next())
    }

    /// Whether a row with this id exists.
    pub async fn exists(&self, entity: &str, id: impl Into<Value>) -> AdapterResult<bool> {
        let sql = dml::build_exists(self.entity(entity)?, &id.into())?;
        Ok(!self.executor.execute(&sql).await?.is_empty())
    }

    /// Delete the row with this id.
    pub async fn destroy(&self, entity: &str, id: impl Into<Value>) -> AdapterResult<()> {
        let sql = dml::build_delete_by_id(self.entity(entity)?, &id.into())?;
        self.executor.execute(&sql).await?;
        Ok(())
    }

    /// Delete matching rows; `None` deletes every row.
    pub async fn destroy_all(&self, entity: &str, conditions: Option<&Where>) -> AdapterResult<()> {
        let sql = dml::build_delete(self.entity(entity)?, conditions)?;
        self.executor.execute(&sql).await?;
        Ok(())
    }

    /// Update the given attributes of one row. Undeclared keys are ignored.
    pub async fn update_attributes(
        &self,
        entity: &str,
        id: impl Into<Value>,
        record: &Record,
    ) -> AdapterResult<()> {
        if let Some(sql) = dml::build_update(self.entity(entity)?, &id.into(), record)? {
            self.executor.execute(&sql).await?;
        }
        Ok(())
    }

    /// Write every attribute of a record that already has an id.
    pub async fn save(&self, entity: &str, record: &Record) -> AdapterResult<()> {
        let id = record
            .id()
            .cloned()
            .ok_or_else(|| AdapterError::invalid_value(format!("save: {} record has no id", entity)))?;
        self.update_attributes(entity, id, record).await
    }

    /// Create or alter every registered entity's table and indexes.
    ///
    /// All statements are attempted; the last error, if any, is returned.
    pub async fn reconcile_schema(&self) -> AdapterResult<()> {
        migrate::reconcile(&self.executor, &self.registry, self.sink.as_ref()).await
    }

    /// Whether reconciliation would change anything. Executes no DDL.
    pub async fn is_schema_current(&self) -> AdapterResult<bool> {
        migrate::is_current(&self.executor, &self.registry).await
    }

    /// The statements reconciliation would run, per entity.
    pub async fn plan(&self) -> AdapterResult<Vec<(String, EntityPlan)>> {
        migrate::plan(&self.executor, &self.registry).await
    }
}

/// Integers may come back as numbers or, over text protocols, as strings.
fn as_integer(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn returned_id(rows: &[Row]) -> Option<i64> {
    rows.iter()
        .find_map(|row| row.get(PRIMARY_KEY).and_then(as_integer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_as_integer() {
        assert_eq!(as_integer(&json!(4)), Some(4));
        assert_eq!(as_integer(&json!("12")), Some(12));
        assert_eq!(as_integer(&json!("x")), None);
        assert_eq!(as_integer(&json!(1.5)), None);
    }

    #[test]
    fn test_returned_id_skips_empty_rows() {
        let rows: Vec<Row> = vec![Row::new(), serde_json::from_value(json!({"id": 7})).unwrap()];
        assert_eq!(returned_id(&rows), Some(7));
        assert_eq!(returned_id(&[]), None);
    }
}
