//! DDL application.
//!
//! Statements run one after another. A failing statement is logged and
//! handed to the error sink, and the remaining statements still run. The
//! batch result carries the last error seen.

use std::sync::Arc;

use tracing::warn;

use super::diff::{ColumnChange, IndexChange, alter_table_sql};
use crate::engine::Executor;
use crate::error::{AdapterError, AdapterResult};
use crate::schema::EntitySchema;

/// Receives every error raised while reconciling.
pub type ErrorSink = Arc<dyn Fn(&AdapterError) + Send + Sync>;

/// Runs DDL for one entity.
pub struct Applier<'a, E: ?Sized> {
    executor: &'a E,
    sink: Option<&'a ErrorSink>,
}

impl<'a, E: Executor + ?Sized> Applier<'a, E> {
    pub fn new(executor: &'a E, sink: Option<&'a ErrorSink>) -> Self {
        Self { executor, sink }
    }

    /// Log an error and pass it to the sink.
    pub fn report(&self, entity: &str, sql: Option<&str>, err: &AdapterError) {
        warn!(entity, sql, error = %err, "schema statement failed");
        if let Some(sink) = self.sink {
            sink(err);
        }
    }

    /// Run one statement, reporting a failure.
    pub async fn run(&self, entity: &str, sql: &str) -> AdapterResult<()> {
        let statement = format!("{};", sql);
        match self.executor.execute(&statement).await {
            Ok(_) => Ok(()),
            Err(err) => {
                self.report(entity, Some(sql), &err);
                Err(err)
            }
        }
    }

    /// Apply column changes as a single `ALTER TABLE`. Nothing is sent when
    /// there are no changes.
    pub async fn apply_columns(
        &self,
        entity: &EntitySchema,
        changes: &[ColumnChange],
    ) -> AdapterResult<()> {
        match alter_table_sql(entity, changes) {
            Some(sql) => self.run(&entity.name, &sql).await,
            None => Ok(()),
        }
    }

    /// Apply index changes strictly in order, each awaited before the next.
    pub async fn apply_indexes(
        &self,
        entity: &EntitySchema,
        changes: &[IndexChange],
    ) -> AdapterResult<()> {
        let mut last = None;
        for change in changes {
            if let Err(err) = self.run(&entity.name, &change.to_string()).await {
                last = Some(err);
            }
        }
        last.map_or(Ok(()), Err)
    }
}
