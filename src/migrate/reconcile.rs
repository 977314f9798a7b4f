//! Reconciliation across every registered entity.
//!
//! Each entity runs independently and concurrently; results are joined once
//! all of them have finished.

use futures::future::{join_all, try_join_all};
use tracing::{debug, info};

use super::apply::{Applier, ErrorSink};
use super::diff::{EntityPlan, column_changes, create_table_sql, index_changes};
use super::introspect::{live_columns, live_indexes};
use crate::engine::Executor;
use crate::error::{AdapterError, AdapterResult};
use crate::schema::{EntitySchema, Registry};

fn last_error<T>(results: Vec<AdapterResult<T>>) -> Option<AdapterError> {
    results.into_iter().filter_map(Result::err).last()
}

/// Create or alter every entity's table and indexes to match its declaration.
///
/// Every pending statement is attempted. The result carries the last error
/// raised by any entity.
pub async fn reconcile<E: Executor + ?Sized>(
    executor: &E,
    registry: &Registry,
    sink: Option<&ErrorSink>,
) -> AdapterResult<()> {
    let results = join_all(
        registry
            .entities()
            .map(|entity| reconcile_entity(executor, entity, sink)),
    )
    .await;
    let total = results.len();
    match last_error(results) {
        Some(err) => Err(err),
        None => {
            info!(entities = total, "schema reconciled");
            Ok(())
        }
    }
}

async fn reconcile_entity<E: Executor + ?Sized>(
    executor: &E,
    entity: &EntitySchema,
    sink: Option<&ErrorSink>,
) -> AdapterResult<()> {
    let applier = Applier::new(executor, sink);

    let columns = match live_columns(executor, entity).await {
        Ok(columns) => columns,
        Err(err) => {
            applier.report(&entity.name, None, &err);
            return Err(err);
        }
    };

    if columns.is_empty() {
        debug!(entity = %entity.name, "creating table");
        let created = applier.run(&entity.name, &create_table_sql(entity)).await;
        let indexed = applier
            .apply_indexes(entity, &index_changes(entity, &[]))
            .await;
        return indexed.and(created);
    }

    let changes = column_changes(entity, &columns);
    debug!(entity = %entity.name, changes = changes.len(), "altering table");
    let altered = applier.apply_columns(entity, &changes).await;

    // Read indexes after the ALTER: dropped columns take their indexes with them.
    let indexed = match live_indexes(executor, entity).await {
        Ok(indexes) => {
            applier
                .apply_indexes(entity, &index_changes(entity, &indexes))
                .await
        }
        Err(err) => {
            applier.report(&entity.name, None, &err);
            Err(err)
        }
    };
    indexed.and(altered)
}

/// Whether every entity's table already matches its declaration.
///
/// Index checks are skipped for an entity whose columns already differ.
/// An introspection error is returned in place of the answer.
pub async fn is_current<E: Executor + ?Sized>(
    executor: &E,
    registry: &Registry,
) -> AdapterResult<bool> {
    let results = join_all(
        registry
            .entities()
            .map(|entity| entity_is_current(executor, entity)),
    )
    .await;
    let mut current = true;
    let mut last = None;
    for result in results {
        match result {
            Ok(ok) => current &= ok,
            Err(err) => last = Some(err),
        }
    }
    match last {
        Some(err) => Err(err),
        None => Ok(current),
    }
}

async fn entity_is_current<E: Executor + ?Sized>(
    executor: &E,
    entity: &EntitySchema,
) -> AdapterResult<bool> {
    let columns = live_columns(executor, entity).await?;
    if columns.is_empty() || !column_changes(entity, &columns).is_empty() {
        return Ok(false);
    }
    let indexes = live_indexes(executor, entity).await?;
    Ok(index_changes(entity, &indexes).is_empty())
}

/// Dry run: the plan for each entity, in registry order, without executing DDL.
pub async fn plan<E: Executor + ?Sized>(
    executor: &E,
    registry: &Registry,
) -> AdapterResult<Vec<(String, EntityPlan)>> {
    try_join_all(registry.entities().map(|entity| async move {
        let columns = live_columns(executor, entity).await?;
        let indexes = if columns.is_empty() {
            Vec::new()
        } else {
            live_indexes(executor, entity).await?
        };
        Ok::<_, AdapterError>((entity.name.clone(), EntityPlan::new(entity, &columns, &indexes)))
    }))
    .await
}
