//! SELECT / INSERT / UPDATE / DELETE generation for registered entities.

use super::conditions::{compile_filter, compile_where};
use super::encode::{NULL, quote_columns, quote_ident};
use super::types::stored_value;
use crate::ast::{Filter, Record, Value, Where};
use crate::error::{AdapterError, AdapterResult};
use crate::schema::{EntitySchema, PRIMARY_KEY};

/// Column alias carrying the result of [`build_count`].
pub const COUNT_COLUMN: &str = "cnt";

fn primary_key_value(entity: &EntitySchema, id: &Value) -> AdapterResult<String> {
    let attr = entity
        .attribute(PRIMARY_KEY)
        .ok_or_else(|| AdapterError::UnknownEntity(entity.name.clone()))?;
    let encoded = stored_value(attr, id)?;
    if encoded == NULL || encoded == "DEFAULT" {
        return Err(AdapterError::invalid_value(format!(
            "{}: primary key must not be null",
            entity.name
        )));
    }
    Ok(encoded)
}

fn where_id(entity: &EntitySchema, id: &Value) -> AdapterResult<String> {
    Ok(format!(
        " WHERE {} = {}",
        quote_ident(PRIMARY_KEY),
        primary_key_value(entity, id)?
    ))
}

/// Declared (name, encoded value) pairs from a record, in record order.
/// Undeclared keys are ignored.
fn declared_fields(
    entity: &EntitySchema,
    record: &Record,
    with_id: bool,
) -> AdapterResult<Vec<(String, String)>> {
    let mut fields = Vec::with_capacity(record.len());
    for (name, value) in record.iter() {
        let Some(attr) = entity.attribute(name) else {
            continue;
        };
        if attr.is_primary_key() && !with_id {
            continue;
        }
        fields.push((attr.name.clone(), stored_value(attr, value)?));
    }
    Ok(fields)
}

fn assignments(fields: &[(String, String)]) -> String {
    fields
        .iter()
        .filter(|(name, _)| name != PRIMARY_KEY)
        .map(|(name, value)| format!("{} = {}", quote_ident(name), value))
        .collect::<Vec<_>>()
        .join(",")
}

/// `SELECT "id","title" FROM "posts" WHERE ... ORDER BY ... LIMIT ...`
pub fn build_select(entity: &EntitySchema, filter: &Filter) -> AdapterResult<String> {
    let columns: Vec<&str> = entity.attributes.iter().map(|a| a.name.as_str()).collect();
    Ok(format!(
        "SELECT {} FROM {}{}",
        quote_columns(&columns),
        entity.table_escaped(),
        compile_filter(entity, filter)?
    ))
}

/// `SELECT count(id) as cnt FROM "posts" WHERE ...`
pub fn build_count(entity: &EntitySchema, conditions: Option<&Where>) -> AdapterResult<String> {
    let filter = Filter {
        conditions: conditions.cloned(),
        ..Filter::default()
    };
    Ok(format!(
        "SELECT count({}) as {} FROM {}{}",
        quote_ident(PRIMARY_KEY),
        COUNT_COLUMN,
        entity.table_escaped(),
        compile_filter(entity, &filter)?
    ))
}

/// `INSERT INTO "posts" ("title") VALUES (E't') RETURNING id`.
///
/// The primary key is always generated by the table, so a supplied `id` is ignored.
pub fn build_insert(entity: &EntitySchema, record: &Record) -> AdapterResult<String> {
    let fields = declared_fields(entity, record, false)?;
    let mut sql = format!("INSERT INTO {}", entity.table_escaped());
    if fields.is_empty() {
        sql.push_str(" DEFAULT VALUES");
    } else {
        let (names, values): (Vec<String>, Vec<String>) = fields.into_iter().unzip();
        sql.push_str(&format!(
            " ({}) VALUES ({})",
            quote_columns(&names),
            values.join(",")
        ));
    }
    sql.push_str(" RETURNING id");
    Ok(sql)
}

/// Update the row with the record's `id`, or insert it when no such row exists.
///
/// Emitted as two statements so that it runs in a single round trip; only
/// the INSERT returns a row.
pub fn build_upsert(entity: &EntitySchema, record: &Record) -> AdapterResult<String> {
    let id = record
        .id()
        .ok_or_else(|| AdapterError::invalid_value(format!("{}: upsert requires an id", entity.name)))?;
    let by_id = where_id(entity, id)?;
    let mut fields = declared_fields(entity, record, false)?;
    fields.insert(0, (PRIMARY_KEY.to_string(), primary_key_value(entity, id)?));

    let table = entity.table_escaped();
    let mut sql = String::new();
    let set = assignments(&fields);
    if !set.is_empty() {
        sql.push_str(&format!("UPDATE {} SET {}{}; ", table, set, by_id));
    }
    let (names, values): (Vec<String>, Vec<String>) = fields.into_iter().unzip();
    sql.push_str(&format!(
        "INSERT INTO {} ({}) SELECT {} WHERE NOT EXISTS (SELECT 1 FROM {}{}) RETURNING id",
        table,
        quote_columns(&names),
        values.join(","),
        table,
        by_id
    ));
    Ok(sql)
}

/// `UPDATE "posts" SET "title" = E'x' WHERE "id" = 1`, or `None` when the
/// record carries no declared attribute to change.
pub fn build_update(entity: &EntitySchema, id: &Value, record: &Record) -> AdapterResult<Option<String>> {
    let fields = declared_fields(entity, record, false)?;
    let set = assignments(&fields);
    if set.is_empty() {
        return Ok(None);
    }
    Ok(Some(format!(
        "UPDATE {} SET {}{}",
        entity.table_escaped(),
        set,
        where_id(entity, id)?
    )))
}

/// `DELETE FROM "posts" WHERE ...`; no predicate deletes every row.
pub fn build_delete(entity: &EntitySchema, conditions: Option<&Where>) -> AdapterResult<String> {
    let mut sql = format!("DELETE FROM {}", entity.table_escaped());
    if let Some(conditions) = conditions {
        let clauses = compile_where(entity, conditions)?;
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
    }
    Ok(sql)
}

pub fn build_delete_by_id(entity: &EntitySchema, id: &Value) -> AdapterResult<String> {
    Ok(format!(
        "DELETE FROM {}{}",
        entity.table_escaped(),
        where_id(entity, id)?
    ))
}

pub fn build_find(entity: &EntitySchema, id: &Value) -> AdapterResult<String> {
    let columns: Vec<&str> = entity.attributes.iter().map(|a| a.name.as_str()).collect();
    Ok(format!(
        "SELECT {} FROM {}{} LIMIT 1",
        quote_columns(&columns),
        entity.table_escaped(),
        where_id(entity, id)?
    ))
}

pub fn build_exists(entity: &EntitySchema, id: &Value) -> AdapterResult<String> {
    Ok(format!(
        "SELECT 1 AS {} FROM {}{} LIMIT 1",
        quote_ident("exists"),
        entity.table_escaped(),
        where_id(entity, id)?
    ))
}
