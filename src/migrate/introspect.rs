//! Live schema introspection.
//!
//! Reads a table's columns from `information_schema` and its non-primary
//! indexes from `pg_index`. Results are fetched fresh on every call.

use crate::engine::{Executor, Row};
use crate::error::AdapterResult;
use crate::schema::EntitySchema;
use crate::transpiler::encode::escape_string;
use crate::transpiler::types::normalize_pg_type;

/// A column as the catalog reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveColumn {
    pub field: String,
    /// Normalized type name, e.g. `integer` rather than `int4`.
    pub data_type: String,
    pub nullable: bool,
    pub default: Option<String>,
    pub length: Option<u32>,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
}

impl LiveColumn {
    pub fn new(field: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            data_type: data_type.into(),
            nullable: true,
            default: None,
            length: None,
            precision: None,
            scale: None,
        }
    }

    /// The type as a declaration would spell it: `varchar(255)`, `numeric(10,2)`.
    pub fn canonical_type(&self) -> String {
        match (self.data_type.as_str(), self.length, self.precision, self.scale) {
            ("varchar" | "char", Some(len), _, _) => format!("{}({})", self.data_type, len),
            ("numeric", _, Some(p), Some(s)) if s > 0 => format!("numeric({},{})", p, s),
            ("numeric", _, Some(p), _) => format!("numeric({})", p),
            _ => self.data_type.clone(),
        }
    }

    fn from_row(row: &Row) -> Option<Self> {
        Some(Self {
            field: text(row, "Field")?,
            data_type: normalize_pg_type(&text(row, "Type")?).to_string(),
            nullable: text(row, "Null").is_none_or(|n| n.eq_ignore_ascii_case("YES")),
            default: text(row, "Default"),
            length: int(row, "Length"),
            precision: int(row, "Precision"),
            scale: int(row, "Scale"),
        })
    }
}

/// A non-primary index as the catalog reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveIndex {
    pub name: String,
    pub unique: bool,
    /// Backed by a table constraint, so it must be dropped with `DROP CONSTRAINT`.
    pub constraint: bool,
    pub columns: Vec<String>,
}

impl LiveIndex {
    fn from_row(row: &Row) -> Option<Self> {
        Some(Self {
            name: text(row, "Name")?,
            unique: flag(row, "Unique"),
            constraint: flag(row, "Constraint"),
            columns: text(row, "Columns")
                .map(|c| c.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_default(),
        })
    }
}

fn text(row: &Row, key: &str) -> Option<String> {
    match row.get(key)? {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn int(row: &Row, key: &str) -> Option<u32> {
    match row.get(key)? {
        serde_json::Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn flag(row: &Row, key: &str) -> bool {
    match row.get(key) {
        Some(serde_json::Value::Bool(b)) => *b,
        Some(serde_json::Value::String(s)) => matches!(s.as_str(), "t" | "true" | "TRUE"),
        _ => false,
    }
}

/// Catalog query for the entity's columns.
pub fn columns_sql(entity: &EntitySchema) -> String {
    let (schema, table) = entity.table_parts();
    let schema = schema
        .map(escape_string)
        .unwrap_or_else(|| "current_schema()".to_string());
    format!(
        "SELECT column_name::text AS \"Field\", udt_name::text AS \"Type\", \
         is_nullable::text AS \"Null\", column_default::text AS \"Default\", \
         character_maximum_length::int AS \"Length\", numeric_precision::int AS \"Precision\", \
         numeric_scale::int AS \"Scale\" \
         FROM information_schema.columns \
         WHERE table_name = {} AND table_schema = {} \
         ORDER BY ordinal_position",
        escape_string(table),
        schema
    )
}

/// Catalog query for the entity's non-primary indexes, columns in key order.
pub fn indexes_sql(entity: &EntitySchema) -> String {
    format!(
        "SELECT c.relname::text AS \"Name\", b.indisunique AS \"Unique\", \
         EXISTS(SELECT 1 FROM pg_constraint k WHERE k.conindid = b.indexrelid) AS \"Constraint\", \
         ARRAY_TO_STRING(ARRAY_AGG(d.attname ORDER BY b.columnpos_order), ',') AS \"Columns\" \
         FROM (SELECT indrelid, indexrelid, indisunique, indkey[columnpos_order] AS columnpos, columnpos_order \
         FROM (SELECT indrelid, indexrelid, indisunique, indkey, GENERATE_SUBSCRIPTS(indkey, 1) AS columnpos_order \
         FROM pg_index WHERE indrelid = {}::regclass AND indisprimary = false) a) b \
         INNER JOIN pg_class c ON b.indexrelid = c.oid \
         INNER JOIN pg_attribute d ON b.indrelid = d.attrelid AND b.columnpos = d.attnum \
         GROUP BY \"Name\", \"Unique\", \"Constraint\" \
         ORDER BY \"Name\"",
        escape_string(&entity.table_escaped())
    )
}

pub async fn live_columns<E: Executor + ?Sized>(
    executor: &E,
    entity: &EntitySchema,
) -> AdapterResult<Vec<LiveColumn>> {
    let rows = executor.execute(&columns_sql(entity)).await?;
    Ok(rows.iter().filter_map(LiveColumn::from_row).collect())
}

pub async fn live_indexes<E: Executor + ?Sized>(
    executor: &E,
    entity: &EntitySchema,
) -> AdapterResult<Vec<LiveIndex>> {
    let rows = executor.execute(&indexes_sql(entity)).await?;
    Ok(rows.iter().filter_map(LiveIndex::from_row).collect())
}
