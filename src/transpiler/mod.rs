//! SQL generation for registered entities.
//!
//! Everything here is pure string assembly: nothing touches the database.

pub mod conditions;
pub mod dml;
pub mod encode;
pub mod types;

pub use conditions::{compile_filter, compile_limit, compile_order, compile_where};
pub use encode::{escape_identifier, escape_literal, escape_string, quote_ident};
pub use types::{column_type, normalize_pg_type, stored_value};

use crate::ast::{Filter, Where};
use crate::error::AdapterResult;
use crate::schema::EntitySchema;

/// Trait for compiling filter nodes against an entity.
pub trait ToSql {
    /// Convert this node to SQL text for `entity`.
    fn to_sql(&self, entity: &EntitySchema) -> AdapterResult<String>;
}

impl ToSql for Filter {
    fn to_sql(&self, entity: &EntitySchema) -> AdapterResult<String> {
        compile_filter(entity, self)
    }
}

impl ToSql for Where {
    /// The AND-joined clause list, without the `WHERE` keyword.
    fn to_sql(&self, entity: &EntitySchema) -> AdapterResult<String> {
        Ok(compile_where(entity, self)?.join(" AND "))
    }
}
