//! Query execution.
//!
//! The adapter never talks to the database directly. Every statement goes
//! through an [`Executor`], which takes SQL text and hands back rows as
//! JSON-like maps. [`PgExecutor`] is the sqlx-backed implementation; tests
//! substitute their own.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use futures::future::BoxFuture;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow, PgSslMode};
use sqlx::{Column, Executor as _, Row as _, TypeInfo};
use tracing::debug;

use crate::config::ConnectionConfig;
use crate::error::{AdapterError, AdapterResult};

/// One result row, keyed by column name.
pub type Row = HashMap<String, serde_json::Value>;

/// Runs SQL text and returns the resulting rows.
///
/// Implementations own connection handling. Failures surface as
/// [`AdapterError::Transport`] and are passed through unchanged.
pub trait Executor: Send + Sync {
    fn execute<'a>(&'a self, sql: &'a str) -> BoxFuture<'a, AdapterResult<Vec<Row>>>;
}

impl<T: Executor + ?Sized> Executor for Arc<T> {
    fn execute<'a>(&'a self, sql: &'a str) -> BoxFuture<'a, AdapterResult<Vec<Row>>> {
        (**self).execute(sql)
    }
}

impl<T: Executor + ?Sized> Executor for &T {
    fn execute<'a>(&'a self, sql: &'a str) -> BoxFuture<'a, AdapterResult<Vec<Row>>> {
        (**self).execute(sql)
    }
}

/// A PostgreSQL connection pool.
#[derive(Clone)]
pub struct PgExecutor {
    pool: PgPool,
}

impl PgExecutor {
    /// Connect using a connection URL.
    ///
    /// ```rust,ignore
    /// let db = PgExecutor::connect("postgres://localhost/blog").await?;
    /// ```
    pub async fn connect(url: &str) -> AdapterResult<Self> {
        let options: PgConnectOptions = url
            .parse()
            .map_err(|e: sqlx::Error| AdapterError::Config(e.to_string()))?;
        Self::connect_with(options, ConnectionConfig::DEFAULT_POOL_SIZE).await
    }

    /// Connect using the `[connection]` section of a config file.
    pub async fn from_config(config: &ConnectionConfig) -> AdapterResult<Self> {
        Self::connect_with(connect_options(config)?, config.pool_size).await
    }

    async fn connect_with(options: PgConnectOptions, pool_size: u32) -> AdapterResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(pool_size.max(1))
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    /// Wrap a pool the host already owns.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn connect_options(config: &ConnectionConfig) -> AdapterResult<PgConnectOptions> {
    let mut options = match &config.url {
        Some(url) => url
            .parse::<PgConnectOptions>()
            .map_err(|e| AdapterError::Config(e.to_string()))?,
        None => PgConnectOptions::new(),
    };
    if let Some(host) = &config.host {
        options = options.host(host);
    }
    if let Some(port) = config.port {
        options = options.port(port);
    }
    if let Some(username) = &config.username {
        options = options.username(username);
    }
    if let Some(password) = &config.password {
        options = options.password(password);
    }
    if let Some(database) = &config.database {
        options = options.database(database);
    }
    if config.ssl {
        options = options.ssl_mode(PgSslMode::Require);
    }
    Ok(options)
}

impl Executor for PgExecutor {
    fn execute<'a>(&'a self, sql: &'a str) -> BoxFuture<'a, AdapterResult<Vec<Row>>> {
        Box::pin(async move {
            let started = Instant::now();
            // No bind arguments, so sqlx uses the simple query protocol and
            // multi-statement text (upsert) is accepted.
            let result = self.pool.fetch_all(sql).await;
            debug!(
                sql,
                elapsed_ms = started.elapsed().as_millis() as u64,
                ok = result.is_ok(),
                "query"
            );
            Ok(result?.iter().map(row_to_map).collect())
        })
    }
}

/// Convert a PgRow to a HashMap.
fn row_to_map(row: &PgRow) -> Row {
    let mut map = HashMap::new();

    for (i, column) in row.columns().iter().enumerate() {
        let name = column.name().to_string();

        let value: serde_json::Value = match column.type_info().name() {
            "BOOL" => row
                .try_get::<Option<bool>, _>(i)
                .ok()
                .flatten()
                .map(serde_json::Value::Bool)
                .unwrap_or(serde_json::Value::Null),
            "INT2" => int_value(row.try_get::<Option<i16>, _>(i).ok().flatten().map(i64::from)),
            "INT4" => int_value(row.try_get::<Option<i32>, _>(i).ok().flatten().map(i64::from)),
            "INT8" => int_value(row.try_get::<Option<i64>, _>(i).ok().flatten()),
            "FLOAT4" => float_value(row.try_get::<Option<f32>, _>(i).ok().flatten().map(f64::from)),
            "FLOAT8" => float_value(row.try_get::<Option<f64>, _>(i).ok().flatten()),
            "UUID" => row
                .try_get::<Option<sqlx::types::Uuid>, _>(i)
                .ok()
                .flatten()
                .map(|u| serde_json::Value::String(u.to_string()))
                .unwrap_or(serde_json::Value::Null),
            "TIMESTAMPTZ" => row
                .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(i)
                .ok()
                .flatten()
                .map(|d| serde_json::Value::String(crate::ast::values::iso8601(&d)))
                .unwrap_or(serde_json::Value::Null),
            "JSON" | "JSONB" => text_value(row, i)
                .map(|s| serde_json::from_str(&s).unwrap_or(serde_json::Value::String(s)))
                .unwrap_or(serde_json::Value::Null),
            _ => text_value(row, i)
                .map(serde_json::Value::String)
                .unwrap_or(serde_json::Value::Null),
        };

        map.insert(name, value);
    }

    map
}

fn int_value(v: Option<i64>) -> serde_json::Value {
    v.map(|n| serde_json::Value::Number(n.into()))
        .unwrap_or(serde_json::Value::Null)
}

fn float_value(v: Option<f64>) -> serde_json::Value {
    v.and_then(serde_json::Number::from_f64)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

// Simple-protocol results arrive as text, so any column decodes as a string.
fn text_value(row: &PgRow, i: usize) -> Option<String> {
    row.try_get_unchecked::<Option<String>, _>(i).ok().flatten()
}
