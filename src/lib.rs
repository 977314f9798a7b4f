//! # pgadapter
//!
//! PostgreSQL adapter core: declare entities, compile abstract filters into
//! SQL, and reconcile declared schemas against the live database.
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use pgadapter::prelude::*;
//!
//! let mut db = PgAdapter::new(PgExecutor::connect("postgres://localhost/blog").await?);
//! db.register_entity(
//!     "posts",
//!     vec![Attribute::string("title").not_null(), Attribute::integer("userId")],
//!     EntityOptions::default(),
//! );
//! db.reconcile_schema().await?;
//!
//! let id = db.create("posts", &Record::new().set("title", "t").set("userId", 5)).await?;
//! let rows = db
//!     .find_all("posts", &Filter::matching(Where::new().eq("title", "t")))
//!     .await?;
//! ```
//!
//! ## Filters
//!
//! | Input                         | SQL                              |
//! |-------------------------------|----------------------------------|
//! | `{x: null}`                   | `"x" IS NULL`                    |
//! | `{x: {neq: null}}`            | `"x" IS NOT NULL`                |
//! | `{x: {inq: []}}`              | `FALSE`                          |
//! | `{x: {between: [1, 5]}}`      | `"x" BETWEEN 1 AND 5`            |
//! | `{x: {regexp: "/^a/i"}}`      | `"x" ~* '^a'`                    |
//! | `{or: [{a: 1}, {a: 2}]}`      | `("a" = 1 OR "a" = 2)`           |

pub mod adapter;
pub mod ast;
pub mod config;
pub mod engine;
pub mod error;
pub mod migrate;
pub mod schema;
pub mod transpiler;

pub use adapter::PgAdapter;

pub mod prelude {
    pub use crate::adapter::PgAdapter;
    pub use crate::ast::*;
    pub use crate::config::AdapterConfig;
    pub use crate::engine::{Executor, PgExecutor, Row};
    pub use crate::error::*;
    pub use crate::migrate::{EntityPlan, ErrorSink};
    pub use crate::schema::{Attribute, EntityOptions, IndexDef, NumberKind, Registry};
    pub use crate::transpiler::ToSql;
}
