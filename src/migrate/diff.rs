//! Schema Diff
//!
//! Compares a declared entity against its introspected table and produces
//! the DDL needed to converge them. Mismatches are returned as data; nothing
//! here touches the database.

use std::fmt;

use super::introspect::{LiveColumn, LiveIndex};
use crate::schema::{AttrType, Attribute, EntitySchema, IndexDef, NumberKind, PRIMARY_KEY};
use crate::transpiler::encode::{quote_columns, quote_ident};
use crate::transpiler::types::column_type;

/// One fragment of an `ALTER TABLE` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnChange {
    Add { name: String, definition: String },
    AlterType { name: String, ty: String },
    SetNotNull(String),
    DropNotNull(String),
    Drop(String),
}

impl fmt::Display for ColumnChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnChange::Add { name, definition } => {
                write!(f, "ADD COLUMN {} {}", quote_ident(name), definition)
            }
            ColumnChange::AlterType { name, ty } => {
                write!(f, "ALTER COLUMN {} TYPE {}", quote_ident(name), ty)
            }
            ColumnChange::SetNotNull(name) => {
                write!(f, "ALTER COLUMN {} SET NOT NULL", quote_ident(name))
            }
            ColumnChange::DropNotNull(name) => {
                write!(f, "ALTER COLUMN {} DROP NOT NULL", quote_ident(name))
            }
            ColumnChange::Drop(name) => write!(f, "DROP COLUMN {}", quote_ident(name)),
        }
    }
}

/// One standalone index statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexChange {
    Create { table: String, index: IndexDef },
    /// `constraint` selects `DROP CONSTRAINT` over `DROP INDEX`.
    Drop { table: String, name: String, constraint: bool },
}

impl fmt::Display for IndexChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexChange::Create { table, index } if index.is_constraint() => write!(
                f,
                "ALTER TABLE {} ADD CONSTRAINT {} UNIQUE ({})",
                table,
                quote_ident(&index.name),
                quote_columns(&index.columns)
            ),
            IndexChange::Create { table, index } => {
                let unique = if index.is_unique() { "UNIQUE " } else { "" };
                let method = index
                    .method
                    .as_deref()
                    .map(|m| format!(" USING {}", m))
                    .unwrap_or_default();
                write!(
                    f,
                    "CREATE {}INDEX {} ON {}{} ({})",
                    unique,
                    quote_ident(&index.name),
                    table,
                    method,
                    quote_columns(&index.columns)
                )
            }
            IndexChange::Drop {
                table,
                name,
                constraint: true,
            } => write!(f, "ALTER TABLE {} DROP CONSTRAINT {}", table, quote_ident(name)),
            IndexChange::Drop { table, name, .. } => {
                write!(f, "DROP INDEX {}{}", schema_prefix(table), quote_ident(name))
            }
        }
    }
}

/// `"blog".` for the quoted table `"blog"."posts"`, empty when unqualified.
/// Indexes live in their table's schema.
fn schema_prefix(table: &str) -> &str {
    match table.rfind("\".\"") {
        Some(dot) => &table[..dot + 2],
        None => "",
    }
}

/// `varchar NOT NULL`, `integer`, ...
pub fn column_definition(attr: &Attribute) -> String {
    if attr.nullable {
        column_type(attr)
    } else {
        format!("{} NOT NULL", column_type(attr))
    }
}

/// The type the catalog will report for a declared attribute.
///
/// `float(p)` is stored as `real` up to 24 bits of precision and as double
/// precision above that.
fn expected_type(attr: &Attribute) -> String {
    match (attr.ty, attr.size) {
        (AttrType::Number(NumberKind::Float), Some(p)) if p <= 24 => "real".to_string(),
        (AttrType::Number(NumberKind::Float), Some(_)) => "float".to_string(),
        _ => column_type(attr),
    }
}

/// Column adds, then alterations, then drops. The primary key never appears.
pub fn column_changes(entity: &EntitySchema, live: &[LiveColumn]) -> Vec<ColumnChange> {
    let find = |name: &str| live.iter().find(|c| c.field == name);
    let mut adds = Vec::new();
    let mut alters = Vec::new();

    for attr in entity.columns() {
        let Some(actual) = find(&attr.name) else {
            adds.push(ColumnChange::Add {
                name: attr.name.clone(),
                definition: column_definition(attr),
            });
            continue;
        };
        if !actual.canonical_type().eq_ignore_ascii_case(&expected_type(attr)) {
            alters.push(ColumnChange::AlterType {
                name: attr.name.clone(),
                ty: column_type(attr),
            });
        }
        match (actual.nullable, attr.nullable) {
            (true, false) => alters.push(ColumnChange::SetNotNull(attr.name.clone())),
            (false, true) => alters.push(ColumnChange::DropNotNull(attr.name.clone())),
            _ => {}
        }
    }

    let drops = live
        .iter()
        .filter(|c| c.field != PRIMARY_KEY && entity.attribute(&c.field).is_none())
        .map(|c| ColumnChange::Drop(c.field.clone()));

    adds.into_iter().chain(alters).chain(drops).collect()
}

/// Index adds, then modifications (drop and re-add), then drops.
pub fn index_changes(entity: &EntitySchema, live: &[LiveIndex]) -> Vec<IndexChange> {
    let table = entity.table_escaped();
    let find = |name: &str| live.iter().find(|i| i.name == name);
    let create = |index: &IndexDef| IndexChange::Create {
        table: table.clone(),
        index: index.clone(),
    };
    let drop = |actual: &LiveIndex| IndexChange::Drop {
        table: table.clone(),
        name: actual.name.clone(),
        constraint: actual.constraint,
    };

    let mut adds = Vec::new();
    let mut modified = Vec::new();
    for index in &entity.indexes {
        match find(&index.name) {
            None => adds.push(create(index)),
            Some(actual) if index_differs(index, actual) => {
                modified.push(drop(actual));
                modified.push(create(index));
            }
            Some(_) => {}
        }
    }

    let drops = live
        .iter()
        .filter(|i| entity.index(&i.name).is_none())
        .map(drop);

    adds.into_iter().chain(modified).chain(drops).collect()
}

fn index_differs(declared: &IndexDef, actual: &LiveIndex) -> bool {
    declared.columns.len() != actual.columns.len()
        || declared.is_unique() != actual.unique
        || declared
            .columns
            .iter()
            .zip(&actual.columns)
            .any(|(a, b)| a.trim() != b.trim())
}

/// `CREATE TABLE` with the serial primary key first, then every declared column.
pub fn create_table_sql(entity: &EntitySchema) -> String {
    let mut lines = vec![format!("{} SERIAL PRIMARY KEY", quote_ident(PRIMARY_KEY))];
    lines.extend(
        entity
            .columns()
            .map(|attr| format!("{} {}", quote_ident(&attr.name), column_definition(attr))),
    );
    format!(
        "CREATE TABLE {} (\n  {}\n)",
        entity.table_escaped(),
        lines.join(",\n  ")
    )
}

/// All column changes folded into one `ALTER TABLE`, or `None` when there are none.
pub fn alter_table_sql(entity: &EntitySchema, changes: &[ColumnChange]) -> Option<String> {
    if changes.is_empty() {
        return None;
    }
    let fragments: Vec<String> = changes.iter().map(ToString::to_string).collect();
    Some(format!(
        "ALTER TABLE {} {}",
        entity.table_escaped(),
        fragments.join(", ")
    ))
}

/// What reconciliation would do for one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityPlan {
    /// The table does not exist.
    Create {
        table_sql: String,
        indexes: Vec<IndexChange>,
    },
    Alter {
        alter_sql: Option<String>,
        columns: Vec<ColumnChange>,
        indexes: Vec<IndexChange>,
    },
}

impl EntityPlan {
    /// Plan against a snapshot of the live table. No live columns means the
    /// table is missing.
    pub fn new(entity: &EntitySchema, columns: &[LiveColumn], indexes: &[LiveIndex]) -> Self {
        if columns.is_empty() {
            return EntityPlan::Create {
                table_sql: create_table_sql(entity),
                indexes: index_changes(entity, &[]),
            };
        }
        let changes = column_changes(entity, columns);
        EntityPlan::Alter {
            alter_sql: alter_table_sql(entity, &changes),
            columns: changes,
            indexes: index_changes(entity, indexes),
        }
    }

    /// True when the live table already matches.
    pub fn is_empty(&self) -> bool {
        match self {
            EntityPlan::Create { .. } => false,
            EntityPlan::Alter {
                columns, indexes, ..
            } => columns.is_empty() && indexes.is_empty(),
        }
    }

    /// Statements in execution order.
    pub fn statements(&self) -> Vec<String> {
        let (head, indexes) = match self {
            EntityPlan::Create { table_sql, indexes } => (Some(table_sql.clone()), indexes),
            EntityPlan::Alter {
                alter_sql, indexes, ..
            } => (alter_sql.clone(), indexes),
        };
        head.into_iter()
            .chain(indexes.iter().map(ToString::to_string))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{EntityOptions, Registry};
    use pretty_assertions::assert_eq;

    fn posts(extra: Vec<Attribute>, options: EntityOptions) -> EntitySchema {
        let mut attrs = vec![
            Attribute::string("title").not_null(),
            Attribute::integer("userId"),
        ];
        attrs.extend(extra);
        Registry::new().register_entity("posts", attrs, options).clone()
    }

    fn live(field: &str, ty: &str, nullable: bool) -> LiveColumn {
        LiveColumn {
            nullable,
            ..LiveColumn::new(field, ty)
        }
    }

    fn reconciled() -> Vec<LiveColumn> {
        vec![
            live("id", "integer", false),
            live("title", "varchar", false),
            live("userId", "integer", true),
        ]
    }

    #[test]
    fn test_create_table() {
        assert_eq!(
            create_table_sql(&posts(vec![], EntityOptions::default())),
            "CREATE TABLE \"posts\" (\n  \"id\" SERIAL PRIMARY KEY,\n  \"title\" varchar NOT NULL,\n  \"userId\" integer\n)"
        );
    }

    #[test]
    fn test_no_changes_when_reconciled() {
        let entity = posts(vec![], EntityOptions::default());
        assert!(column_changes(&entity, &reconciled()).is_empty());
        assert!(EntityPlan::new(&entity, &reconciled(), &[]).is_empty());
    }

    #[test]
    fn test_added_attribute_is_one_add() {
        let entity = posts(vec![Attribute::date("publishedAt")], EntityOptions::default());
        let changes = column_changes(&entity, &reconciled());
        assert_eq!(
            changes,
            vec![ColumnChange::Add {
                name: "publishedAt".into(),
                definition: "timestamp with time zone".into()
            }]
        );
        assert_eq!(
            alter_table_sql(&entity, &changes).unwrap(),
            "ALTER TABLE \"posts\" ADD COLUMN \"publishedAt\" timestamp with time zone"
        );
    }

    #[test]
    fn test_change_ordering() {
        let entity = posts(vec![Attribute::text("body")], EntityOptions::default());
        let current = vec![
            live("id", "integer", false),
            live("legacy", "varchar", true),
            live("title", "text", true),
            live("userId", "INTEGER", false),
        ];
        let sql: Vec<String> = column_changes(&entity, &current).iter().map(ToString::to_string).collect();
        assert_eq!(
            sql,
            vec![
                "ADD COLUMN \"body\" text",
                "ALTER COLUMN \"title\" TYPE varchar",
                "ALTER COLUMN \"title\" SET NOT NULL",
                "ALTER COLUMN \"userId\" DROP NOT NULL",
                "DROP COLUMN \"legacy\"",
            ]
        );
    }

    #[test]
    fn test_sized_types_compare_with_catalog_precision() {
        let entity = posts(
            vec![
                Attribute::string("slug").size(64),
                Attribute::number("ratio", NumberKind::Float).size(10),
            ],
            EntityOptions::default(),
        );
        let mut current = reconciled();
        current.push(LiveColumn {
            length: Some(64),
            ..live("slug", "varchar", true)
        });
        current.push(live("ratio", "real", true));
        assert!(column_changes(&entity, &current).is_empty());
    }

    #[test]
    fn test_index_changes() {
        let entity = posts(
            vec![Attribute::string("slug").unique()],
            EntityOptions::default()
                .index(IndexDef::new("posts_user_title", ["userId", "title"]))
                .index(IndexDef::new("posts_search", ["title"]).using("gin")),
        );
        let current = vec![
            LiveIndex {
                name: "posts_user_title".into(),
                unique: false,
                constraint: false,
                columns: vec!["title".into(), "userId".into()],
            },
            LiveIndex {
                name: "posts_old_key".into(),
                unique: true,
                constraint: true,
                columns: vec!["title".into()],
            },
            LiveIndex {
                name: "posts_old_idx".into(),
                unique: false,
                constraint: false,
                columns: vec!["userId".into()],
            },
        ];
        let sql: Vec<String> = index_changes(&entity, &current).iter().map(ToString::to_string).collect();
        assert_eq!(
            sql,
            vec![
                "CREATE INDEX \"posts_search\" ON \"posts\" USING gin (\"title\")",
                "ALTER TABLE \"posts\" ADD CONSTRAINT \"posts_slug_key\" UNIQUE (\"slug\")",
                "DROP INDEX \"posts_user_title\"",
                "CREATE INDEX \"posts_user_title\" ON \"posts\" (\"userId\",\"title\")",
                "ALTER TABLE \"posts\" DROP CONSTRAINT \"posts_old_key\"",
                "DROP INDEX \"posts_old_idx\"",
            ]
        );
    }

    #[test]
    fn test_qualified_table_index_statements() {
        let entity = Registry::new()
            .register_entity(
                "posts",
                vec![Attribute::string("title").indexed()],
                EntityOptions::default().table("blog.posts"),
            )
            .clone();
        let current = vec![
            LiveIndex {
                name: "posts_old_idx".into(),
                unique: false,
                constraint: false,
                columns: vec!["title".into()],
            },
            LiveIndex {
                name: "posts_old_key".into(),
                unique: true,
                constraint: true,
                columns: vec!["title".into()],
            },
        ];
        let sql: Vec<String> = index_changes(&entity, &current).iter().map(ToString::to_string).collect();
        assert_eq!(
            sql,
            vec![
                "CREATE INDEX \"posts_title_idx\" ON \"blog\".\"posts\" (\"title\")",
                "DROP INDEX \"blog\".\"posts_old_idx\"",
                "ALTER TABLE \"blog\".\"posts\" DROP CONSTRAINT \"posts_old_key\"",
            ]
        );
        let unqualified = IndexChange::Drop {
            table: "\"posts\"".into(),
            name: "posts_old_idx".into(),
            constraint: false,
        };
        assert_eq!(unqualified.to_string(), "DROP INDEX \"posts_old_idx\"");
    }

    #[test]
    fn test_unique_non_btree_is_plain_unique_index() {
        let change = IndexChange::Create {
            table: "\"t\"".into(),
            index: IndexDef::new("t_h", ["a"]).unique().using("hash"),
        };
        assert_eq!(change.to_string(), "CREATE UNIQUE INDEX \"t_h\" ON \"t\" USING hash (\"a\")");
    }

    #[test]
    fn test_missing_table_plan() {
        let entity = posts(vec![Attribute::string("slug").indexed()], EntityOptions::default());
        let plan = EntityPlan::new(&entity, &[], &[]);
        assert!(!plan.is_empty());
        let statements = plan.statements();
        assert_eq!(statements.len(), 2);
        assert!(statements[0].starts_with("CREATE TABLE \"posts\""));
        assert_eq!(statements[1], "CREATE INDEX \"posts_slug_idx\" ON \"posts\" (\"slug\")");
    }
}
