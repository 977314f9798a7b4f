//! Test executors.
//!
//! `ScriptedExecutor` replays canned responses and records every statement.
//! `Catalog` keeps an in-memory table catalog, answers the introspection
//! queries and applies the DDL the adapter emits, so reconciliation can be
//! exercised end to end without a server.

#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use futures::future::BoxFuture;
use pgadapter::engine::{Executor, Row};
use pgadapter::error::{AdapterError, AdapterResult};
use serde_json::json;

pub fn row(value: serde_json::Value) -> Row {
    serde_json::from_value(value).expect("row must be an object")
}

#[derive(Default)]
pub struct ScriptedExecutor {
    responses: Mutex<VecDeque<AdapterResult<Vec<Row>>>>,
    log: Mutex<Vec<String>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then_rows(self, rows: Vec<serde_json::Value>) -> Self {
        let rows = rows.into_iter().map(row).collect();
        self.responses.lock().unwrap().push_back(Ok(rows));
        self
    }

    pub fn then_error(self, message: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(AdapterError::Transport(message.to_string())));
        self
    }

    pub fn statements(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn last(&self) -> String {
        self.statements().last().cloned().unwrap_or_default()
    }
}

impl Executor for ScriptedExecutor {
    fn execute<'a>(&'a self, sql: &'a str) -> BoxFuture<'a, AdapterResult<Vec<Row>>> {
        self.log.lock().unwrap().push(sql.to_string());
        let next = self.responses.lock().unwrap().pop_front();
        Box::pin(async move { next.unwrap_or_else(|| Ok(Vec::new())) })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FakeColumn {
    pub name: String,
    pub udt: String,
    pub length: Option<u32>,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
    pub nullable: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FakeIndex {
    pub name: String,
    pub unique: bool,
    pub constraint: bool,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FakeTable {
    pub columns: Vec<FakeColumn>,
    pub indexes: Vec<FakeIndex>,
}

#[derive(Default)]
struct CatalogState {
    tables: BTreeMap<String, FakeTable>,
    log: Vec<String>,
    fail_on: Vec<String>,
}

#[derive(Default)]
pub struct Catalog {
    state: Mutex<CatalogState>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every statement containing `needle`.
    pub fn fail_on(self, needle: &str) -> Self {
        self.state.lock().unwrap().fail_on.push(needle.to_string());
        self
    }

    pub fn table(&self, name: &str) -> Option<FakeTable> {
        self.state.lock().unwrap().tables.get(name).cloned()
    }

    pub fn statements(&self) -> Vec<String> {
        self.state.lock().unwrap().log.clone()
    }

    /// Executed statements other than introspection queries.
    pub fn ddl(&self) -> Vec<String> {
        self.statements()
            .into_iter()
            .filter(|s| !s.starts_with("SELECT"))
            .collect()
    }

    pub fn clear_log(&self) {
        self.state.lock().unwrap().log.clear();
    }

    fn run(&self, sql: &str) -> AdapterResult<Vec<Row>> {
        let mut state = self.state.lock().unwrap();
        state.log.push(sql.to_string());
        if state.fail_on.iter().any(|n| sql.contains(n.as_str())) {
            return Err(AdapterError::Transport(format!("rejected: {}", sql)));
        }
        let sql = sql.trim().trim_end_matches(';');

        if sql.contains("information_schema.columns") {
            let table = between(sql, "table_name = E'", "'").unwrap_or_default();
            let rows = state
                .tables
                .get(table)
                .map(|t| t.columns.iter().map(column_row).collect())
                .unwrap_or_default();
            return Ok(rows);
        }
        if sql.contains("FROM pg_index") {
            let quoted = between(sql, "indrelid = E'", "'::regclass").unwrap_or_default();
            let table = quoted.replace("\\\"", "");
            let Some(t) = state.tables.get(&table) else {
                return Err(AdapterError::Transport(format!("relation {} does not exist", table)));
            };
            return Ok(t.indexes.iter().map(index_row).collect());
        }
        if let Some(rest) = sql.strip_prefix("CREATE TABLE ") {
            let (table, rest) = ident(rest);
            if state.tables.contains_key(&table) {
                return Err(AdapterError::Transport(format!("relation {} already exists", table)));
            }
            let body = rest.trim().trim_start_matches('(').trim_end_matches(')');
            let mut fake = FakeTable::default();
            for line in body.split(",\n") {
                let (name, def) = ident(line.trim());
                fake.columns.push(parse_definition(name, def));
            }
            state.tables.insert(table, fake);
            return Ok(Vec::new());
        }
        if let Some(rest) = sql.strip_prefix("ALTER TABLE ") {
            let (table, rest) = ident(rest);
            let t = state
                .tables
                .get_mut(&table)
                .ok_or_else(|| AdapterError::Transport(format!("relation {} does not exist", table)))?;
            let mut next = t.clone();
            for fragment in rest.split(", ") {
                alter(&mut next, fragment.trim())?;
            }
            *t = next;
            return Ok(Vec::new());
        }
        if let Some(rest) = sql.strip_prefix("CREATE ") {
            let unique = rest.starts_with("UNIQUE ");
            let rest = rest.trim_start_matches("UNIQUE ").trim_start_matches("INDEX ");
            let (name, rest) = ident(rest);
            let (table, rest) = ident(rest.trim_start_matches("ON "));
            let t = state
                .tables
                .get_mut(&table)
                .ok_or_else(|| AdapterError::Transport(format!("relation {} does not exist", table)))?;
            let columns = column_list(rest);
            t.indexes.push(FakeIndex { name, unique, constraint: false, columns });
            return Ok(Vec::new());
        }
        if let Some(rest) = sql.strip_prefix("DROP INDEX ") {
            let (name, _) = ident(rest);
            for t in state.tables.values_mut() {
                if let Some(pos) = t.indexes.iter().position(|i| i.name == name) {
                    if t.indexes[pos].constraint {
                        return Err(AdapterError::Transport(format!(
                            "cannot drop index {} because constraint {} requires it",
                            name, name
                        )));
                    }
                    t.indexes.remove(pos);
                    return Ok(Vec::new());
                }
            }
            return Err(AdapterError::Transport(format!("index {} does not exist", name)));
        }
        Err(AdapterError::Transport(format!("unsupported statement: {}", sql)))
    }
}

impl Executor for Catalog {
    fn execute<'a>(&'a self, sql: &'a str) -> BoxFuture<'a, AdapterResult<Vec<Row>>> {
        let result = self.run(sql);
        Box::pin(async move { result })
    }
}

fn between<'a>(s: &'a str, start: &str, end: &str) -> Option<&'a str> {
    let from = s.find(start)? + start.len();
    let len = s[from..].find(end)?;
    Some(&s[from..from + len])
}

/// Split a leading `"ident"` from the rest.
fn ident(s: &str) -> (String, &str) {
    let s = s.trim_start();
    let body = &s[1..];
    let end = body.find('"').unwrap_or(body.len());
    (body[..end].to_string(), body[end + 1..].trim_start())
}

fn column_list(s: &str) -> Vec<String> {
    let inner = between(s, "(", ")").unwrap_or_default();
    inner.split(',').map(|c| c.trim().trim_matches('"').to_string()).collect()
}

fn parse_definition(name: String, def: &str) -> FakeColumn {
    if def.starts_with("SERIAL") {
        return FakeColumn {
            name,
            udt: "int4".into(),
            length: None,
            precision: Some(32),
            scale: Some(0),
            nullable: false,
        };
    }
    let (ty, nullable) = match def.strip_suffix(" NOT NULL") {
        Some(ty) => (ty, false),
        None => (def, true),
    };
    let mut column = typed(ty.trim());
    column.name = name;
    column.nullable = nullable;
    column
}

/// The catalog's view of a declared type.
fn typed(ty: &str) -> FakeColumn {
    let (base, args) = match ty.split_once('(') {
        Some((base, args)) => (base, Some(args.trim_end_matches(')'))),
        None => (ty, None),
    };
    let first = args.and_then(|a| a.split(',').next()).and_then(|n| n.trim().parse().ok());
    let second = args.and_then(|a| a.split(',').nth(1)).and_then(|n| n.trim().parse().ok());
    let (udt, length, precision, scale) = match base {
        "varchar" => ("varchar", first, None, None),
        "text" => ("text", None, None, None),
        "integer" => ("int4", None, Some(32), Some(0)),
        "float" if first.is_some_and(|p: u32| p <= 24) => ("float4", None, Some(24), None),
        "float" => ("float8", None, Some(53), None),
        "numeric" => ("numeric", None, first, first.map(|_| second.unwrap_or(0))),
        "boolean" => ("bool", None, None, None),
        "timestamp with time zone" => ("timestamptz", None, None, None),
        other => (other, None, None, None),
    };
    FakeColumn {
        name: String::new(),
        udt: udt.to_string(),
        length,
        precision,
        scale,
        nullable: true,
    }
}

fn alter(table: &mut FakeTable, fragment: &str) -> AdapterResult<()> {
    let missing = |name: &str| AdapterError::Transport(format!("column {} does not exist", name));
    if let Some(rest) = fragment.strip_prefix("ADD COLUMN ") {
        let (name, def) = ident(rest);
        if table.columns.iter().any(|c| c.name == name) {
            return Err(AdapterError::Transport(format!("column {} already exists", name)));
        }
        table.columns.push(parse_definition(name, def));
    } else if let Some(rest) = fragment.strip_prefix("ALTER COLUMN ") {
        let (name, action) = ident(rest);
        let column = table
            .columns
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| missing(&name))?;
        match action {
            "SET NOT NULL" => column.nullable = false,
            "DROP NOT NULL" => column.nullable = true,
            other => {
                let ty = other.trim_start_matches("TYPE ").trim();
                let replaced = typed(ty);
                column.udt = replaced.udt;
                column.length = replaced.length;
                column.precision = replaced.precision;
                column.scale = replaced.scale;
            }
        }
    } else if let Some(rest) = fragment.strip_prefix("DROP COLUMN ") {
        let (name, _) = ident(rest);
        let before = table.columns.len();
        table.columns.retain(|c| c.name != name);
        if table.columns.len() == before {
            return Err(missing(&name));
        }
        table.indexes.retain(|i| !i.columns.contains(&name));
    } else if let Some(rest) = fragment.strip_prefix("ADD CONSTRAINT ") {
        let (name, rest) = ident(rest);
        let columns = column_list(rest);
        table.indexes.push(FakeIndex { name, unique: true, constraint: true, columns });
    } else if let Some(rest) = fragment.strip_prefix("DROP CONSTRAINT ") {
        let (name, _) = ident(rest);
        let before = table.indexes.len();
        table.indexes.retain(|i| !(i.constraint && i.name == name));
        if table.indexes.len() == before {
            return Err(AdapterError::Transport(format!("constraint {} does not exist", name)));
        }
    } else {
        return Err(AdapterError::Transport(format!("unsupported fragment: {}", fragment)));
    }
    Ok(())
}

fn column_row(c: &FakeColumn) -> Row {
    row(json!({
        "Field": c.name,
        "Type": c.udt,
        "Null": if c.nullable { "YES" } else { "NO" },
        "Default": if c.name == "id" { json!("nextval('seq'::regclass)") } else { json!(null) },
        "Length": c.length,
        "Precision": c.precision,
        "Scale": c.scale,
    }))
}

fn index_row(i: &FakeIndex) -> Row {
    row(json!({
        "Name": i.name,
        "Unique": i.unique,
        "Constraint": i.constraint,
        "Columns": i.columns.join(","),
    }))
}
