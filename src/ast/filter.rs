//! Abstract filters: predicates plus ordering and pagination, before compilation.

use super::operators::{Operator, Pattern};
use super::values::Value;
use crate::error::{AdapterError, AdapterResult};

/// What a single attribute key in a filter map asks for.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Equality, or `IS NULL` for a null comparand.
    Eq(Value),
    Op(Operator),
    Pattern(Pattern),
}

/// One entry of a filter map, in the order the caller wrote it.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Attr { name: String, cond: Condition },
    /// `or: [...]`: each branch is ANDed internally, branches are ORed.
    Or(Vec<Where>),
    /// `arbitrary: "..."`: a raw SQL fragment, emitted verbatim.
    Arbitrary(String),
}

/// A filter predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Where {
    /// A raw SQL condition, emitted verbatim.
    Raw(String),
    /// A template with `?` placeholders substituted left-to-right by encoded literals.
    Template { sql: String, params: Vec<Value> },
    /// Attribute conditions and sentinels, ANDed in order.
    Map(Vec<Clause>),
}

impl Default for Where {
    fn default() -> Self {
        Where::Map(Vec::new())
    }
}

impl Where {
    /// An empty map; compiles to no clause.
    pub fn new() -> Self {
        Self::default()
    }

    /// A raw SQL condition, emitted verbatim.
    pub fn raw(sql: impl Into<String>) -> Self {
        Where::Raw(sql.into())
    }

    /// `sql` with each `?` replaced by the next encoded parameter.
    pub fn template(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Where::Template {
            sql: sql.into(),
            params,
        }
    }

    fn push(mut self, clause: Clause) -> Self {
        match &mut self {
            Where::Map(clauses) => clauses.push(clause),
            // Builders on a raw/template predicate start a fresh map.
            _ => self = Where::Map(vec![clause]),
        }
        self
    }

    /// `"name" = value` (or `IS NULL`).
    pub fn eq(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(Clause::Attr {
            name: name.into(),
            cond: Condition::Eq(value.into()),
        })
    }

    /// `"name" <op> operand`, e.g. `Operator::Gt(5.into())`.
    pub fn op(self, name: impl Into<String>, op: Operator) -> Self {
        self.push(Clause::Attr {
            name: name.into(),
            cond: Condition::Op(op),
        })
    }

    /// `"name" ~ 'source'`, or `~*` when case-insensitive.
    pub fn pattern(self, name: impl Into<String>, pattern: Pattern) -> Self {
        self.push(Clause::Attr {
            name: name.into(),
            cond: Condition::Pattern(pattern),
        })
    }

    /// Branches are each ANDed, then ORed together. Branches that compile to
    /// nothing are skipped, and an empty group emits no clause.
    pub fn or(self, branches: Vec<Where>) -> Self {
        self.push(Clause::Or(branches))
    }

    /// A trusted raw fragment, emitted verbatim.
    pub fn arbitrary(self, sql: impl Into<String>) -> Self {
        self.push(Clause::Arbitrary(sql.into()))
    }

    /// Parse the dynamic filter shape hosts send:
    ///
    /// - `"raw sql"`
    /// - `["tpl with ?", v1, v2]`
    /// - `{ attr: value | {op: operand} | {"regexp": "/src/i"}, "or": [...], "arbitrary": "..." }`
    pub fn from_json(value: serde_json::Value) -> AdapterResult<Self> {
        match value {
            serde_json::Value::String(sql) => Ok(Where::Raw(sql)),
            serde_json::Value::Array(items) => {
                let mut items = items.into_iter();
                let sql = match items.next() {
                    Some(serde_json::Value::String(sql)) => sql,
                    _ => {
                        return Err(AdapterError::invalid_filter(
                            "template filter must start with a string",
                        ));
                    }
                };
                Ok(Where::Template {
                    sql,
                    params: items.map(Value::from).collect(),
                })
            }
            serde_json::Value::Object(map) => {
                let mut clauses = Vec::with_capacity(map.len());
                for (key, value) in map {
                    let clause = match (key.as_str(), value) {
                        ("or", serde_json::Value::Array(branches)) => Clause::Or(
                            branches
                                .into_iter()
                                .map(Where::from_json)
                                .collect::<AdapterResult<Vec<_>>>()?,
                        ),
                        ("arbitrary", serde_json::Value::String(sql)) => Clause::Arbitrary(sql),
                        ("arbitrary", other) => Clause::Arbitrary(other.to_string()),
                        (name, value) => Clause::Attr {
                            name: name.to_string(),
                            cond: condition_from_json(value)?,
                        },
                    };
                    clauses.push(clause);
                }
                Ok(Where::Map(clauses))
            }
            other => Err(AdapterError::invalid_filter(format!(
                "unsupported filter: {}",
                other
            ))),
        }
    }
}

fn condition_from_json(value: serde_json::Value) -> AdapterResult<Condition> {
    if let serde_json::Value::Object(map) = &value
        && map.len() == 1
        && let Some((key, operand)) = map.iter().next()
    {
        if key == "regexp" {
            return match operand {
                serde_json::Value::String(text) => Ok(Condition::Pattern(Pattern::parse(text))),
                other => Err(AdapterError::invalid_filter(format!(
                    "regexp expects a string, got {}",
                    other
                ))),
            };
        }
        return Ok(Condition::Op(Operator::from_json(key, operand.clone())?));
    }
    Ok(Condition::Eq(value.into()))
}

/// A complete filter: predicate, ordering and pagination.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub conditions: Option<Where>,
    /// Whitespace separated columns, each optionally followed by `ASC`/`DESC`.
    pub order: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    /// A fully custom clause that bypasses compilation.
    pub prebuilt: Option<String>,
}

impl Filter {
    /// Everything: no predicate, order or limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// A filter with only a predicate.
    pub fn matching(conditions: Where) -> Self {
        Self {
            conditions: Some(conditions),
            ..Self::default()
        }
    }

    /// A complete clause string used as-is, bypassing compilation.
    pub fn prebuilt(sql: impl Into<String>) -> Self {
        Self {
            prebuilt: Some(sql.into()),
            ..Self::default()
        }
    }

    /// Replace the predicate.
    pub fn filter(mut self, conditions: Where) -> Self {
        self.conditions = Some(conditions);
        self
    }

    /// Order spec, e.g. `"createdAt DESC, id"`.
    pub fn order(mut self, order: impl Into<String>) -> Self {
        self.order = Some(order.into());
        self
    }

    /// Emits `LIMIT n OFFSET m`; without a limit the offset is ignored.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Rows to skip; only used together with a limit.
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Parse `{ "where": ..., "order": "...", "limit": n, "offset": n }`.
    pub fn from_json(value: serde_json::Value) -> AdapterResult<Self> {
        let serde_json::Value::Object(mut map) = value else {
            return Err(AdapterError::invalid_filter("filter must be an object"));
        };
        let conditions = match map.remove("where") {
            None | Some(serde_json::Value::Null) => None,
            Some(w) => Some(Where::from_json(w)?),
        };
        let order = match map.remove("order") {
            Some(serde_json::Value::String(s)) => Some(s),
            Some(serde_json::Value::Array(terms)) => Some(
                terms
                    .iter()
                    .filter_map(|t| t.as_str())
                    .collect::<Vec<_>>()
                    .join(" "),
            ),
            _ => None,
        };
        Ok(Self {
            conditions,
            order,
            limit: map.get("limit").and_then(as_count),
            offset: map.get("offset").and_then(as_count),
            prebuilt: None,
        })
    }
}

fn as_count(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_where_from_object_keeps_order() {
        let w = Where::from_json(json!({"b": 1, "a": null, "arbitrary": "x > 1"})).unwrap();
        assert_eq!(
            w,
            Where::new()
                .eq("b", 1)
                .eq("a", Value::Null)
                .arbitrary("x > 1")
        );
    }

    #[test]
    fn test_where_from_template() {
        let w = Where::from_json(json!(["title = ?", "t"])).unwrap();
        assert_eq!(w, Where::template("title = ?", vec![Value::from("t")]));
        assert!(Where::from_json(json!([1, 2])).is_err());
    }

    #[test]
    fn test_where_operators_and_patterns() {
        let w = Where::from_json(json!({
            "title": {"like": "%Test%"},
            "body": {"regexp": "/^Post/i"},
            "or": [{"a": 1}, {"a": 2}]
        }))
        .unwrap();
        assert_eq!(
            w,
            Where::new()
                .op("title", Operator::Like("%Test%".into()))
                .pattern("body", Pattern::new("^Post").case_insensitive())
                .or(vec![Where::new().eq("a", 1), Where::new().eq("a", 2)])
        );
    }

    #[test]
    fn test_multi_key_object_is_a_plain_value() {
        let w = Where::from_json(json!({"meta": {"gt": 1, "lt": 2}})).unwrap();
        assert_eq!(w, Where::new().eq("meta", Value::Json(json!({"gt": 1, "lt": 2}))));
    }

    #[test]
    fn test_filter_from_json() {
        let f = Filter::from_json(json!({
            "where": {"title": "t"},
            "order": "title DESC",
            "limit": 10,
            "offset": "5"
        }))
        .unwrap();
        assert_eq!(
            f,
            Filter::matching(Where::new().eq("title", "t"))
                .order("title DESC")
                .limit(10)
                .offset(5)
        );
    }
}
