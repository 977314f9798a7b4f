use super::values::Value;
use crate::error::{AdapterError, AdapterResult};

/// A single-key operator object from a filter, e.g. `{gt: 5}` or `{inq: [1, 2]}`.
#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    Between(Value, Value),
    /// Set membership. An empty set compiles to `FALSE`.
    Inq(Vec<Value>),
    /// Negated set membership. An empty set compiles to `TRUE`.
    Nin(Vec<Value>),
    Neq(Value),
    Like(Value),
    NLike(Value),
    /// Any other operator token, rendered verbatim as an infix operator
    /// (`ilike`, `@>`, ...). The token is trusted input.
    Raw { op: String, value: Value },
}

impl Operator {
    /// Build an operator from its filter key and JSON operand.
    pub fn from_json(key: &str, operand: serde_json::Value) -> AdapterResult<Self> {
        let op = match key {
            "gt" => Operator::Gt(operand.into()),
            "gte" => Operator::Gte(operand.into()),
            "lt" => Operator::Lt(operand.into()),
            "lte" => Operator::Lte(operand.into()),
            "neq" => Operator::Neq(operand.into()),
            "like" => Operator::Like(operand.into()),
            "nlike" => Operator::NLike(operand.into()),
            "between" => match operand {
                serde_json::Value::Array(mut bounds) if bounds.len() == 2 => {
                    let hi = bounds.pop().unwrap_or_default();
                    let lo = bounds.pop().unwrap_or_default();
                    Operator::Between(lo.into(), hi.into())
                }
                other => {
                    return Err(AdapterError::invalid_filter(format!(
                        "between expects a two-element array, got {}",
                        other
                    )));
                }
            },
            "inq" | "nin" => {
                let items: Vec<Value> = match operand {
                    serde_json::Value::Array(items) => items.into_iter().map(Value::from).collect(),
                    scalar => vec![scalar.into()],
                };
                if key == "inq" {
                    Operator::Inq(items)
                } else {
                    Operator::Nin(items)
                }
            }
            other => Operator::Raw {
                op: other.to_string(),
                value: operand.into(),
            },
        };
        Ok(op)
    }
}

/// A regular-expression match against a column (`~` or `~*`).
///
/// The source text is emitted verbatim inside single quotes; it is trusted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    pub source: String,
    pub case_insensitive: bool,
}

impl Pattern {
    /// A case-sensitive pattern (`~`).
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            case_insensitive: false,
        }
    }

    /// Match with `~*`.
    pub fn case_insensitive(mut self) -> Self {
        self.case_insensitive = true;
        self
    }

    /// Parse `/source/flags` or a bare source string.
    pub fn parse(text: &str) -> Self {
        if let Some(rest) = text.strip_prefix('/')
            && let Some(end) = rest.rfind('/')
        {
            let flags = &rest[end + 1..];
            return Self {
                source: rest[..end].to_string(),
                case_insensitive: flags.contains('i'),
            };
        }
        Self::new(text)
    }
}
