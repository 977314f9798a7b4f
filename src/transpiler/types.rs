//! Mapping between abstract attribute types and PostgreSQL column types,
//! plus type-aware encoding of stored values.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

use super::encode::{NULL, escape_literal, escape_string, float_literal, timestamp_literal};
use crate::ast::{Operator, Value};
use crate::error::{AdapterError, AdapterResult};
use crate::schema::{AttrType, Attribute, NumberKind};

/// Column type for an attribute, e.g. `varchar(255)` or `timestamp with time zone`.
pub fn column_type(attr: &Attribute) -> String {
    let size = attr.size.map(|s| format!("({})", s)).unwrap_or_default();
    match attr.ty {
        AttrType::String | AttrType::Json | AttrType::Array => format!("varchar{}", size),
        AttrType::Text => format!("text{}", size),
        AttrType::Number(NumberKind::Float) => format!("float{}", size),
        AttrType::Number(NumberKind::Numeric) => format!("numeric{}", size),
        AttrType::Number(NumberKind::Integer) => format!("integer{}", size),
        AttrType::Date => "timestamp with time zone".to_string(),
        AttrType::Boolean => "boolean".to_string(),
    }
}

/// Canonical name for a catalog `udt_name`, matching what [`column_type`] emits.
/// Unknown names pass through unchanged.
pub fn normalize_pg_type(udt_name: &str) -> &str {
    match udt_name {
        "int4" => "integer",
        "int8" => "bigint",
        "int2" => "smallint",
        "bool" => "boolean",
        "float8" => "float",
        "float4" => "real",
        "timestamptz" => "timestamp with time zone",
        "timestamp" => "timestamp without time zone",
        "bpchar" => "char",
        other => other,
    }
}

/// `DEFAULT` for auto-increment attributes, `NULL` otherwise.
fn default_or_null(attr: &Attribute) -> String {
    if attr.auto_increment {
        "DEFAULT".to_string()
    } else {
        NULL.to_string()
    }
}

/// Encode a value for INSERT/UPDATE text according to its attribute's type.
pub fn stored_value(attr: &Attribute, value: &Value) -> AdapterResult<String> {
    typed_value(attr, value, &default_or_null(attr))
}

/// Encode a comparand for a WHERE clause. Absent values are always `NULL`,
/// never `DEFAULT`.
pub fn condition_value(attr: &Attribute, value: &Value) -> AdapterResult<String> {
    typed_value(attr, value, NULL)
}

/// `absent` is emitted for NULL and for values the type treats as missing.
fn typed_value(attr: &Attribute, value: &Value, absent: &str) -> AdapterResult<String> {
    if value.is_null() {
        return Ok(absent.to_string());
    }
    if attr.ty.is_serialized() {
        return Ok(escape_string(&value.to_json_string()));
    }
    match attr.ty {
        AttrType::Number(_) => Ok(number_value(value, absent)),
        AttrType::Date => match coerce_date(value)? {
            Some(d) => Ok(timestamp_literal(&d)),
            None => Ok(absent.to_string()),
        },
        _ => Ok(escape_literal(value)),
    }
}

/// Encode the operand(s) of an operator object.
///
/// `between` yields `a AND b`; `inq`/`nin` yield a comma list of plain
/// literals (empty for an empty set); the rest encode their single operand.
pub fn operand_value(attr: &Attribute, op: &Operator) -> AdapterResult<String> {
    match op {
        Operator::Between(lo, hi) => Ok(format!(
            "{} AND {}",
            condition_value(attr, lo)?,
            condition_value(attr, hi)?
        )),
        Operator::Inq(items) | Operator::Nin(items) => Ok(items
            .iter()
            .map(escape_literal)
            .collect::<Vec<_>>()
            .join(",")),
        Operator::Gt(v)
        | Operator::Gte(v)
        | Operator::Lt(v)
        | Operator::Lte(v)
        | Operator::Neq(v)
        | Operator::Like(v)
        | Operator::NLike(v)
        | Operator::Raw { value: v, .. } => condition_value(attr, v),
    }
}

/// Numbers are emitted as bare decimal text. Falsy non-zero input (empty
/// string, `false`) is treated as absent.
fn number_value(value: &Value, absent: &str) -> String {
    match value {
        Value::Int(n) => n.to_string(),
        Value::Float(n) => float_literal(*n),
        Value::Bool(false) => absent.to_string(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                absent.to_string()
            } else if let Ok(n) = trimmed.parse::<i64>() {
                n.to_string()
            } else if let Ok(n) = trimmed.parse::<f64>()
                && n.is_finite()
            {
                n.to_string()
            } else {
                escape_string(s)
            }
        }
        other => escape_literal(other),
    }
}

/// Coerce a value to a timestamp. `Ok(None)` means "treat as absent".
fn coerce_date(value: &Value) -> AdapterResult<Option<DateTime<Utc>>> {
    match value {
        Value::Date(d) => Ok(Some(*d)),
        Value::Null | Value::Bool(false) | Value::Int(0) => Ok(None),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::Int(ms) => millis(*ms).map(Some),
        Value::Float(ms) if ms.is_finite() => {
            if *ms == 0.0 {
                Ok(None)
            } else {
                millis(*ms as i64).map(Some)
            }
        }
        Value::String(s) => parse_date(s.trim()).map(Some).ok_or_else(|| {
            AdapterError::invalid_value(format!("cannot interpret '{}' as a date", s))
        }),
        other => Err(AdapterError::invalid_value(format!(
            "cannot interpret {} as a date",
            other
        ))),
    }
}

fn millis(ms: i64) -> AdapterResult<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| AdapterError::invalid_value(format!("timestamp {} out of range", ms)))
}

/// RFC 3339, then `YYYY-MM-DD[ T]HH:MM:SS[.f]` as UTC, then a bare date at midnight UTC.
fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(d) = DateTime::parse_from_rfc3339(s) {
        return Some(d.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
