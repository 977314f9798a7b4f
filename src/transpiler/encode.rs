//! Literal and identifier encoding for generated PostgreSQL text.
//!
//! Strings are emitted as escape-string constants (`E'...'`) so that every
//! quote and control byte is written as a backslash escape. Identifiers are
//! always double-quoted, with embedded quotes doubled.

use chrono::{DateTime, Utc};

use crate::ast::Value;
use crate::ast::values::iso8601;

/// The SQL NULL token. Callers compare encoded text against it to choose
/// `IS NULL` / `IS NOT NULL`.
pub const NULL: &str = "NULL";

/// Encode a value as a SQL literal.
pub fn escape_literal(value: &Value) -> String {
    match value {
        Value::Null => NULL.to_string(),
        Value::Bool(true) => "true".to_string(),
        Value::Bool(false) => "false".to_string(),
        Value::Int(n) => n.to_string(),
        Value::Float(n) => float_literal(*n),
        Value::Date(d) => timestamp_literal(d),
        Value::String(s) => escape_string(s),
        Value::Json(v) => escape_string(&v.to_string()),
    }
}

/// Finite floats as decimal text; NaN and infinities as quoted float input.
pub fn float_literal(n: f64) -> String {
    if n.is_nan() {
        "'NaN'".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "'Infinity'" } else { "'-Infinity'" }.to_string()
    } else {
        n.to_string()
    }
}

/// `TIMESTAMP WITH TIME ZONE '<iso8601>'`.
pub fn timestamp_literal(d: &DateTime<Utc>) -> String {
    format!("TIMESTAMP WITH TIME ZONE '{}'", iso8601(d))
}

/// Quote a string as an escape-string constant.
pub fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 3);
    out.push_str("E'");
    for c in s.chars() {
        match c {
            '\0' => out.push_str("\\x00"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\u{8}' => out.push_str("\\b"),
            '\t' => out.push_str("\\t"),
            '\u{1a}' => out.push_str("\\x1A"),
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Quote a possibly dotted identifier: `a.b` becomes `"a"."b"`.
pub fn escape_identifier(name: &str) -> String {
    if name.contains('.') {
        return name
            .split('.')
            .map(quote_ident)
            .collect::<Vec<_>>()
            .join(".");
    }
    quote_ident(name)
}

/// Quote a single identifier part, dots included verbatim.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Comma-joined quoted column list.
pub fn quote_columns<S: AsRef<str>>(columns: &[S]) -> String {
    columns
        .iter()
        .map(|c| quote_ident(c.as_ref()))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    /// Decode an `E'...'` constant the way the PostgreSQL lexer does.
    fn decode_escape_string(literal: &str) -> Option<String> {
        let body = literal.strip_prefix("E'")?.strip_suffix('\'')?;
        let mut out = String::new();
        let mut chars = body.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '\\' => match chars.next()? {
                    'b' => out.push('\u{8}'),
                    'f' => out.push('\u{c}'),
                    'n' => out.push('\n'),
                    'r' => out.push('\r'),
                    't' => out.push('\t'),
                    'x' => {
                        let mut code = 0u32;
                        let mut digits = 0;
                        while digits < 2 {
                            match chars.peek().and_then(|d| d.to_digit(16)) {
                                Some(d) => {
                                    code = code * 16 + d;
                                    chars.next();
                                    digits += 1;
                                }
                                None => break,
                            }
                        }
                        if digits == 0 {
                            out.push('x');
                        } else {
                            out.push(char::from_u32(code)?);
                        }
                    }
                    d @ '0'..='7' => {
                        let mut code = d.to_digit(8)?;
                        for _ in 0..2 {
                            match chars.peek().and_then(|d| d.to_digit(8)) {
                                Some(d) => {
                                    code = code * 8 + d;
                                    chars.next();
                                }
                                None => break,
                            }
                        }
                        out.push(char::from_u32(code)?);
                    }
                    other => out.push(other),
                },
                // A bare quote inside the body would end the constant early.
                '\'' => return None,
                c => out.push(c),
            }
        }
        Some(out)
    }

    #[test]
    fn test_scalar_literals() {
        assert_eq!(escape_literal(&Value::Null), "NULL");
        assert_eq!(escape_literal(&Value::Bool(true)), "true");
        assert_eq!(escape_literal(&Value::Bool(false)), "false");
        assert_eq!(escape_literal(&Value::Int(-42)), "-42");
        assert_eq!(escape_literal(&Value::Float(1.5)), "1.5");
        assert_eq!(escape_literal(&Value::Float(f64::NAN)), "'NaN'");
        assert_eq!(escape_literal(&Value::Float(f64::NEG_INFINITY)), "'-Infinity'");
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(escape_literal(&Value::from("it's")), "E'it\\'s'");
        assert_eq!(
            escape_literal(&Value::from("a\n\r\t\u{8}\u{1a}\0\\\"")),
            "E'a\\n\\r\\t\\b\\x1A\\x00\\\\\\\"'"
        );
    }

    #[test]
    fn test_date_literal() {
        let d = Utc.with_ymd_and_hms(2021, 6, 1, 8, 30, 0).unwrap();
        assert_eq!(
            escape_literal(&Value::Date(d)),
            "TIMESTAMP WITH TIME ZONE '2021-06-01T08:30:00.000Z'"
        );
    }

    #[test]
    fn test_identifiers() {
        assert_eq!(escape_identifier("posts"), "\"posts\"");
        assert_eq!(escape_identifier("blog.posts"), "\"blog\".\"posts\"");
        assert_eq!(escape_identifier("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(quote_ident("a.b"), "\"a.b\"");
        assert_eq!(quote_columns(&["a", "b"]), "\"a\",\"b\"");
    }

    proptest! {
        #[test]
        fn prop_escape_string_round_trips(s in any::<String>()) {
            let encoded = escape_string(&s);
            prop_assert_eq!(decode_escape_string(&encoded), Some(s));
        }

        #[test]
        fn prop_no_raw_control_bytes(s in "[\\x00-\\x1f'\"\\\\a-z]*") {
            let encoded = escape_string(&s);
            let body = &encoded[2..encoded.len() - 1];
            for c in ['\0', '\n', '\r', '\t', '\u{8}', '\u{1a}'] {
                prop_assert!(!body.contains(c));
            }
        }
    }
}
