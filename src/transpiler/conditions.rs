//! Filter compilation: WHERE clauses, ORDER BY terms, LIMIT/OFFSET.

use nom::{
    IResult,
    bytes::complete::{take_while, take_while1},
    multi::many0,
    sequence::delimited,
};

use super::encode::{NULL, escape_literal, quote_ident};
use super::types::{condition_value, operand_value};
use crate::ast::{Clause, Condition, Filter, Operator, Pattern, Where};
use crate::error::AdapterResult;
use crate::schema::{Attribute, EntitySchema};

/// Compile a predicate into clauses to be joined with `AND`.
///
/// Keys that are neither declared attributes nor the `or`/`arbitrary`
/// sentinels are dropped.
pub fn compile_where(entity: &EntitySchema, conditions: &Where) -> AdapterResult<Vec<String>> {
    match conditions {
        Where::Raw(sql) => Ok(vec![sql.clone()]),
        Where::Template { sql, params } => Ok(vec![substitute_params(sql, params)]),
        Where::Map(clauses) => {
            let mut fields = Vec::with_capacity(clauses.len());
            for clause in clauses {
                match clause {
                    Clause::Attr {
                        name,
                        cond: Condition::Pattern(pattern),
                    } => fields.push(pattern_clause(name, pattern)),
                    Clause::Attr { name, cond } => {
                        let Some(attr) = entity.attribute(name) else {
                            continue;
                        };
                        fields.push(attribute_clause(attr, cond)?);
                    }
                    Clause::Or(branches) => {
                        let mut ors = Vec::with_capacity(branches.len());
                        for branch in branches {
                            let ands = compile_where(entity, branch)?;
                            match ands.len() {
                                0 => {}
                                1 => ors.extend(ands),
                                _ => ors.push(format!("({})", ands.join(" AND "))),
                            }
                        }
                        if !ors.is_empty() {
                            fields.push(format!("({})", ors.join(" OR ")));
                        }
                    }
                    Clause::Arbitrary(sql) => fields.push(sql.clone()),
                }
            }
            Ok(fields)
        }
    }
}

/// Replace each `?` left-to-right with the next encoded parameter.
/// Placeholders beyond the parameter list become `NULL`.
fn substitute_params(sql: &str, params: &[crate::ast::Value]) -> String {
    let mut params = params.iter();
    let mut out = String::with_capacity(sql.len());
    for c in sql.chars() {
        if c == '?' {
            match params.next() {
                Some(v) => out.push_str(&escape_literal(v)),
                None => out.push_str(NULL),
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn pattern_clause(name: &str, pattern: &Pattern) -> String {
    let op = if pattern.case_insensitive { "~*" } else { "~" };
    format!("{} {} '{}'", quote_ident(name), op, pattern.source)
}

fn attribute_clause(attr: &Attribute, cond: &Condition) -> AdapterResult<String> {
    let column = quote_ident(&attr.name);
    match cond {
        Condition::Eq(value) => {
            let value = condition_value(attr, value)?;
            if value == NULL {
                Ok(format!("{} IS NULL", column))
            } else {
                Ok(format!("{} = {}", column, value))
            }
        }
        Condition::Op(op) => operator_clause(&column, attr, op),
        Condition::Pattern(pattern) => Ok(pattern_clause(&attr.name, pattern)),
    }
}

fn operator_clause(column: &str, attr: &Attribute, op: &Operator) -> AdapterResult<String> {
    match op {
        Operator::Inq(items) if items.is_empty() => return Ok("FALSE".to_string()),
        Operator::Nin(items) if items.is_empty() => return Ok("TRUE".to_string()),
        _ => {}
    }
    let value = operand_value(attr, op)?;
    let sql = match op {
        Operator::Gt(_) => format!("{} > {}", column, value),
        Operator::Gte(_) => format!("{} >= {}", column, value),
        Operator::Lt(_) => format!("{} < {}", column, value),
        Operator::Lte(_) => format!("{} <= {}", column, value),
        Operator::Between(..) => format!("{} BETWEEN {}", column, value),
        Operator::Inq(_) => format!("{} IN ({})", column, value),
        Operator::Nin(_) => format!("{} NOT IN ({})", column, value),
        Operator::Neq(_) if value == NULL => format!("{} IS NOT NULL", column),
        Operator::Neq(_) => format!("{} != {}", column, value),
        Operator::Like(_) => format!("{} LIKE {}", column, value),
        Operator::NLike(_) => format!("{} NOT LIKE {}", column, value),
        Operator::Raw { op, .. } => format!("{} {} {}", column, op, value),
    };
    Ok(sql)
}

fn is_separator(c: char) -> bool {
    c.is_whitespace() || c == ','
}

/// Split an order spec on whitespace and commas.
fn order_tokens(input: &str) -> IResult<&str, Vec<&str>> {
    many0(delimited(
        take_while(is_separator),
        take_while1(|c: char| !is_separator(c)),
        take_while(is_separator),
    ))(input)
}

/// Compile an order spec such as `"title DESC id"` into
/// `"title" DESC,"id"`. Returns `None` when there are no terms.
pub fn compile_order(order: &str) -> Option<String> {
    let tokens = order_tokens(order).map(|(_, t)| t).unwrap_or_default();
    let mut terms: Vec<String> = Vec::with_capacity(tokens.len());
    for token in tokens {
        let is_direction = token.eq_ignore_ascii_case("asc") || token.eq_ignore_ascii_case("desc");
        match terms.last_mut() {
            Some(last) if is_direction => {
                last.push(' ');
                last.push_str(&token.to_ascii_uppercase());
            }
            _ => terms.push(quote_ident(token)),
        }
    }
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(","))
    }
}

/// `LIMIT n OFFSET m`, or nothing when no limit is set.
pub fn compile_limit(limit: Option<u64>, offset: Option<u64>) -> Option<String> {
    limit.map(|n| format!("LIMIT {} OFFSET {}", n, offset.unwrap_or(0)))
}

/// Assemble ` WHERE ...`, ` ORDER BY ...` and ` LIMIT ... OFFSET ...`, in that
/// order, omitting absent parts. A prebuilt filter is returned untouched.
pub fn compile_filter(entity: &EntitySchema, filter: &Filter) -> AdapterResult<String> {
    if let Some(sql) = &filter.prebuilt {
        return Ok(sql.clone());
    }
    let mut out = String::new();

    if let Some(conditions) = &filter.conditions {
        let fields = compile_where(entity, conditions)?;
        if !fields.is_empty() {
            out.push_str(" WHERE ");
            out.push_str(&fields.join(" AND "));
        }
    }

    if let Some(order) = filter.order.as_deref().and_then(compile_order) {
        out.push_str(" ORDER BY ");
        out.push_str(&order);
    }

    if let Some(limit) = compile_limit(filter.limit, filter.offset) {
        out.push(' ');
        out.push_str(&limit);
    }

    Ok(out)
}
