//! Condition compilation and evaluation for the memory backend.
//!
//! Conditions are SQL boolean expressions with `@name` placeholders. They are
//! rewritten to positional `$n` placeholders, parsed with the PostgreSQL
//! dialect and evaluated per row with SQL three-valued logic.

pub mod pattern;

use std::cmp::Ordering;
use std::collections::HashMap;

use sqlparser::ast::{BinaryOperator, Expr, Ident, UnaryOperator, Value as SqlValue};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::Token;

use crate::adapter::Filter;
use crate::core::{Record, Result, StoreError, Value};

pub use pattern::matches_like;

/// A compiled filter, ready to be tested against rows.
#[derive(Debug, Clone)]
pub struct Predicate {
    expr: Option<Expr>,
    params: Vec<Value>,
}

impl Predicate {
    /// A predicate that every row satisfies.
    pub fn always() -> Self {
        Self {
            expr: None,
            params: Vec::new(),
        }
    }

    pub fn compile(filter: &Filter) -> Result<Self> {
        if filter.is_empty() {
            return Ok(Self::always());
        }
        let (sql, params) = bind_placeholders(&filter.to_string(), filter.params())?;
        Ok(Self {
            expr: Some(parse_expression(&sql)?),
            params,
        })
    }

    /// `NULL` results count as non-matching, as in a `WHERE` clause.
    pub fn matches(&self, record: &Record) -> Result<bool> {
        match &self.expr {
            None => Ok(true),
            Some(expr) => {
                let scope = Scope {
                    record: Some(record),
                    params: &self.params,
                };
                Ok(truth(&scope.eval(expr)?)? == Some(true))
            }
        }
    }
}

/// Rewrites `@name` placeholders outside quoted text into positional `$n`
/// placeholders. Repeated names share one position.
pub fn bind_placeholders(sql: &str, params: &[(String, Value)]) -> Result<(String, Vec<Value>)> {
    let mut out = String::with_capacity(sql.len());
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut values = Vec::new();
    let mut quote: Option<char> = None;

    let mut chars = sql.char_indices().peekable();
    while let Some((start, c)) = chars.next() {
        if let Some(q) = quote {
            out.push(c);
            if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '\'' | '"' => {
                quote = Some(c);
                out.push(c);
            }
            '@' if chars
                .peek()
                .is_some_and(|(_, next)| next.is_ascii_alphabetic() || *next == '_') =>
            {
                let name_start = start + 1;
                let mut name_end = name_start;
                while let Some((i, next)) = chars.peek().copied() {
                    if next.is_ascii_alphanumeric() || next == '_' {
                        name_end = i + next.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                let name = &sql[name_start..name_end];

                let position = match positions.get(name) {
                    Some(position) => *position,
                    None => {
                        let value = params
                            .iter()
                            .find(|(n, _)| n == name)
                            .map(|(_, v)| v.clone())
                            .ok_or_else(|| {
                                StoreError::Backend(format!("No value bound for parameter @{}", name))
                            })?;
                        values.push(value);
                        positions.insert(name, values.len());
                        values.len()
                    }
                };
                out.push('$');
                out.push_str(&position.to_string());
            }
            c => out.push(c),
        }
    }

    Ok((out, values))
}

/// Parses a single SQL expression, rejecting trailing input.
pub fn parse_expression(sql: &str) -> Result<Expr> {
    let dialect = PostgreSqlDialect {};
    let mut parser = Parser::new(&dialect)
        .try_with_sql(sql)
        .map_err(|e| StoreError::Backend(format!("Invalid condition '{}': {}", sql, e)))?;
    let expr = parser
        .parse_expr()
        .map_err(|e| StoreError::Backend(format!("Invalid condition '{}': {}", sql, e)))?;

    let next = parser.peek_token();
    if next.token != Token::EOF {
        return Err(StoreError::Backend(format!(
            "Unexpected '{}' in condition '{}'",
            next.token, sql
        )));
    }
    Ok(expr)
}

/// Evaluates an expression that references no columns or parameters,
/// such as a column default.
pub fn evaluate_constant(expr: &Expr) -> Result<Value> {
    Scope {
        record: None,
        params: &[],
    }
    .eval(expr)
}

fn truth(value: &Value) -> Result<Option<bool>> {
    match value {
        Value::Null => Ok(None),
        Value::Boolean(b) => Ok(Some(*b)),
        other => Err(StoreError::Backend(format!(
            "Condition must be BOOLEAN, got {}",
            other.type_name()
        ))),
    }
}

struct Scope<'a> {
    record: Option<&'a Record>,
    params: &'a [Value],
}

impl Scope<'_> {
    fn eval(&self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Identifier(ident) => self.column(ident),
            Expr::CompoundIdentifier(parts) => match parts.last() {
                Some(ident) => self.column(ident),
                None => Err(StoreError::Backend("Empty column reference".into())),
            },
            Expr::Value(v) => self.literal(&v.value),
            Expr::Nested(inner) => self.eval(inner),

            Expr::UnaryOp { op, expr } => {
                // `-9223372036854775808` only fits once the sign is attached
                if *op == UnaryOperator::Minus
                    && let Expr::Value(v) = expr.as_ref()
                    && let SqlValue::Number(n, _) = &v.value
                {
                    return number(&format!("-{}", n));
                }

                let value = self.eval(expr)?;
                match (op, value) {
                    (_, Value::Null) => Ok(Value::Null),
                    (UnaryOperator::Not, v) => Ok(Value::Boolean(!truth(&v)?.unwrap_or(false))),
                    (UnaryOperator::Minus, Value::Integer(i)) => i
                        .checked_neg()
                        .map(Value::Integer)
                        .ok_or_else(|| StoreError::Backend("integer out of range".into())),
                    (UnaryOperator::Plus, Value::Integer(i)) => Ok(Value::Integer(i)),
                    (op, v) => Err(StoreError::Backend(format!(
                        "Operator {} cannot be applied to {}",
                        op,
                        v.type_name()
                    ))),
                }
            }

            Expr::BinaryOp { left, op, right } => match op {
                BinaryOperator::And => {
                    let l = truth(&self.eval(left)?)?;
                    if l == Some(false) {
                        return Ok(Value::Boolean(false));
                    }
                    let r = truth(&self.eval(right)?)?;
                    Ok(match (l, r) {
                        (_, Some(false)) => Value::Boolean(false),
                        (Some(true), Some(true)) => Value::Boolean(true),
                        _ => Value::Null,
                    })
                }
                BinaryOperator::Or => {
                    let l = truth(&self.eval(left)?)?;
                    if l == Some(true) {
                        return Ok(Value::Boolean(true));
                    }
                    let r = truth(&self.eval(right)?)?;
                    Ok(match (l, r) {
                        (_, Some(true)) => Value::Boolean(true),
                        (Some(false), Some(false)) => Value::Boolean(false),
                        _ => Value::Null,
                    })
                }
                _ => {
                    let l = self.eval(left)?;
                    let r = self.eval(right)?;
                    binary(op, l, r)
                }
            },

            Expr::IsNull(inner) => Ok(Value::Boolean(self.eval(inner)?.is_null())),
            Expr::IsNotNull(inner) => Ok(Value::Boolean(!self.eval(inner)?.is_null())),

            Expr::InList {
                expr,
                list,
                negated,
            } => {
                let needle = self.eval(expr)?;
                if needle.is_null() {
                    return Ok(Value::Null);
                }
                let mut saw_null = false;
                for item in list {
                    let candidate = self.eval(item)?;
                    if candidate.is_null() {
                        saw_null = true;
                    } else if needle.compare(&candidate)? == Ordering::Equal {
                        return Ok(Value::Boolean(!negated));
                    }
                }
                Ok(if saw_null {
                    Value::Null
                } else {
                    Value::Boolean(*negated)
                })
            }

            Expr::Between {
                expr,
                negated,
                low,
                high,
            } => {
                let value = self.eval(expr)?;
                let low = self.eval(low)?;
                let high = self.eval(high)?;
                if value.is_null() || low.is_null() || high.is_null() {
                    return Ok(Value::Null);
                }
                let inside = value.compare(&low)? != Ordering::Less
                    && value.compare(&high)? != Ordering::Greater;
                Ok(Value::Boolean(inside != *negated))
            }

            Expr::Like {
                negated,
                expr,
                pattern,
                ..
            } => self.like(expr, pattern, *negated, true),
            Expr::ILike {
                negated,
                expr,
                pattern,
                ..
            } => self.like(expr, pattern, *negated, false),

            Expr::Array(array) => array
                .elem
                .iter()
                .map(|item| self.eval(item))
                .collect::<Result<Vec<_>>>()
                .map(Value::List),

            other => Err(StoreError::Backend(format!(
                "Unsupported expression: {}",
                other
            ))),
        }
    }

    fn like(&self, expr: &Expr, pattern: &Expr, negated: bool, case_sensitive: bool) -> Result<Value> {
        let text = self.eval(expr)?;
        let pattern = self.eval(pattern)?;
        match (&text, &pattern) {
            (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
            (Value::Text(text), Value::Text(pattern)) => {
                let matched = matches_like(text, pattern, case_sensitive)?;
                Ok(Value::Boolean(matched != negated))
            }
            _ => Err(StoreError::Backend(format!(
                "LIKE requires TEXT operands, got {} and {}",
                text.type_name(),
                pattern.type_name()
            ))),
        }
    }

    /// Unquoted names fall back to their lower-cased form, as PostgreSQL folds them.
    fn column(&self, ident: &Ident) -> Result<Value> {
        let record = self.record.ok_or_else(|| {
            StoreError::Backend(format!("Column reference '{}' is not allowed here", ident.value))
        })?;

        let found = record.get(&ident.value).or_else(|| {
            if ident.quote_style.is_none() {
                record.get(&ident.value.to_lowercase())
            } else {
                None
            }
        });
        found
            .cloned()
            .ok_or_else(|| StoreError::Backend(format!("Column '{}' does not exist", ident.value)))
    }

    fn literal(&self, value: &SqlValue) -> Result<Value> {
        match value {
            SqlValue::Null => Ok(Value::Null),
            SqlValue::Boolean(b) => Ok(Value::Boolean(*b)),
            SqlValue::Number(n, _) => number(n),
            SqlValue::SingleQuotedString(s) => Ok(Value::Text(s.clone())),
            SqlValue::Placeholder(p) => {
                let position = p
                    .strip_prefix('$')
                    .and_then(|n| n.parse::<usize>().ok())
                    .filter(|n| *n >= 1 && *n <= self.params.len())
                    .ok_or_else(|| StoreError::Backend(format!("No value bound for {}", p)))?;
                Ok(self.params[position - 1].clone())
            }
            other => Err(StoreError::Backend(format!("Unsupported literal {}", other))),
        }
    }
}

fn number(text: &str) -> Result<Value> {
    text.parse::<i64>()
        .map(Value::Integer)
        .map_err(|_| StoreError::Backend(format!("Unsupported numeric literal {}", text)))
}

fn binary(op: &BinaryOperator, left: Value, right: Value) -> Result<Value> {
    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }

    let comparison = |accept: fn(Ordering) -> bool| -> Result<Value> {
        Ok(Value::Boolean(accept(left.compare(&right)?)))
    };

    match op {
        BinaryOperator::Eq => comparison(Ordering::is_eq),
        BinaryOperator::NotEq => comparison(Ordering::is_ne),
        BinaryOperator::Lt => comparison(Ordering::is_lt),
        BinaryOperator::LtEq => comparison(Ordering::is_le),
        BinaryOperator::Gt => comparison(Ordering::is_gt),
        BinaryOperator::GtEq => comparison(Ordering::is_ge),
        BinaryOperator::StringConcat => Ok(Value::Text(format!("{}{}", left, right))),
        BinaryOperator::Plus
        | BinaryOperator::Minus
        | BinaryOperator::Multiply
        | BinaryOperator::Divide
        | BinaryOperator::Modulo => match (&left, &right) {
            (Value::Integer(a), Value::Integer(b)) => arithmetic(op, *a, *b).map(Value::Integer),
            _ => Err(StoreError::Backend(format!(
                "Operator {} cannot be applied to {} and {}",
                op,
                left.type_name(),
                right.type_name()
            ))),
        },
        other => Err(StoreError::Backend(format!("Unsupported operator {}", other))),
    }
}

fn arithmetic(op: &BinaryOperator, a: i64, b: i64) -> Result<i64> {
    let result = match op {
        BinaryOperator::Plus => a.checked_add(b),
        BinaryOperator::Minus => a.checked_sub(b),
        BinaryOperator::Multiply => a.checked_mul(b),
        BinaryOperator::Divide | BinaryOperator::Modulo if b == 0 => {
            return Err(StoreError::Backend("division by zero".into()));
        }
        BinaryOperator::Divide => a.checked_div(b),
        _ => a.checked_rem(b),
    };
    result.ok_or_else(|| StoreError::Backend("integer out of range".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params;
    use uuid::Uuid;

    fn row() -> Record {
        let mut record = Record::new();
        record.insert("username".into(), Value::from("alice"));
        record.insert("email".into(), Value::Null);
        record.insert("age".into(), Value::Integer(30));
        record.insert("active".into(), Value::Boolean(true));
        record
    }

    fn check(condition: &str, params: Vec<(String, Value)>) -> bool {
        let mut filter = Filter::new();
        filter.push(condition, params).unwrap();
        Predicate::compile(&filter).unwrap().matches(&row()).unwrap()
    }

    #[test]
    fn test_placeholders_outside_quotes() {
        let (sql, values) = bind_placeholders(
            "a = @x AND b = '@x' AND c = @y AND d = @x",
            &params! { "x" => 1, "y" => "two" },
        )
        .unwrap();
        assert_eq!(sql, "a = $1 AND b = '@x' AND c = $2 AND d = $1");
        assert_eq!(values, vec![Value::Integer(1), Value::from("two")]);
    }

    #[test]
    fn test_unbound_placeholder_is_error() {
        let err = bind_placeholders("a = @missing", &[]).unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
    }

    #[test]
    fn test_comparisons_and_logic() {
        assert!(check("username = @name", params! { "name" => "alice" }));
        assert!(!check("username = @name", params! { "name" => "bob" }));
        assert!(check("age >= 18 AND active", params! {}));
        assert!(check("age < 18 OR username <> 'bob'", params! {}));
        assert!(check("NOT (age BETWEEN 40 AND 50)", params! {}));
        assert!(check("age IN (10, 20, 30)", params! {}));
        assert!(check("(age + 5) * 2 = 70", params! {}));
    }

    #[test]
    fn test_three_valued_logic() {
        assert!(!check("email = 'x'", params! {}));
        assert!(!check("NOT (email = 'x')", params! {}));
        assert!(check("email IS NULL", params! {}));
        assert!(check("email = 'x' OR active", params! {}));
        assert!(!check("username NOT IN ('bob', NULL)", params! {}));
    }

    #[test]
    fn test_like_and_ilike() {
        assert!(check("username LIKE 'al%'", params! {}));
        assert!(!check("username LIKE 'AL%'", params! {}));
        assert!(check("username ILIKE @p", params! { "p" => "AL%" }));
        assert!(check("username NOT LIKE '%z%'", params! {}));
    }

    #[test]
    fn test_uuid_compares_with_text() {
        let id = Uuid::new_v4();
        let mut record = row();
        record.insert("id".into(), Value::Uuid(id));

        let mut filter = Filter::new();
        filter
            .push("id = @id", params! { "id" => id.to_string() })
            .unwrap();
        assert!(Predicate::compile(&filter).unwrap().matches(&record).unwrap());
    }

    #[test]
    fn test_errors_surface() {
        let mut filter = Filter::new();
        filter.push("nope = 1", params! {}).unwrap();
        let predicate = Predicate::compile(&filter).unwrap();
        assert!(predicate.matches(&row()).is_err());

        let mut filter = Filter::new();
        filter.push("username = = 1", params! {}).unwrap();
        assert!(Predicate::compile(&filter).is_err());

        let mut filter = Filter::new();
        filter.push("age = 1 garbage", params! {}).unwrap();
        assert!(Predicate::compile(&filter).is_err());
    }

    #[test]
    fn test_constant_defaults() {
        assert_eq!(
            evaluate_constant(&parse_expression("ARRAY['a', 'b']").unwrap()).unwrap(),
            Value::List(vec![Value::from("a"), Value::from("b")])
        );
        assert_eq!(
            evaluate_constant(&parse_expression("-5").unwrap()).unwrap(),
            Value::Integer(-5)
        );
        assert!(evaluate_constant(&parse_expression("col").unwrap()).is_err());
    }

    #[test]
    fn test_integer_bounds() {
        let min = Value::Integer(i64::MIN).to_sql_literal();
        assert_eq!(
            evaluate_constant(&parse_expression(&min).unwrap()).unwrap(),
            Value::Integer(i64::MIN)
        );
        assert_eq!(
            evaluate_constant(&parse_expression("- 42").unwrap()).unwrap(),
            Value::Integer(-42)
        );
        assert!(evaluate_constant(&parse_expression("9223372036854775808").unwrap()).is_err());
        assert!(evaluate_constant(&parse_expression("-9223372036854775809").unwrap()).is_err());
    }
}
