//! Table definitions of the memory backend, read from `CREATE TABLE` DDL.

use std::fmt;

use chrono::Utc;
use sqlparser::ast::{ColumnDef, ColumnOption, Expr, Statement};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use uuid::Uuid;

use crate::core::naming::validate_identifier;
use crate::core::value::parse_timestamp;
use crate::core::{Record, Result, StoreError, Value};
use crate::expression::evaluate_constant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    Uuid,
    Boolean,
    Integer,
    Text { max_length: Option<u32> },
    Timestamp,
    Array(Box<ColumnType>),
}

impl ColumnType {
    /// Reads a rendered SQL type. Returns the type and whether it is a
    /// `SERIAL` form backed by a sequence.
    fn parse(sql_type: &str) -> Option<(Self, bool)> {
        let sql_type = sql_type.trim().to_uppercase();

        if let Some(element) = sql_type.strip_suffix("[]") {
            let (element, _) = Self::parse(element)?;
            return Some((Self::Array(Box::new(element)), false));
        }

        let column_type = match sql_type.as_str() {
            "UUID" => Self::Uuid,
            "BOOLEAN" | "BOOL" => Self::Boolean,
            "INTEGER" | "INT" | "INT4" | "BIGINT" | "INT8" | "SMALLINT" => Self::Integer,
            "SERIAL" | "BIGSERIAL" | "SMALLSERIAL" => return Some((Self::Integer, true)),
            "TEXT" | "VARCHAR" | "CHARACTER VARYING" => Self::Text { max_length: None },
            t if t.starts_with("TIMESTAMP") => Self::Timestamp,
            t => {
                let length = t
                    .strip_prefix("VARCHAR(")
                    .or_else(|| t.strip_prefix("CHARACTER VARYING("))?
                    .strip_suffix(')')?
                    .trim()
                    .parse()
                    .ok()?;
                Self::Text {
                    max_length: Some(length),
                }
            }
        };
        Some((column_type, false))
    }

    /// Converts a value to this type, accepting the textual forms of UUIDs
    /// and timestamps.
    pub fn coerce(&self, value: Value) -> Result<Value> {
        match (self, value) {
            (_, Value::Null) => Ok(Value::Null),
            (Self::Uuid, Value::Uuid(u)) => Ok(Value::Uuid(u)),
            (Self::Uuid, Value::Text(s)) => Uuid::parse_str(&s)
                .map(Value::Uuid)
                .map_err(|_| StoreError::Backend(format!("invalid input syntax for type uuid: \"{}\"", s))),
            (Self::Boolean, Value::Boolean(b)) => Ok(Value::Boolean(b)),
            (Self::Integer, Value::Integer(i)) => Ok(Value::Integer(i)),
            (Self::Text { max_length }, Value::Text(s)) => {
                if let Some(max) = max_length
                    && s.chars().count() > *max as usize
                {
                    return Err(StoreError::Backend(format!(
                        "value too long for type character varying({})",
                        max
                    )));
                }
                Ok(Value::Text(s))
            }
            (Self::Timestamp, Value::Timestamp(ts)) => Ok(Value::Timestamp(ts)),
            (Self::Timestamp, Value::Text(s)) => parse_timestamp(&s)
                .map(Value::Timestamp)
                .ok_or_else(|| StoreError::Backend(format!("invalid input syntax for type timestamp: \"{}\"", s))),
            (Self::Array(element), Value::List(items)) => items
                .into_iter()
                .map(|item| element.coerce(item))
                .collect::<Result<Vec<_>>>()
                .map(Value::List),
            (expected, value) => Err(StoreError::Backend(format!(
                "expected {}, got {}",
                expected,
                value.type_name()
            ))),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uuid => write!(f, "UUID"),
            Self::Boolean => write!(f, "BOOLEAN"),
            Self::Integer => write!(f, "INTEGER"),
            Self::Text { max_length: Some(n) } => write!(f, "VARCHAR({})", n),
            Self::Text { max_length: None } => write!(f, "TEXT"),
            Self::Timestamp => write!(f, "TIMESTAMP"),
            Self::Array(element) => write!(f, "{}[]", element),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnDefault {
    None,
    Literal(Value),
    GeneratedUuid,
    Sequence,
    CurrentTimestamp,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
    pub unique: bool,
    pub primary: bool,
    pub default: ColumnDefault,
}

impl ColumnSpec {
    /// Value for a column the insert did not mention. Sequences are owned by
    /// the table and handled there.
    pub fn default_value(&self) -> Value {
        match &self.default {
            ColumnDefault::None | ColumnDefault::Sequence => Value::Null,
            ColumnDefault::Literal(value) => value.clone(),
            ColumnDefault::GeneratedUuid => Value::Uuid(Uuid::new_v4()),
            ColumnDefault::CurrentTimestamp => Value::Timestamp(Utc::now().naive_utc()),
        }
    }

    pub fn check_not_null(&self, table: &str, value: &Value) -> Result<()> {
        if value.is_null() && !self.nullable {
            return Err(StoreError::Backend(format!(
                "null value in column \"{}\" of relation \"{}\" violates not-null constraint",
                self.name, table
            )));
        }
        Ok(())
    }

    fn from_definition(table: &str, column: &ColumnDef) -> Result<Self> {
        let name = column.name.value.clone();
        validate_identifier(&name)?;

        let (column_type, serial) = ColumnType::parse(&column.data_type.to_string()).ok_or_else(|| {
            StoreError::Backend(format!(
                "type \"{}\" of column \"{}\" in table \"{}\" is not supported",
                column.data_type, name, table
            ))
        })?;

        let mut spec = Self {
            name,
            column_type,
            nullable: true,
            unique: false,
            primary: false,
            default: if serial {
                ColumnDefault::Sequence
            } else {
                ColumnDefault::None
            },
        };

        for option in &column.options {
            match &option.option {
                ColumnOption::NotNull => spec.nullable = false,
                ColumnOption::Null => spec.nullable = true,
                ColumnOption::Default(expr) => spec.default = spec.parse_default(expr)?,
                other => {
                    let rendered = other.to_string().to_uppercase();
                    if rendered.starts_with("PRIMARY KEY") {
                        spec.primary = true;
                    } else if rendered.starts_with("UNIQUE") {
                        spec.unique = true;
                    } else {
                        return Err(StoreError::Backend(format!(
                            "column option '{}' is not supported",
                            other
                        )));
                    }
                }
            }
        }

        if spec.primary {
            spec.unique = true;
            spec.nullable = false;
        }
        Ok(spec)
    }

    fn parse_default(&self, expr: &Expr) -> Result<ColumnDefault> {
        let rendered = expr.to_string().to_lowercase();
        if rendered.contains("gen_random_uuid") || rendered.contains("uuid_generate_v4") {
            return match self.column_type {
                ColumnType::Uuid => Ok(ColumnDefault::GeneratedUuid),
                _ => Err(self.default_mismatch(&rendered)),
            };
        }
        if rendered.contains("now()") || rendered.contains("current_timestamp") {
            return match self.column_type {
                ColumnType::Timestamp => Ok(ColumnDefault::CurrentTimestamp),
                _ => Err(self.default_mismatch(&rendered)),
            };
        }

        let value = evaluate_constant(expr)?;
        self.column_type
            .coerce(value)
            .map(ColumnDefault::Literal)
            .map_err(|_| self.default_mismatch(&rendered))
    }

    fn default_mismatch(&self, rendered: &str) -> StoreError {
        StoreError::Backend(format!(
            "default {} does not fit column \"{}\" of type {}",
            rendered, self.name, self.column_type
        ))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    name: String,
    columns: Vec<ColumnSpec>,
}

impl TableSchema {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn require_column(&self, name: &str) -> Result<&ColumnSpec> {
        self.column(name).ok_or_else(|| {
            StoreError::Backend(format!(
                "column \"{}\" of relation \"{}\" does not exist",
                name, self.name
            ))
        })
    }

    /// A row with every column set to `NULL`.
    pub fn null_row(&self) -> Record {
        self.columns
            .iter()
            .map(|c| (c.name.clone(), Value::Null))
            .collect()
    }

    /// Reads a single `CREATE TABLE` statement.
    pub fn from_ddl(sql: &str) -> Result<Self> {
        let dialect = PostgreSqlDialect {};
        let mut statements = Parser::parse_sql(&dialect, sql)
            .map_err(|e| StoreError::Backend(format!("Invalid DDL: {}", e)))?;

        let create = match (statements.pop(), statements.is_empty()) {
            (Some(Statement::CreateTable(create)), true) => create,
            _ => {
                return Err(StoreError::Backend(
                    "expected exactly one CREATE TABLE statement".into(),
                ));
            }
        };

        let name = create.name.to_string();
        validate_identifier(&name)?;
        if create.columns.is_empty() {
            return Err(StoreError::Backend(format!("table \"{}\" has no columns", name)));
        }

        let mut columns: Vec<ColumnSpec> = Vec::with_capacity(create.columns.len());
        for column in &create.columns {
            let spec = ColumnSpec::from_definition(&name, column)?;
            if columns.iter().any(|c| c.name == spec.name) {
                return Err(StoreError::Backend(format!(
                    "column \"{}\" specified more than once",
                    spec.name
                )));
            }
            columns.push(spec);
        }

        if columns.iter().filter(|c| c.primary).count() > 1 {
            return Err(StoreError::Backend(format!(
                "multiple primary keys for table \"{}\" are not allowed",
                name
            )));
        }

        Ok(Self { name, columns })
    }
}
