use serde::{Deserialize, Serialize};

use crate::core::naming::is_valid_identifier;
use crate::core::{Result, StoreError, Value};

/// Element type of a list column. Lists cannot nest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    Uuid,
    Boolean,
    Integer,
    Text,
    Timestamp,
}

impl ElementKind {
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (Self::Uuid, v) => v.as_uuid().is_some(),
            (Self::Boolean, Value::Boolean(_)) => true,
            (Self::Integer, Value::Integer(_)) => true,
            (Self::Text, Value::Text(_)) => true,
            (Self::Timestamp, v) => v.as_timestamp().is_some(),
            _ => false,
        }
    }
}

/// Semantic type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    Uuid,
    Boolean,
    Integer,
    Text { max_length: Option<u32> },
    List(ElementKind),
    Timestamp,
}

impl FieldKind {
    /// Whether the backend can generate values of this kind on insert.
    pub fn supports_autogenerate(&self) -> bool {
        matches!(self, Self::Uuid | Self::Integer | Self::Timestamp)
    }

    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (Self::Uuid, v) => v.as_uuid().is_some(),
            (Self::Boolean, Value::Boolean(_)) => true,
            (Self::Integer, Value::Integer(_)) => true,
            (Self::Text { max_length }, Value::Text(s)) => {
                max_length.is_none_or(|max| s.chars().count() <= max as usize)
            }
            (Self::List(element), Value::List(items)) => items.iter().all(|v| element.accepts(v)),
            (Self::Timestamp, v) => v.as_timestamp().is_some(),
            _ => false,
        }
    }
}

/// Describes one column of an entity table for automatic creation.
///
/// Flags combine the way SQL column constraints do: a primary key is always
/// unique and never null, and an autogenerated column ignores any explicit
/// default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    name: String,
    kind: FieldKind,
    nullable: bool,
    unique: bool,
    primary: bool,
    autogenerate: bool,
    default: Option<Value>,
}

impl FieldSchema {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            nullable: true,
            unique: false,
            primary: false,
            autogenerate: false,
            default: None,
        }
    }

    /// The conventional identifier column: a generated UUID primary key.
    pub fn id() -> Self {
        Self::uuid(crate::core::ID_COLUMN).primary().autogenerate()
    }

    pub fn uuid(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Uuid)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Boolean)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Integer)
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Text { max_length: None })
    }

    pub fn varchar(name: impl Into<String>, max_length: u32) -> Self {
        Self::new(
            name,
            FieldKind::Text {
                max_length: Some(max_length),
            },
        )
    }

    pub fn list(name: impl Into<String>, element: ElementKind) -> Self {
        Self::new(name, FieldKind::List(element))
    }

    pub fn timestamp(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Timestamp)
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    pub fn autogenerate(mut self) -> Self {
        self.autogenerate = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn is_primary(&self) -> bool {
        self.primary
    }

    pub fn is_unique(&self) -> bool {
        self.primary || self.unique
    }

    pub fn is_nullable(&self) -> bool {
        !self.primary && self.nullable
    }

    pub fn is_autogenerated(&self) -> bool {
        self.autogenerate
    }

    /// The explicit default, unless the column is autogenerated.
    pub fn effective_default(&self) -> Option<&Value> {
        if self.autogenerate {
            None
        } else {
            self.default.as_ref()
        }
    }

    /// Checks the descriptor for combinations no backend column can express.
    pub fn validate(&self, table: &str) -> Result<()> {
        if !is_valid_identifier(&self.name) {
            return Err(StoreError::schema(table, &self.name, "invalid column name"));
        }
        if let FieldKind::Text {
            max_length: Some(0),
        } = self.kind
        {
            return Err(StoreError::schema(
                table,
                &self.name,
                "text length must be positive",
            ));
        }
        if self.autogenerate && !self.kind.supports_autogenerate() {
            return Err(StoreError::schema(
                table,
                &self.name,
                format!("{:?} columns cannot be autogenerated", self.kind),
            ));
        }
        if let Some(default) = self.effective_default()
            && !self.kind.accepts(default)
        {
            return Err(StoreError::schema(
                table,
                &self.name,
                format!("default value {} does not fit {:?}", default, self.kind),
            ));
        }
        Ok(())
    }
}

/// Validates a whole field list for one table.
pub fn validate_fields(table: &str, fields: &[FieldSchema]) -> Result<()> {
    if !is_valid_identifier(table) {
        return Err(StoreError::schema(table, "", "invalid table name"));
    }
    if fields.is_empty() {
        return Err(StoreError::schema(table, "", "no fields declared"));
    }
    for (i, field) in fields.iter().enumerate() {
        field.validate(table)?;
        if fields[..i].iter().any(|f| f.name == field.name) {
            return Err(StoreError::schema(table, &field.name, "declared twice"));
        }
    }
    Ok(())
}
