use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Result, StoreError, Value};

/// Name of the identifier column every entity table carries.
pub const ID_COLUMN: &str = "id";

/// A row as a column-name-keyed mapping.
pub type Record = BTreeMap<String, Value>;

/// Identifier assigned by the backend when an entity is first saved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityId {
    Uuid(Uuid),
    Integer(i64),
}

impl EntityId {
    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            Self::Uuid(u) => Some(*u),
            Self::Integer(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::Uuid(_) => None,
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uuid(u) => write!(f, "{}", u),
            Self::Integer(i) => write!(f, "{}", i),
        }
    }
}

impl From<Uuid> for EntityId {
    fn from(u: Uuid) -> Self {
        Self::Uuid(u)
    }
}

impl From<i64> for EntityId {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<EntityId> for Value {
    fn from(id: EntityId) -> Self {
        match id {
            EntityId::Uuid(u) => Value::Uuid(u),
            EntityId::Integer(i) => Value::Integer(i),
        }
    }
}

impl From<&EntityId> for Value {
    fn from(id: &EntityId) -> Self {
        id.clone().into()
    }
}

impl TryFrom<&Value> for EntityId {
    type Error = StoreError;

    fn try_from(value: &Value) -> Result<Self> {
        match value {
            Value::Uuid(u) => Ok(Self::Uuid(*u)),
            Value::Integer(i) => Ok(Self::Integer(*i)),
            Value::Text(s) => Uuid::parse_str(s).map(Self::Uuid).map_err(|_| {
                StoreError::Deserialization(format!("'{}' is not a valid identifier", s))
            }),
            other => Err(StoreError::Deserialization(format!(
                "{} value cannot be used as an identifier",
                other.type_name()
            ))),
        }
    }
}
