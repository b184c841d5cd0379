use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unsupported backend: {0}")]
    UnsupportedBackend(String),

    #[error("Schema error in table '{table}', field '{field}': {reason}")]
    Schema {
        table: String,
        field: String,
        reason: String,
    },

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Table '{0}' is already registered")]
    DuplicateRegistration(String),

    #[error("Table '{0}' is not registered")]
    UnregisteredTable(String),

    #[error("Table '{table}' is not available: {reason}")]
    MissingTable { table: String, reason: String },

    #[error("Table '{table}' is registered for a different entity type, not {requested}")]
    TableTypeMismatch {
        table: String,
        requested: &'static str,
    },

    #[error("Parameter conflict: {} already bound", .0.join(", "))]
    ParameterConflict(Vec<String>),

    #[error("Entity has no identifier until it is saved")]
    UnpersistedAccess,

    #[error("Invalid identifier: '{0}'")]
    InvalidIdentifier(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

impl StoreError {
    pub(crate) fn schema(
        table: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Schema {
            table: table.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// True when the error means the backend could not be reached at all.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_conflict_names_keys() {
        let err = StoreError::ParameterConflict(vec!["username".into(), "email".into()]);
        assert_eq!(
            err.to_string(),
            "Parameter conflict: username, email already bound"
        );
    }

    #[test]
    fn test_schema_error_names_table_and_field() {
        let err = StoreError::schema("users", "nickname", "text length must be positive");
        let message = err.to_string();
        assert!(message.contains("users"));
        assert!(message.contains("nickname"));
    }
}
