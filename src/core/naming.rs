use regex::Regex;

use super::{Result, StoreError};

lazy_static::lazy_static! {
    static ref IDENTIFIER: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
}

/// Returns true if `name` can be used unquoted as a table or column name.
pub fn is_valid_identifier(name: &str) -> bool {
    name.len() <= 63 && IDENTIFIER.is_match(name)
}

pub fn validate_identifier(name: &str) -> Result<()> {
    if is_valid_identifier(name) {
        Ok(())
    } else {
        Err(StoreError::InvalidIdentifier(name.to_string()))
    }
}

/// Default table name for an entity type: the last path segment, lower-cased.
///
/// `my_app::model::User` becomes `user`, `Wrapper<Inner>` becomes `wrapper`.
pub fn default_table_name(type_name: &str) -> String {
    let without_generics = type_name.split('<').next().unwrap_or(type_name);
    let segment = without_generics
        .rsplit("::")
        .next()
        .unwrap_or(without_generics);
    segment.to_lowercase()
}

/// Escapes a string for inclusion in a SQL literal.
///
/// Replaces single quotes with double single quotes.
pub fn sql_escape_string(value: &str) -> String {
    value.replace('\'', "''")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifiers() {
        assert!(is_valid_identifier("users"));
        assert!(is_valid_identifier("_created_at2"));
        assert!(!is_valid_identifier("2fast"));
        assert!(!is_valid_identifier("user name"));
        assert!(!is_valid_identifier("users; DROP TABLE users"));
        assert!(!is_valid_identifier(""));
    }

    #[test]
    fn test_default_table_name() {
        assert_eq!(default_table_name("my_app::model::User"), "user");
        assert_eq!(default_table_name("Message"), "message");
        assert_eq!(default_table_name("crate::Wrapper<crate::Inner>"), "wrapper");
    }
}
