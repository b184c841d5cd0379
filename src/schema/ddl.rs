//! `CREATE TABLE` synthesis from field descriptors.
//!
//! The generated SQL targets PostgreSQL column types; the in-memory backend
//! parses the same statement to build its catalog.

use super::field::{ElementKind, FieldKind, FieldSchema, validate_fields};
use crate::core::Result;

fn element_type(element: ElementKind) -> &'static str {
    match element {
        ElementKind::Uuid => "UUID",
        ElementKind::Boolean => "BOOLEAN",
        ElementKind::Integer => "INTEGER",
        ElementKind::Text => "TEXT",
        ElementKind::Timestamp => "TIMESTAMP WITHOUT TIME ZONE",
    }
}

/// Column type plus the generated default, if the field is autogenerated.
fn column_form(field: &FieldSchema) -> String {
    let generated = field.is_autogenerated();
    match field.kind() {
        FieldKind::Uuid if generated => "UUID DEFAULT gen_random_uuid()".to_string(),
        FieldKind::Uuid => "UUID".to_string(),
        FieldKind::Boolean => "BOOLEAN".to_string(),
        FieldKind::Integer if generated => "SERIAL".to_string(),
        FieldKind::Integer => "INTEGER".to_string(),
        FieldKind::Text {
            max_length: Some(length),
        } => format!("VARCHAR({})", length),
        FieldKind::Text { max_length: None } => "TEXT".to_string(),
        FieldKind::List(element) => format!("{}[]", element_type(element)),
        FieldKind::Timestamp if generated => {
            "TIMESTAMP WITHOUT TIME ZONE DEFAULT (now() AT TIME ZONE 'utc')".to_string()
        }
        FieldKind::Timestamp => "TIMESTAMP WITHOUT TIME ZONE".to_string(),
    }
}

/// Renders one column definition.
///
/// Constraint order: `PRIMARY KEY` alone for primary keys, otherwise `UNIQUE`
/// then `NOT NULL`; an explicit `DEFAULT` comes last and only for columns that
/// are not autogenerated.
pub fn column_definition(table: &str, field: &FieldSchema) -> Result<String> {
    field.validate(table)?;

    let mut definition = format!("{} {}", field.name(), column_form(field));

    if field.is_primary() {
        definition.push_str(" PRIMARY KEY");
    } else {
        if field.is_unique() {
            definition.push_str(" UNIQUE");
        }
        if !field.is_nullable() {
            definition.push_str(" NOT NULL");
        }
    }

    if let Some(default) = field.effective_default() {
        definition.push_str(" DEFAULT ");
        definition.push_str(&default.to_sql_literal());
    }

    Ok(definition)
}

/// Synthesizes the `CREATE TABLE` statement for `table` from its field list.
pub fn create_table_sql(table: &str, fields: &[FieldSchema]) -> Result<String> {
    validate_fields(table, fields)?;

    let columns = fields
        .iter()
        .map(|field| column_definition(table, field))
        .collect::<Result<Vec<_>>>()?;

    Ok(format!("CREATE TABLE {} ({})", table, columns.join(", ")))
}
