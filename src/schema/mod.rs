pub mod ddl;
pub mod field;

pub use ddl::{column_definition, create_table_sql};
pub use field::{ElementKind, FieldKind, FieldSchema, validate_fields};
