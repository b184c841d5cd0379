pub mod error;
pub mod naming;
pub mod types;
pub mod value;

pub use error::{Result, StoreError};
pub use types::{EntityId, ID_COLUMN, Record};
pub use value::Value;
