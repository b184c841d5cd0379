pub mod catalog;
pub mod memory;
pub mod table;
pub mod transaction;

pub use catalog::{ColumnDefault, ColumnSpec, ColumnType, TableSchema};
pub use memory::MemoryAdapter;
pub use table::MemoryTable;
pub use transaction::{Change, UndoLog};
