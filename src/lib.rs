// ============================================================================
// tablestore
// ============================================================================
//
// Backend-agnostic entity storage: entities, field schemas with DDL
// synthesis, an adapter contract, typed table proxies, a query builder and a
// database registry, with an in-process relational backend.
//
// ============================================================================

pub mod adapter;
pub mod connection;
pub mod core;
pub mod entity;
pub mod expression;
pub mod facade;
pub mod prelude;
pub mod query;
pub mod schema;
pub mod storage;

pub use adapter::{Adapter, Filter, OrderBy, Params, Selection, TableStatus};
pub use connection::{AdapterConfig, BackendKind};
pub use core::{EntityId, ID_COLUMN, Record, Result, StoreError, Value};
pub use entity::{Entity, Identity};
pub use facade::{Database, Deserializer, Table};
pub use query::{DEFAULT_LIMIT, QueryBuilder};
pub use schema::{ElementKind, FieldKind, FieldSchema};
pub use storage::MemoryAdapter;
