//! Everything an application needs to declare and store entities.
//!
//! ```
//! use tablestore::prelude::*;
//! ```

pub use crate::{
    Adapter, AdapterConfig, BackendKind, DEFAULT_LIMIT, Database, ElementKind, Entity, EntityId, FieldKind,
    FieldSchema, Identity, Params, QueryBuilder, Record, Result, StoreError, Table, TableStatus, Value,
    entity_identity, params,
};
