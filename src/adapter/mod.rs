//! Backend-neutral storage contract.
//!
//! Every physical backend implements [`Adapter`]; the table proxies and the
//! registry only ever talk to an `Arc<dyn Adapter>`.

pub mod filter;

pub use filter::{Filter, OrderBy, Params, Selection};

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};

use crate::connection::{AdapterConfig, BackendKind};
use crate::core::{EntityId, Record, Result};
use crate::schema::FieldSchema;
use crate::storage::MemoryAdapter;

/// Outcome of [`Adapter::ensure_table`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableStatus {
    /// The table was already present.
    Exists,
    /// The table was absent and has been created from the field list.
    Created,
    /// The table is absent and no field list was supplied.
    Absent,
    /// Creation was attempted and rejected.
    CreationFailed(String),
    /// The backend could not be reached.
    Unreachable(String),
}

impl TableStatus {
    /// True when the table can be used after the call.
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Exists | Self::Created)
    }
}

impl fmt::Display for TableStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exists => write!(f, "exists"),
            Self::Created => write!(f, "created"),
            Self::Absent => write!(f, "table does not exist and no fields were given"),
            Self::CreationFailed(cause) => write!(f, "creation failed: {}", cause),
            Self::Unreachable(cause) => write!(f, "backend unreachable: {}", cause),
        }
    }
}

#[async_trait]
pub trait Adapter: Send + Sync {
    fn backend(&self) -> BackendKind;

    async fn table_exists(&self, table: &str) -> Result<bool>;

    /// Creates `table` from the synthesized DDL of `fields`.
    async fn create_table(&self, table: &str, fields: &[FieldSchema]) -> Result<()>;

    /// Makes sure `table` exists, creating it from `fields` when it is absent.
    ///
    /// Existence is always checked first. Without a field list an absent table
    /// is reported as [`TableStatus::Absent`] and nothing is created.
    async fn ensure_table(&self, table: &str, fields: Option<&[FieldSchema]>) -> TableStatus {
        let status = match self.table_exists(table).await {
            Ok(true) => TableStatus::Exists,
            Ok(false) => match fields {
                None => TableStatus::Absent,
                Some(fields) => match self.create_table(table, fields).await {
                    Ok(()) => TableStatus::Created,
                    Err(e) if e.is_unavailable() => TableStatus::Unreachable(e.to_string()),
                    Err(e) => TableStatus::CreationFailed(e.to_string()),
                },
            },
            Err(e) if e.is_unavailable() => TableStatus::Unreachable(e.to_string()),
            Err(e) => TableStatus::CreationFailed(e.to_string()),
        };

        if status.is_available() {
            debug!("Table '{}': {}", table, status);
        } else {
            warn!("Table '{}' unavailable: {}", table, status);
        }
        status
    }

    async fn get_by_id(&self, table: &str, id: &EntityId) -> Result<Option<Record>>;

    /// Inserts `record` when `id` is `None`, otherwise updates the row with
    /// that identifier. Returns the identifier of the stored row.
    async fn save(&self, table: &str, id: Option<&EntityId>, record: &Record) -> Result<EntityId>;

    async fn delete_by_id(&self, table: &str, id: &EntityId) -> Result<bool>;

    /// Deletes every row matching `filter`, returning how many were removed.
    async fn delete_where(&self, table: &str, filter: &Filter) -> Result<u64>;

    async fn count(&self, table: &str, filter: &Filter) -> Result<u64>;

    async fn select(&self, table: &str, selection: &Selection) -> Result<Vec<Record>>;

    async fn truncate(&self, table: &str) -> Result<()>;

    /// Releases the backend. Later calls fail with `Unavailable`.
    async fn close(&self) -> Result<()>;
}

/// Builds the adapter for `config.backend` after validating the configuration.
pub async fn connect(config: &AdapterConfig) -> Result<Arc<dyn Adapter>> {
    config.validate()?;
    match config.backend {
        BackendKind::Memory => {
            let adapter = MemoryAdapter::new(config.clone())?;
            debug!("Connected to {}", config.to_url());
            Ok(Arc::new(adapter))
        }
    }
}

/// Same as [`connect`], starting from a connection URL.
pub async fn connect_url(url: &str) -> Result<Arc<dyn Adapter>> {
    let config = AdapterConfig::from_url(url)?;
    connect(&config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StoreError;
    use crate::schema::FieldSchema;

    fn config() -> AdapterConfig {
        AdapterConfig::new(BackendKind::Memory)
            .host("localhost")
            .database("test")
            .credentials("admin", "secret")
    }

    #[tokio::test]
    async fn test_connect_validates_config() {
        let err = connect(&AdapterConfig::new(BackendKind::Memory))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, StoreError::Configuration(_)));

        let adapter = connect(&config()).await.unwrap();
        assert_eq!(adapter.backend(), BackendKind::Memory);
    }

    #[tokio::test]
    async fn test_ensure_table_outcomes() {
        let adapter = connect(&config()).await.unwrap();
        let fields = [FieldSchema::id(), FieldSchema::text("title")];

        assert_eq!(adapter.ensure_table("posts", None).await, TableStatus::Absent);
        assert!(!adapter.table_exists("posts").await.unwrap());

        assert_eq!(
            adapter.ensure_table("posts", Some(&fields[..])).await,
            TableStatus::Created
        );
        assert_eq!(
            adapter.ensure_table("posts", Some(&fields[..])).await,
            TableStatus::Exists
        );
        assert_eq!(adapter.ensure_table("posts", None).await, TableStatus::Exists);

        let bad = [FieldSchema::boolean("flag").autogenerate()];
        assert!(matches!(
            adapter.ensure_table("flags", Some(&bad[..])).await,
            TableStatus::CreationFailed(_)
        ));

        adapter.close().await.unwrap();
        assert!(matches!(
            adapter.ensure_table("posts", Some(&fields[..])).await,
            TableStatus::Unreachable(_)
        ));
    }
}
