use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use async_trait::async_trait;
use log::{debug, info};
use tokio::sync::RwLock;

use super::catalog::TableSchema;
use super::table::MemoryTable;
use super::transaction::atomically;
use crate::adapter::{Adapter, Filter, Selection};
use crate::connection::{AdapterConfig, BackendKind};
use crate::core::{EntityId, ID_COLUMN, Record, Result, StoreError, Value};
use crate::expression::Predicate;
use crate::schema::{FieldSchema, create_table_sql};

type TableHandle = Arc<RwLock<MemoryTable>>;

/// In-process relational backend.
///
/// Each table sits behind its own lock; the map of tables has a separate lock
/// that is only held to look tables up or add them.
pub struct MemoryAdapter {
    config: AdapterConfig,
    tables: RwLock<HashMap<String, TableHandle>>,
    closed: AtomicBool,
}

impl MemoryAdapter {
    pub fn new(config: AdapterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            tables: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    /// Executes one `CREATE TABLE` statement.
    pub async fn execute_ddl(&self, sql: &str) -> Result<()> {
        self.ensure_open()?;
        let schema = TableSchema::from_ddl(sql)?;
        let name = schema.name().to_string();

        let mut tables = self.tables.write().await;
        if tables.contains_key(&name) {
            return Err(StoreError::Backend(format!(
                "relation \"{}\" already exists",
                name
            )));
        }
        tables.insert(name.clone(), Arc::new(RwLock::new(MemoryTable::new(schema))));
        debug!("Created table '{}': {}", name, sql);
        Ok(())
    }

    pub async fn table_names(&self) -> Result<Vec<String>> {
        self.ensure_open()?;
        let mut names: Vec<String> = self.tables.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(AtomicOrdering::Acquire) {
            return Err(StoreError::Unavailable(format!(
                "connection to {} is closed",
                self.config.to_url()
            )));
        }
        Ok(())
    }

    async fn handle(&self, table: &str) -> Result<TableHandle> {
        self.ensure_open()?;
        self.tables
            .read()
            .await
            .get(table)
            .cloned()
            .ok_or_else(|| StoreError::Backend(format!("relation \"{}\" does not exist", table)))
    }

    /// Compiles `filter` and resolves its column references against the
    /// table's columns, so a bad condition fails even on an empty table.
    fn predicate(table: &MemoryTable, filter: &Filter) -> Result<Predicate> {
        let predicate = Predicate::compile(filter)?;
        predicate.matches(&table.schema().null_row())?;
        Ok(predicate)
    }

    fn matching_rows(table: &MemoryTable, filter: &Filter) -> Result<Vec<(u64, Record)>> {
        let predicate = Self::predicate(table, filter)?;
        let mut matched = Vec::new();
        for (row_id, row) in table.rows() {
            if predicate.matches(row)? {
                matched.push((row_id, row.clone()));
            }
        }
        Ok(matched)
    }
}

fn identifier_of(table: &MemoryTable, row_id: u64) -> Result<EntityId> {
    match table.get(row_id).and_then(|row| row.get(ID_COLUMN)) {
        Some(value) if !value.is_null() => EntityId::try_from(value),
        _ => Err(StoreError::Backend(format!(
            "relation \"{}\" returned no {} for the saved row",
            table.schema().name(),
            ID_COLUMN
        ))),
    }
}

#[async_trait]
impl Adapter for MemoryAdapter {
    fn backend(&self) -> BackendKind {
        BackendKind::Memory
    }

    async fn table_exists(&self, table: &str) -> Result<bool> {
        self.ensure_open()?;
        Ok(self.tables.read().await.contains_key(table))
    }

    async fn create_table(&self, table: &str, fields: &[FieldSchema]) -> Result<()> {
        let sql = create_table_sql(table, fields)?;
        self.execute_ddl(&sql).await
    }

    async fn get_by_id(&self, table: &str, id: &EntityId) -> Result<Option<Record>> {
        let handle = self.handle(table).await?;
        let table = handle.read().await;
        let row_id = table.find_by_id(&Value::from(id))?;
        Ok(row_id.and_then(|row_id| table.get(row_id).cloned()))
    }

    async fn save(&self, table: &str, id: Option<&EntityId>, record: &Record) -> Result<EntityId> {
        let handle = self.handle(table).await?;
        let mut guard = handle.write().await;

        let mut values = record.clone();
        values.remove(ID_COLUMN);

        let saved = match id {
            None => atomically(&mut *guard, |t, log| {
                let row_id = t.insert(&values, log)?;
                identifier_of(t, row_id)
            })?,
            Some(id) => atomically(&mut *guard, |t, log| {
                let row_id = t.find_by_id(&Value::from(id))?.ok_or_else(|| {
                    StoreError::Backend(format!(
                        "no row with {} {} in relation \"{}\"",
                        ID_COLUMN,
                        id,
                        t.schema().name()
                    ))
                })?;
                t.update(row_id, &values, log)?;
                Ok(id.clone())
            })?,
        };

        debug!("Saved row {} in '{}'", saved, table);
        Ok(saved)
    }

    async fn delete_by_id(&self, table: &str, id: &EntityId) -> Result<bool> {
        let handle = self.handle(table).await?;
        let mut guard = handle.write().await;
        let deleted = atomically(&mut *guard, |t, log| {
            Ok(match t.find_by_id(&Value::from(id))? {
                Some(row_id) => t.delete(row_id, log),
                None => false,
            })
        })?;
        debug!("Delete {} from '{}': {}", id, table, deleted);
        Ok(deleted)
    }

    async fn delete_where(&self, table: &str, filter: &Filter) -> Result<u64> {
        let handle = self.handle(table).await?;
        let mut guard = handle.write().await;

        let removed = atomically(&mut *guard, |t, log| {
            let predicate = Self::predicate(t, filter)?;
            let candidates: Vec<u64> = t.rows().map(|(row_id, _)| row_id).collect();
            let mut removed = 0;
            for row_id in candidates {
                let matches = match t.get(row_id) {
                    Some(row) => predicate.matches(row)?,
                    None => false,
                };
                if matches && t.delete(row_id, log) {
                    removed += 1;
                }
            }
            Ok(removed)
        })?;

        debug!("Deleted {} row(s) from '{}' where {}", removed, table, filter);
        Ok(removed)
    }

    async fn count(&self, table: &str, filter: &Filter) -> Result<u64> {
        let handle = self.handle(table).await?;
        let guard = handle.read().await;
        if filter.is_empty() {
            return Ok(guard.len() as u64);
        }
        Ok(Self::matching_rows(&guard, filter)?.len() as u64)
    }

    async fn select(&self, table: &str, selection: &Selection) -> Result<Vec<Record>> {
        let handle = self.handle(table).await?;
        let guard = handle.read().await;
        let schema = guard.schema();

        for order in &selection.order {
            schema.require_column(&order.column)?;
        }
        if let Some(columns) = &selection.columns {
            for column in columns {
                schema.require_column(column)?;
            }
        }

        let mut rows: Vec<Record> = Self::matching_rows(&guard, &selection.filter)?
            .into_iter()
            .map(|(_, row)| row)
            .collect();

        if !selection.order.is_empty() {
            rows.sort_by(|a, b| {
                for order in &selection.order {
                    let left = a.get(&order.column).unwrap_or(&Value::Null);
                    let right = b.get(&order.column).unwrap_or(&Value::Null);
                    let ordering = left.sort_cmp(right);
                    let ordering = if order.descending {
                        ordering.reverse()
                    } else {
                        ordering
                    };
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                Ordering::Equal
            });
        }

        rows.truncate(selection.limit);

        if let Some(columns) = &selection.columns {
            rows = rows
                .into_iter()
                .map(|row| {
                    columns
                        .iter()
                        .map(|c| (c.clone(), row.get(c).cloned().unwrap_or(Value::Null)))
                        .collect()
                })
                .collect();
        }

        debug!(
            "Selected {} row(s) from '{}' where {}",
            rows.len(),
            table,
            selection.filter
        );
        Ok(rows)
    }

    async fn truncate(&self, table: &str) -> Result<()> {
        let handle = self.handle(table).await?;
        let removed = handle.write().await.truncate();
        debug!("Truncated '{}' ({} row(s))", table, removed);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.ensure_open()?;
        self.closed.store(true, AtomicOrdering::Release);
        self.tables.write().await.clear();
        info!("Closed {}", self.config.to_url());
        Ok(())
    }
}
