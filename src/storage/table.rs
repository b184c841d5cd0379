use std::collections::{BTreeMap, HashMap};

use super::catalog::{ColumnDefault, ColumnSpec, TableSchema};
use super::transaction::{Change, UndoLog};
use crate::core::{ID_COLUMN, Record, Result, StoreError, Value};

/// Rows of one table, kept in insertion order under internal row ids.
#[derive(Debug, Clone)]
pub struct MemoryTable {
    schema: TableSchema,
    rows: BTreeMap<u64, Record>,
    next_row_id: u64,
    sequences: HashMap<String, i64>,
}

impl MemoryTable {
    pub fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            rows: BTreeMap::new(),
            next_row_id: 0,
            sequences: HashMap::new(),
        }
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = (u64, &Record)> {
        self.rows.iter().map(|(row_id, row)| (*row_id, row))
    }

    pub fn get(&self, row_id: u64) -> Option<&Record> {
        self.rows.get(&row_id)
    }

    /// Row id of the row whose `id` column equals `id`.
    pub fn find_by_id(&self, id: &Value) -> Result<Option<u64>> {
        let column = self.schema.require_column(ID_COLUMN)?;
        let id = coerce_into(column, id.clone())?;
        Ok(self
            .rows
            .iter()
            .find(|(_, row)| row.get(ID_COLUMN) == Some(&id))
            .map(|(row_id, _)| *row_id))
    }

    /// Inserts a row. Columns missing from `record` take their default.
    pub fn insert(&mut self, record: &Record, log: &mut UndoLog) -> Result<u64> {
        self.check_known_columns(record)?;

        let Self {
            schema, sequences, ..
        } = &mut *self;

        let mut row = Record::new();
        for column in schema.columns() {
            let value = match record.get(&column.name) {
                Some(value) => coerce_into(column, value.clone())?,
                None if column.default == ColumnDefault::Sequence => {
                    let counter = sequences.entry(column.name.clone()).or_insert(0);
                    *counter += 1;
                    Value::Integer(*counter)
                }
                None => column.default_value(),
            };
            column.check_not_null(schema.name(), &value)?;
            row.insert(column.name.clone(), value);
        }

        let row_id = self.next_row_id;
        self.next_row_id += 1;
        self.rows.insert(row_id, row);
        log.record(Change::Inserted { row_id });

        self.check_unique(row_id)?;
        Ok(row_id)
    }

    /// Overwrites the columns present in `record`; other columns keep their values.
    pub fn update(&mut self, row_id: u64, record: &Record, log: &mut UndoLog) -> Result<()> {
        self.check_known_columns(record)?;

        let previous = self.rows.get(&row_id).cloned().ok_or_else(|| {
            StoreError::Backend(format!(
                "row {} of relation \"{}\" does not exist",
                row_id,
                self.schema.name()
            ))
        })?;

        let mut row = previous.clone();
        for (name, value) in record {
            let column = self.schema.require_column(name)?;
            let value = coerce_into(column, value.clone())?;
            column.check_not_null(self.schema.name(), &value)?;
            row.insert(name.clone(), value);
        }

        self.rows.insert(row_id, row);
        log.record(Change::Updated { row_id, previous });

        self.check_unique(row_id)
    }

    pub fn delete(&mut self, row_id: u64, log: &mut UndoLog) -> bool {
        match self.rows.remove(&row_id) {
            Some(previous) => {
                log.record(Change::Deleted { row_id, previous });
                true
            }
            None => false,
        }
    }

    /// Removes every row. Sequences keep counting.
    pub fn truncate(&mut self) -> usize {
        let removed = self.rows.len();
        self.rows.clear();
        removed
    }

    pub(super) fn undo(&mut self, change: Change) {
        match change {
            Change::Inserted { row_id } => {
                self.rows.remove(&row_id);
            }
            Change::Updated { row_id, previous } | Change::Deleted { row_id, previous } => {
                self.rows.insert(row_id, previous);
            }
        }
    }

    fn check_known_columns(&self, record: &Record) -> Result<()> {
        for name in record.keys() {
            self.schema.require_column(name)?;
        }
        Ok(())
    }

    /// NULLs never conflict.
    fn check_unique(&self, row_id: u64) -> Result<()> {
        let Some(row) = self.rows.get(&row_id) else {
            return Ok(());
        };

        for column in self.schema.columns().iter().filter(|c| c.unique) {
            let value = match row.get(&column.name) {
                Some(value) if !value.is_null() => value,
                _ => continue,
            };
            let duplicate = self
                .rows
                .iter()
                .any(|(other_id, other)| *other_id != row_id && other.get(&column.name) == Some(value));
            if duplicate {
                return Err(StoreError::Backend(format!(
                    "duplicate key value violates unique constraint \"{}_{}_key\": ({})=({})",
                    self.schema.name(),
                    column.name,
                    column.name,
                    value
                )));
            }
        }
        Ok(())
    }
}

fn coerce_into(column: &ColumnSpec, value: Value) -> Result<Value> {
    column.column_type.coerce(value).map_err(|e| match e {
        StoreError::Backend(reason) => {
            StoreError::Backend(format!("column \"{}\": {}", column.name, reason))
        }
        other => other,
    })
}
