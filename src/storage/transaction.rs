//! Undo log for multi-step writes on one table.
//!
//! Each mutating step records how to reverse itself. If a later step fails,
//! the log is replayed backwards so the table looks untouched. Sequence
//! counters are left advanced, as in PostgreSQL.

use log::debug;

use super::table::MemoryTable;
use crate::core::{Record, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Inserted { row_id: u64 },
    Updated { row_id: u64, previous: Record },
    Deleted { row_id: u64, previous: Record },
}

#[derive(Debug, Default)]
pub struct UndoLog {
    changes: Vec<Change>,
}

impl UndoLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, change: Change) {
        self.changes.push(change);
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn rollback(self, table: &mut MemoryTable) {
        debug!(
            "Rolling back {} change(s) on '{}'",
            self.changes.len(),
            table.schema().name()
        );
        for change in self.changes.into_iter().rev() {
            table.undo(change);
        }
    }
}

/// Runs `work` against `table`; on error every recorded change is reverted
/// before the error is returned.
pub fn atomically<T>(
    table: &mut MemoryTable,
    work: impl FnOnce(&mut MemoryTable, &mut UndoLog) -> Result<T>,
) -> Result<T> {
    let mut log = UndoLog::new();
    match work(table, &mut log) {
        Ok(value) => Ok(value),
        Err(e) => {
            log.rollback(table);
            Err(e)
        }
    }
}
