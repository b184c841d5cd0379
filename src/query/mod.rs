//! Predicate, ordering and parameter accumulation for one table.

use log::debug;

use crate::adapter::{Filter, OrderBy, Params, Selection};
use crate::core::naming::validate_identifier;
use crate::core::{Result, Value};
use crate::entity::Entity;
use crate::facade::Table;

/// Row cap used by [`QueryBuilder::fetch`].
pub const DEFAULT_LIMIT: usize = 20;

/// Mutable, single-use accumulator of conditions bound to one table.
///
/// Conditions are AND-combined in the order they were added. Parameter names
/// must be unique across all of them.
#[derive(Debug, Clone)]
pub struct QueryBuilder<T> {
    table: Table<T>,
    filter: Filter,
    order: Vec<OrderBy>,
}

impl<T: Entity> QueryBuilder<T> {
    pub(crate) fn new(table: Table<T>) -> Self {
        Self {
            table,
            filter: Filter::new(),
            order: Vec::new(),
        }
    }

    pub fn table(&self) -> &Table<T> {
        &self.table
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    /// Appends `condition` to the conjunction.
    ///
    /// Fails with `ParameterConflict` if any parameter name is already bound;
    /// in that case neither the condition nor its parameters are kept.
    pub fn where_clause(&mut self, condition: &str, params: Params) -> Result<&mut Self> {
        self.filter.push(condition, params)?;
        Ok(self)
    }

    /// Equality on one column, bound under the column's name.
    pub fn where_column(&mut self, column: &str, value: impl Into<Value>) -> Result<&mut Self> {
        validate_identifier(column)?;
        let condition = format!("{} = @{}", column, column);
        self.where_clause(&condition, vec![(column.to_string(), value.into())])
    }

    /// Adds a sort key. Earlier calls take precedence.
    pub fn order_by(&mut self, column: &str, descending: bool) -> &mut Self {
        self.order.push(OrderBy {
            column: column.to_string(),
            descending,
        });
        self
    }

    /// Number of matching rows. Ordering is ignored.
    pub async fn count(&self) -> Result<u64> {
        self.table
            .adapter()
            .count(self.table.name(), &self.filter)
            .await
    }

    /// Matching rows, ordered and capped at `limit`.
    ///
    /// With `columns` only those columns are read, so the deserializer must
    /// accept rows missing the others.
    pub async fn select(&self, columns: Option<&[&str]>, limit: usize) -> Result<Vec<T>> {
        let columns = match columns {
            Some(columns) => {
                for column in columns {
                    validate_identifier(column)?;
                }
                Some(columns.iter().map(|c| c.to_string()).collect())
            }
            None => None,
        };

        let selection = Selection {
            filter: self.filter.clone(),
            order: self.order.clone(),
            columns,
            limit,
        };
        debug!("Select from '{}' where {}", self.table.name(), self.filter);

        let rows = self
            .table
            .adapter()
            .select(self.table.name(), &selection)
            .await?;
        rows.iter().map(|row| self.table.deserialize(row)).collect()
    }

    /// All columns, at most [`DEFAULT_LIMIT`] rows.
    pub async fn fetch(&self) -> Result<Vec<T>> {
        self.select(None, DEFAULT_LIMIT).await
    }

    pub async fn first(&self) -> Result<Option<T>> {
        Ok(self.select(None, 1).await?.into_iter().next())
    }

    /// Deletes the matching rows in one transaction, returning how many went.
    pub async fn delete_all(&self) -> Result<u64> {
        self.table
            .adapter()
            .delete_where(self.table.name(), &self.filter)
            .await
    }
}
