use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use log::debug;

use crate::adapter::{Adapter, Filter, Params};
use crate::core::{EntityId, Record, Result, Value};
use crate::entity::Entity;
use crate::query::QueryBuilder;
use crate::schema::FieldSchema;

/// Turns a stored row back into an entity.
pub type Deserializer<T> = Arc<dyn Fn(&Record) -> Result<T> + Send + Sync>;

struct TableInner<T> {
    name: String,
    adapter: Arc<dyn Adapter>,
    deserializer: Deserializer<T>,
    fields: Option<Vec<FieldSchema>>,
}

/// Typed handle binding an entity type to one backend table.
///
/// Cloning is cheap and clones share the same binding. The proxy holds no
/// mutable state, so it can be used from many tasks at once.
pub struct Table<T> {
    inner: Arc<TableInner<T>>,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for Table<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            _entity: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Table<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.inner.name)
            .field("entity", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T: Entity> Table<T> {
    pub(crate) fn new(
        name: String,
        adapter: Arc<dyn Adapter>,
        deserializer: Deserializer<T>,
        fields: Option<Vec<FieldSchema>>,
    ) -> Self {
        Self {
            inner: Arc::new(TableInner {
                name,
                adapter,
                deserializer,
                fields,
            }),
            _entity: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Field list given at registration, if any.
    pub fn fields(&self) -> Option<&[FieldSchema]> {
        self.inner.fields.as_deref()
    }

    pub(crate) fn adapter(&self) -> &Arc<dyn Adapter> {
        &self.inner.adapter
    }

    pub(crate) fn deserialize(&self, record: &Record) -> Result<T> {
        (self.inner.deserializer)(record)
    }

    /// Point lookup; a missing row is `Ok(None)`.
    pub async fn get_by_id(&self, id: impl Into<EntityId>) -> Result<Option<T>> {
        let id = id.into();
        match self.inner.adapter.get_by_id(self.name(), &id).await? {
            Some(record) => self.deserialize(&record).map(Some),
            None => Ok(None),
        }
    }

    /// Inserts an unsaved entity or updates a saved one.
    ///
    /// On the first successful save the backend's identifier is assigned to
    /// the entity; later saves keep and return the same identifier.
    pub async fn save(&self, entity: &T) -> Result<EntityId> {
        let identity = entity.identity();
        let _saving = identity.lock_for_save().await;

        let existing = identity.as_option();
        let record = entity.to_record();

        let id = self.inner.adapter.save(self.name(), existing, &record).await?;
        if existing.is_some() {
            return Ok(id);
        }

        debug!("Inserted {} into '{}'", id, self.name());
        if let Err(e) = identity.assign(id.clone()) {
            // The entity was identified elsewhere meanwhile; drop the new row.
            self.inner.adapter.delete_by_id(self.name(), &id).await?;
            return Err(e);
        }
        Ok(id)
    }

    /// Deletes the row of a saved entity.
    pub async fn delete(&self, entity: &T) -> Result<bool> {
        let id = entity.id()?;
        self.inner.adapter.delete_by_id(self.name(), id).await
    }

    pub async fn delete_by_id(&self, id: impl Into<EntityId>) -> Result<bool> {
        self.inner
            .adapter
            .delete_by_id(self.name(), &id.into())
            .await
    }

    pub async fn count(&self) -> Result<u64> {
        self.inner.adapter.count(self.name(), &Filter::new()).await
    }

    /// Removes every row.
    pub async fn truncate(&self) -> Result<()> {
        self.inner.adapter.truncate(self.name()).await
    }

    /// A fresh builder with no conditions.
    pub fn query(&self) -> QueryBuilder<T> {
        QueryBuilder::new(self.clone())
    }

    /// A builder starting from `condition` and its parameters.
    pub fn build_query(&self, condition: &str, params: Params) -> Result<QueryBuilder<T>> {
        let mut query = self.query();
        query.where_clause(condition, params)?;
        Ok(query)
    }

    /// A builder starting from `column = value`.
    pub fn where_column(&self, column: &str, value: impl Into<Value>) -> Result<QueryBuilder<T>> {
        let mut query = self.query();
        query.where_column(column, value)?;
        Ok(query)
    }

    /// Table proxy whose entity is rebuilt by `T::from_record`.
    pub(crate) fn with_default_deserializer(
        name: String,
        adapter: Arc<dyn Adapter>,
        fields: Option<Vec<FieldSchema>>,
    ) -> Self {
        Self::new(name, adapter, Arc::new(T::from_record), fields)
    }
}
