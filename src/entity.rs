//! The capability set domain types implement to be stored in a table.

use std::hash::{Hash, Hasher};
use std::sync::OnceLock;

use tokio::sync::{Mutex, MutexGuard};

use crate::core::naming::default_table_name;
use crate::core::{EntityId, ID_COLUMN, Record, Result, StoreError, Value};

/// Set-once holder of an entity's backend identifier.
///
/// An identity starts empty and is filled exactly once, by the table proxy,
/// after the first successful save. Equality and hashing follow the
/// identifier once it exists; before that an identity only equals itself.
/// Because the hash changes when the identifier is assigned, do not keep an
/// unsaved entity in a hash-based collection across its first save.
///
/// Saves of one entity are serialized through a per-identity lock, so two
/// tasks saving the same unsaved entity insert it once.
#[derive(Debug, Default)]
pub struct Identity {
    id: OnceLock<EntityId>,
    saving: Mutex<()>,
}

impl Clone for Identity {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            saving: Mutex::new(()),
        }
    }
}

impl Identity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn persisted(id: EntityId) -> Self {
        Self {
            id: OnceLock::from(id),
            saving: Mutex::new(()),
        }
    }

    /// Reads the identity from the `id` column of a record; a missing or
    /// `NULL` column yields an unpersisted identity.
    pub fn from_record(record: &Record) -> Result<Self> {
        match record.get(ID_COLUMN) {
            None | Some(Value::Null) => Ok(Self::new()),
            Some(value) => EntityId::try_from(value).map(Self::persisted),
        }
    }

    pub fn get(&self) -> Result<&EntityId> {
        self.id.get().ok_or(StoreError::UnpersistedAccess)
    }

    pub fn as_option(&self) -> Option<&EntityId> {
        self.id.get()
    }

    pub fn is_persisted(&self) -> bool {
        self.id.get().is_some()
    }

    /// Held by the table proxy for the whole of a save.
    pub(crate) async fn lock_for_save(&self) -> MutexGuard<'_, ()> {
        self.saving.lock().await
    }

    /// Records the identifier returned by the first save. Assigning the same
    /// identifier again is a no-op; a different one is refused.
    pub(crate) fn assign(&self, id: EntityId) -> Result<()> {
        let current = self.id.get_or_init(|| id.clone());
        if *current == id {
            Ok(())
        } else {
            Err(StoreError::Backend(format!(
                "entity {} cannot be re-identified as {}",
                current, id
            )))
        }
    }
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        match (self.id.get(), other.id.get()) {
            (Some(a), Some(b)) => a == b,
            _ => std::ptr::eq(self, other),
        }
    }
}

impl Eq for Identity {}

impl Hash for Identity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self.id.get() {
            Some(id) => id.hash(state),
            None => std::ptr::hash(self, state),
        }
    }
}

/// A domain type that can be persisted through a [`Table`](crate::Table).
pub trait Entity: Send + Sync + Sized + 'static {
    fn identity(&self) -> &Identity;

    /// Column values of the entity, without the identifier column.
    fn to_record(&self) -> Record;

    /// Rebuilds an entity from a stored row, including its `id` column.
    fn from_record(record: &Record) -> Result<Self>;

    /// Table name used when none is given at registration.
    fn default_table_name() -> String {
        default_table_name(std::any::type_name::<Self>())
    }

    fn id(&self) -> Result<&EntityId> {
        self.identity().get()
    }

    fn is_persisted(&self) -> bool {
        self.identity().is_persisted()
    }

    /// Full serialized form: the columns plus `id` once persisted.
    fn serialize(&self) -> Record {
        let mut record = self.to_record();
        record.remove(ID_COLUMN);
        if let Some(id) = self.identity().as_option() {
            record.insert(ID_COLUMN.to_string(), id.into());
        }
        record
    }
}

/// Implements `PartialEq`, `Eq` and `Hash` for an entity type through its
/// [`Identity`].
#[macro_export]
macro_rules! entity_identity {
    ($ty:ty) => {
        impl ::std::cmp::PartialEq for $ty {
            fn eq(&self, other: &Self) -> bool {
                $crate::Entity::identity(self) == $crate::Entity::identity(other)
            }
        }

        impl ::std::cmp::Eq for $ty {}

        impl ::std::hash::Hash for $ty {
            fn hash<H: ::std::hash::Hasher>(&self, state: &mut H) {
                ::std::hash::Hash::hash($crate::Entity::identity(self), state)
            }
        }
    };
}
