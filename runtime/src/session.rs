//! # Session
//!
//! The context every value operation runs in: the slab store, the composite
//! declarations known so far and the runtime configuration. A session is
//! passed explicitly; nothing in this crate reaches for global state.
//!
//! Reads take `&Session`, anything that may allocate or release a slab takes
//! `&mut Session`. Iterators borrow the session immutably, so a container
//! cannot be mutated while it is being walked.

use std::sync::Arc;

use tracing::debug;

use crate::config::RuntimeConfig;
use crate::error::{Error, Result};
use crate::storage::{
    maybe_store_externally, InMemorySlabStorage, Slab, SlabStorage, Storable, StorageId,
    StorageStats,
};
use crate::types::{Address, CompositeTypeInfo, TypeEnvironment};
use crate::value::Value;

pub struct Session {
    storage: Box<dyn SlabStorage>,
    types: TypeEnvironment,
    config: RuntimeConfig,
}

impl Session {
    pub fn new(storage: Box<dyn SlabStorage>, config: RuntimeConfig) -> Self {
        Self {
            storage,
            types: TypeEnvironment::new(),
            config,
        }
    }

    /// A session over a fresh in-memory store with the default configuration.
    pub fn in_memory() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// A session over a fresh in-memory store.
    pub fn with_config(config: RuntimeConfig) -> Self {
        Self::new(Box::new(InMemorySlabStorage::new()), config)
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn types(&self) -> &TypeEnvironment {
        &self.types
    }

    pub fn types_mut(&mut self) -> &mut TypeEnvironment {
        &mut self.types
    }

    pub fn register_type(&mut self, info: CompositeTypeInfo) {
        debug!(type_id = %info.id, kind = info.kind.name(), "register composite type");
        self.types.register(info);
    }

    pub fn storage(&self) -> &dyn SlabStorage {
        self.storage.as_ref()
    }

    pub fn stats(&self) -> Result<StorageStats> {
        StorageStats::collect(self.storage.as_ref())
    }

    // -----------------------------------------------------------------------
    // Storables
    // -----------------------------------------------------------------------

    /// The storable a parent owned by `owner` embeds for `value`, applying
    /// the inlining policy.
    pub fn storable(&mut self, value: &Value, owner: Option<Address>) -> Result<Storable> {
        maybe_store_externally(
            self.storage.as_mut(),
            Storable::Inline(value.clone()),
            owner,
            self.config.max_inline_size,
        )
    }

    /// Resolve a storable back to the value it stands for.
    pub fn stored_value(&self, storable: &Storable) -> Result<Value> {
        match storable {
            Storable::Inline(value) => Ok(value.clone()),
            Storable::Indirect(id) => match &*self.storage.retrieve(*id)? {
                Slab::Storable(inner) => self.stored_value(inner),
                _ => Err(Error::UnexpectedSlab {
                    id: *id,
                    expected: "storable",
                }),
            },
        }
    }

    /// Release everything a storable holds: the value's own slabs and the
    /// wrapper slab of an externalized value.
    pub fn remove_storable(&mut self, storable: &Storable) -> Result<()> {
        let value = self.stored_value(storable).map_err(removed_twice)?;
        value.release(self)?;
        if let Storable::Indirect(id) = storable {
            self.release(*id)?;
        }
        Ok(())
    }

    /// Bind `value` to `target`.
    ///
    /// A value the caller holds alone is moved: returned as is when already
    /// owned by `target`, otherwise copied under `target` with the source
    /// deep-removed. A value still embedded in a parent (read back from a
    /// container or an account) is copied under `target` and its parent
    /// keeps the original.
    pub fn move_value(&mut self, value: Value, target: Option<Address>) -> Result<Value> {
        if self.is_attached(&value)? {
            return value.transfer(self, target, false);
        }
        if value.owner() == target {
            return Ok(value);
        }
        let moved = value.transfer(self, target, true)?;
        value.deep_remove(self)?;
        Ok(moved)
    }

    /// Whether the container behind `value` is embedded in a parent.
    /// Scalars are never attached.
    pub fn is_attached(&self, value: &Value) -> Result<bool> {
        match value.root_id() {
            Some(id) => Ok(self.storage.retrieve(id)?.is_attached()),
            None => Ok(false),
        }
    }

    // -----------------------------------------------------------------------
    // Slab plumbing for the container modules
    // -----------------------------------------------------------------------

    pub(crate) fn allocate(&mut self, owner: Option<Address>, slab: Slab) -> Result<StorageId> {
        let id = self
            .storage
            .generate_storage_id(Address::for_owner(owner))?;
        self.storage.store(id, slab)?;
        Ok(id)
    }

    pub(crate) fn retrieve(&self, id: StorageId) -> Result<Arc<Slab>> {
        self.storage.retrieve(id)
    }

    /// Retrieve a slab that is about to be released. A missing slab means it
    /// was released already.
    pub(crate) fn retrieve_for_removal(&self, id: StorageId) -> Result<Arc<Slab>> {
        self.storage.retrieve(id).map_err(removed_twice)
    }

    pub(crate) fn overwrite(&mut self, id: StorageId, slab: Slab) -> Result<()> {
        self.storage.store(id, slab)
    }

    pub(crate) fn release(&mut self, id: StorageId) -> Result<()> {
        self.storage.remove(id).map_err(removed_twice)
    }

    /// Move `value` into a parent owned by `owner` and return what the
    /// parent embeds for it.
    pub(crate) fn adopt(&mut self, value: Value, owner: Option<Address>) -> Result<Storable> {
        let value = self.move_value(value, owner)?;
        self.embed(&value, owner)
    }

    /// The storable for a value that now belongs to a parent.
    pub(crate) fn embed(&mut self, value: &Value, owner: Option<Address>) -> Result<Storable> {
        self.mark_attached(value, true)?;
        self.storable(value, owner)
    }

    /// Take a value out of its parent. The wrapper slab of an externalized
    /// value is released; the value's own slabs stay live and belong to the
    /// caller.
    pub(crate) fn detach(&mut self, storable: Storable) -> Result<Value> {
        let value = self.stored_value(&storable)?;
        if let Storable::Indirect(id) = storable {
            self.release(id)?;
        }
        self.mark_attached(&value, false)?;
        Ok(value)
    }

    fn mark_attached(&mut self, value: &Value, attached: bool) -> Result<()> {
        let Some(id) = value.root_id() else {
            return Ok(());
        };
        let slab = self.storage.retrieve(id)?;
        if slab.is_attached() == attached {
            return Ok(());
        }
        let mut slab = (*slab).clone();
        slab.set_attached(attached);
        self.storage.store(id, slab)
    }
}

fn removed_twice(err: Error) -> Error {
    match err {
        Error::NotFound(id) => Error::DoubleRemove(id),
        other => other,
    }
}
