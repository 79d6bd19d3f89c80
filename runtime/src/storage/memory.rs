//! In-memory slab arena.
//!
//! Slabs are kept decoded behind `Arc`, so `retrieve` is a reference-count
//! bump rather than a decode. `encode` serializes on demand and is only meant
//! for size and consistency checks.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::trace;

use super::{codec, Slab, SlabStorage, StorageId};
use crate::error::{Error, Result};
use crate::types::Address;

#[derive(Debug, Default, Clone)]
pub struct InMemorySlabStorage {
    slabs: BTreeMap<StorageId, Arc<Slab>>,
    /// Last index handed out per address.
    counters: HashMap<Address, u64>,
}

impl InMemorySlabStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: StorageId) -> bool {
        self.slabs.contains_key(&id)
    }
}

impl SlabStorage for InMemorySlabStorage {
    fn generate_storage_id(&mut self, address: Address) -> Result<StorageId> {
        let counter = self.counters.entry(address).or_insert(0);
        *counter += 1;
        Ok(StorageId::new(address, *counter))
    }

    fn store(&mut self, id: StorageId, slab: Slab) -> Result<()> {
        trace!(%id, kind = slab.kind(), "store slab");
        self.slabs.insert(id, Arc::new(slab));
        Ok(())
    }

    fn retrieve(&self, id: StorageId) -> Result<Arc<Slab>> {
        self.slabs.get(&id).cloned().ok_or(Error::NotFound(id))
    }

    fn remove(&mut self, id: StorageId) -> Result<()> {
        trace!(%id, "remove slab");
        self.slabs.remove(&id).map(|_| ()).ok_or(Error::NotFound(id))
    }

    fn encode(&self) -> Result<BTreeMap<StorageId, Vec<u8>>> {
        self.slabs
            .iter()
            .map(|(id, slab)| Ok((*id, codec::encode_slab(slab)?)))
            .collect()
    }

    fn slab_count(&self) -> usize {
        self.slabs.len()
    }
}
