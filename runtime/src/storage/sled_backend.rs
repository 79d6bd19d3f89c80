//! # Durable Slab Store
//!
//! Slabs persisted in sled's embedded key-value store.
//!
//! ## Tree Layout
//!
//! | Tree       | Key                               | Value              |
//! |------------|-----------------------------------|--------------------|
//! | `slabs`    | `address (8B) ‖ index (8B BE)`    | `bincode(Slab)`    |
//! | `counters` | `address (8B)`                    | last index (8B BE) |
//!
//! Indices are big-endian so that sled's lexicographic order matches
//! [`StorageId`] ordering. Counters are persisted so ids stay unique across
//! a reopen of the same database.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use sled::{Db, Tree};
use tracing::trace;

use super::{codec, Slab, SlabStorage, StorageId};
use crate::error::{Error, Result};
use crate::types::Address;

#[derive(Debug, Clone)]
pub struct SledSlabStorage {
    db: Db,
    slabs: Tree,
    counters: Tree,
}

impl SledSlabStorage {
    /// Open or create a slab store at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// A store that lives in a temporary directory and is deleted on drop.
    pub fn open_temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> Result<Self> {
        let slabs = db.open_tree("slabs")?;
        let counters = db.open_tree("counters")?;
        Ok(Self {
            db,
            slabs,
            counters,
        })
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

fn decode_index(bytes: &[u8]) -> Result<u64> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| Error::Codec("invalid counter bytes".to_string()))?;
    Ok(u64::from_be_bytes(raw))
}

impl SlabStorage for SledSlabStorage {
    fn generate_storage_id(&mut self, address: Address) -> Result<StorageId> {
        let last = match self.counters.get(address.0)? {
            Some(bytes) => decode_index(&bytes)?,
            None => 0,
        };
        let next = last + 1;
        self.counters.insert(address.0, next.to_be_bytes().to_vec())?;
        Ok(StorageId::new(address, next))
    }

    fn store(&mut self, id: StorageId, slab: Slab) -> Result<()> {
        trace!(%id, kind = slab.kind(), "store slab");
        let bytes = codec::encode_slab(&slab)?;
        self.slabs.insert(id.to_key(), bytes)?;
        Ok(())
    }

    fn retrieve(&self, id: StorageId) -> Result<Arc<Slab>> {
        match self.slabs.get(id.to_key())? {
            Some(bytes) => Ok(Arc::new(codec::decode_slab(&bytes)?)),
            None => Err(Error::NotFound(id)),
        }
    }

    fn remove(&mut self, id: StorageId) -> Result<()> {
        trace!(%id, "remove slab");
        match self.slabs.remove(id.to_key())? {
            Some(_) => Ok(()),
            None => Err(Error::NotFound(id)),
        }
    }

    fn encode(&self) -> Result<BTreeMap<StorageId, Vec<u8>>> {
        let mut slabs = BTreeMap::new();
        for entry in self.slabs.iter() {
            let (key, value) = entry?;
            let id = StorageId::from_key(&key)
                .ok_or_else(|| Error::Codec("invalid slab key".to_string()))?;
            slabs.insert(id, value.to_vec());
        }
        Ok(slabs)
    }

    fn slab_count(&self) -> usize {
        self.slabs.len()
    }
}
