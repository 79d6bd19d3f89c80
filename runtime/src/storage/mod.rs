//! # Storage Module
//!
//! Every persisted value lives in a *slab*: one unit of storage addressed by a
//! [`StorageId`]. Containers own one root slab each; scalars are embedded in
//! their parent's slab unless their encoding is too large, in which case they
//! are moved into a slab of their own and the parent keeps a placeholder.
//!
//! ## Architecture
//!
//! ```text
//! mod.rs           — StorageId, Storable, Slab, SlabStorage trait, inlining policy
//! codec.rs         — bincode encoding and size accounting
//! memory.rs        — in-memory slab arena
//! sled_backend.rs  — durable slab store on sled
//! ```
//!
//! ## Data Flow
//!
//! ```text
//! Value ──storable()──▶ Storable::Inline ──(size ≥ threshold)──▶ Slab::Storable
//!                            │                                        │
//!                       parent slab                         Storable::Indirect(id)
//! ```

pub mod codec;
pub mod memory;
pub mod sled_backend;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::types::Address;
use crate::value::array::ArraySlab;
use crate::value::composite::CompositeSlab;
use crate::value::dictionary::DictionarySlab;
use crate::value::Value;

pub use memory::InMemorySlabStorage;
pub use sled_backend::SledSlabStorage;

// ---------------------------------------------------------------------------
// StorageId
// ---------------------------------------------------------------------------

/// Names one slab: the address it is allocated under plus a sequence number
/// that is unique and monotonic per address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StorageId {
    pub address: Address,
    pub index: u64,
}

impl StorageId {
    pub fn new(address: Address, index: u64) -> Self {
        Self { address, index }
    }

    /// Owner of the slab, `None` when it was allocated for a transient value.
    pub fn owner(&self) -> Option<Address> {
        self.address.owner()
    }

    /// 16-byte big-endian key. Byte order matches `Ord`, so range scans over
    /// one address walk its slabs in allocation order.
    pub fn to_key(&self) -> [u8; 16] {
        let mut key = [0u8; 16];
        key[..8].copy_from_slice(&self.address.0);
        key[8..].copy_from_slice(&self.index.to_be_bytes());
        key
    }

    pub fn from_key(key: &[u8]) -> Option<Self> {
        if key.len() != 16 {
            return None;
        }
        let mut address = [0u8; 8];
        address.copy_from_slice(&key[..8]);
        let mut index = [0u8; 8];
        index.copy_from_slice(&key[8..]);
        Some(Self::new(Address(address), u64::from_be_bytes(index)))
    }
}

impl fmt::Display for StorageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.index)
    }
}

// ---------------------------------------------------------------------------
// Storable & Slab
// ---------------------------------------------------------------------------

/// The encodable projection of a value as its parent slab sees it.
///
/// Containers are always `Inline` with only their handle embedded; the
/// container's content sits in its own root slab.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Storable {
    /// The value is embedded in the parent's encoding.
    Inline(Value),
    /// Placeholder for a value that was moved into its own slab.
    Indirect(StorageId),
}

/// A persisted unit of storage.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Slab {
    /// A storable too large to embed in its parent.
    Storable(Storable),
    Array(ArraySlab),
    Dictionary(DictionarySlab),
    Composite(CompositeSlab),
}

impl Slab {
    /// Whether a container root is embedded in a parent. Wrapper slabs are
    /// never attached.
    pub fn is_attached(&self) -> bool {
        match self {
            Slab::Storable(_) => false,
            Slab::Array(array) => array.attached,
            Slab::Dictionary(dictionary) => dictionary.attached,
            Slab::Composite(composite) => composite.attached,
        }
    }

    pub(crate) fn set_attached(&mut self, attached: bool) {
        match self {
            Slab::Storable(_) => {}
            Slab::Array(array) => array.attached = attached,
            Slab::Dictionary(dictionary) => dictionary.attached = attached,
            Slab::Composite(composite) => composite.attached = attached,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Slab::Storable(_) => "storable",
            Slab::Array(_) => "array",
            Slab::Dictionary(_) => "dictionary",
            Slab::Composite(_) => "composite",
        }
    }
}

// ---------------------------------------------------------------------------
// SlabStorage
// ---------------------------------------------------------------------------

/// Backend contract consumed by the value layer.
///
/// Calls are synchronous and assumed atomic individually. Nothing here is
/// transactional across calls.
pub trait SlabStorage {
    /// Allocate a fresh id under `address`.
    fn generate_storage_id(&mut self, address: Address) -> Result<StorageId>;

    /// Write `slab` at `id`, replacing whatever was there.
    fn store(&mut self, id: StorageId, slab: Slab) -> Result<()>;

    /// Read the slab at `id`; [`Error::NotFound`](crate::Error::NotFound) if absent.
    fn retrieve(&self, id: StorageId) -> Result<Arc<Slab>>;

    /// Delete the slab at `id`; [`Error::NotFound`](crate::Error::NotFound) if absent.
    fn remove(&mut self, id: StorageId) -> Result<()>;

    /// Encoded bytes of every slab. Diagnostic only.
    fn encode(&self) -> Result<BTreeMap<StorageId, Vec<u8>>>;

    fn slab_count(&self) -> usize;
}

/// Byte footprint of a store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StorageStats {
    pub slab_count: usize,
    pub total_size: usize,
}

impl StorageStats {
    pub fn collect(storage: &dyn SlabStorage) -> Result<Self> {
        let slabs = storage.encode()?;
        Ok(Self {
            slab_count: slabs.len(),
            total_size: slabs.values().map(Vec::len).sum(),
        })
    }
}

impl fmt::Display for StorageStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} slabs, {} bytes", self.slab_count, self.total_size)
    }
}

// ---------------------------------------------------------------------------
// Inlining Policy
// ---------------------------------------------------------------------------

/// Return `storable` unchanged if it can be inlined, otherwise store it in a
/// fresh slab under `owner` and return a placeholder for it.
pub fn maybe_store_externally(
    storage: &mut dyn SlabStorage,
    storable: Storable,
    owner: Option<Address>,
    max_inline_size: u64,
) -> Result<Storable> {
    let size = codec::storable_size(&storable)?;
    if u64::from(size) < max_inline_size {
        return Ok(storable);
    }

    let id = storage.generate_storage_id(Address::for_owner(owner))?;
    storage.store(id, Slab::Storable(storable))?;
    debug!(%id, size, "stored oversized value externally");

    Ok(Storable::Indirect(id))
}
