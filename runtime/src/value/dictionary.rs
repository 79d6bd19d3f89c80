//! # Dictionaries
//!
//! A map over hashable keys stored in one root slab. Entries are indexed by
//! the BLAKE3 digest of the key's canonical identity, so a lookup never looks
//! at unrelated keys and iteration walks entries in digest order.
//!
//! The identity of a key does not depend on where it is stored: an enum key
//! hashes its type identity and raw value, never its slab. Digests therefore
//! survive a transfer to another owner unchanged.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Bound;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Value;
use crate::error::{Error, Result};
use crate::session::Session;
use crate::storage::{Slab, Storable, StorageId};
use crate::types::{Address, StaticType};

/// BLAKE3 digest of a key's canonical identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KeyDigest(pub [u8; 32]);

impl KeyDigest {
    /// Digest of `key`; fails with [`Error::UnhashableKey`] outside the
    /// hashable subset.
    pub fn of(session: &Session, key: &Value) -> Result<Self> {
        Ok(KeyIdentity::of(session, key)?.digest)
    }
}

/// Canonical identity bytes of a key and their digest.
struct KeyIdentity {
    bytes: Vec<u8>,
    digest: KeyDigest,
}

impl KeyIdentity {
    fn of(session: &Session, key: &Value) -> Result<Self> {
        let mut bytes = Vec::new();
        key.write_key_identity(session, &mut bytes)?;
        let digest = KeyDigest(*blake3::hash(&bytes).as_bytes());
        Ok(Self { bytes, digest })
    }

    /// Whether `stored` holds a key with exactly this identity.
    fn matches(&self, session: &Session, stored: &Storable) -> Result<bool> {
        let stored = KeyIdentity::of(session, &session.stored_value(stored)?)?;
        Ok(stored.bytes == self.bytes)
    }
}

impl fmt::Display for KeyDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DictionaryEntry {
    pub(crate) key: Storable,
    pub(crate) value: Storable,
}

/// Root slab of a dictionary.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DictionarySlab {
    pub(crate) static_type: StaticType,
    pub(crate) entries: BTreeMap<KeyDigest, DictionaryEntry>,
    pub(crate) attached: bool,
}

impl DictionarySlab {
    /// The entry stored under `key`. A digest hit only counts when the
    /// stored key has the same identity.
    fn entry(&self, session: &Session, key: &KeyIdentity) -> Result<Option<&DictionaryEntry>> {
        match self.entries.get(&key.digest) {
            Some(entry) if key.matches(session, &entry.key)? => Ok(Some(entry)),
            _ => Ok(None),
        }
    }
}

fn dictionary_slab(slab: &Slab, id: StorageId) -> Result<&DictionarySlab> {
    match slab {
        Slab::Dictionary(dictionary) => Ok(dictionary),
        _ => Err(Error::UnexpectedSlab {
            id,
            expected: "dictionary",
        }),
    }
}

/// Handle to a dictionary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DictionaryValue {
    id: StorageId,
}

impl DictionaryValue {
    /// Create a dictionary of `static_type` under `owner` holding `entries`.
    ///
    /// Later duplicates of a key win; the values they replace are
    /// deep-removed.
    pub fn new(
        session: &mut Session,
        static_type: StaticType,
        owner: Option<Address>,
        entries: Vec<(Value, Value)>,
    ) -> Result<Self> {
        if !static_type.is_dictionary() {
            return Err(Error::InvalidStaticType(format!(
                "{static_type} is not a dictionary type"
            )));
        }
        session.types().check(&static_type)?;

        let id = session.allocate(
            owner,
            Slab::Dictionary(DictionarySlab {
                static_type,
                entries: BTreeMap::new(),
                attached: false,
            }),
        )?;
        let dictionary = Self { id };
        for (key, value) in entries {
            if let Some(replaced) = dictionary.insert(session, key, value)? {
                replaced.deep_remove(session)?;
            }
        }
        debug!(%id, count = dictionary.count(session)?, "created dictionary");
        Ok(dictionary)
    }

    pub fn storage_id(&self) -> StorageId {
        self.id
    }

    pub fn owner(&self) -> Option<Address> {
        self.id.owner()
    }

    fn load(&self, session: &Session) -> Result<Arc<Slab>> {
        let slab = session.retrieve(self.id)?;
        session
            .types()
            .check(&dictionary_slab(&slab, self.id)?.static_type)?;
        Ok(slab)
    }

    fn load_owned(&self, session: &Session) -> Result<DictionarySlab> {
        let slab = self.load(session)?;
        Ok(dictionary_slab(&slab, self.id)?.clone())
    }

    pub fn static_type(&self, session: &Session) -> Result<StaticType> {
        let slab = self.load(session)?;
        Ok(dictionary_slab(&slab, self.id)?.static_type.clone())
    }

    pub fn count(&self, session: &Session) -> Result<usize> {
        let slab = self.load(session)?;
        Ok(dictionary_slab(&slab, self.id)?.entries.len())
    }

    pub fn contains_key(&self, session: &Session, key: &Value) -> Result<bool> {
        let identity = KeyIdentity::of(session, key)?;
        let slab = self.load(session)?;
        Ok(dictionary_slab(&slab, self.id)?
            .entry(session, &identity)?
            .is_some())
    }

    pub fn get(&self, session: &Session, key: &Value) -> Result<Option<Value>> {
        let identity = KeyIdentity::of(session, key)?;
        let slab = self.load(session)?;
        match dictionary_slab(&slab, self.id)?.entry(session, &identity)? {
            Some(entry) => Ok(Some(session.stored_value(&entry.value)?)),
            None => Ok(None),
        }
    }

    /// Map `key` to `value`, returning the value it replaces.
    ///
    /// On replacement the stored key is kept. An incoming key the caller
    /// holds alone is deep-removed; one read back from a parent is left
    /// there. The replaced value is handed back to the caller, still live.
    pub fn insert(&self, session: &mut Session, key: Value, value: Value) -> Result<Option<Value>> {
        let identity = KeyIdentity::of(session, &key)?;
        let digest = identity.digest;
        let owner = self.owner();
        let mut dictionary = self.load_owned(session)?;
        if let Some(entry) = dictionary.entries.get(&digest) {
            if !identity.matches(session, &entry.key)? {
                return Err(Error::KeyCollision(digest));
            }
        }
        let value = session.adopt(value, owner)?;

        let Some(entry) = dictionary.entries.get_mut(&digest) else {
            let key = session.adopt(key, owner)?;
            dictionary.entries.insert(digest, DictionaryEntry { key, value });
            session.overwrite(self.id, Slab::Dictionary(dictionary))?;
            return Ok(None);
        };

        let replaced = std::mem::replace(&mut entry.value, value);
        session.overwrite(self.id, Slab::Dictionary(dictionary))?;

        if !session.is_attached(&key)? {
            key.deep_remove(session)?;
        }
        Ok(Some(session.detach(replaced)?))
    }

    /// Remove the entry for `key`. The stored key is deep-removed; the value
    /// is handed back to the caller.
    pub fn remove(&self, session: &mut Session, key: &Value) -> Result<Option<Value>> {
        let identity = KeyIdentity::of(session, key)?;
        let mut dictionary = self.load_owned(session)?;
        if dictionary.entry(session, &identity)?.is_none() {
            return Ok(None);
        }
        let Some(entry) = dictionary.entries.remove(&identity.digest) else {
            return Ok(None);
        };
        session.overwrite(self.id, Slab::Dictionary(dictionary))?;

        session.remove_storable(&entry.key)?;
        Ok(Some(session.detach(entry.value)?))
    }

    /// Entries in digest order. Each call starts from the beginning.
    pub fn iter<'s>(&self, session: &'s Session) -> Result<DictionaryIter<'s>> {
        Ok(DictionaryIter {
            session,
            id: self.id,
            slab: self.load(session)?,
            last: None,
        })
    }

    /// Visit entries until `visitor` returns `false`.
    pub fn iterate<F>(&self, session: &Session, mut visitor: F) -> Result<()>
    where
        F: FnMut(Value, Value) -> bool,
    {
        for entry in self.iter(session)? {
            let (key, value) = entry?;
            if !visitor(key, value) {
                break;
            }
        }
        Ok(())
    }

    pub(crate) fn transfer(
        &self,
        session: &mut Session,
        target: Option<Address>,
        is_for_removal: bool,
    ) -> Result<DictionaryValue> {
        if is_for_removal && self.owner() == target {
            return Ok(*self);
        }

        let slab = self.load(session)?;
        let source = dictionary_slab(&slab, self.id)?;
        let mut entries = BTreeMap::new();
        for (digest, entry) in &source.entries {
            let key = session.stored_value(&entry.key)?.transfer(session, target, false)?;
            let value = session
                .stored_value(&entry.value)?
                .transfer(session, target, false)?;
            entries.insert(
                *digest,
                DictionaryEntry {
                    key: session.embed(&key, target)?,
                    value: session.embed(&value, target)?,
                },
            );
        }

        let id = session.allocate(
            target,
            Slab::Dictionary(DictionarySlab {
                static_type: source.static_type.clone(),
                entries,
                attached: false,
            }),
        )?;
        debug!(from = %self.id, to = %id, "transferred dictionary");
        Ok(DictionaryValue { id })
    }

    pub(crate) fn release(&self, session: &mut Session) -> Result<()> {
        let slab = session.retrieve_for_removal(self.id)?;
        for entry in dictionary_slab(&slab, self.id)?.entries.values() {
            session.remove_storable(&entry.key)?;
            session.remove_storable(&entry.value)?;
        }
        session.release(self.id)?;
        debug!(id = %self.id, "removed dictionary");
        Ok(())
    }

    pub(crate) fn equal(&self, session: &Session, other: &DictionaryValue) -> Result<bool> {
        if self.id == other.id {
            return Ok(true);
        }
        let left = self.load(session)?;
        let right = other.load(session)?;
        let left = dictionary_slab(&left, self.id)?;
        let right = dictionary_slab(&right, other.id)?;

        if left.static_type != right.static_type || left.entries.len() != right.entries.len() {
            return Ok(false);
        }
        for (digest, entry) in &left.entries {
            let Some(counterpart) = right.entries.get(digest) else {
                return Ok(false);
            };
            let left_key = session.stored_value(&entry.key)?;
            if !left_key.equal(session, &session.stored_value(&counterpart.key)?)? {
                return Ok(false);
            }
            let a = session.stored_value(&entry.value)?;
            let b = session.stored_value(&counterpart.value)?;
            if !a.equal(session, &b)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Iterator over the entries of one dictionary snapshot.
pub struct DictionaryIter<'s> {
    session: &'s Session,
    id: StorageId,
    slab: Arc<Slab>,
    /// Digest of the entry returned last; iteration resumes after it.
    last: Option<KeyDigest>,
}

impl Iterator for DictionaryIter<'_> {
    type Item = Result<(Value, Value)>;

    fn next(&mut self) -> Option<Self::Item> {
        let dictionary = match dictionary_slab(&self.slab, self.id) {
            Ok(dictionary) => dictionary,
            Err(err) => return Some(Err(err)),
        };
        let lower = match &self.last {
            Some(digest) => Bound::Excluded(*digest),
            None => Bound::Unbounded,
        };
        let (digest, entry) = dictionary.entries.range((lower, Bound::Unbounded)).next()?;
        self.last = Some(*digest);

        let entry = self
            .session
            .stored_value(&entry.key)
            .and_then(|key| Ok((key, self.session.stored_value(&entry.value)?)));
        Some(entry)
    }
}
