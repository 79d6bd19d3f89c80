//! # Account Storage
//!
//! Maps `(owner, key)` to the storable of a value written there. Writing a
//! value moves it into the owner's account first, so the stored tree is bound
//! to the owner no matter where it was built. A value read back from another
//! slot or container is copied instead, and its source keeps the original.
//!
//! What happens to the value being replaced is governed by
//! [`OverwritePolicy`]:
//!
//! | Policy        | Overwrite / delete                                  |
//! |---------------|-----------------------------------------------------|
//! | `DeepRemove`  | the prior value's slabs are released first          |
//! | `Retain`      | the mapping is dropped, prior slabs stay in storage |

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::config::OverwritePolicy;
use crate::error::Result;
use crate::session::Session;
use crate::storage::Storable;
use crate::types::Address;
use crate::value::Value;

// ---------------------------------------------------------------------------
// AccountStorage
// ---------------------------------------------------------------------------

/// Per-account key/value store on top of a [`Session`].
#[derive(Debug, Default, Clone)]
pub struct AccountStorage {
    entries: BTreeMap<(Address, String), Storable>,
}

impl AccountStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exists(&self, owner: Address, key: &str) -> bool {
        self.entries.contains_key(&(owner, key.to_string()))
    }

    /// The value stored at `key` in `owner`'s account.
    pub fn read(&self, session: &Session, owner: Address, key: &str) -> Result<Option<Value>> {
        match self.entries.get(&(owner, key.to_string())) {
            Some(storable) => Ok(Some(session.stored_value(storable)?)),
            None => Ok(None),
        }
    }

    /// Store `value` at `key`, or delete the entry when `value` is `None`.
    ///
    /// The incoming value is bound to `owner` before the prior one is
    /// touched, so a value read from any slot, this one included, can be
    /// written back. Writing the container already stored at `key` leaves
    /// the slot unchanged.
    pub fn write(
        &mut self,
        session: &mut Session,
        owner: Address,
        key: &str,
        value: Option<Value>,
    ) -> Result<()> {
        let slot = (owner, key.to_string());

        let incoming = match value {
            Some(value) => {
                if let Some(prior) = self.entries.get(&slot) {
                    let root = value.root_id();
                    if root.is_some() && session.stored_value(prior)?.root_id() == root {
                        debug!(%owner, key, "account entry unchanged");
                        return Ok(());
                    }
                }
                Some(session.adopt(value, Some(owner))?)
            }
            None => None,
        };

        if let Some(prior) = self.entries.remove(&slot) {
            match session.config().overwrite_policy {
                OverwritePolicy::DeepRemove => session.remove_storable(&prior)?,
                OverwritePolicy::Retain => {
                    warn!(%owner, key, "replaced value left in storage");
                }
            }
        }

        match incoming {
            Some(storable) => {
                self.entries.insert(slot, storable);
                debug!(%owner, key, "wrote account entry");
            }
            None => debug!(%owner, key, "deleted account entry"),
        }
        Ok(())
    }

    /// Keys stored in `owner`'s account, in order.
    pub fn keys(&self, owner: Address) -> Vec<String> {
        self.entries
            .range((owner, String::new())..)
            .take_while(|((address, _), _)| *address == owner)
            .map(|((_, key), _)| key.clone())
            .collect()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::types::{PrimitiveType, StaticType};
    use crate::value::ArrayValue;

    fn session(policy: OverwritePolicy) -> Session {
        Session::with_config(RuntimeConfig {
            overwrite_policy: policy,
            ..RuntimeConfig::default()
        })
    }

    fn int_array(session: &mut Session, values: &[i64]) -> Value {
        let array = ArrayValue::new(
            session,
            StaticType::variable_sized(StaticType::Primitive(PrimitiveType::Int64)),
            None,
            values.iter().map(|n| Value::Int64(*n)).collect(),
        )
        .unwrap();
        Value::Array(array)
    }

    #[test]
    fn write_read_delete() {
        let mut session = session(OverwritePolicy::DeepRemove);
        let mut accounts = AccountStorage::new();
        let owner = Address::from_u64(1);

        assert!(!accounts.exists(owner, "greeting"));
        accounts
            .write(&mut session, owner, "greeting", Some("hello".into()))
            .unwrap();
        assert!(accounts.exists(owner, "greeting"));
        assert!(matches!(
            accounts.read(&session, owner, "greeting").unwrap(),
            Some(Value::String(s)) if s == "hello"
        ));

        accounts.write(&mut session, owner, "greeting", None).unwrap();
        assert!(!accounts.exists(owner, "greeting"));
        assert!(accounts.read(&session, owner, "greeting").unwrap().is_none());
    }

    #[test]
    fn written_containers_are_bound_to_the_owner() {
        let mut session = session(OverwritePolicy::DeepRemove);
        let mut accounts = AccountStorage::new();
        let owner = Address::from_u64(4);

        let array = int_array(&mut session, &[1, 2, 3]);
        accounts.write(&mut session, owner, "numbers", Some(array)).unwrap();

        let stored = accounts.read(&session, owner, "numbers").unwrap().unwrap();
        assert_eq!(stored.owner(), Some(owner));
        // The transient source was removed by the move.
        assert_eq!(session.storage().slab_count(), 1);
    }

    #[test]
    fn overwrite_releases_prior_value() {
        let mut session = session(OverwritePolicy::DeepRemove);
        let mut accounts = AccountStorage::new();
        let owner = Address::from_u64(1);

        let first = int_array(&mut session, &[1]);
        accounts.write(&mut session, owner, "k", Some(first)).unwrap();
        let second = int_array(&mut session, &[2]);
        accounts.write(&mut session, owner, "k", Some(second)).unwrap();
        assert_eq!(session.storage().slab_count(), 1);

        accounts.write(&mut session, owner, "k", None).unwrap();
        assert_eq!(session.storage().slab_count(), 0);
    }

    #[test]
    fn retain_policy_leaves_prior_slabs() {
        let mut session = session(OverwritePolicy::Retain);
        let mut accounts = AccountStorage::new();
        let owner = Address::from_u64(1);

        let first = int_array(&mut session, &[1]);
        accounts.write(&mut session, owner, "k", Some(first)).unwrap();
        let second = int_array(&mut session, &[2]);
        accounts.write(&mut session, owner, "k", Some(second)).unwrap();
        assert_eq!(session.storage().slab_count(), 2);
        assert_eq!(accounts.entry_count(), 1);
    }

    #[test]
    fn keys_are_scoped_to_the_owner() {
        let mut session = session(OverwritePolicy::DeepRemove);
        let mut accounts = AccountStorage::new();
        let alice = Address::from_u64(1);
        let bob = Address::from_u64(2);

        for key in ["b", "a"] {
            accounts
                .write(&mut session, alice, key, Some(Value::Bool(true)))
                .unwrap();
        }
        accounts
            .write(&mut session, bob, "c", Some(Value::Bool(false)))
            .unwrap();

        assert_eq!(accounts.keys(alice), ["a", "b"]);
        assert_eq!(accounts.keys(bob), ["c"]);
        assert_eq!(accounts.entry_count(), 3);
    }

    fn array_of(value: &Value) -> ArrayValue {
        match value {
            Value::Array(array) => *array,
            other => panic!("expected an array, got {}", other.kind_name()),
        }
    }

    #[test]
    fn writing_a_slot_back_to_itself_is_a_no_op() {
        let mut session = session(OverwritePolicy::DeepRemove);
        let mut accounts = AccountStorage::new();
        let owner = Address::from_u64(1);

        let numbers = int_array(&mut session, &[1, 2, 3]);
        accounts.write(&mut session, owner, "k", Some(numbers)).unwrap();
        let stored = accounts.read(&session, owner, "k").unwrap().unwrap();
        accounts.write(&mut session, owner, "k", Some(stored)).unwrap();

        let reread = accounts.read(&session, owner, "k").unwrap().unwrap();
        assert_eq!(array_of(&reread).count(&session).unwrap(), 3);
        assert_eq!(session.storage().slab_count(), 1);

        accounts.write(&mut session, owner, "k", None).unwrap();
        assert_eq!(session.storage().slab_count(), 0);
    }

    #[test]
    fn copying_between_slots_keeps_both_independent() {
        let mut session = session(OverwritePolicy::DeepRemove);
        let mut accounts = AccountStorage::new();
        let owner = Address::from_u64(1);

        let numbers = int_array(&mut session, &[1, 2, 3]);
        accounts.write(&mut session, owner, "a", Some(numbers)).unwrap();
        let stored = accounts.read(&session, owner, "a").unwrap().unwrap();
        accounts.write(&mut session, owner, "b", Some(stored)).unwrap();
        assert_eq!(session.storage().slab_count(), 2);

        accounts.write(&mut session, owner, "a", None).unwrap();
        let copy = accounts.read(&session, owner, "b").unwrap().unwrap();
        assert_eq!(array_of(&copy).count(&session).unwrap(), 3);
        assert!(matches!(array_of(&copy).get(&session, 2).unwrap(), Value::Int64(3)));

        accounts.write(&mut session, owner, "b", None).unwrap();
        assert_eq!(session.storage().slab_count(), 0);
    }

    #[test]
    fn a_slot_can_be_replaced_by_its_own_child() {
        let mut session = session(OverwritePolicy::DeepRemove);
        let mut accounts = AccountStorage::new();
        let owner = Address::from_u64(1);

        let inner = int_array(&mut session, &[7, 8]);
        let outer = ArrayValue::new(
            &mut session,
            StaticType::variable_sized(StaticType::variable_sized(StaticType::Primitive(
                PrimitiveType::Int64,
            ))),
            None,
            vec![inner],
        )
        .unwrap();
        accounts
            .write(&mut session, owner, "k", Some(Value::Array(outer)))
            .unwrap();
        assert_eq!(session.storage().slab_count(), 2);

        let stored = accounts.read(&session, owner, "k").unwrap().unwrap();
        let child = array_of(&stored).get(&session, 0).unwrap();
        accounts.write(&mut session, owner, "k", Some(child)).unwrap();

        let replaced = accounts.read(&session, owner, "k").unwrap().unwrap();
        assert!(matches!(array_of(&replaced).get(&session, 1).unwrap(), Value::Int64(8)));
        assert_eq!(session.storage().slab_count(), 1);

        accounts.write(&mut session, owner, "k", None).unwrap();
        assert_eq!(session.storage().slab_count(), 0);
    }
}
