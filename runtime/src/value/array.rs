//! # Arrays
//!
//! An ordered sequence of values stored in one root slab. Elements are
//! storables: small values are embedded, large ones sit in wrapper slabs of
//! their own, nested containers are embedded as handles.
//!
//! Every mutation rewrites the root slab. Inserted values are moved into the
//! array's owner first, so after `append` the caller's handle is spent. An
//! element read back from another container is copied and stays where it was.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Value;
use crate::error::{Error, Result};
use crate::session::Session;
use crate::storage::{Slab, Storable, StorageId};
use crate::types::{Address, StaticType};

/// Root slab of an array.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArraySlab {
    pub(crate) static_type: StaticType,
    pub(crate) elements: Vec<Storable>,
    /// Set while the array is embedded in a parent.
    pub(crate) attached: bool,
}

fn array_slab(slab: &Slab, id: StorageId) -> Result<&ArraySlab> {
    match slab {
        Slab::Array(array) => Ok(array),
        _ => Err(Error::UnexpectedSlab {
            id,
            expected: "array",
        }),
    }
}

/// Handle to an array.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrayValue {
    id: StorageId,
}

impl ArrayValue {
    /// Create an array of `static_type` (a variable-sized array type) under
    /// `owner`, moving `elements` into it.
    pub fn new(
        session: &mut Session,
        static_type: StaticType,
        owner: Option<Address>,
        elements: Vec<Value>,
    ) -> Result<Self> {
        if !static_type.is_array() {
            return Err(Error::InvalidStaticType(format!(
                "{static_type} is not an array type"
            )));
        }
        session.types().check(&static_type)?;

        let mut storables = Vec::with_capacity(elements.len());
        for element in elements {
            storables.push(session.adopt(element, owner)?);
        }
        let count = storables.len();
        let id = session.allocate(
            owner,
            Slab::Array(ArraySlab {
                static_type,
                elements: storables,
                attached: false,
            }),
        )?;
        debug!(%id, count, "created array");
        Ok(Self { id })
    }

    pub fn storage_id(&self) -> StorageId {
        self.id
    }

    pub fn owner(&self) -> Option<Address> {
        self.id.owner()
    }

    fn load(&self, session: &Session) -> Result<Arc<Slab>> {
        let slab = session.retrieve(self.id)?;
        session.types().check(&array_slab(&slab, self.id)?.static_type)?;
        Ok(slab)
    }

    fn load_owned(&self, session: &Session) -> Result<ArraySlab> {
        let slab = self.load(session)?;
        Ok(array_slab(&slab, self.id)?.clone())
    }

    pub fn static_type(&self, session: &Session) -> Result<StaticType> {
        let slab = self.load(session)?;
        Ok(array_slab(&slab, self.id)?.static_type.clone())
    }

    pub fn count(&self, session: &Session) -> Result<usize> {
        let slab = self.load(session)?;
        Ok(array_slab(&slab, self.id)?.elements.len())
    }

    pub fn get(&self, session: &Session, index: usize) -> Result<Value> {
        let slab = self.load(session)?;
        let elements = &array_slab(&slab, self.id)?.elements;
        let storable = elements.get(index).ok_or(Error::IndexOutOfRange {
            index,
            count: elements.len(),
        })?;
        session.stored_value(storable)
    }

    pub fn append(&self, session: &mut Session, value: Value) -> Result<()> {
        let mut array = self.load_owned(session)?;
        array.elements.push(session.adopt(value, self.owner())?);
        session.overwrite(self.id, Slab::Array(array))
    }

    /// Insert before `index`; `index == count` appends.
    pub fn insert(&self, session: &mut Session, index: usize, value: Value) -> Result<()> {
        let mut array = self.load_owned(session)?;
        let count = array.elements.len();
        if index > count {
            return Err(Error::IndexOutOfRange { index, count });
        }
        array
            .elements
            .insert(index, session.adopt(value, self.owner())?);
        session.overwrite(self.id, Slab::Array(array))
    }

    /// Replace the element at `index`. The replaced value is deep-removed.
    pub fn set(&self, session: &mut Session, index: usize, value: Value) -> Result<()> {
        let mut array = self.load_owned(session)?;
        let count = array.elements.len();
        if index >= count {
            return Err(Error::IndexOutOfRange { index, count });
        }
        let replaced =
            std::mem::replace(&mut array.elements[index], session.adopt(value, self.owner())?);
        session.overwrite(self.id, Slab::Array(array))?;
        session.remove_storable(&replaced)
    }

    /// Take the element at `index` out of the array and hand it back.
    pub fn remove(&self, session: &mut Session, index: usize) -> Result<Value> {
        let mut array = self.load_owned(session)?;
        let count = array.elements.len();
        if index >= count {
            return Err(Error::IndexOutOfRange { index, count });
        }
        let storable = array.elements.remove(index);
        session.overwrite(self.id, Slab::Array(array))?;
        session.detach(storable)
    }

    /// Elements in storage order. Each call starts from the beginning.
    pub fn iter<'s>(&self, session: &'s Session) -> Result<ArrayIter<'s>> {
        Ok(ArrayIter {
            session,
            id: self.id,
            slab: self.load(session)?,
            index: 0,
        })
    }

    /// Visit elements in storage order until `visitor` returns `false`.
    pub fn iterate<F>(&self, session: &Session, mut visitor: F) -> Result<()>
    where
        F: FnMut(Value) -> bool,
    {
        for element in self.iter(session)? {
            if !visitor(element?) {
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
    ) -> Result<ArrayValue> {
        if is_for_removal && self.owner() == target {
            return Ok(*self);
        }

        let slab = self.load(session)?;
        let source = array_slab(&slab, self.id)?;
        let mut elements = Vec::with_capacity(source.elements.len());
        for storable in &source.elements {
            let copy = session.stored_value(storable)?.transfer(session, target, false)?;
            elements.push(session.embed(&copy, target)?);
        }

        let id = session.allocate(
            target,
            Slab::Array(ArraySlab {
                static_type: source.static_type.clone(),
                elements,
                attached: false,
            }),
        )?;
        debug!(from = %self.id, to = %id, "transferred array");
        Ok(ArrayValue { id })
    }

    pub(crate) fn release(&self, session: &mut Session) -> Result<()> {
        let slab = session.retrieve_for_removal(self.id)?;
        for storable in &array_slab(&slab, self.id)?.elements {
            session.remove_storable(storable)?;
        }
        session.release(self.id)?;
        debug!(id = %self.id, "removed array");
        Ok(())
    }

    pub(crate) fn equal(&self, session: &Session, other: &ArrayValue) -> Result<bool> {
        if self.id == other.id {
            return Ok(true);
        }
        let left = self.load(session)?;
        let right = other.load(session)?;
        let left = array_slab(&left, self.id)?;
        let right = array_slab(&right, other.id)?;

        if left.static_type != right.static_type || left.elements.len() != right.elements.len() {
            return Ok(false);
        }
        for (a, b) in left.elements.iter().zip(&right.elements) {
            if !session.stored_value(a)?.equal(session, &session.stored_value(b)?)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Iterator over the elements of one array snapshot.
pub struct ArrayIter<'s> {
    session: &'s Session,
    id: StorageId,
    slab: Arc<Slab>,
    index: usize,
}

impl Iterator for ArrayIter<'_> {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        let array = match array_slab(&self.slab, self.id) {
            Ok(array) => array,
            Err(err) => return Some(Err(err)),
        };
        let storable = array.elements.get(self.index)?;
        self.index += 1;
        Some(self.session.stored_value(storable))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;

    fn strings() -> StaticType {
        StaticType::variable_sized(StaticType::Primitive(crate::types::PrimitiveType::String))
    }

    fn collect(session: &Session, array: &ArrayValue) -> Vec<String> {
        array
            .iter(session)
            .unwrap()
            .map(|v| match v.unwrap() {
                Value::String(s) => s,
                other => panic!("unexpected element: {other:?}"),
            })
            .collect()
    }

    #[test]
    fn new_and_get() {
        let mut session = Session::in_memory();
        let array = ArrayValue::new(
            &mut session,
            strings(),
            Some(Address::from_u64(1)),
            vec!["a".into(), "b".into()],
        )
        .unwrap();

        assert_eq!(array.count(&session).unwrap(), 2);
        assert!(matches!(array.get(&session, 1).unwrap(), Value::String(s) if s == "b"));
        assert_eq!(array.owner(), Some(Address::from_u64(1)));
        assert_eq!(session.storage().slab_count(), 1);
    }

    #[test]
    fn out_of_range_access_is_fatal() {
        let mut session = Session::in_memory();
        let array = ArrayValue::new(&mut session, strings(), None, vec!["a".into()]).unwrap();

        let err = array.get(&session, 1).unwrap_err();
        assert!(matches!(err, Error::IndexOutOfRange { index: 1, count: 1 }));
        assert!(err.is_fatal());
        assert!(array.insert(&mut session, 2, "x".into()).is_err());
        assert!(array.remove(&mut session, 1).is_err());
    }

    #[test]
    fn mutation_keeps_order() {
        let mut session = Session::in_memory();
        let array = ArrayValue::new(&mut session, strings(), None, vec![]).unwrap();

        array.append(&mut session, "b".into()).unwrap();
        array.insert(&mut session, 0, "a".into()).unwrap();
        array.append(&mut session, "d".into()).unwrap();
        array.set(&mut session, 2, "c".into()).unwrap();
        assert_eq!(collect(&session, &array), ["a", "b", "c"]);

        let removed = array.remove(&mut session, 1).unwrap();
        assert!(matches!(removed, Value::String(s) if s == "b"));
        assert_eq!(collect(&session, &array), ["a", "c"]);
    }

    #[test]
    fn iteration_is_restartable() {
        let mut session = Session::in_memory();
        let array =
            ArrayValue::new(&mut session, strings(), None, vec!["x".into(), "y".into()]).unwrap();
        assert_eq!(collect(&session, &array), collect(&session, &array));

        let mut seen = 0;
        array
            .iterate(&session, |_| {
                seen += 1;
                false
            })
            .unwrap();
        assert_eq!(seen, 1);
    }

    #[test]
    fn rejects_non_array_types() {
        let mut session = Session::in_memory();
        let err = ArrayValue::new(&mut session, StaticType::any_struct(), None, vec![]).unwrap_err();
        assert!(matches!(err, Error::InvalidStaticType(_)));
        assert_eq!(session.storage().slab_count(), 0);
    }

    #[test]
    fn large_elements_are_externalized_and_released() {
        let mut session = Session::with_config(RuntimeConfig {
            max_inline_size: 32,
            ..RuntimeConfig::default()
        });
        let long = "z".repeat(100);
        let array =
            ArrayValue::new(&mut session, strings(), None, vec![long.as_str().into()]).unwrap();
        assert_eq!(session.storage().slab_count(), 2);
        assert!(matches!(array.get(&session, 0).unwrap(), Value::String(s) if s == long));

        array.set(&mut session, 0, "short".into()).unwrap();
        assert_eq!(session.storage().slab_count(), 1);

        Value::Array(array).deep_remove(&mut session).unwrap();
        assert_eq!(session.storage().slab_count(), 0);
    }

    #[test]
    fn transfer_copies_into_the_target_owner() {
        let mut session = Session::in_memory();
        let source =
            ArrayValue::new(&mut session, strings(), None, vec!["a".into(), "b".into()]).unwrap();
        let target = Some(Address::from_u64(3));

        let copy = source.transfer(&mut session, target, false).unwrap();
        assert_ne!(copy.storage_id(), source.storage_id());
        assert_eq!(copy.owner(), target);
        assert!(copy.equal(&session, &source).unwrap());
        assert_eq!(session.storage().slab_count(), 2);

        let same = source.transfer(&mut session, None, true).unwrap();
        assert_eq!(same, source);
        assert_eq!(session.storage().slab_count(), 2);
    }
}
