//! # Composites
//!
//! Structures, resources, enums, events and contracts: a type identity plus
//! an ordered list of named fields, stored in one root slab.
//!
//! A composite's declaration must be registered in the session's
//! [`TypeEnvironment`](crate::types::TypeEnvironment) before one can be
//! created or loaded. Enum cases carry exactly one field, the raw value, and
//! are the only hashable composites.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Value;
use crate::config::ENUM_RAW_VALUE_FIELD_NAME;
use crate::error::{Error, Result};
use crate::session::Session;
use crate::storage::{Slab, Storable, StorageId};
use crate::types::{Address, CompositeKind, CompositeTypeInfo, TypeId};

/// A field passed to [`CompositeValue::new`].
#[derive(Clone, Debug)]
pub struct CompositeField {
    pub name: String,
    pub value: Value,
}

impl CompositeField {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct StoredField {
    name: String,
    value: Storable,
}

/// Root slab of a composite.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompositeSlab {
    pub(crate) type_id: TypeId,
    pub(crate) kind: CompositeKind,
    pub(crate) fields: Vec<StoredField>,
    pub(crate) attached: bool,
}

impl CompositeSlab {
    fn field(&self, name: &str) -> Option<&StoredField> {
        self.fields.iter().find(|field| field.name == name)
    }
}

fn composite_slab(slab: &Slab, id: StorageId) -> Result<&CompositeSlab> {
    match slab {
        Slab::Composite(composite) => Ok(composite),
        _ => Err(Error::UnexpectedSlab {
            id,
            expected: "composite",
        }),
    }
}

/// Enum cases hold one field, the raw value, of the declared raw type.
fn check_enum_case(info: &CompositeTypeInfo, fields: &[CompositeField]) -> Result<()> {
    let invalid = |reason: &str| Error::InvalidStaticType(format!("enum {}: {reason}", info.id));

    let [field] = fields else {
        return Err(invalid("expected exactly one field"));
    };
    if field.name != ENUM_RAW_VALUE_FIELD_NAME {
        return Err(invalid("missing raw value"));
    }
    if field.value.primitive_type() != info.enum_raw_type {
        return Err(invalid("raw value does not match the declared raw type"));
    }
    Ok(())
}

/// Handle to a composite.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeValue {
    id: StorageId,
}

impl CompositeValue {
    /// Create a composite of the registered type `type_id` under `owner`.
    ///
    /// A repeated field name replaces the earlier value, which is
    /// deep-removed.
    pub fn new(
        session: &mut Session,
        type_id: TypeId,
        fields: Vec<CompositeField>,
        owner: Option<Address>,
    ) -> Result<Self> {
        let info = session.types().resolve(&type_id)?.clone();
        if info.kind == CompositeKind::Enum {
            check_enum_case(&info, &fields)?;
        }

        let mut stored: Vec<StoredField> = Vec::with_capacity(fields.len());
        for field in fields {
            let value = session.adopt(field.value, owner)?;
            match stored.iter_mut().find(|f| f.name == field.name) {
                Some(existing) => {
                    let replaced = std::mem::replace(&mut existing.value, value);
                    session.remove_storable(&replaced)?;
                }
                None => stored.push(StoredField {
                    name: field.name,
                    value,
                }),
            }
        }

        let id = session.allocate(
            owner,
            Slab::Composite(CompositeSlab {
                type_id,
                kind: info.kind,
                fields: stored,
                attached: false,
            }),
        )?;
        debug!(%id, kind = info.kind.name(), "created composite");
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
        session
            .types()
            .resolve(&composite_slab(&slab, self.id)?.type_id)?;
        Ok(slab)
    }

    fn load_owned(&self, session: &Session) -> Result<CompositeSlab> {
        let slab = self.load(session)?;
        Ok(composite_slab(&slab, self.id)?.clone())
    }

    pub fn type_id(&self, session: &Session) -> Result<TypeId> {
        let slab = self.load(session)?;
        Ok(composite_slab(&slab, self.id)?.type_id.clone())
    }

    pub fn kind(&self, session: &Session) -> Result<CompositeKind> {
        let slab = self.load(session)?;
        Ok(composite_slab(&slab, self.id)?.kind)
    }

    pub fn is_enum(&self, session: &Session) -> Result<bool> {
        Ok(self.kind(session)? == CompositeKind::Enum)
    }

    pub fn field_count(&self, session: &Session) -> Result<usize> {
        let slab = self.load(session)?;
        Ok(composite_slab(&slab, self.id)?.fields.len())
    }

    pub fn field_names(&self, session: &Session) -> Result<Vec<String>> {
        let slab = self.load(session)?;
        Ok(composite_slab(&slab, self.id)?
            .fields
            .iter()
            .map(|field| field.name.clone())
            .collect())
    }

    pub fn get_field(&self, session: &Session, name: &str) -> Result<Option<Value>> {
        let slab = self.load(session)?;
        match composite_slab(&slab, self.id)?.field(name) {
            Some(field) => Ok(Some(session.stored_value(&field.value)?)),
            None => Ok(None),
        }
    }

    fn check_mutable(&self, composite: &CompositeSlab) -> Result<()> {
        if composite.kind == CompositeKind::Enum {
            return Err(Error::InvalidStaticType(format!(
                "enum {} cases cannot be modified",
                composite.type_id
            )));
        }
        Ok(())
    }

    /// Set a field, adding it if absent. A replaced value is deep-removed.
    pub fn set_field(&self, session: &mut Session, name: &str, value: Value) -> Result<()> {
        let mut composite = self.load_owned(session)?;
        self.check_mutable(&composite)?;

        let value = session.adopt(value, self.owner())?;
        let replaced = match composite.fields.iter().position(|f| f.name == name) {
            Some(position) => Some(std::mem::replace(&mut composite.fields[position].value, value)),
            None => {
                composite.fields.push(StoredField {
                    name: name.to_string(),
                    value,
                });
                None
            }
        };
        session.overwrite(self.id, Slab::Composite(composite))?;

        if let Some(replaced) = replaced {
            session.remove_storable(&replaced)?;
        }
        Ok(())
    }

    /// Remove a field and deep-remove its value. Returns whether it existed.
    pub fn remove_field(&self, session: &mut Session, name: &str) -> Result<bool> {
        let mut composite = self.load_owned(session)?;
        self.check_mutable(&composite)?;

        let Some(position) = composite.fields.iter().position(|f| f.name == name) else {
            return Ok(false);
        };
        let removed = composite.fields.remove(position);
        session.overwrite(self.id, Slab::Composite(composite))?;
        session.remove_storable(&removed.value)?;
        Ok(true)
    }

    /// Visit fields in declaration order until `visitor` returns `false`.
    pub fn for_each_field<F>(&self, session: &Session, mut visitor: F) -> Result<()>
    where
        F: FnMut(&str, Value) -> bool,
    {
        let slab = self.load(session)?;
        for field in &composite_slab(&slab, self.id)?.fields {
            if !visitor(&field.name, session.stored_value(&field.value)?) {
                break;
            }
        }
        Ok(())
    }

    /// Key identity of an enum case: type identity, then raw value.
    pub(crate) fn write_key_identity(&self, session: &Session, buf: &mut Vec<u8>) -> Result<()> {
        let slab = self.load(session)?;
        let composite = composite_slab(&slab, self.id)?;
        if composite.kind != CompositeKind::Enum {
            return Err(Error::UnhashableKey(composite.kind.name()));
        }
        let raw = composite
            .field(ENUM_RAW_VALUE_FIELD_NAME)
            .ok_or_else(|| Error::InvalidStaticType(format!("enum {} has no raw value", composite.type_id)))?;

        composite.type_id.write_canonical(buf);
        session.stored_value(&raw.value)?.write_key_identity(session, buf)
    }

    pub(crate) fn transfer(
        &self,
        session: &mut Session,
        target: Option<Address>,
        is_for_removal: bool,
    ) -> Result<CompositeValue> {
        if is_for_removal && self.owner() == target {
            return Ok(*self);
        }

        let slab = self.load(session)?;
        let source = composite_slab(&slab, self.id)?;
        let mut fields = Vec::with_capacity(source.fields.len());
        for field in &source.fields {
            let copy = session
                .stored_value(&field.value)?
                .transfer(session, target, false)?;
            fields.push(StoredField {
                name: field.name.clone(),
                value: session.embed(&copy, target)?,
            });
        }

        let id = session.allocate(
            target,
            Slab::Composite(CompositeSlab {
                type_id: source.type_id.clone(),
                kind: source.kind,
                fields,
                attached: false,
            }),
        )?;
        debug!(from = %self.id, to = %id, "transferred composite");
        Ok(CompositeValue { id })
    }

    pub(crate) fn release(&self, session: &mut Session) -> Result<()> {
        let slab = session.retrieve_for_removal(self.id)?;
        for field in &composite_slab(&slab, self.id)?.fields {
            session.remove_storable(&field.value)?;
        }
        session.release(self.id)?;
        debug!(id = %self.id, "removed composite");
        Ok(())
    }

    pub(crate) fn equal(&self, session: &Session, other: &CompositeValue) -> Result<bool> {
        if self.id == other.id {
            return Ok(true);
        }
        let left = self.load(session)?;
        let right = other.load(session)?;
        let left = composite_slab(&left, self.id)?;
        let right = composite_slab(&right, other.id)?;

        if left.type_id != right.type_id
            || left.kind != right.kind
            || left.fields.len() != right.fields.len()
        {
            return Ok(false);
        }
        for field in &left.fields {
            let Some(counterpart) = right.field(&field.name) else {
                return Ok(false);
            };
            let a = session.stored_value(&field.value)?;
            let b = session.stored_value(&counterpart.value)?;
            if !a.equal(session, &b)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
