//! # Values
//!
//! [`Value`] is a closed enum. Every operation that walks a value tree
//! (equality, key identity, transfer, deep remove) is an exhaustive `match`,
//! so adding a kind without teaching those walks about it does not compile.
//!
//! ## Layout
//!
//! ```text
//! scalar.rs      — integer wrap-around, fixed point, paths, capabilities
//! array.rs       — ordered sequence, one root slab
//! dictionary.rs  — digest-keyed map over hashable keys, one root slab
//! composite.rs   — named fields with a type identity, one root slab
//! ```
//!
//! Container variants are handles: a [`StorageId`] naming the root slab.
//! Copying a handle does not copy the container; [`Value::deep_copy`] does.

pub mod array;
pub mod composite;
pub mod dictionary;
pub mod scalar;

use num_bigint::{BigInt, BigUint};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::session::Session;
use crate::storage::StorageId;
use crate::types::{write_len_prefixed, Address, PrimitiveType};

pub use array::{ArrayIter, ArrayValue};
pub use composite::{CompositeField, CompositeValue};
pub use dictionary::{DictionaryIter, DictionaryValue, KeyDigest};
pub use scalar::{CapabilityValue, Fix64Value, IntegerKind, PathValue, UFix64Value};

/// A runtime value.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Value {
    Void,
    Nil,
    Some(Box<Value>),
    Bool(bool),

    Int(BigInt),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Int128(i128),
    Int256(BigInt),

    UInt(BigUint),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    UInt128(u128),
    UInt256(BigUint),

    Word8(u8),
    Word16(u16),
    Word32(u32),
    Word64(u64),

    Fix64(Fix64Value),
    UFix64(UFix64Value),

    String(String),
    Address(Address),
    Path(PathValue),
    Capability(CapabilityValue),

    Array(ArrayValue),
    Dictionary(DictionaryValue),
    Composite(CompositeValue),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    pub fn some(inner: Value) -> Self {
        Value::Some(Box::new(inner))
    }

    /// Integer of the given kind built from an arbitrary source, see
    /// [`IntegerKind::wrap`].
    pub fn integer(kind: IntegerKind, source: &BigInt) -> Result<Self> {
        kind.wrap(source)
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Void => "Void",
            Value::Nil => "Nil",
            Value::Some(_) => "Some",
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::Int8(_) => "Int8",
            Value::Int16(_) => "Int16",
            Value::Int32(_) => "Int32",
            Value::Int64(_) => "Int64",
            Value::Int128(_) => "Int128",
            Value::Int256(_) => "Int256",
            Value::UInt(_) => "UInt",
            Value::UInt8(_) => "UInt8",
            Value::UInt16(_) => "UInt16",
            Value::UInt32(_) => "UInt32",
            Value::UInt64(_) => "UInt64",
            Value::UInt128(_) => "UInt128",
            Value::UInt256(_) => "UInt256",
            Value::Word8(_) => "Word8",
            Value::Word16(_) => "Word16",
            Value::Word32(_) => "Word32",
            Value::Word64(_) => "Word64",
            Value::Fix64(_) => "Fix64",
            Value::UFix64(_) => "UFix64",
            Value::String(_) => "String",
            Value::Address(_) => "Address",
            Value::Path(_) => "Path",
            Value::Capability(_) => "Capability",
            Value::Array(_) => "Array",
            Value::Dictionary(_) => "Dictionary",
            Value::Composite(_) => "Composite",
        }
    }

    /// Integer kind of an integer or word value.
    pub fn integer_kind(&self) -> Option<IntegerKind> {
        let kind = match self {
            Value::Int(_) => IntegerKind::Int,
            Value::Int8(_) => IntegerKind::Int8,
            Value::Int16(_) => IntegerKind::Int16,
            Value::Int32(_) => IntegerKind::Int32,
            Value::Int64(_) => IntegerKind::Int64,
            Value::Int128(_) => IntegerKind::Int128,
            Value::Int256(_) => IntegerKind::Int256,
            Value::UInt(_) => IntegerKind::UInt,
            Value::UInt8(_) => IntegerKind::UInt8,
            Value::UInt16(_) => IntegerKind::UInt16,
            Value::UInt32(_) => IntegerKind::UInt32,
            Value::UInt64(_) => IntegerKind::UInt64,
            Value::UInt128(_) => IntegerKind::UInt128,
            Value::UInt256(_) => IntegerKind::UInt256,
            Value::Word8(_) => IntegerKind::Word8,
            Value::Word16(_) => IntegerKind::Word16,
            Value::Word32(_) => IntegerKind::Word32,
            Value::Word64(_) => IntegerKind::Word64,
            _ => return None,
        };
        Some(kind)
    }

    /// Numeric value of an integer or word value.
    pub fn to_big_int(&self) -> Option<BigInt> {
        let n = match self {
            Value::Int(n) | Value::Int256(n) => n.clone(),
            Value::UInt(n) | Value::UInt256(n) => BigInt::from(n.clone()),
            Value::Int8(n) => BigInt::from(*n),
            Value::Int16(n) => BigInt::from(*n),
            Value::Int32(n) => BigInt::from(*n),
            Value::Int64(n) => BigInt::from(*n),
            Value::Int128(n) => BigInt::from(*n),
            Value::UInt8(n) | Value::Word8(n) => BigInt::from(*n),
            Value::UInt16(n) | Value::Word16(n) => BigInt::from(*n),
            Value::UInt32(n) | Value::Word32(n) => BigInt::from(*n),
            Value::UInt64(n) | Value::Word64(n) => BigInt::from(*n),
            Value::UInt128(n) => BigInt::from(*n),
            _ => return None,
        };
        Some(n)
    }

    /// Primitive type of a scalar; `None` for optionals, capabilities and containers.
    pub fn primitive_type(&self) -> Option<PrimitiveType> {
        if let Some(kind) = self.integer_kind() {
            return Some(kind.primitive_type());
        }
        match self {
            Value::Void => Some(PrimitiveType::Void),
            Value::Bool(_) => Some(PrimitiveType::Bool),
            Value::Fix64(_) => Some(PrimitiveType::Fix64),
            Value::UFix64(_) => Some(PrimitiveType::UFix64),
            Value::String(_) => Some(PrimitiveType::String),
            Value::Address(_) => Some(PrimitiveType::Address),
            Value::Path(_) => Some(PrimitiveType::Path),
            _ => None,
        }
    }

    /// Root slab of a container value.
    pub fn storage_id(&self) -> Option<StorageId> {
        match self {
            Value::Array(a) => Some(a.storage_id()),
            Value::Dictionary(d) => Some(d.storage_id()),
            Value::Composite(c) => Some(c.storage_id()),
            _ => None,
        }
    }

    /// Root slab of the container behind this value, looking through
    /// optionals.
    pub(crate) fn root_id(&self) -> Option<StorageId> {
        match self {
            Value::Some(inner) => inner.root_id(),
            _ => self.storage_id(),
        }
    }

    /// Account the value is bound to. Scalars are never owned; an optional
    /// is owned by whatever owns its payload.
    pub fn owner(&self) -> Option<Address> {
        match self {
            Value::Some(inner) => inner.owner(),
            Value::Array(a) => a.owner(),
            Value::Dictionary(d) => d.owner(),
            Value::Composite(c) => c.owner(),
            _ => None,
        }
    }

    // -- Equality -----------------------------------------------------------

    /// Structural equality. Containers compare by content, never by slab.
    pub fn equal(&self, session: &Session, other: &Value) -> Result<bool> {
        let equal = match (self, other) {
            (Value::Void, Value::Void) | (Value::Nil, Value::Nil) => true,
            (Value::Some(a), Value::Some(b)) => return a.equal(session, b),
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) | (Value::Int256(a), Value::Int256(b)) => a == b,
            (Value::Int8(a), Value::Int8(b)) => a == b,
            (Value::Int16(a), Value::Int16(b)) => a == b,
            (Value::Int32(a), Value::Int32(b)) => a == b,
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::Int128(a), Value::Int128(b)) => a == b,
            (Value::UInt(a), Value::UInt(b)) | (Value::UInt256(a), Value::UInt256(b)) => a == b,
            (Value::UInt8(a), Value::UInt8(b)) | (Value::Word8(a), Value::Word8(b)) => a == b,
            (Value::UInt16(a), Value::UInt16(b)) | (Value::Word16(a), Value::Word16(b)) => a == b,
            (Value::UInt32(a), Value::UInt32(b)) | (Value::Word32(a), Value::Word32(b)) => a == b,
            (Value::UInt64(a), Value::UInt64(b)) | (Value::Word64(a), Value::Word64(b)) => a == b,
            (Value::UInt128(a), Value::UInt128(b)) => a == b,
            (Value::Fix64(a), Value::Fix64(b)) => a == b,
            (Value::UFix64(a), Value::UFix64(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Address(a), Value::Address(b)) => a == b,
            (Value::Path(a), Value::Path(b)) => a == b,
            (Value::Capability(a), Value::Capability(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => return a.equal(session, b),
            (Value::Dictionary(a), Value::Dictionary(b)) => return a.equal(session, b),
            (Value::Composite(a), Value::Composite(b)) => return a.equal(session, b),
            _ => false,
        };
        Ok(equal)
    }

    // -- Key identity -------------------------------------------------------

    fn tag(&self) -> u8 {
        match self {
            Value::Void => 0,
            Value::Nil => 1,
            Value::Some(_) => 2,
            Value::Bool(_) => 3,
            Value::Int(_) => 4,
            Value::Int8(_) => 5,
            Value::Int16(_) => 6,
            Value::Int32(_) => 7,
            Value::Int64(_) => 8,
            Value::Int128(_) => 9,
            Value::Int256(_) => 10,
            Value::UInt(_) => 11,
            Value::UInt8(_) => 12,
            Value::UInt16(_) => 13,
            Value::UInt32(_) => 14,
            Value::UInt64(_) => 15,
            Value::UInt128(_) => 16,
            Value::UInt256(_) => 17,
            Value::Word8(_) => 18,
            Value::Word16(_) => 19,
            Value::Word32(_) => 20,
            Value::Word64(_) => 21,
            Value::Fix64(_) => 22,
            Value::UFix64(_) => 23,
            Value::String(_) => 24,
            Value::Address(_) => 25,
            Value::Path(_) => 26,
            Value::Capability(_) => 27,
            Value::Array(_) => 28,
            Value::Dictionary(_) => 29,
            Value::Composite(_) => 30,
        }
    }

    /// Append the storage-independent identity of a hashable value.
    ///
    /// Two values produce the same bytes exactly when they are the same
    /// dictionary key. Enums contribute their type identity and raw value,
    /// never their slab.
    pub(crate) fn write_key_identity(&self, session: &Session, buf: &mut Vec<u8>) -> Result<()> {
        buf.push(self.tag());
        match self {
            Value::Bool(b) => buf.push(u8::from(*b)),
            Value::Int(n) | Value::Int256(n) => write_len_prefixed(buf, &n.to_signed_bytes_be()),
            Value::UInt(n) | Value::UInt256(n) => write_len_prefixed(buf, &n.to_bytes_be()),
            Value::Int8(n) => buf.extend_from_slice(&n.to_be_bytes()),
            Value::Int16(n) => buf.extend_from_slice(&n.to_be_bytes()),
            Value::Int32(n) => buf.extend_from_slice(&n.to_be_bytes()),
            Value::Int64(n) => buf.extend_from_slice(&n.to_be_bytes()),
            Value::Int128(n) => buf.extend_from_slice(&n.to_be_bytes()),
            Value::UInt8(n) | Value::Word8(n) => buf.push(*n),
            Value::UInt16(n) | Value::Word16(n) => buf.extend_from_slice(&n.to_be_bytes()),
            Value::UInt32(n) | Value::Word32(n) => buf.extend_from_slice(&n.to_be_bytes()),
            Value::UInt64(n) | Value::Word64(n) => buf.extend_from_slice(&n.to_be_bytes()),
            Value::UInt128(n) => buf.extend_from_slice(&n.to_be_bytes()),
            Value::Fix64(n) => buf.extend_from_slice(&n.raw().to_be_bytes()),
            Value::UFix64(n) => buf.extend_from_slice(&n.raw().to_be_bytes()),
            Value::String(s) => write_len_prefixed(buf, s.as_bytes()),
            Value::Address(a) => buf.extend_from_slice(a.as_bytes()),
            Value::Path(p) => {
                buf.push(p.domain as u8);
                write_len_prefixed(buf, p.identifier.as_bytes());
            }
            Value::Composite(c) => c.write_key_identity(session, buf)?,
            Value::Void
            | Value::Nil
            | Value::Some(_)
            | Value::Capability(_)
            | Value::Array(_)
            | Value::Dictionary(_) => return Err(Error::UnhashableKey(self.kind_name())),
        }
        Ok(())
    }

    /// Whether the value can be used as a dictionary key.
    pub fn is_hashable(&self, session: &Session) -> Result<bool> {
        match self {
            Value::Composite(c) => c.is_enum(session),
            Value::Void
            | Value::Nil
            | Value::Some(_)
            | Value::Capability(_)
            | Value::Array(_)
            | Value::Dictionary(_) => Ok(false),
            _ => Ok(true),
        }
    }

    // -- Transfer -----------------------------------------------------------

    /// Produce a tree equal to `self` owned by `target`.
    ///
    /// Containers are copied into fresh slabs under `target`, re-applying the
    /// inlining policy at every level. With `is_for_removal` set and no owner
    /// change, the source is consumed by the caller and its handle is returned
    /// as-is. The source is never removed here; see [`Session::move_value`].
    pub fn transfer(
        &self,
        session: &mut Session,
        target: Option<Address>,
        is_for_removal: bool,
    ) -> Result<Value> {
        let transferred = match self {
            Value::Some(inner) => Value::some(inner.transfer(session, target, is_for_removal)?),
            Value::Array(a) => Value::Array(a.transfer(session, target, is_for_removal)?),
            Value::Dictionary(d) => Value::Dictionary(d.transfer(session, target, is_for_removal)?),
            Value::Composite(c) => Value::Composite(c.transfer(session, target, is_for_removal)?),
            Value::Void
            | Value::Nil
            | Value::Bool(_)
            | Value::Int(_)
            | Value::Int8(_)
            | Value::Int16(_)
            | Value::Int32(_)
            | Value::Int64(_)
            | Value::Int128(_)
            | Value::Int256(_)
            | Value::UInt(_)
            | Value::UInt8(_)
            | Value::UInt16(_)
            | Value::UInt32(_)
            | Value::UInt64(_)
            | Value::UInt128(_)
            | Value::UInt256(_)
            | Value::Word8(_)
            | Value::Word16(_)
            | Value::Word32(_)
            | Value::Word64(_)
            | Value::Fix64(_)
            | Value::UFix64(_)
            | Value::String(_)
            | Value::Address(_)
            | Value::Path(_)
            | Value::Capability(_) => self.clone(),
        };
        Ok(transferred)
    }

    /// Independent copy under the same owner.
    pub fn deep_copy(&self, session: &mut Session) -> Result<Value> {
        self.transfer(session, self.owner(), false)
    }

    // -- Deep remove --------------------------------------------------------

    /// Release every slab reachable from this value, including the root's.
    ///
    /// Takes the value by move: after removal the handle is gone. Other
    /// copies of the same handle must not be used again.
    pub fn deep_remove(self, session: &mut Session) -> Result<()> {
        self.release(session)
    }

    pub(crate) fn release(&self, session: &mut Session) -> Result<()> {
        match self {
            Value::Some(inner) => inner.release(session),
            Value::Array(a) => a.release(session),
            Value::Dictionary(d) => d.release(session),
            Value::Composite(c) => c.release(session),
            Value::Void
            | Value::Nil
            | Value::Bool(_)
            | Value::Int(_)
            | Value::Int8(_)
            | Value::Int16(_)
            | Value::Int32(_)
            | Value::Int64(_)
            | Value::Int128(_)
            | Value::Int256(_)
            | Value::UInt(_)
            | Value::UInt8(_)
            | Value::UInt16(_)
            | Value::UInt32(_)
            | Value::UInt64(_)
            | Value::UInt128(_)
            | Value::UInt256(_)
            | Value::Word8(_)
            | Value::Word16(_)
            | Value::Word32(_)
            | Value::Word64(_)
            | Value::Fix64(_)
            | Value::UFix64(_)
            | Value::String(_)
            | Value::Address(_)
            | Value::Path(_)
            | Value::Capability(_) => Ok(()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Address> for Value {
    fn from(a: Address) -> Self {
        Value::Address(a)
    }
}

impl From<PathValue> for Value {
    fn from(p: PathValue) -> Self {
        Value::Path(p)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => Value::some(v.into()),
            None => Value::Nil,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PathDomain;

    fn identity(session: &Session, value: &Value) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        value.write_key_identity(session, &mut buf)?;
        Ok(buf)
    }

    #[test]
    fn scalar_equality_is_structural() {
        let session = Session::in_memory();
        assert!(Value::from("a").equal(&session, &Value::from("a")).unwrap());
        assert!(!Value::from("a").equal(&session, &Value::from("b")).unwrap());
        assert!(Value::some(Value::Int8(3))
            .equal(&session, &Value::some(Value::Int8(3)))
            .unwrap());
    }

    #[test]
    fn equal_numbers_of_different_kinds_differ() {
        let session = Session::in_memory();
        assert!(!Value::UInt8(1).equal(&session, &Value::Word8(1)).unwrap());
        assert!(!Value::Int(BigInt::from(1))
            .equal(&session, &Value::Int256(BigInt::from(1)))
            .unwrap());
    }

    #[test]
    fn key_identity_includes_the_kind() {
        let session = Session::in_memory();
        let a = identity(&session, &Value::UInt8(7)).unwrap();
        let b = identity(&session, &Value::Word8(7)).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn key_identity_separates_path_domains() {
        let session = Session::in_memory();
        let a = identity(&session, &PathValue::new(PathDomain::Public, "x").into()).unwrap();
        let b = identity(&session, &PathValue::new(PathDomain::Private, "x").into()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn unhashable_kinds_are_rejected() {
        let session = Session::in_memory();
        for value in [Value::Void, Value::Nil, Value::some(Value::Bool(true))] {
            assert!(!value.is_hashable(&session).unwrap());
            assert!(matches!(
                identity(&session, &value),
                Err(Error::UnhashableKey(_))
            ));
        }
        assert!(Value::from("k").is_hashable(&session).unwrap());
    }

    #[test]
    fn scalar_transfer_is_identity() {
        let mut session = Session::in_memory();
        let value = Value::UInt64(99);
        let moved = value
            .transfer(&mut session, Some(Address::from_u64(1)), false)
            .unwrap();
        assert!(moved.equal(&session, &value).unwrap());
        assert_eq!(session.storage().slab_count(), 0);
    }

    #[test]
    fn integer_accessors() {
        let value = Value::Word16(65535);
        assert_eq!(value.integer_kind(), Some(IntegerKind::Word16));
        assert_eq!(value.to_big_int(), Some(BigInt::from(65535)));
        assert_eq!(value.primitive_type(), Some(PrimitiveType::Word16));
        assert_eq!(Value::from("s").integer_kind(), None);
    }

    #[test]
    fn option_conversion() {
        let session = Session::in_memory();
        let some: Value = Some("x").into();
        let none: Value = Option::<&str>::None.into();
        assert!(some.equal(&session, &Value::some("x".into())).unwrap());
        assert!(none.equal(&session, &Value::Nil).unwrap());
    }
}
