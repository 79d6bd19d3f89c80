//! # Type Identity & Static Types
//!
//! Containers record the static type of what they hold, and composites record
//! the identity of their declaring type. Both are persisted inside slabs, so
//! everything here is serde-encodable.
//!
//! Composite declarations are registered in a [`TypeEnvironment`] owned by the
//! [`Session`](crate::session::Session). There is no global registry: a
//! loaded slab whose recorded type cannot be resolved in the session's
//! environment fails with [`Error::InvalidStaticType`].

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{ADDRESS_LENGTH, TRANSIENT_ADDRESS};
use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// An 8-byte account address.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(pub [u8; ADDRESS_LENGTH]);

impl Address {
    /// The reserved address transient slabs are allocated under.
    pub const TRANSIENT: Address = Address(TRANSIENT_ADDRESS);

    /// Big-endian address from an integer. Handy in tests.
    pub fn from_u64(n: u64) -> Self {
        Address(n.to_be_bytes())
    }

    /// Build an address from up to 8 bytes, left-padding with zeros.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() > ADDRESS_LENGTH {
            return Err(Error::OutOfRange {
                kind: "Address",
                value: hex::encode(bytes),
            });
        }
        let mut raw = [0u8; ADDRESS_LENGTH];
        raw[ADDRESS_LENGTH - bytes.len()..].copy_from_slice(bytes);
        Ok(Address(raw))
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }

    pub fn is_transient(&self) -> bool {
        *self == Self::TRANSIENT
    }

    /// The owner this address denotes: `None` for the transient address.
    pub fn owner(self) -> Option<Address> {
        if self.is_transient() {
            None
        } else {
            Some(self)
        }
    }

    /// The address slabs of `owner` are allocated under.
    pub fn for_owner(owner: Option<Address>) -> Address {
        owner.unwrap_or(Self::TRANSIENT)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

// ---------------------------------------------------------------------------
// Locations & Type Identity
// ---------------------------------------------------------------------------

/// Where a composite type was declared.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Location {
    /// A contract deployed to an account.
    Address { address: Address, name: String },
    /// A free-standing program (script, transaction, test harness).
    Identifier(String),
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Address { address, name } => write!(f, "A.{}.{}", hex::encode(address.0), name),
            Location::Identifier(id) => write!(f, "I.{id}"),
        }
    }
}

/// Identity of a composite type: declaring location plus qualified name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeId {
    pub location: Location,
    pub qualified_identifier: String,
}

impl TypeId {
    pub fn new(location: Location, qualified_identifier: impl Into<String>) -> Self {
        Self {
            location,
            qualified_identifier: qualified_identifier.into(),
        }
    }

    /// Length-prefixed canonical bytes, used in dictionary key identity.
    pub(crate) fn write_canonical(&self, buf: &mut Vec<u8>) {
        match &self.location {
            Location::Address { address, name } => {
                buf.push(0);
                buf.extend_from_slice(&address.0);
                write_len_prefixed(buf, name.as_bytes());
            }
            Location::Identifier(id) => {
                buf.push(1);
                write_len_prefixed(buf, id.as_bytes());
            }
        }
        write_len_prefixed(buf, self.qualified_identifier.as_bytes());
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.location, self.qualified_identifier)
    }
}

pub(crate) fn write_len_prefixed(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u64).to_be_bytes());
    buf.extend_from_slice(bytes);
}

/// The declaration kind of a composite.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CompositeKind {
    Structure,
    Resource,
    Enum,
    Event,
    Contract,
}

impl CompositeKind {
    pub fn name(self) -> &'static str {
        match self {
            CompositeKind::Structure => "structure",
            CompositeKind::Resource => "resource",
            CompositeKind::Enum => "enum",
            CompositeKind::Event => "event",
            CompositeKind::Contract => "contract",
        }
    }
}

/// Storage domain of a path value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PathDomain {
    Storage,
    Private,
    Public,
}

impl PathDomain {
    pub const ALL: [PathDomain; 3] = [PathDomain::Storage, PathDomain::Private, PathDomain::Public];

    pub fn identifier(self) -> &'static str {
        match self {
            PathDomain::Storage => "storage",
            PathDomain::Private => "private",
            PathDomain::Public => "public",
        }
    }
}

// ---------------------------------------------------------------------------
// Static Types
// ---------------------------------------------------------------------------

/// Built-in types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PrimitiveType {
    Never,
    Void,
    AnyStruct,
    AnyResource,
    Bool,
    String,
    Address,
    Path,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Int128,
    Int256,
    UInt,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    UInt128,
    UInt256,
    Word8,
    Word16,
    Word32,
    Word64,
    Fix64,
    UFix64,
}

impl PrimitiveType {
    /// Integer and word types, the only valid enum raw types.
    pub fn is_integer(self) -> bool {
        use PrimitiveType::*;
        matches!(
            self,
            Int | Int8
                | Int16
                | Int32
                | Int64
                | Int128
                | Int256
                | UInt
                | UInt8
                | UInt16
                | UInt32
                | UInt64
                | UInt128
                | UInt256
                | Word8
                | Word16
                | Word32
                | Word64
        )
    }
}

/// Static type recorded in container slabs.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StaticType {
    Primitive(PrimitiveType),
    Optional(Box<StaticType>),
    VariableSized(Box<StaticType>),
    Dictionary {
        key: Box<StaticType>,
        value: Box<StaticType>,
    },
    Composite(TypeId),
    Reference {
        authorized: bool,
        referenced: Box<StaticType>,
    },
    Capability(Option<Box<StaticType>>),
}

impl StaticType {
    pub fn any_struct() -> Self {
        StaticType::Primitive(PrimitiveType::AnyStruct)
    }

    /// `[element]`
    pub fn variable_sized(element: StaticType) -> Self {
        StaticType::VariableSized(Box::new(element))
    }

    /// `{key: value}`
    pub fn dictionary(key: StaticType, value: StaticType) -> Self {
        StaticType::Dictionary {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, StaticType::VariableSized(_))
    }

    pub fn is_dictionary(&self) -> bool {
        matches!(self, StaticType::Dictionary { .. })
    }
}

impl fmt::Display for StaticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaticType::Primitive(p) => write!(f, "{p:?}"),
            StaticType::Optional(inner) => write!(f, "{inner}?"),
            StaticType::VariableSized(element) => write!(f, "[{element}]"),
            StaticType::Dictionary { key, value } => write!(f, "{{{key}: {value}}}"),
            StaticType::Composite(id) => write!(f, "{id}"),
            StaticType::Reference {
                authorized,
                referenced,
            } => {
                if *authorized {
                    write!(f, "auth &{referenced}")
                } else {
                    write!(f, "&{referenced}")
                }
            }
            StaticType::Capability(None) => write!(f, "Capability"),
            StaticType::Capability(Some(borrow)) => write!(f, "Capability<{borrow}>"),
        }
    }
}

// ---------------------------------------------------------------------------
// Type Environment
// ---------------------------------------------------------------------------

/// A registered composite declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompositeTypeInfo {
    pub id: TypeId,
    pub kind: CompositeKind,
    /// Raw type of an enum declaration; `None` for every other kind.
    pub enum_raw_type: Option<PrimitiveType>,
}

impl CompositeTypeInfo {
    pub fn new(id: TypeId, kind: CompositeKind) -> Self {
        Self {
            id,
            kind,
            enum_raw_type: None,
        }
    }

    pub fn enumeration(id: TypeId, raw_type: PrimitiveType) -> Self {
        Self {
            id,
            kind: CompositeKind::Enum,
            enum_raw_type: Some(raw_type),
        }
    }
}

/// Composite declarations known to a session.
#[derive(Debug, Default, Clone)]
pub struct TypeEnvironment {
    composites: BTreeMap<TypeId, CompositeTypeInfo>,
}

impl TypeEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a declaration, replacing any previous one with the same id.
    pub fn register(&mut self, info: CompositeTypeInfo) {
        self.composites.insert(info.id.clone(), info);
    }

    pub fn resolve(&self, id: &TypeId) -> Result<&CompositeTypeInfo> {
        self.composites
            .get(id)
            .ok_or_else(|| Error::InvalidStaticType(format!("unknown composite type {id}")))
    }

    /// Check that every composite named in `ty` resolves.
    pub fn check(&self, ty: &StaticType) -> Result<()> {
        match ty {
            StaticType::Primitive(_) | StaticType::Capability(None) => Ok(()),
            StaticType::Optional(inner)
            | StaticType::VariableSized(inner)
            | StaticType::Capability(Some(inner)) => self.check(inner),
            StaticType::Reference { referenced, .. } => self.check(referenced),
            StaticType::Dictionary { key, value } => {
                self.check(key)?;
                self.check(value)
            }
            StaticType::Composite(id) => self.resolve(id).map(|_| ()),
        }
    }

    pub fn len(&self) -> usize {
        self.composites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.composites.is_empty()
    }
}
