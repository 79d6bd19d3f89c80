//! # Randomized Workloads
//!
//! Seeded generators for value trees of every kind, used by the integration
//! tests, the benchmarks and the `strata-smoke` runner. The same seed always
//! produces the same trees, so a failing run can be replayed.
//!
//! [`ValueMap`] is an independent mirror of a dictionary's expected content,
//! keyed by the same canonical key identity the dictionary itself uses.

use std::collections::BTreeMap;

use num_bigint::{BigInt, BigUint};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::{ENUM_RAW_VALUE_FIELD_NAME, FIX64_MAX_INT, UFIX64_MAX_INT};
use crate::error::Result;
use crate::session::Session;
use crate::types::{
    Address, CompositeKind, CompositeTypeInfo, Location, PathDomain, StaticType, TypeId,
};
use crate::value::{
    ArrayValue, CapabilityValue, CompositeField, CompositeValue, DictionaryValue, Fix64Value,
    IntegerKind, KeyDigest, PathValue, UFix64Value, Value,
};

/// Size of identifiers, field names and path identifiers.
const IDENTIFIER_SIZE: usize = 8;
const SMALL_STRING_MAX: usize = 255;
const LARGE_STRING_EXTRA: usize = 4048;

// ---------------------------------------------------------------------------
// WorkloadConfig
// ---------------------------------------------------------------------------

/// Shape limits of generated trees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadConfig {
    /// Containers are only generated above this depth.
    pub max_depth: usize,
    /// Upper bound on element count of a nested array or dictionary.
    pub inner_container_max_size: usize,
    pub composite_max_fields: usize,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            max_depth: 3,
            inner_container_max_size: 16,
            composite_max_fields: 10,
        }
    }
}

impl WorkloadConfig {
    /// Tight limits for unit and integration tests.
    pub fn small() -> Self {
        Self {
            max_depth: 3,
            inner_container_max_size: 4,
            composite_max_fields: 4,
        }
    }
}

// ---------------------------------------------------------------------------
// Kind selection
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug)]
enum Pick {
    Integer(IntegerKind),
    Fix64,
    UFix64,
    SmallString,
    LargeString,
    BoolTrue,
    BoolFalse,
    Path,
    Address,
    Enum,
    Void,
    Nil,
    Capability,
    Some,
    Array,
    Dictionary,
    Composite,
}

/// Hashable kinds. UInt64 and small strings are listed more than once so
/// they come up more often.
const HASHABLE: &[Pick] = &[
    Pick::Integer(IntegerKind::Int),
    Pick::Integer(IntegerKind::Int8),
    Pick::Integer(IntegerKind::Int16),
    Pick::Integer(IntegerKind::Int32),
    Pick::Integer(IntegerKind::Int64),
    Pick::Integer(IntegerKind::Int128),
    Pick::Integer(IntegerKind::Int256),
    Pick::Integer(IntegerKind::UInt),
    Pick::Integer(IntegerKind::UInt8),
    Pick::Integer(IntegerKind::UInt16),
    Pick::Integer(IntegerKind::UInt32),
    Pick::Integer(IntegerKind::UInt64),
    Pick::Integer(IntegerKind::UInt64),
    Pick::Integer(IntegerKind::UInt64),
    Pick::Integer(IntegerKind::UInt64),
    Pick::Integer(IntegerKind::UInt128),
    Pick::Integer(IntegerKind::UInt256),
    Pick::Integer(IntegerKind::Word8),
    Pick::Integer(IntegerKind::Word16),
    Pick::Integer(IntegerKind::Word32),
    Pick::Integer(IntegerKind::Word64),
    Pick::Fix64,
    Pick::UFix64,
    Pick::SmallString,
    Pick::SmallString,
    Pick::SmallString,
    Pick::SmallString,
    Pick::LargeString,
    Pick::BoolTrue,
    Pick::BoolFalse,
    Pick::Path,
    Pick::Address,
    Pick::Enum,
];

/// Leaf kinds that are not hashable.
const UNHASHABLE_LEAVES: &[Pick] = &[Pick::Void, Pick::Nil, Pick::Capability];

/// Kinds that nest further.
const NESTING: &[Pick] = &[
    Pick::Some,
    Pick::Array,
    Pick::Array,
    Pick::Dictionary,
    Pick::Dictionary,
    Pick::Composite,
];

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

/// Seeded value generator.
///
/// Composite and enum declarations it invents are registered in the
/// session's type environment as they are generated.
pub struct Generator {
    rng: StdRng,
    config: WorkloadConfig,
}

impl Generator {
    pub fn new(seed: u64, config: WorkloadConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            config,
        }
    }

    pub fn config(&self) -> &WorkloadConfig {
        &self.config
    }

    /// Uniform integer in `0..=upper`.
    pub fn int_up_to(&mut self, upper: usize) -> usize {
        self.rng.gen_range(0..=upper)
    }

    /// Any storable value; containers only while `depth` is below the
    /// configured maximum.
    pub fn storable_value(
        &mut self,
        session: &mut Session,
        owner: Option<Address>,
        depth: usize,
    ) -> Result<Value> {
        let leaves = HASHABLE.len() + UNHASHABLE_LEAVES.len();
        let choices = if depth < self.config.max_depth {
            leaves + NESTING.len()
        } else {
            leaves
        };

        let n = self.rng.gen_range(0..choices);
        let pick = if n < HASHABLE.len() {
            HASHABLE[n]
        } else if n < leaves {
            UNHASHABLE_LEAVES[n - HASHABLE.len()]
        } else {
            NESTING[n - leaves]
        };
        self.generate(session, owner, depth, pick)
    }

    /// A value from the hashable subset, enums included.
    pub fn hashable_value(&mut self, session: &mut Session, owner: Option<Address>) -> Result<Value> {
        let pick = HASHABLE[self.rng.gen_range(0..HASHABLE.len())];
        self.generate(session, owner, 0, pick)
    }

    fn generate(
        &mut self,
        session: &mut Session,
        owner: Option<Address>,
        depth: usize,
        pick: Pick,
    ) -> Result<Value> {
        let value = match pick {
            Pick::Integer(kind) => self.integer(kind)?,
            Pick::Fix64 => {
                let n = self.sign() * self.rng.gen_range(0..FIX64_MAX_INT);
                Value::Fix64(Fix64Value::with_integer(n)?)
            }
            Pick::UFix64 => Value::UFix64(UFix64Value::with_integer(
                self.rng.gen_range(0..UFIX64_MAX_INT),
            )?),
            Pick::SmallString => {
                let size = self.int_up_to(SMALL_STRING_MAX);
                Value::String(self.string_of_size(size))
            }
            Pick::LargeString => {
                let size = self.int_up_to(LARGE_STRING_EXTRA) + SMALL_STRING_MAX;
                Value::String(self.string_of_size(size))
            }
            Pick::BoolTrue => Value::Bool(true),
            Pick::BoolFalse => Value::Bool(false),
            Pick::Path => Value::Path(self.path()),
            Pick::Address => Value::Address(self.address()),
            Pick::Enum => Value::Composite(self.enum_case(session, owner)?),
            Pick::Void => Value::Void,
            Pick::Nil => Value::Nil,
            Pick::Capability => Value::Capability(CapabilityValue {
                address: self.address(),
                path: self.path(),
                borrow_type: Some(StaticType::Reference {
                    authorized: false,
                    referenced: Box::new(StaticType::any_struct()),
                }),
            }),
            Pick::Some => Value::some(self.storable_value(session, owner, depth + 1)?),
            Pick::Array => Value::Array(self.array(session, owner, depth)?),
            Pick::Dictionary => Value::Dictionary(self.dictionary(session, owner, depth)?),
            Pick::Composite => {
                Value::Composite(self.composite(session, CompositeKind::Structure, owner, depth)?)
            }
        };
        Ok(value)
    }

    fn sign(&mut self) -> i64 {
        if self.rng.gen_bool(0.5) {
            1
        } else {
            -1
        }
    }

    /// A random value of an integer kind.
    pub fn integer(&mut self, kind: IntegerKind) -> Result<Value> {
        let value = match kind {
            IntegerKind::Int => Value::Int(BigInt::from(self.sign() * self.rng.gen_range(0..i64::MAX))),
            IntegerKind::Int8 => Value::Int8(self.rng.gen()),
            IntegerKind::Int16 => Value::Int16(self.rng.gen()),
            IntegerKind::Int32 => Value::Int32(self.rng.gen()),
            IntegerKind::Int64 => Value::Int64(self.rng.gen()),
            IntegerKind::Int128 => Value::Int128(i128::from(self.rng.gen::<i64>())),
            IntegerKind::Int256 => Value::Int256(BigInt::from(self.rng.gen::<i64>())),
            IntegerKind::UInt => Value::UInt(BigUint::from(self.rng.gen::<u64>())),
            IntegerKind::UInt256 => Value::UInt256(BigUint::from(self.rng.gen::<u64>())),
            IntegerKind::UInt128 => Value::UInt128(u128::from(self.rng.gen::<u64>())),
            other => other.wrap(&BigInt::from(self.rng.gen::<u64>()))?,
        };
        Ok(value)
    }

    /// A string of `size` random bytes, with invalid UTF-8 sequences
    /// replaced by `$`.
    pub fn string_of_size(&mut self, size: usize) -> String {
        let mut bytes = vec![0u8; size];
        self.rng.fill(&mut bytes[..]);
        String::from_utf8_lossy(&bytes).replace(char::REPLACEMENT_CHARACTER, "$")
    }

    pub fn identifier(&mut self) -> String {
        self.string_of_size(IDENTIFIER_SIZE)
    }

    pub fn address(&mut self) -> Address {
        Address(self.rng.gen())
    }

    pub fn path(&mut self) -> PathValue {
        let domain = PathDomain::ALL[self.rng.gen_range(0..PathDomain::ALL.len())];
        PathValue::new(domain, self.identifier())
    }

    fn location(&mut self, name: &str) -> Location {
        Location::Address {
            address: self.address(),
            name: name.to_string(),
        }
    }

    /// An enum case of a freshly declared enum with a random integer raw type.
    pub fn enum_case(
        &mut self,
        session: &mut Session,
        owner: Option<Address>,
    ) -> Result<CompositeValue> {
        let kind = IntegerKind::ALL[self.rng.gen_range(0..IntegerKind::ALL.len())];
        let raw_value = self.integer(kind)?;

        let identifier = self.identifier();
        let type_id = TypeId::new(self.location(&identifier), identifier);
        session.register_type(CompositeTypeInfo::enumeration(
            type_id.clone(),
            kind.primitive_type(),
        ));

        CompositeValue::new(
            session,
            type_id,
            vec![CompositeField::new(ENUM_RAW_VALUE_FIELD_NAME, raw_value)],
            owner,
        )
    }

    pub fn array(
        &mut self,
        session: &mut Session,
        owner: Option<Address>,
        depth: usize,
    ) -> Result<ArrayValue> {
        let count = self.int_up_to(self.config.inner_container_max_size);
        self.array_of_size(session, owner, depth, count)
    }

    pub fn array_of_size(
        &mut self,
        session: &mut Session,
        owner: Option<Address>,
        depth: usize,
        count: usize,
    ) -> Result<ArrayValue> {
        let mut elements = Vec::with_capacity(count);
        for _ in 0..count {
            elements.push(self.storable_value(session, owner, depth + 1)?);
        }
        ArrayValue::new(
            session,
            StaticType::variable_sized(StaticType::any_struct()),
            owner,
            elements,
        )
    }

    pub fn dictionary(
        &mut self,
        session: &mut Session,
        owner: Option<Address>,
        depth: usize,
    ) -> Result<DictionaryValue> {
        let count = self.int_up_to(self.config.inner_container_max_size);
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            let key = self.hashable_value(session, owner)?;
            let value = self.storable_value(session, owner, depth + 1)?;
            entries.push((key, value));
        }
        DictionaryValue::new(
            session,
            StaticType::dictionary(StaticType::any_struct(), StaticType::any_struct()),
            owner,
            entries,
        )
    }

    pub fn composite(
        &mut self,
        session: &mut Session,
        kind: CompositeKind,
        owner: Option<Address>,
        depth: usize,
    ) -> Result<CompositeValue> {
        let count = self.int_up_to(self.config.composite_max_fields);
        self.composite_with_fields(session, kind, owner, depth, count)
    }

    pub fn composite_with_fields(
        &mut self,
        session: &mut Session,
        kind: CompositeKind,
        owner: Option<Address>,
        depth: usize,
        count: usize,
    ) -> Result<CompositeValue> {
        let identifier = self.identifier();
        let type_id = TypeId::new(self.location(&identifier), identifier);

        let mut fields = Vec::with_capacity(count);
        for _ in 0..count {
            let name = self.identifier();
            fields.push(CompositeField::new(
                name,
                self.storable_value(session, owner, depth + 1)?,
            ));
        }

        session.register_type(CompositeTypeInfo::new(type_id.clone(), kind));
        CompositeValue::new(session, type_id, fields, owner)
    }
}

// ---------------------------------------------------------------------------
// ValueMap
// ---------------------------------------------------------------------------

/// Expected dictionary content, held as independent deep copies.
#[derive(Debug, Default)]
pub struct ValueMap {
    entries: BTreeMap<KeyDigest, (Value, Value)>,
}

impl ValueMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record copies of `key` and `value`. A previous entry for the same
    /// key is deep-removed.
    pub fn put(&mut self, session: &mut Session, key: &Value, value: &Value) -> Result<()> {
        let digest = KeyDigest::of(session, key)?;
        let key = key.deep_copy(session)?;
        let value = value.deep_copy(session)?;
        if let Some((old_key, old_value)) = self.entries.insert(digest, (key, value)) {
            old_key.deep_remove(session)?;
            old_value.deep_remove(session)?;
        }
        Ok(())
    }

    pub fn get(&self, session: &Session, key: &Value) -> Result<Option<&Value>> {
        let digest = KeyDigest::of(session, key)?;
        Ok(self.entries.get(&digest).map(|(_, value)| value))
    }

    /// Forget `key`, deep-removing the recorded copies. Returns whether it
    /// was present.
    pub fn remove(&mut self, session: &mut Session, key: &Value) -> Result<bool> {
        let digest = KeyDigest::of(session, key)?;
        match self.entries.remove(&digest) {
            Some((key, value)) => {
                key.deep_remove(session)?;
                value.deep_remove(session)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.values().map(|(key, value)| (key, value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Deep-remove every recorded copy.
    pub fn clear(&mut self, session: &mut Session) -> Result<()> {
        for (_, (key, value)) in std::mem::take(&mut self.entries) {
            key.deep_remove(session)?;
            value.deep_remove(session)?;
        }
        Ok(())
    }
}
