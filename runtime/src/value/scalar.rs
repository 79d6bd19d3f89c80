//! Scalar value kinds.
//!
//! Scalars have no storage of their own: they are embedded in their parent
//! slab (or externalized as a whole when too large). This module covers the
//! pieces that need more than a bare Rust primitive: integer construction
//! from a wider source with exact wrap-around, fixed-point decimals, paths
//! and capabilities.

use std::fmt;

use num_bigint::{BigInt, BigUint};
use num_traits::{One, ToPrimitive};
use serde::{Deserialize, Serialize};

use super::Value;
use crate::config::{FIX64_FACTOR, FIX64_MAX_INT, FIX64_MIN_INT, FIX64_SCALE, UFIX64_MAX_INT};
use crate::error::{Error, Result};
use crate::types::{Address, PathDomain, PrimitiveType, StaticType};

// ---------------------------------------------------------------------------
// Integer kinds
// ---------------------------------------------------------------------------

/// Every integer and word kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IntegerKind {
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
}

impl IntegerKind {
    pub const ALL: [IntegerKind; 18] = [
        IntegerKind::Int,
        IntegerKind::Int8,
        IntegerKind::Int16,
        IntegerKind::Int32,
        IntegerKind::Int64,
        IntegerKind::Int128,
        IntegerKind::Int256,
        IntegerKind::UInt,
        IntegerKind::UInt8,
        IntegerKind::UInt16,
        IntegerKind::UInt32,
        IntegerKind::UInt64,
        IntegerKind::UInt128,
        IntegerKind::UInt256,
        IntegerKind::Word8,
        IntegerKind::Word16,
        IntegerKind::Word32,
        IntegerKind::Word64,
    ];

    /// Width in bits; `None` for the arbitrary-precision kinds.
    pub fn bits(self) -> Option<u32> {
        use IntegerKind::*;
        match self {
            Int | UInt => None,
            Int8 | UInt8 | Word8 => Some(8),
            Int16 | UInt16 | Word16 => Some(16),
            Int32 | UInt32 | Word32 => Some(32),
            Int64 | UInt64 | Word64 => Some(64),
            Int128 | UInt128 => Some(128),
            Int256 | UInt256 => Some(256),
        }
    }

    pub fn is_signed(self) -> bool {
        use IntegerKind::*;
        matches!(self, Int | Int8 | Int16 | Int32 | Int64 | Int128 | Int256)
    }

    pub fn primitive_type(self) -> PrimitiveType {
        match self {
            IntegerKind::Int => PrimitiveType::Int,
            IntegerKind::Int8 => PrimitiveType::Int8,
            IntegerKind::Int16 => PrimitiveType::Int16,
            IntegerKind::Int32 => PrimitiveType::Int32,
            IntegerKind::Int64 => PrimitiveType::Int64,
            IntegerKind::Int128 => PrimitiveType::Int128,
            IntegerKind::Int256 => PrimitiveType::Int256,
            IntegerKind::UInt => PrimitiveType::UInt,
            IntegerKind::UInt8 => PrimitiveType::UInt8,
            IntegerKind::UInt16 => PrimitiveType::UInt16,
            IntegerKind::UInt32 => PrimitiveType::UInt32,
            IntegerKind::UInt64 => PrimitiveType::UInt64,
            IntegerKind::UInt128 => PrimitiveType::UInt128,
            IntegerKind::UInt256 => PrimitiveType::UInt256,
            IntegerKind::Word8 => PrimitiveType::Word8,
            IntegerKind::Word16 => PrimitiveType::Word16,
            IntegerKind::Word32 => PrimitiveType::Word32,
            IntegerKind::Word64 => PrimitiveType::Word64,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            IntegerKind::Int => "Int",
            IntegerKind::Int8 => "Int8",
            IntegerKind::Int16 => "Int16",
            IntegerKind::Int32 => "Int32",
            IntegerKind::Int64 => "Int64",
            IntegerKind::Int128 => "Int128",
            IntegerKind::Int256 => "Int256",
            IntegerKind::UInt => "UInt",
            IntegerKind::UInt8 => "UInt8",
            IntegerKind::UInt16 => "UInt16",
            IntegerKind::UInt32 => "UInt32",
            IntegerKind::UInt64 => "UInt64",
            IntegerKind::UInt128 => "UInt128",
            IntegerKind::UInt256 => "UInt256",
            IntegerKind::Word8 => "Word8",
            IntegerKind::Word16 => "Word16",
            IntegerKind::Word32 => "Word32",
            IntegerKind::Word64 => "Word64",
        }
    }

    /// Build a value of this kind from an arbitrary integer.
    ///
    /// Fixed-width kinds keep the low `bits` bits of the two's-complement
    /// representation, exactly like a narrowing cast. `UInt` rejects
    /// negative sources; `Int` takes anything.
    pub fn wrap(self, source: &BigInt) -> Result<Value> {
        let kind = self.name();
        let value = match self {
            IntegerKind::Int => Value::Int(source.clone()),
            IntegerKind::UInt => match source.to_biguint() {
                Some(n) => Value::UInt(n),
                None => {
                    return Err(Error::OutOfRange {
                        kind,
                        value: source.to_string(),
                    })
                }
            },
            IntegerKind::Int8 => Value::Int8(narrow(wrap_signed(source, 8).to_i8(), kind)?),
            IntegerKind::Int16 => Value::Int16(narrow(wrap_signed(source, 16).to_i16(), kind)?),
            IntegerKind::Int32 => Value::Int32(narrow(wrap_signed(source, 32).to_i32(), kind)?),
            IntegerKind::Int64 => Value::Int64(narrow(wrap_signed(source, 64).to_i64(), kind)?),
            IntegerKind::Int128 => {
                Value::Int128(narrow(wrap_signed(source, 128).to_i128(), kind)?)
            }
            IntegerKind::Int256 => Value::Int256(wrap_signed(source, 256)),
            IntegerKind::UInt8 => Value::UInt8(narrow(wrap_unsigned(source, 8).to_u8(), kind)?),
            IntegerKind::UInt16 => {
                Value::UInt16(narrow(wrap_unsigned(source, 16).to_u16(), kind)?)
            }
            IntegerKind::UInt32 => {
                Value::UInt32(narrow(wrap_unsigned(source, 32).to_u32(), kind)?)
            }
            IntegerKind::UInt64 => {
                Value::UInt64(narrow(wrap_unsigned(source, 64).to_u64(), kind)?)
            }
            IntegerKind::UInt128 => {
                Value::UInt128(narrow(wrap_unsigned(source, 128).to_u128(), kind)?)
            }
            IntegerKind::UInt256 => Value::UInt256(wrap_unsigned(source, 256)),
            IntegerKind::Word8 => Value::Word8(narrow(wrap_unsigned(source, 8).to_u8(), kind)?),
            IntegerKind::Word16 => {
                Value::Word16(narrow(wrap_unsigned(source, 16).to_u16(), kind)?)
            }
            IntegerKind::Word32 => {
                Value::Word32(narrow(wrap_unsigned(source, 32).to_u32(), kind)?)
            }
            IntegerKind::Word64 => {
                Value::Word64(narrow(wrap_unsigned(source, 64).to_u64(), kind)?)
            }
        };
        Ok(value)
    }
}

fn narrow<T>(value: Option<T>, kind: &'static str) -> Result<T> {
    // Only reachable if the wrap arithmetic above is wrong.
    value.ok_or(Error::OutOfRange {
        kind,
        value: "wrapped value".to_string(),
    })
}

/// `source mod 2^bits`, always non-negative.
fn wrap_unsigned(source: &BigInt, bits: u32) -> BigUint {
    let modulus = BigInt::one() << bits;
    let reduced = ((source % &modulus) + &modulus) % &modulus;
    reduced.magnitude().clone()
}

/// Two's-complement reinterpretation of the low `bits` bits.
fn wrap_signed(source: &BigInt, bits: u32) -> BigInt {
    let unsigned = BigInt::from(wrap_unsigned(source, bits));
    let half = BigInt::one() << (bits - 1);
    if unsigned >= half {
        unsigned - (BigInt::one() << bits)
    } else {
        unsigned
    }
}

// ---------------------------------------------------------------------------
// Fixed point
// ---------------------------------------------------------------------------

/// Signed fixed-point decimal: a 64-bit integer scaled by `10^8`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fix64Value(i64);

impl Fix64Value {
    pub fn from_raw(raw: i64) -> Self {
        Fix64Value(raw)
    }

    /// The fixed-point value equal to the integer `n`.
    pub fn with_integer(n: i64) -> Result<Self> {
        if !(FIX64_MIN_INT..=FIX64_MAX_INT).contains(&n) {
            return Err(Error::OutOfRange {
                kind: "Fix64",
                value: n.to_string(),
            });
        }
        Ok(Fix64Value(n * FIX64_FACTOR))
    }

    pub fn raw(self) -> i64 {
        self.0
    }

    /// Integer part, truncated toward zero.
    pub fn to_int(self) -> i64 {
        self.0 / FIX64_FACTOR
    }
}

impl fmt::Display for Fix64Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let magnitude = (self.0 as i128).unsigned_abs();
        let factor = FIX64_FACTOR as u128;
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(
            f,
            "{sign}{}.{:0width$}",
            magnitude / factor,
            magnitude % factor,
            width = FIX64_SCALE as usize
        )
    }
}

/// Unsigned fixed-point decimal: a 64-bit unsigned integer scaled by `10^8`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UFix64Value(u64);

impl UFix64Value {
    pub fn from_raw(raw: u64) -> Self {
        UFix64Value(raw)
    }

    pub fn with_integer(n: u64) -> Result<Self> {
        if n > UFIX64_MAX_INT {
            return Err(Error::OutOfRange {
                kind: "UFix64",
                value: n.to_string(),
            });
        }
        Ok(UFix64Value(n * FIX64_FACTOR as u64))
    }

    pub fn raw(self) -> u64 {
        self.0
    }

    pub fn to_int(self) -> u64 {
        self.0 / FIX64_FACTOR as u64
    }
}

impl fmt::Display for UFix64Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let factor = FIX64_FACTOR as u64;
        write!(
            f,
            "{}.{:0width$}",
            self.0 / factor,
            self.0 % factor,
            width = FIX64_SCALE as usize
        )
    }
}

// ---------------------------------------------------------------------------
// Paths & capabilities
// ---------------------------------------------------------------------------

/// `/domain/identifier`
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathValue {
    pub domain: PathDomain,
    pub identifier: String,
}

impl PathValue {
    pub fn new(domain: PathDomain, identifier: impl Into<String>) -> Self {
        Self {
            domain,
            identifier: identifier.into(),
        }
    }
}

impl fmt::Display for PathValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.domain.identifier(), self.identifier)
    }
}

/// A capability to borrow what is stored at `path` in `address`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityValue {
    pub address: Address,
    pub path: PathValue,
    pub borrow_type: Option<StaticType>,
}

impl fmt::Display for CapabilityValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.borrow_type {
            Some(ty) => write!(f, "Capability<{ty}>(address: {}, path: {})", self.address, self.path),
            None => write!(f, "Capability(address: {}, path: {})", self.address, self.path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_width_kinds_truncate() {
        let source = BigInt::from(300);
        assert!(matches!(IntegerKind::UInt8.wrap(&source).unwrap(), Value::UInt8(44)));
        assert!(matches!(IntegerKind::Int8.wrap(&source).unwrap(), Value::Int8(44)));
        assert!(matches!(IntegerKind::Word8.wrap(&source).unwrap(), Value::Word8(44)));

        let source = BigInt::from(200);
        assert!(matches!(IntegerKind::Int8.wrap(&source).unwrap(), Value::Int8(-56)));
    }

    #[test]
    fn negative_source_wraps_into_unsigned_kinds() {
        let source = BigInt::from(-1);
        assert!(matches!(IntegerKind::UInt16.wrap(&source).unwrap(), Value::UInt16(u16::MAX)));
        assert!(matches!(IntegerKind::Word64.wrap(&source).unwrap(), Value::Word64(u64::MAX)));
        assert!(matches!(IntegerKind::UInt128.wrap(&source).unwrap(), Value::UInt128(u128::MAX)));
    }

    #[test]
    fn in_range_values_are_preserved() {
        let source = BigInt::from(i64::MIN);
        assert!(matches!(IntegerKind::Int64.wrap(&source).unwrap(), Value::Int64(i64::MIN)));
        assert!(matches!(IntegerKind::Int128.wrap(&source).unwrap(), Value::Int128(n) if n == i64::MIN as i128));
    }

    #[test]
    fn int256_wraps_at_two_to_the_255() {
        let max = (BigInt::one() << 255) - BigInt::one();
        match IntegerKind::Int256.wrap(&(&max + BigInt::one())).unwrap() {
            Value::Int256(n) => assert_eq!(n, -(BigInt::one() << 255usize)),
            other => panic!("unexpected value: {other:?}"),
        }
        match IntegerKind::Int256.wrap(&max).unwrap() {
            Value::Int256(n) => assert_eq!(n, max),
            other => panic!("unexpected value: {other:?}"),
        }
    }

    #[test]
    fn uint256_wraps_at_two_to_the_256() {
        let modulus = BigInt::one() << 256;
        match IntegerKind::UInt256.wrap(&(modulus + BigInt::from(5))).unwrap() {
            Value::UInt256(n) => assert_eq!(n, BigUint::from(5u32)),
            other => panic!("unexpected value: {other:?}"),
        }
    }

    #[test]
    fn arbitrary_precision_kinds() {
        let big = BigInt::from(u128::MAX) * BigInt::from(4);
        match IntegerKind::Int.wrap(&big).unwrap() {
            Value::Int(n) => assert_eq!(n, big),
            other => panic!("unexpected value: {other:?}"),
        }
        assert!(matches!(
            IntegerKind::UInt.wrap(&BigInt::from(-3)),
            Err(Error::OutOfRange { kind: "UInt", .. })
        ));
    }

    #[test]
    fn fix64_integer_round_trip() {
        let value = Fix64Value::with_integer(-42).unwrap();
        assert_eq!(value.raw(), -4_200_000_000);
        assert_eq!(value.to_int(), -42);
        assert!(Fix64Value::with_integer(FIX64_MAX_INT + 1).is_err());
    }

    #[test]
    fn fix64_to_int_truncates_toward_zero() {
        assert_eq!(Fix64Value::from_raw(-150_000_000).to_int(), -1);
        assert_eq!(UFix64Value::from_raw(199_999_999).to_int(), 1);
    }

    #[test]
    fn fixed_point_display() {
        assert_eq!(Fix64Value::from_raw(-150_000_000).to_string(), "-1.50000000");
        assert_eq!(Fix64Value::from_raw(i64::MIN).to_string(), "-92233720368.54775808");
        assert_eq!(UFix64Value::from_raw(1).to_string(), "0.00000001");
    }

    #[test]
    fn ufix64_bounds() {
        assert!(UFix64Value::with_integer(UFIX64_MAX_INT).is_ok());
        assert!(UFix64Value::with_integer(UFIX64_MAX_INT + 1).is_err());
    }

    #[test]
    fn path_display() {
        let path = PathValue::new(PathDomain::Public, "receiver");
        assert_eq!(path.to_string(), "/public/receiver");
    }

    #[test]
    fn kinds_map_to_integer_primitives() {
        for kind in IntegerKind::ALL {
            assert!(kind.primitive_type().is_integer(), "{}", kind.name());
        }
        assert_eq!(IntegerKind::ALL.iter().filter(|k| k.is_signed()).count(), 7);
    }
}
