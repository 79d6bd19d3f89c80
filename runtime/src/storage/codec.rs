//! Slab encoding.
//!
//! The byte layout is whatever `bincode` produces for the serde derives on
//! [`Slab`] and [`Storable`]. The only contract is content round-trip:
//! decoding an encoded slab yields an equal slab. Sizes are computed with
//! the same encoder so the inlining decision and the storage byte-accounting
//! agree with each other.

use serde::Serialize;

use super::{Slab, Storable};
use crate::config::MAX_ENCODED_SIZE;
use crate::error::{Error, Result};

/// Encoded size of any serializable item, rejecting sizes above `u32::MAX`.
pub fn encoded_size<T: Serialize + ?Sized>(item: &T) -> Result<u32> {
    let size = bincode::serialized_size(item)?;
    check_size(size)
}

fn check_size(size: u64) -> Result<u32> {
    if size > MAX_ENCODED_SIZE {
        return Err(Error::EncodingOverflow { size });
    }
    Ok(size as u32)
}

/// Encoded size of a storable as its parent would embed it.
pub fn storable_size(storable: &Storable) -> Result<u32> {
    encoded_size(storable)
}

pub fn encode_slab(slab: &Slab) -> Result<Vec<u8>> {
    encoded_size(slab)?;
    Ok(bincode::serialize(slab)?)
}

pub fn decode_slab(bytes: &[u8]) -> Result<Slab> {
    Ok(bincode::deserialize(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn size_matches_encoding_length() {
        let slab = Slab::Storable(Storable::Inline(Value::String("hello".into())));
        let bytes = encode_slab(&slab).unwrap();
        assert_eq!(encoded_size(&slab).unwrap() as usize, bytes.len());
    }

    #[test]
    fn decode_reproduces_content() {
        let slab = Slab::Storable(Storable::Inline(Value::UInt64(u64::MAX)));
        let decoded = decode_slab(&encode_slab(&slab).unwrap()).unwrap();
        match decoded {
            Slab::Storable(Storable::Inline(Value::UInt64(n))) => assert_eq!(n, u64::MAX),
            other => panic!("unexpected slab: {other:?}"),
        }
    }

    #[test]
    fn oversized_encoding_is_an_overflow() {
        let err = check_size(MAX_ENCODED_SIZE + 1).unwrap_err();
        assert!(matches!(err, Error::EncodingOverflow { size } if size == MAX_ENCODED_SIZE + 1));
        assert_eq!(check_size(MAX_ENCODED_SIZE).unwrap(), u32::MAX);
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        assert!(matches!(decode_slab(&[0xFF; 3]), Err(Error::Codec(_))));
    }
}
