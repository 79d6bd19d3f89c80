//! # Error Taxonomy
//!
//! Two classes of failure leave this crate:
//!
//! - **Recoverable** — a referenced slab is missing, an encoding is too large,
//!   a recorded type cannot be resolved, a configuration file is unreadable,
//!   or the backend itself failed. The caller decides what to do.
//! - **Fatal** — a broken invariant (double remove, out-of-range index,
//!   unhashable dictionary key, colliding key digests, a slab of the wrong
//!   shape). These abort the current operation and must never be retried.
//!
//! A higher layer translates both into language-level aborts; this crate only
//! classifies them.

use crate::storage::StorageId;
use crate::value::KeyDigest;

/// Errors raised by storage, value and account operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A referenced slab does not exist.
    #[error("slab not found: {0}")]
    NotFound(StorageId),

    /// A storable encodes to more bytes than the layout can represent.
    #[error("storable size is too large: expected at most u32::MAX bytes, got {size}")]
    EncodingOverflow {
        /// The encoded size that was computed.
        size: u64,
    },

    /// A loaded value carries a type tag the type environment cannot resolve.
    #[error("invalid static type: {0}")]
    InvalidStaticType(String),

    /// Opaque fault from the storage backend.
    #[error("storage backend error: {0}")]
    Backend(String),

    /// A configuration file could not be read.
    #[error("configuration error: {0}")]
    Config(String),

    /// Slab or configuration bytes could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// A scalar could not be built from the given source value.
    #[error("value {value} is out of range for {kind}")]
    OutOfRange {
        /// Name of the scalar kind.
        kind: &'static str,
        /// Textual form of the rejected source value.
        value: String,
    },

    /// Array access outside `0..count`.
    #[error("array index out of bounds: index {index}, count {count}")]
    IndexOutOfRange {
        /// The requested index.
        index: usize,
        /// Element count at the time of the access.
        count: usize,
    },

    /// A slab was released twice.
    #[error("slab {0} was already removed")]
    DoubleRemove(StorageId),

    /// A value outside the hashable subset was used as a dictionary key.
    #[error("{0} values cannot be used as dictionary keys")]
    UnhashableKey(&'static str),

    /// Two distinct keys hash to the same dictionary digest.
    #[error("dictionary keys collide on digest {0}")]
    KeyCollision(KeyDigest),

    /// A slab exists but holds a different kind of node than expected.
    #[error("slab {id} is not a {expected} slab")]
    UnexpectedSlab {
        /// The slab that was read.
        id: StorageId,
        /// What the caller expected to find there.
        expected: &'static str,
    },
}

impl Error {
    /// `true` for programming errors that signal a broken invariant.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::IndexOutOfRange { .. }
                | Error::DoubleRemove(_)
                | Error::UnhashableKey(_)
                | Error::KeyCollision(_)
                | Error::UnexpectedSlab { .. }
        )
    }
}

impl From<sled::Error> for Error {
    fn from(err: sled::Error) -> Self {
        Error::Backend(err.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::Codec(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Address;

    #[test]
    fn fatal_classification() {
        let id = StorageId::new(Address::from_u64(1), 7);

        assert!(Error::DoubleRemove(id).is_fatal());
        assert!(Error::IndexOutOfRange { index: 3, count: 2 }.is_fatal());
        assert!(Error::UnhashableKey("array").is_fatal());
        assert!(Error::KeyCollision(crate::value::KeyDigest([7; 32])).is_fatal());

        assert!(!Error::NotFound(id).is_fatal());
        assert!(!Error::EncodingOverflow { size: u64::MAX }.is_fatal());
        assert!(!Error::Backend("io".into()).is_fatal());
        assert!(!Error::Config("missing".into()).is_fatal());
    }

    #[test]
    fn messages_name_the_slab() {
        let id = StorageId::new(Address::from_u64(0x41), 2);
        let message = Error::NotFound(id).to_string();
        assert!(message.contains("0x0000000000000041"));
        assert!(message.contains('2'));
    }
}
