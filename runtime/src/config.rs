//! # Runtime Configuration & Constants
//!
//! Every magic number of the value store lives here. The storage layout
//! depends on several of them (inline threshold, fixed-point scale, address
//! width), so changing one after data has been persisted means the old slabs
//! no longer decode to the same values.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Storage Layout
// ---------------------------------------------------------------------------

/// Encoded size (in bytes) at which a storable stops being embedded in its
/// parent slab and is moved into a slab of its own.
///
/// A storable whose encoding is strictly smaller than this is inlined.
pub const MAX_INLINE_ELEMENT_SIZE: u64 = 256;

/// Largest encoded size the codec will report. Anything above this is an
/// [`Error::EncodingOverflow`] and aborts the write.
pub const MAX_ENCODED_SIZE: u64 = u32::MAX as u64;

/// Account addresses are 8 bytes wide.
pub const ADDRESS_LENGTH: usize = 8;

/// Address under which transient (unowned) slabs are allocated. No account
/// can own values at this address.
pub const TRANSIENT_ADDRESS: [u8; ADDRESS_LENGTH] = [0u8; ADDRESS_LENGTH];

// ---------------------------------------------------------------------------
// Value Representation
// ---------------------------------------------------------------------------

/// Number of fractional decimal digits carried by `Fix64` / `UFix64`.
pub const FIX64_SCALE: u32 = 8;

/// Denominator of the fixed-point kinds: `10^FIX64_SCALE`.
pub const FIX64_FACTOR: i64 = 100_000_000;

/// Largest integer part representable by `Fix64`.
pub const FIX64_MAX_INT: i64 = i64::MAX / FIX64_FACTOR;

/// Smallest integer part representable by `Fix64`.
pub const FIX64_MIN_INT: i64 = i64::MIN / FIX64_FACTOR;

/// Largest integer part representable by `UFix64`.
pub const UFIX64_MAX_INT: u64 = u64::MAX / FIX64_FACTOR as u64;

/// Name of the single field every enum composite carries.
pub const ENUM_RAW_VALUE_FIELD_NAME: &str = "rawValue";

// ---------------------------------------------------------------------------
// RuntimeConfig
// ---------------------------------------------------------------------------

/// What the account facade does with the value it is about to replace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverwritePolicy {
    /// Release every slab of the prior value before writing the new one.
    #[default]
    DeepRemove,
    /// Drop the mapping but leave the prior value's slabs in the store.
    Retain,
}

/// Tunable parameters for a [`Session`](crate::session::Session).
///
/// Defaults match the constants above. Tests shrink `max_inline_size` to
/// force externalization of small values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Inline threshold, see [`MAX_INLINE_ELEMENT_SIZE`].
    pub max_inline_size: u64,

    /// Account facade behavior on overwrite and delete.
    pub overwrite_policy: OverwritePolicy,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_inline_size: MAX_INLINE_ELEMENT_SIZE,
            overwrite_policy: OverwritePolicy::default(),
        }
    }
}

impl RuntimeConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Codec(format!("invalid config: {e}")))
    }

    /// Load a JSON configuration file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json(&raw)
    }
}
