// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Strata Runtime — Persistent Values & Slabs
//!
//! The storage layer underneath a resource-oriented language: every value a
//! program keeps around ends up here, either embedded in its parent or in a
//! slab of its own, bound to the account that owns it.
//!
//! ## Architecture
//!
//! - **storage** — Slabs, storage ids, the backend trait and the inlining rule.
//!   Two backends: an in-memory arena and sled.
//! - **value** — The closed `Value` enum: scalars plus arrays, dictionaries
//!   and composites backed by root slabs. Transfer and deep remove live here.
//! - **session** — Store, type environment and configuration, threaded
//!   explicitly through every operation.
//! - **account** — Per-account key/value facade with an explicit overwrite
//!   policy.
//! - **types** — Addresses, type identities, static types.
//! - **workload** — Seeded random value trees for tests and smoke runs.
//! - **config** — Layout constants and `RuntimeConfig`.
//!
//! ## Ground Rules
//!
//! 1. Slab count and byte footprint after a deep remove equal what they were
//!    before the value was created.
//! 2. Transfer never touches its source.
//! 3. Containers compare by content, never by slab.
//! 4. An encoding that does not fit in `u32` is an error, not a truncation.

pub mod account;
pub mod config;
pub mod error;
pub mod session;
pub mod storage;
pub mod types;
pub mod value;
pub mod workload;

pub use error::{Error, Result};
pub use session::Session;
pub use value::Value;
