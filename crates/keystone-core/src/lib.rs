//! # Keystone Core - Foundation
//!
//! Immutable, content-addressed nodes and the derivation algebra that
//! produces them. This crate is pure and synchronous: no I/O, no global
//! clock, no global randomness. Side effects (time, entropy) are injected
//! through the [`Effects`] bundle so every operation is reproducible under
//! a seeded source.
//!
//! ## Core Concepts
//!
//! - **Node**: identifier + optional payload + optional relations, committed
//!   to by a canonical SHA-256 hash. Immutable once sealed.
//! - **Address**: `identifier^hash`, globally unique barring collision.
//! - **Derivation**: `fork` (new timeline), `mutate` (intrinsic change),
//!   `relate` (extrinsic change) - each returns a *new* node.
//! - **Effects**: injected time + randomness, deterministic under test.
//!
//! ## What's NOT in this crate
//!
//! - Witness/admission behavior (see `keystone-store`)
//! - Capability semantics (see `keystone`)
//! - Persistence or transport of any kind

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Unified error handling
pub mod errors;

/// Injectable time and randomness
pub mod effects;

/// Canonical node hashing
pub mod hash;

/// Immutable content-addressed nodes
pub mod node;

/// Node derivation transforms
pub mod derive;

/// UTC timestamp rendering
pub mod time;

pub use derive::{
    fork, mutate, relate, Derived, ForkOptions, LifecycleOptions, MutateOptions, RelateOptions,
    PAYLOAD_TIMESTAMP, PAYLOAD_UUID, REL_ANCESTOR, REL_AUDIT, REL_PAST,
};
pub use effects::{
    Effects, OsRandom, RandomSource, SeededRandom, SimulatedClock, SystemClock, TimeSource,
};
pub use errors::{KeystoneError, Result};
pub use hash::{compute_node_hash, digest_hex};
pub use node::{Address, Node, Payload, Relations, ADDRESS_DELIMITER};
pub use time::{format_utc, parse_utc, UTC_TIMESTAMP_FORMAT};
