//! Hash challenge generation and solving
//!
//! A challenge commits to possession of a secret without storing it: the
//! salt is public, the expected result is `hash_iterations` applications of
//! the digest starting from `secret ++ salt`, and only `{salt, result}`
//! pairs are retained. Whoever remembers the secret can recompute the result
//! for any salt; nobody else can, to the digest's preimage resistance.
//! Higher iteration counts trade verification cost for resistance to
//! offline guessing.

use crate::constants::{
    DEFAULT_HASH_ITERATIONS, DEFAULT_POOL_SIZE, MAX_SALT_CHARS, MIN_SALT_CHARS, SALT_ENTROPY_BYTES,
};
use keystone_core::{digest_hex, Effects, KeystoneError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Closed enumeration of challenge schemes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeType {
    /// Iterated-hash commitments (the only scheme in v1)
    #[default]
    Hash,
}

impl fmt::Display for ChallengeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChallengeType::Hash => f.write_str("hash"),
        }
    }
}

/// Public parameters of a keystone's challenge scheme
///
/// Serializes to the shareable wire shape:
/// `{"type": "hash", "poolSize": n, "hashIterations": n}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeConfig {
    /// Challenge scheme
    #[serde(rename = "type")]
    pub challenge_type: ChallengeType,
    /// Number of challenges generated per keystone
    pub pool_size: usize,
    /// Digest applications from secret to expected result
    pub hash_iterations: u32,
}

impl Default for ChallengeConfig {
    fn default() -> Self {
        Self {
            challenge_type: ChallengeType::Hash,
            pool_size: DEFAULT_POOL_SIZE,
            hash_iterations: DEFAULT_HASH_ITERATIONS,
        }
    }
}

impl ChallengeConfig {
    /// Validate the parameters
    pub fn validate(&self) -> Result<()> {
        if self.pool_size == 0 {
            return Err(KeystoneError::invalid("challenge pool size must be >= 1"));
        }
        if self.hash_iterations == 0 {
            return Err(KeystoneError::invalid("hash iterations must be >= 1"));
        }
        Ok(())
    }
}

/// One commitment: public salt, expected result
///
/// Transient - generated into a keystone's payload, never persisted on its
/// own. The secret it was derived from is not part of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    /// Public salt, unique within one pool
    pub salt: String,
    /// Expected iterated-digest result
    pub expected: String,
}

/// Holder-side computation: the response for one salt
///
/// Identical formula to generation; matching the stored commitment proves
/// possession of `secret`.
pub fn solve_challenge(secret: &str, salt: &str, hash_iterations: u32) -> Result<String> {
    if secret.is_empty() {
        return Err(KeystoneError::invalid("secret required"));
    }
    if salt.is_empty() {
        return Err(KeystoneError::invalid("salt required"));
    }
    if salt.len() < MIN_SALT_CHARS || salt.len() > MAX_SALT_CHARS {
        return Err(KeystoneError::invalid(format!(
            "salt length {} outside allowed bounds {MIN_SALT_CHARS}..={MAX_SALT_CHARS}",
            salt.len()
        )));
    }
    if hash_iterations == 0 {
        return Err(KeystoneError::invalid("hash iterations must be >= 1"));
    }

    let mut digest = digest_hex(format!("{secret}{salt}").as_bytes());
    for _ in 1..hash_iterations {
        digest = digest_hex(digest.as_bytes());
    }
    Ok(digest)
}

/// Generate a pool of fresh challenges from a secret
///
/// Salts come from the injected randomness, so a seeded source yields a
/// reproducible pool. The secret is used only to compute the expected
/// results; it is not part of the returned challenges.
pub fn generate_challenge_pool(
    effects: &Effects,
    secret: &str,
    config: &ChallengeConfig,
) -> Result<Vec<Challenge>> {
    config.validate()?;
    if secret.is_empty() {
        return Err(KeystoneError::invalid("secret required"));
    }

    let mut salts = BTreeSet::new();
    let mut pool = Vec::with_capacity(config.pool_size);
    while pool.len() < config.pool_size {
        let salt = hex::encode(effects.random_bytes::<SALT_ENTROPY_BYTES>());
        // 32 bytes of entropy collide only if the randomness source repeats
        if !salts.insert(salt.clone()) {
            continue;
        }
        let expected = solve_challenge(secret, &salt, config.hash_iterations)?;
        pool.push(Challenge { salt, expected });
    }
    Ok(pool)
}
