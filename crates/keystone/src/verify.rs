//! Challenge verification and consumption
//!
//! Consuming a challenge must never change the keystone node itself - the
//! capability's hash and address are fixed at issuance. Solutions therefore
//! live out-of-band in a [`SolutionLedger`] keyed by `(keystone address,
//! salt)`, which can be rendered to its own persistable node and witnessed
//! into a repo like anything else.
//!
//! Verification outcomes are values, never errors: an invalid proof is an
//! expected, frequent event. All rejections mean "capability not currently
//! exercisable" and are distinguished only for diagnostics - never for
//! granting partial trust.

use crate::constants::PAYLOAD_SOLUTIONS;
use crate::keystone::Keystone;
use keystone_core::{Effects, Node, Payload, Result};
use keystone_store::Hashed;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use subtle::ConstantTimeEq;

/// Outcome of one verification attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// Response matched; the salt is now consumed
    Valid,
    /// Response did not match; the salt remains available
    Invalid,
    /// The salt is not part of this keystone's pool
    UnknownSalt,
    /// The salt was already solved once; replays never re-evaluate
    AlreadyConsumed,
    /// The keystone's expiration has passed
    Expired,
}

impl VerifyOutcome {
    /// Whether the proof was accepted
    pub fn is_valid(&self) -> bool {
        matches!(self, VerifyOutcome::Valid)
    }
}

impl fmt::Display for VerifyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = match self {
            VerifyOutcome::Valid => "valid",
            VerifyOutcome::Invalid => "invalid",
            VerifyOutcome::UnknownSalt => "unknown salt",
            VerifyOutcome::AlreadyConsumed => "already consumed",
            VerifyOutcome::Expired => "expired",
        };
        f.write_str(rendered)
    }
}

#[derive(Default)]
struct LedgerState {
    /// `(keystone address, salt)` to the consumed response
    solutions: BTreeMap<(String, String), String>,
    /// Failed attempts per keystone address, for intrusion diagnostics
    failed_attempts: BTreeMap<String, u64>,
}

/// Out-of-band record of consumed challenges
///
/// One mutex guards the whole ledger, making the already-consumed check,
/// the equality check, and the consumption mark a single atomic decision
/// per `(keystone, salt)` - concurrent attempts against the same salt can
/// never both succeed.
#[derive(Default)]
pub struct SolutionLedger {
    state: Mutex<LedgerState>,
}

impl SolutionLedger {
    /// An empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Verify a response against one of a keystone's challenges and, on
    /// success, mark the salt consumed
    ///
    /// Ordering of rejections: unknown salt, already consumed, expired,
    /// then the comparison. A failed comparison does NOT burn the salt -
    /// otherwise an attacker could exhaust the pool with garbage guesses.
    pub fn verify_and_consume(
        &self,
        effects: &Effects,
        keystone: &Keystone,
        salt: &str,
        response: &str,
    ) -> Result<VerifyOutcome> {
        let address = keystone.address().to_string();

        let expected = match keystone.challenges().get(salt) {
            None => return Ok(VerifyOutcome::UnknownSalt),
            Some(expected) => expected.clone(),
        };

        let now = effects.now()?;

        let mut state = self.state.lock();
        let key = (address.clone(), salt.to_string());
        if state.solutions.contains_key(&key) {
            return Ok(VerifyOutcome::AlreadyConsumed);
        }
        if let Some(expiration) = keystone.expiration() {
            if expiration.is_expired(now)? {
                return Ok(VerifyOutcome::Expired);
            }
        }

        let matches: bool = response
            .as_bytes()
            .ct_eq(expected.as_bytes())
            .into();
        if matches {
            state.solutions.insert(key, response.to_string());
            tracing::debug!(keystone = %address, "challenge consumed");
            Ok(VerifyOutcome::Valid)
        } else {
            let failures = state.failed_attempts.entry(address.clone()).or_default();
            *failures += 1;
            tracing::warn!(
                keystone = %address,
                failed_attempts = *failures,
                "challenge response mismatch"
            );
            Ok(VerifyOutcome::Invalid)
        }
    }

    /// Consumed salt-to-response map for one keystone
    pub fn solutions(&self, keystone: &Keystone) -> BTreeMap<String, String> {
        let address = keystone.address().to_string();
        self.state
            .lock()
            .solutions
            .iter()
            .filter(|((keystone_address, _), _)| keystone_address == &address)
            .map(|((_, salt), response)| (salt.clone(), response.clone()))
            .collect()
    }

    /// Number of consumed challenges for one keystone
    pub fn consumed(&self, keystone: &Keystone) -> usize {
        self.solutions(keystone).len()
    }

    /// Number of still-available challenges for one keystone
    pub fn remaining(&self, keystone: &Keystone) -> usize {
        keystone.pool_size().saturating_sub(self.consumed(keystone))
    }

    /// Whether every salt has been consumed
    ///
    /// An exhausted keystone cannot be exercised again; rotation means
    /// minting a new keystone, never patching this one.
    pub fn is_exhausted(&self, keystone: &Keystone) -> bool {
        self.remaining(keystone) == 0
    }

    /// Failed attempts recorded against one keystone
    pub fn failed_attempts(&self, keystone: &Keystone) -> u64 {
        self.state
            .lock()
            .failed_attempts
            .get(keystone.address().as_str())
            .copied()
            .unwrap_or(0)
    }

    /// Render this keystone's consumed solutions as a persistable node
    ///
    /// The ledger node is a separate record keyed by the keystone's address;
    /// the keystone node itself never changes when challenges are consumed.
    pub fn ledger_node(&self, keystone: &Keystone) -> Result<Node> {
        let solutions: Map<String, Value> = self
            .solutions(keystone)
            .into_iter()
            .map(|(salt, response)| (salt, Value::String(response)))
            .collect();
        let mut payload = Payload::new();
        payload.insert(
            "keystone".to_string(),
            json!(keystone.address().as_str()),
        );
        payload.insert(PAYLOAD_SOLUTIONS.to_string(), Value::Object(solutions));
        Node::sealed(
            format!("keystone solutions {}", keystone.lifecycle_hash()),
            Some(payload),
            None,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::challenge::{solve_challenge, ChallengeConfig};
    use crate::mint::{generate_keystone, MintRequest};
    use crate::scope::{Scope, ScopeBase};

    const ITERATIONS: u32 = 5;

    fn minted(effects: &Effects, expires_in: Option<u64>) -> Keystone {
        generate_keystone(
            effects,
            MintRequest {
                secret: "hunter2",
                scope: Scope::base(ScopeBase::Owner),
                challenge_config: ChallengeConfig {
                    pool_size: 3,
                    hash_iterations: ITERATIONS,
                    ..Default::default()
                },
                expires_in,
                extra_label: None,
                notes: None,
            },
        )
        .unwrap()
        .keystone
    }

    fn first_salt(keystone: &Keystone) -> String {
        keystone.challenges().keys().next().unwrap().clone()
    }

    #[test]
    fn test_correct_response_consumes() {
        let effects = Effects::for_test("verify_valid");
        let keystone = minted(&effects, None);
        let ledger = SolutionLedger::new();
        let salt = first_salt(&keystone);
        let response = solve_challenge("hunter2", &salt, ITERATIONS).unwrap();

        let outcome = ledger
            .verify_and_consume(&effects, &keystone, &salt, &response)
            .unwrap();
        assert!(outcome.is_valid());
        assert_eq!(ledger.consumed(&keystone), 1);
        assert_eq!(ledger.remaining(&keystone), 2);
        assert_eq!(ledger.solutions(&keystone)[&salt], response);
    }

    #[test]
    fn test_replay_is_rejected_without_reevaluation() {
        let effects = Effects::for_test("verify_replay");
        let keystone = minted(&effects, None);
        let ledger = SolutionLedger::new();
        let salt = first_salt(&keystone);
        let response = solve_challenge("hunter2", &salt, ITERATIONS).unwrap();

        ledger
            .verify_and_consume(&effects, &keystone, &salt, &response)
            .unwrap();
        // even the correct response is refused the second time
        let outcome = ledger
            .verify_and_consume(&effects, &keystone, &salt, &response)
            .unwrap();
        assert_eq!(outcome, VerifyOutcome::AlreadyConsumed);
        assert_eq!(ledger.consumed(&keystone), 1);
    }

    #[test]
    fn test_failed_attempt_does_not_burn_salt() {
        let effects = Effects::for_test("verify_no_burn");
        let keystone = minted(&effects, None);
        let ledger = SolutionLedger::new();
        let salt = first_salt(&keystone);

        let outcome = ledger
            .verify_and_consume(&effects, &keystone, &salt, "wrong response")
            .unwrap();
        assert_eq!(outcome, VerifyOutcome::Invalid);
        assert_eq!(ledger.failed_attempts(&keystone), 1);

        // the salt is still available for the correct attempt
        let response = solve_challenge("hunter2", &salt, ITERATIONS).unwrap();
        let outcome = ledger
            .verify_and_consume(&effects, &keystone, &salt, &response)
            .unwrap();
        assert!(outcome.is_valid());
    }

    #[test]
    fn test_unknown_salt() {
        let effects = Effects::for_test("verify_unknown");
        let keystone = minted(&effects, None);
        let ledger = SolutionLedger::new();

        let outcome = ledger
            .verify_and_consume(&effects, &keystone, "not-a-pool-salt!", "response")
            .unwrap();
        assert_eq!(outcome, VerifyOutcome::UnknownSalt);
    }

    #[test]
    fn test_expiration_boundary() {
        let effects = Effects::for_test("verify_expiry");
        let keystone = minted(&effects, Some(60));
        let ledger = SolutionLedger::new();
        let salt = first_salt(&keystone);
        let response = solve_challenge("hunter2", &salt, ITERATIONS).unwrap();

        // still inside the window
        let outcome = ledger
            .verify_and_consume(&effects, &keystone, &salt, &response)
            .unwrap();
        assert!(outcome.is_valid());

        // past the window, an otherwise-valid proof is refused
        effects.advance_time(120).unwrap();
        let other_salt = keystone
            .challenges()
            .keys()
            .find(|candidate| **candidate != salt)
            .unwrap()
            .clone();
        let other_response = solve_challenge("hunter2", &other_salt, ITERATIONS).unwrap();
        let outcome = ledger
            .verify_and_consume(&effects, &keystone, &other_salt, &other_response)
            .unwrap();
        assert_eq!(outcome, VerifyOutcome::Expired);
    }

    #[test]
    fn test_pool_exhaustion() {
        let effects = Effects::for_test("verify_exhaustion");
        let keystone = minted(&effects, None);
        let ledger = SolutionLedger::new();

        for salt in keystone.challenges().keys() {
            let response = solve_challenge("hunter2", salt, ITERATIONS).unwrap();
            assert!(ledger
                .verify_and_consume(&effects, &keystone, salt, &response)
                .unwrap()
                .is_valid());
        }
        assert!(ledger.is_exhausted(&keystone));
        assert_eq!(ledger.remaining(&keystone), 0);
    }

    #[test]
    fn test_ledger_node_is_out_of_band() {
        let effects = Effects::for_test("verify_ledger_node");
        let keystone = minted(&effects, None);
        let ledger = SolutionLedger::new();
        let keystone_hash_before = keystone.node().hash.clone();

        let salt = first_salt(&keystone);
        let response = solve_challenge("hunter2", &salt, ITERATIONS).unwrap();
        ledger
            .verify_and_consume(&effects, &keystone, &salt, &response)
            .unwrap();

        let ledger_node = ledger.ledger_node(&keystone).unwrap();
        let payload = ledger_node.payload.as_ref().unwrap();
        assert_eq!(
            payload["keystone"],
            json!(keystone.address().as_str())
        );
        assert_eq!(payload[PAYLOAD_SOLUTIONS][&salt], json!(response));

        // consuming never touched the keystone node itself
        assert_eq!(keystone.node().hash, keystone_hash_before);
    }

    #[test]
    fn test_ledgers_are_keyed_per_keystone() {
        let effects = Effects::for_test("verify_keyed");
        let first = minted(&effects, None);
        let second = minted(&effects, None);
        let ledger = SolutionLedger::new();

        let salt = first_salt(&first);
        let response = solve_challenge("hunter2", &salt, ITERATIONS).unwrap();
        ledger
            .verify_and_consume(&effects, &first, &salt, &response)
            .unwrap();

        assert_eq!(ledger.consumed(&first), 1);
        assert_eq!(ledger.consumed(&second), 0);
    }
}
