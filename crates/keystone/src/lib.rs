//! # Keystone - Possession-Based Capabilities
//!
//! Minting, encoding, and verifying scoped, time-boxed authorization tokens
//! whose validity is anchored in hash commitments rather than a central
//! authority's live state.
//!
//! A keystone is minted once from a secret: a pool of `{salt, expected}`
//! commitments is generated, the secret is discarded, and the capability's
//! identity is bound to its issuance event through the lifecycle hash
//! embedded in its identifier. Anyone holding the secret can later solve a
//! challenge; a verifier checks the solution against the stored commitment
//! and consumes the salt, so a captured solution can never be replayed.
//!
//! ```
//! use keystone::{
//!     generate_keystone, solve_challenge, ChallengeConfig, MintRequest, Scope, ScopeBase,
//!     SolutionLedger,
//! };
//! use keystone_core::Effects;
//!
//! let effects = Effects::deterministic(42, 1735689600);
//! let minted = generate_keystone(
//!     &effects,
//!     MintRequest {
//!         secret: "correct horse battery staple",
//!         scope: Scope::base(ScopeBase::Owner),
//!         challenge_config: ChallengeConfig::default(),
//!         expires_in: None,
//!         extra_label: None,
//!         notes: None,
//!     },
//! )
//! .unwrap();
//!
//! let ledger = SolutionLedger::new();
//! let salt = minted.keystone.challenges().keys().next().unwrap().clone();
//! let response = solve_challenge(
//!     "correct horse battery staple",
//!     &salt,
//!     ChallengeConfig::default().hash_iterations,
//! )
//! .unwrap();
//! let outcome = ledger
//!     .verify_and_consume(&effects, &minted.keystone, &salt, &response)
//!     .unwrap();
//! assert!(outcome.is_valid());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Grammar delimiters, bounds, and payload key names
pub mod constants;

/// Hierarchical authorization scopes
pub mod scope;

/// Keystone identifier codec
pub mod identifier;

/// Expiration stamps
pub mod expiration;

/// Challenge generation and solving
pub mod challenge;

/// Shareable config nodes
pub mod config;

/// The keystone view and witness behavior
pub mod keystone;

/// Minting
pub mod mint;

/// Verification and consumption
pub mod verify;

pub use challenge::{
    generate_challenge_pool, solve_challenge, Challenge, ChallengeConfig, ChallengeType,
};
pub use config::{generate_config_node, parse_config_node, KeystoneConfigData};
pub use expiration::{Expiration, ExpirationFormat};
pub use identifier::{IdentifierError, KeystoneIdentifier};
pub use keystone::Keystone;
pub use mint::{generate_keystone, MintRequest, Minted};
pub use scope::{Scope, ScopeBase};
pub use verify::{SolutionLedger, VerifyOutcome};
