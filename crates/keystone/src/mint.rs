//! Keystone minting
//!
//! Issuance is a bootstrap in three derivations. The lifecycle hash belongs
//! in the keystone's identifier, but it does not exist until the keystone's
//! temporal-junction node has been hashed - so the timeline starts under a
//! placeholder:
//!
//! 1. fork the `keystone` primitive with a lifecycle stamp, identifier
//!    carrying the [`UNMINTED_LIFECYCLE`] placeholder;
//! 2. mutate to the final identifier (placeholder replaced by the now-known
//!    junction hash) and the challenge payload;
//! 3. relate the result to its freshly generated, history-free config node.
//!
//! Minting is intended for a secure environment: the secret passes through
//! here but is never part of any returned node, and the holder must remember
//! it independently.

use crate::challenge::{generate_challenge_pool, ChallengeConfig, ChallengeType};
use crate::config::generate_config_node;
use crate::constants::{
    KEYSTONE_PRIMITIVE_IDENTIFIER, PAYLOAD_CHALLENGES, PAYLOAD_EXPIRATION,
    PAYLOAD_EXPIRATION_FORMAT, PAYLOAD_SOLUTIONS, REL_CONFIG, UNMINTED_LIFECYCLE,
};
use crate::expiration::Expiration;
use crate::identifier::KeystoneIdentifier;
use crate::keystone::Keystone;
use crate::scope::Scope;
use keystone_core::{
    fork, mutate, relate, Effects, ForkOptions, KeystoneError, LifecycleOptions, MutateOptions,
    Node, Payload, RelateOptions, Relations, Result, REL_ANCESTOR, REL_PAST,
};
use serde_json::{Map, Value};

/// Parameters for minting one keystone
#[derive(Debug, Clone)]
pub struct MintRequest<'a> {
    /// The holder's secret; consumed for commitment generation, never stored
    pub secret: &'a str,
    /// Authorization scope of the capability
    pub scope: Scope,
    /// Public challenge parameters
    pub challenge_config: ChallengeConfig,
    /// Lifetime in seconds from now; `None` for no expiration
    pub expires_in: Option<u64>,
    /// Optional free-form identifier label
    pub extra_label: Option<String>,
    /// Free-text notes carried on the config node
    pub notes: Option<String>,
}

/// A freshly minted keystone
#[derive(Debug, Clone)]
pub struct Minted {
    /// The finished, validated keystone
    pub keystone: Keystone,
    /// Intermediate nodes produced during the bootstrap
    ///
    /// Persist these if an audit trail is wanted; only the keystone and its
    /// config are required for live use.
    pub intermediates: Vec<Node>,
    /// The shareable, history-free config node
    pub config: Node,
}

fn linked() -> Vec<String> {
    vec![REL_ANCESTOR.to_string(), REL_PAST.to_string()]
}

/// Mint a keystone
pub fn generate_keystone(effects: &Effects, request: MintRequest<'_>) -> Result<Minted> {
    let MintRequest {
        secret,
        scope,
        challenge_config,
        expires_in,
        extra_label,
        notes,
    } = request;

    challenge_config.validate()?;
    if challenge_config.challenge_type != ChallengeType::Hash {
        return Err(KeystoneError::invalid(
            "only the hash challenge type exists in v1",
        ));
    }
    // validates scope bounds and the extra label before any derivation
    let placeholder =
        KeystoneIdentifier::new(scope.clone(), UNMINTED_LIFECYCLE, extra_label.clone())?;

    // the junction node cannot embed its own hash; it starts life under the
    // placeholder lifecycle field
    let primitive = Node::primitive(KEYSTONE_PRIMITIVE_IDENTIFIER)?;
    let junction = fork(
        effects,
        &primitive,
        &ForkOptions {
            new_identifier: Some(placeholder.encode()),
            lifecycle: Some(LifecycleOptions {
                timestamp: true,
                uuid: true,
            }),
            linked_relations: linked(),
            ..Default::default()
        },
    )?
    .node;
    let lifecycle_hash = junction
        .hash
        .clone()
        .ok_or_else(|| KeystoneError::internal("forked junction node has no hash"))?;

    let identifier = KeystoneIdentifier::new(scope, lifecycle_hash, extra_label)?;

    let pool = generate_challenge_pool(effects, secret, &challenge_config)?;
    let challenges: Map<String, Value> = pool
        .into_iter()
        .map(|challenge| (challenge.salt, Value::String(challenge.expected)))
        .collect();

    let mut patch = Payload::new();
    patch.insert(PAYLOAD_CHALLENGES.to_string(), Value::Object(challenges));
    patch.insert(PAYLOAD_SOLUTIONS.to_string(), Value::Object(Map::new()));
    if let Some(seconds) = expires_in {
        let expiration = Expiration::after(effects, seconds)?;
        patch.insert(
            PAYLOAD_EXPIRATION.to_string(),
            Value::String(expiration.stamp.clone()),
        );
        patch.insert(
            PAYLOAD_EXPIRATION_FORMAT.to_string(),
            Value::String(expiration.format.as_str().to_string()),
        );
    }

    let with_data = mutate(
        effects,
        &junction,
        &MutateOptions {
            new_identifier: Some(identifier.encode()),
            patch: Some(patch),
            linked_relations: linked(),
            ..Default::default()
        },
    )?
    .node;

    let config = generate_config_node(&challenge_config, notes)?;
    let mut add = Relations::new();
    add.insert(REL_CONFIG.to_string(), vec![config.address()]);
    let finished = relate(
        effects,
        &with_data,
        &RelateOptions {
            add,
            linked_relations: linked(),
            ..Default::default()
        },
    )?
    .node;

    tracing::debug!(
        keystone = %finished.address(),
        config = %config.address(),
        pool_size = challenge_config.pool_size,
        "minted keystone"
    );

    let keystone = Keystone::from_node(effects, finished)?;
    Ok(Minted {
        keystone,
        intermediates: vec![junction, with_data],
        config,
    })
}
