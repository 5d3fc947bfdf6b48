//! The keystone itself
//!
//! A [`Keystone`] is the typed, validated view over a keystone node: parsed
//! identifier, challenge map, and expiration. It is also a witness - a
//! keystone can observe other nodes - but its observation behavior is
//! passive; recording and judging challenge solutions is the
//! [`crate::verify::SolutionLedger`]'s job, so the keystone node's own hash
//! never changes after issuance.

use crate::constants::{
    PAYLOAD_CHALLENGES, PAYLOAD_EXPIRATION, PAYLOAD_EXPIRATION_FORMAT, REL_CONFIG,
};
use crate::expiration::Expiration;
use crate::identifier::KeystoneIdentifier;
use crate::scope::Scope;
use keystone_core::{Address, Effects, KeystoneError, Node, Result};
use keystone_store::{Hashed, InstanceId, Witness};
use serde_json::Value;
use std::collections::BTreeMap;

/// Validated runtime view of a keystone node
#[derive(Debug, Clone)]
pub struct Keystone {
    node: Node,
    identifier: KeystoneIdentifier,
    challenges: BTreeMap<String, String>,
    expiration: Option<Expiration>,
    instance: InstanceId,
}

fn string_map(value: &Value, what: &str) -> Result<BTreeMap<String, String>> {
    let object = value
        .as_object()
        .ok_or_else(|| KeystoneError::invalid(format!("keystone {what} must be an object")))?;
    object
        .iter()
        .map(|(key, value)| {
            let value = value.as_str().ok_or_else(|| {
                KeystoneError::invalid(format!("keystone {what} entry '{key}' must be a string"))
            })?;
            Ok((key.clone(), value.to_string()))
        })
        .collect()
}

impl Keystone {
    /// Validate a node as a keystone and take the runtime view of it
    pub fn from_node(effects: &Effects, node: Node) -> Result<Self> {
        if node.is_primitive() {
            return Err(KeystoneError::invalid(
                "a keystone node must carry a content commitment",
            ));
        }
        let identifier = KeystoneIdentifier::parse(&node.identifier)?;

        let payload = node
            .payload
            .as_ref()
            .ok_or_else(|| KeystoneError::invalid("keystone node has no payload"))?;
        let challenges = payload
            .get(PAYLOAD_CHALLENGES)
            .ok_or_else(|| KeystoneError::invalid("keystone node has no challenges"))
            .and_then(|value| string_map(value, PAYLOAD_CHALLENGES))?;
        if challenges.is_empty() {
            return Err(KeystoneError::invalid("keystone challenge pool is empty"));
        }

        let expiration = match payload.get(PAYLOAD_EXPIRATION) {
            None => None,
            Some(stamp) => {
                let stamp = stamp.as_str().ok_or_else(|| {
                    KeystoneError::invalid("keystone expiration must be a string")
                })?;
                let format = payload
                    .get(PAYLOAD_EXPIRATION_FORMAT)
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        KeystoneError::invalid("keystone expiration is missing its format tag")
                    })?;
                Some(Expiration::from_parts(stamp, format)?)
            }
        };

        Ok(Self {
            node,
            identifier,
            challenges,
            expiration,
            instance: InstanceId::new(effects),
        })
    }

    /// The underlying node
    pub fn node(&self) -> &Node {
        &self.node
    }

    /// The parsed identifier
    pub fn identifier(&self) -> &KeystoneIdentifier {
        &self.identifier
    }

    /// The keystone's scope
    pub fn scope(&self) -> &Scope {
        &self.identifier.scope
    }

    /// Hash of the issuance event this capability is bound to
    pub fn lifecycle_hash(&self) -> &str {
        &self.identifier.lifecycle_hash
    }

    /// Optional free-form label
    pub fn extra_label(&self) -> Option<&str> {
        self.identifier.extra_label.as_deref()
    }

    /// Salt-to-commitment map
    pub fn challenges(&self) -> &BTreeMap<String, String> {
        &self.challenges
    }

    /// Number of challenges in the pool
    pub fn pool_size(&self) -> usize {
        self.challenges.len()
    }

    /// Expiration stamp, if any
    pub fn expiration(&self) -> Option<&Expiration> {
        self.expiration.as_ref()
    }

    /// Address of the shareable config node, when related
    pub fn config_address(&self) -> Option<&Address> {
        self.node.related(REL_CONFIG).first()
    }
}

impl Hashed for Keystone {
    fn node(&self) -> &Node {
        &self.node
    }
}

impl Witness for Keystone {
    fn instance_id(&self) -> InstanceId {
        self.instance
    }

    fn witness_impl(&self, other: &Node) -> Result<()> {
        // observation only; authorization decisions live with the verifier
        tracing::debug!(
            keystone = %self.address(),
            observed = %other.address(),
            "keystone observed a node"
        );
        Ok(())
    }
}
