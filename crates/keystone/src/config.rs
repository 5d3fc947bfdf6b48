//! Shareable keystone config nodes
//!
//! A keystone config is the public description of how a keystone's
//! challenges are generated and verified. It is deliberately history-free -
//! no `past`, no `ancestor` - so distributing it carries no extra dependency
//! graph: the config and the keystone itself are the only nodes required for
//! live use.

use crate::challenge::{ChallengeConfig, ChallengeType};
use crate::constants::{CONFIG_VERSION, KEYSTONE_CONFIG_IDENTIFIER};
use keystone_core::{KeystoneError, Node, Payload, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Persisted keystone config shape
///
/// Wire form: `{"version": "v1", "challengeConfig": {...}, "notes": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeystoneConfigData {
    /// Config format version
    pub version: String,
    /// Public challenge parameters
    pub challenge_config: ChallengeConfig,
    /// Free-text verification notes for the keystone holder
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl KeystoneConfigData {
    /// Current-version config data for the given challenge parameters
    pub fn new(challenge_config: ChallengeConfig, notes: Option<String>) -> Self {
        Self {
            version: CONFIG_VERSION.to_string(),
            challenge_config,
            notes,
        }
    }
}

/// Generate a history-free keystone config node
pub fn generate_config_node(
    challenge_config: &ChallengeConfig,
    notes: Option<String>,
) -> Result<Node> {
    challenge_config.validate()?;
    if challenge_config.challenge_type != ChallengeType::Hash {
        return Err(KeystoneError::invalid(
            "only the hash challenge type exists in v1",
        ));
    }

    let data = KeystoneConfigData::new(*challenge_config, notes);
    let rendered = serde_json::to_value(&data)?;
    let payload: Payload = match rendered {
        Value::Object(fields) => fields.into_iter().collect(),
        _ => {
            return Err(KeystoneError::internal(
                "config data did not serialize to an object",
            ))
        }
    };
    // sealed with no relations at all: nothing upstream to drag along
    Node::sealed(KEYSTONE_CONFIG_IDENTIFIER, Some(payload), None)
}

/// Read config data back out of a config node
pub fn parse_config_node(node: &Node) -> Result<KeystoneConfigData> {
    if node.identifier != KEYSTONE_CONFIG_IDENTIFIER {
        return Err(KeystoneError::invalid(format!(
            "not a keystone config node: '{}'",
            node.identifier
        )));
    }
    let payload = node
        .payload
        .as_ref()
        .ok_or_else(|| KeystoneError::invalid("config node has no payload"))?;
    let rendered = Value::Object(payload.clone().into_iter().collect());
    Ok(serde_json::from_value(rendered)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_config_node_shape() {
        let config = ChallengeConfig {
            challenge_type: ChallengeType::Hash,
            pool_size: 3,
            hash_iterations: 5,
        };
        let node = generate_config_node(&config, Some("remember the salt".to_string())).unwrap();

        assert_eq!(node.identifier, KEYSTONE_CONFIG_IDENTIFIER);
        assert!(node.relations.is_none());
        assert!(node.hash.is_some());

        let payload = node.payload.as_ref().unwrap();
        assert_eq!(payload["version"], json!("v1"));
        assert_eq!(
            payload["challengeConfig"],
            json!({"type": "hash", "poolSize": 3, "hashIterations": 5})
        );
        assert_eq!(payload["notes"], json!("remember the salt"));
    }

    #[test]
    fn test_notes_omitted_when_absent() {
        let node = generate_config_node(&ChallengeConfig::default(), None).unwrap();
        assert!(!node.payload.as_ref().unwrap().contains_key("notes"));
    }

    #[test]
    fn test_parse_round_trip() {
        let config = ChallengeConfig::default();
        let node = generate_config_node(&config, None).unwrap();
        let parsed = parse_config_node(&node).unwrap();
        assert_eq!(parsed.version, CONFIG_VERSION);
        assert_eq!(parsed.challenge_config, config);
        assert_eq!(parsed.notes, None);
    }

    #[test]
    fn test_parse_rejects_wrong_identifier() {
        let node = Node::sealed("not a config", None, None).unwrap();
        assert!(parse_config_node(&node).is_err());
    }

    #[test]
    fn test_identical_configs_share_an_address() {
        let a = generate_config_node(&ChallengeConfig::default(), None).unwrap();
        let b = generate_config_node(&ChallengeConfig::default(), None).unwrap();
        assert_eq!(a.address(), b.address());
    }
}
