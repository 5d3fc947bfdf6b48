//! Immutable content-addressed nodes
//!
//! A [`Node`] is the atomic unit: an identifier, an optional payload, an
//! optional relation map, and a hash committing to all three. Nodes are
//! immutable once hashed; any change in content means deriving a new node
//! (see [`crate::derive`]), never mutating in place.
//!
//! A *primitive* is a named abstract type seed with no hash at all. It
//! anchors derivation chains (everything forks from some primitive) but
//! carries no content commitment of its own.

use crate::errors::{KeystoneError, Result};
use crate::hash::compute_node_hash;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Delimiter between the identifier and hash halves of an address
pub const ADDRESS_DELIMITER: char = '^';

/// Intrinsic key/value content of a node
pub type Payload = BTreeMap<String, Value>;

/// Extrinsic references: relation name to ordered targets
pub type Relations = BTreeMap<String, Vec<Address>>;

/// Globally unique node name: `identifier^hash`
///
/// A primitive's address has an empty hash half (`identifier^`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Build an address from its identifier and hash halves
    pub fn from_parts(identifier: &str, hash: &str) -> Self {
        Self(format!("{identifier}{ADDRESS_DELIMITER}{hash}"))
    }

    /// Parse an address back into `(identifier, hash)`
    ///
    /// Fails when the delimiter is absent or appears more than once - a
    /// duplicated delimiter makes the split ambiguous.
    pub fn parse(raw: &str) -> Result<(String, String)> {
        let mut pieces = raw.split(ADDRESS_DELIMITER);
        let identifier = pieces
            .next()
            .ok_or_else(|| KeystoneError::invalid(format!("malformed address: {raw}")))?;
        let hash = pieces.next().ok_or_else(|| {
            KeystoneError::invalid(format!(
                "malformed address (missing '{ADDRESS_DELIMITER}'): {raw}"
            ))
        })?;
        if pieces.next().is_some() {
            return Err(KeystoneError::invalid(format!(
                "malformed address (duplicated '{ADDRESS_DELIMITER}'): {raw}"
            )));
        }
        if identifier.is_empty() {
            return Err(KeystoneError::invalid(format!(
                "malformed address (empty identifier): {raw}"
            )));
        }
        Ok((identifier.to_string(), hash.to_string()))
    }

    /// The identifier half
    pub fn identifier(&self) -> &str {
        self.0
            .split_once(ADDRESS_DELIMITER)
            .map(|(identifier, _)| identifier)
            .unwrap_or(&self.0)
    }

    /// The hash half (empty for primitives)
    pub fn hash(&self) -> &str {
        self.0
            .split_once(ADDRESS_DELIMITER)
            .map(|(_, hash)| hash)
            .unwrap_or("")
    }

    /// The raw address string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Address {
    type Err = KeystoneError;

    fn from_str(raw: &str) -> Result<Self> {
        let (identifier, hash) = Self::parse(raw)?;
        Ok(Self::from_parts(&identifier, &hash))
    }
}

/// Immutable content-addressed record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Human/machine-readable descriptor, space-delimited fields
    pub identifier: String,
    /// Intrinsic content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Payload>,
    /// References to other nodes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relations: Option<Relations>,
    /// Content commitment over `{identifier, payload, relations}`;
    /// `None` exactly for primitives
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

fn validate_identifier(identifier: &str) -> Result<()> {
    if identifier.is_empty() {
        return Err(KeystoneError::invalid("identifier required"));
    }
    if identifier.contains(ADDRESS_DELIMITER) {
        return Err(KeystoneError::invalid(format!(
            "identifier cannot contain the address delimiter '{ADDRESS_DELIMITER}': {identifier}"
        )));
    }
    Ok(())
}

impl Node {
    /// A named primitive: an abstract type seed with no hash
    pub fn primitive(identifier: impl Into<String>) -> Result<Self> {
        let identifier = identifier.into();
        validate_identifier(&identifier)?;
        Ok(Self {
            identifier,
            payload: None,
            relations: None,
            hash: None,
        })
    }

    /// Seal a node: compute its content commitment from the given fields
    pub fn sealed(
        identifier: impl Into<String>,
        payload: Option<Payload>,
        relations: Option<Relations>,
    ) -> Result<Self> {
        let identifier = identifier.into();
        validate_identifier(&identifier)?;
        let hash = compute_node_hash(&identifier, payload.as_ref(), relations.as_ref())?;
        Ok(Self {
            identifier,
            payload,
            relations,
            hash: Some(hash),
        })
    }

    /// Whether this node is a primitive (no content commitment)
    pub fn is_primitive(&self) -> bool {
        self.hash.is_none()
    }

    /// The node's address
    pub fn address(&self) -> Address {
        Address::from_parts(&self.identifier, self.hash.as_deref().unwrap_or(""))
    }

    /// Recompute the commitment and compare it to the stored hash
    ///
    /// Primitives carry no commitment and report `false`.
    pub fn verify(&self) -> Result<bool> {
        match &self.hash {
            None => Ok(false),
            Some(stored) => {
                let computed =
                    compute_node_hash(&self.identifier, self.payload.as_ref(), self.relations.as_ref())?;
                Ok(&computed == stored)
            }
        }
    }

    /// Targets of a relation, empty when the relation is absent
    pub fn related(&self, relation: &str) -> &[Address] {
        self.relations
            .as_ref()
            .and_then(|relations| relations.get(relation))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
