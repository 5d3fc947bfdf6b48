//! Canonical node hashing
//!
//! Content addressing uses SHA-256 over a canonical serialization. The
//! algorithm is declared once here; everything that commits to content goes
//! through [`digest_hex`] or [`compute_node_hash`].
//!
//! A node hash is layered: each present field (identifier, relations,
//! payload) is digested on its own, and the field digests are concatenated
//! and digested again. A node with no payload and no relations hashes to the
//! digest of its identifier digest alone. Payload and relations are held in
//! `BTreeMap`s, so their canonical JSON is independent of insertion order.

use crate::errors::Result;
use crate::node::{Payload, Relations};
use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 digest, uppercase
pub fn digest_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode_upper(hasher.finalize())
}

fn has_payload(payload: Option<&Payload>) -> bool {
    payload.map(|p| !p.is_empty()).unwrap_or(false)
}

fn has_relations(relations: Option<&Relations>) -> bool {
    relations
        .map(|r| r.values().any(|targets| !targets.is_empty()))
        .unwrap_or(false)
}

/// Compute the content commitment for a node's fields
///
/// Deterministic: equal `{identifier, payload, relations}` under canonical
/// serialization always produce an equal hash. Empty, absent, and
/// all-empty-valued maps are treated the same.
pub fn compute_node_hash(
    identifier: &str,
    payload: Option<&Payload>,
    relations: Option<&Relations>,
) -> Result<String> {
    let identifier_hash = digest_hex(identifier.as_bytes());

    let with_payload = has_payload(payload);
    let with_relations = has_relations(relations);
    if !with_payload && !with_relations {
        return Ok(digest_hex(identifier_hash.as_bytes()));
    }

    let relations_hash = if with_relations {
        let canonical = serde_json::to_string(&relations)?;
        digest_hex(canonical.as_bytes())
    } else {
        String::new()
    };
    let payload_hash = if with_payload {
        let canonical = serde_json::to_string(&payload)?;
        digest_hex(canonical.as_bytes())
    } else {
        String::new()
    };

    let combined = format!("{identifier_hash}{relations_hash}{payload_hash}");
    Ok(digest_hex(combined.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Address;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn payload_of(pairs: &[(&str, serde_json::Value)]) -> Payload {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_digest_hex_known_vector() {
        // SHA256("") uppercased
        assert_eq!(
            digest_hex(b""),
            "E3B0C44298FC1C149AFBF4C8996FB92427AE41E4649B934CA495991B7852B855"
        );
    }

    #[test]
    fn test_hash_determinism() {
        let payload = payload_of(&[("a", json!(1)), ("b", json!("two"))]);
        let h1 = compute_node_hash("thing", Some(&payload), None).unwrap();
        let h2 = compute_node_hash("thing", Some(&payload), None).unwrap();
        assert_eq!(h1, h2);
    }

    #[test]
    fn test_hash_key_order_independence() {
        let forward = payload_of(&[("a", json!(1)), ("b", json!(2))]);
        let mut reverse = Payload::new();
        reverse.insert("b".to_string(), json!(2));
        reverse.insert("a".to_string(), json!(1));

        let h1 = compute_node_hash("thing", Some(&forward), None).unwrap();
        let h2 = compute_node_hash("thing", Some(&reverse), None).unwrap();
        assert_eq!(h1, h2);
    }

    #[test]
    fn test_single_bit_change_changes_hash() {
        let a = payload_of(&[("count", json!(7))]);
        let b = payload_of(&[("count", json!(6))]);
        let h_a = compute_node_hash("thing", Some(&a), None).unwrap();
        let h_b = compute_node_hash("thing", Some(&b), None).unwrap();
        assert_ne!(h_a, h_b);

        let h_id = compute_node_hash("thinh", Some(&a), None).unwrap();
        assert_ne!(h_a, h_id);
    }

    #[test]
    fn test_absent_and_empty_maps_equivalent() {
        let empty = Payload::new();
        let h_absent = compute_node_hash("thing", None, None).unwrap();
        let h_empty = compute_node_hash("thing", Some(&empty), None).unwrap();
        assert_eq!(h_absent, h_empty);

        let mut empty_valued: Relations = BTreeMap::new();
        empty_valued.insert("past".to_string(), Vec::new());
        let h_empty_valued = compute_node_hash("thing", None, Some(&empty_valued)).unwrap();
        assert_eq!(h_absent, h_empty_valued);
    }

    #[test]
    fn test_relations_participate_in_commitment() {
        let mut relations: Relations = BTreeMap::new();
        relations.insert(
            "ancestor".to_string(),
            vec![Address::from_parts("seed", "ABC123")],
        );
        let bare = compute_node_hash("thing", None, None).unwrap();
        let related = compute_node_hash("thing", None, Some(&relations)).unwrap();
        assert_ne!(bare, related);
    }
}
