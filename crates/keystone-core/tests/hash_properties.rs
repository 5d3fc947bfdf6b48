//! Property tests: canonical hashing and addresses
//!
//! The commitment property from the node model: equal canonical content
//! always hashes equal, and any content difference shows up in the hash.

use keystone_core::{compute_node_hash, Address, Node, Payload};
use proptest::prelude::*;
use serde_json::json;

fn arb_identifier() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9 ]{0,24}[a-z0-9]"
}

fn arb_payload() -> impl Strategy<Value = Payload> {
    prop::collection::btree_map(
        "[a-z]{1,8}",
        prop_oneof![
            any::<i64>().prop_map(|n| json!(n)),
            "[a-zA-Z0-9]{0,16}".prop_map(|s| json!(s)),
            any::<bool>().prop_map(|b| json!(b)),
        ],
        0..6,
    )
}

proptest! {
    #[test]
    fn equal_content_hashes_equal(identifier in arb_identifier(), payload in arb_payload()) {
        let h1 = compute_node_hash(&identifier, Some(&payload), None).unwrap();
        let h2 = compute_node_hash(&identifier, Some(&payload), None).unwrap();
        prop_assert_eq!(h1, h2);
    }

    #[test]
    fn payload_changes_change_the_hash(
        identifier in arb_identifier(),
        payload in arb_payload(),
        key in "[a-z]{1,8}",
    ) {
        let base = compute_node_hash(&identifier, Some(&payload), None).unwrap();

        let mut changed = payload.clone();
        changed.insert(key, json!("sentinel value not produced by the generator"));
        let after = compute_node_hash(&identifier, Some(&changed), None).unwrap();
        prop_assert_ne!(base, after);
    }

    #[test]
    fn sealed_nodes_verify_and_round_trip_addresses(
        identifier in arb_identifier(),
        payload in arb_payload(),
    ) {
        let payload = if payload.is_empty() { None } else { Some(payload) };
        let node = Node::sealed(identifier.clone(), payload, None).unwrap();
        prop_assert!(node.verify().unwrap());

        let (parsed_identifier, parsed_hash) = Address::parse(node.address().as_str()).unwrap();
        prop_assert_eq!(parsed_identifier, identifier);
        prop_assert_eq!(Some(parsed_hash), node.hash);
    }
}
