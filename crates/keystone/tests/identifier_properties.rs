//! Property tests: identifier and scope codecs
//!
//! The round-trip law: parsing an encoded identifier recovers exactly the
//! structured form it was encoded from, for every valid combination of
//! scope, lifecycle hash, and label.

use keystone::{KeystoneIdentifier, Scope, ScopeBase};
use proptest::prelude::*;

fn arb_scope_base() -> impl Strategy<Value = ScopeBase> {
    prop_oneof![
        Just(ScopeBase::Any),
        Just(ScopeBase::Owner),
        Just(ScopeBase::Fork),
        Just(ScopeBase::Mutate),
        Just(ScopeBase::Relate),
    ]
}

fn arb_subscopes() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z0-9.-]{1,12}", 0..4)
}

fn arb_scope() -> impl Strategy<Value = Scope> {
    (arb_scope_base(), arb_subscopes())
        .prop_map(|(base, subscopes)| Scope::new(base, subscopes).expect("generated scope valid"))
}

fn arb_lifecycle_hash() -> impl Strategy<Value = String> {
    "[0-9A-F]{64}"
}

fn arb_label() -> impl Strategy<Value = Option<String>> {
    prop::option::of("[A-Za-z0-9.-]{1,32}")
}

proptest! {
    #[test]
    fn scope_round_trips(scope in arb_scope()) {
        let encoded = scope.encode();
        let parsed = Scope::parse(&encoded).unwrap();
        prop_assert_eq!(parsed, scope);
    }

    #[test]
    fn identifier_round_trips(
        scope in arb_scope(),
        lifecycle_hash in arb_lifecycle_hash(),
        label in arb_label(),
    ) {
        let identifier = KeystoneIdentifier::new(scope, lifecycle_hash, label).unwrap();
        let encoded = identifier.encode();
        let parsed = KeystoneIdentifier::parse(&encoded).unwrap();
        prop_assert_eq!(parsed, identifier);
    }

    #[test]
    fn encoded_identifiers_respect_field_count(
        scope in arb_scope(),
        lifecycle_hash in arb_lifecycle_hash(),
        label in arb_label(),
    ) {
        let has_label = label.is_some();
        let identifier = KeystoneIdentifier::new(scope, lifecycle_hash, label).unwrap();
        let fields = identifier.encode().split(' ').count();
        prop_assert_eq!(fields, if has_label { 4 } else { 3 });
    }

    #[test]
    fn arbitrary_strings_never_panic_the_parser(raw in ".{0,64}") {
        // parsing may fail, but must fail with an error value
        let _ = KeystoneIdentifier::parse(&raw);
        let _ = Scope::parse(&raw);
    }
}
