//! In-memory repo witness
//!
//! The reference repo implementation: a mutex-guarded ordered map from
//! address to node. Useful on its own as a process-local replica and as the
//! model other storage adapters are checked against.

use crate::repo::RepoWitness;
use crate::witness::{Admission, Hashed, InstanceId, Observed, Witness};
use keystone_core::{Address, Effects, KeystoneError, Node, Payload, Result};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Identifier of the in-memory repo's own identity node
const MEMORY_REPO_IDENTIFIER: &str = "witness repo-memory v1";

/// Mutex-guarded in-memory content-addressable store
pub struct InMemoryRepo {
    node: Node,
    instance: InstanceId,
    optimistic_put: bool,
    include_addresses: bool,
    entries: Mutex<BTreeMap<Address, Node>>,
}

fn identity_payload(optimistic_put: bool) -> Payload {
    let mut payload = Payload::new();
    payload.insert("witness".to_string(), json!(true));
    payload.insert("kind".to_string(), json!("repo-memory"));
    payload.insert("optimisticPut".to_string(), json!(optimistic_put));
    payload
}

impl InMemoryRepo {
    /// An optimistic repo (stores whatever it admits)
    pub fn new(effects: &Effects) -> Result<Self> {
        Self::with_policy(effects, true, false)
    }

    /// A repo with an explicit put policy and address-snapshot setting
    pub fn with_policy(
        effects: &Effects,
        optimistic_put: bool,
        include_addresses: bool,
    ) -> Result<Self> {
        let node = Node::sealed(
            MEMORY_REPO_IDENTIFIER,
            Some(identity_payload(optimistic_put)),
            None,
        )?;
        Ok(Self {
            node,
            instance: InstanceId::new(effects),
            optimistic_put,
            include_addresses,
            entries: Mutex::new(BTreeMap::new()),
        })
    }

    /// Number of nodes currently held
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the repo holds nothing
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// A sealed snapshot of this repo's identity, optionally including the
    /// current address list
    ///
    /// This is an explicit derived view computed on call - the identity node
    /// itself never changes.
    pub fn snapshot(&self) -> Result<Node> {
        let mut payload = identity_payload(self.optimistic_put);
        if self.include_addresses {
            let addresses: Vec<Value> = self
                .entries
                .lock()
                .keys()
                .map(|address| json!(address.as_str()))
                .collect();
            payload.insert("includeAddresses".to_string(), json!(true));
            payload.insert("addresses".to_string(), Value::Array(addresses));
        }
        Node::sealed(MEMORY_REPO_IDENTIFIER, Some(payload), None)
    }
}

impl Hashed for InMemoryRepo {
    fn node(&self) -> &Node {
        &self.node
    }
}

impl Witness for InMemoryRepo {
    fn instance_id(&self) -> InstanceId {
        self.instance
    }

    fn can_witness(&self, other: &Observed<'_>) -> Admission {
        self.repo_admission(other)
    }

    fn witness_impl(&self, other: &Node) -> Result<()> {
        self.repo_store(other)
    }
}

impl RepoWitness for InMemoryRepo {
    fn get(&self, address: &Address) -> Result<Option<Node>> {
        Ok(self.entries.lock().get(address).cloned())
    }

    fn can_put(&self, node: &Node) -> bool {
        !node.is_primitive()
    }

    fn put(&self, node: &Node) -> Result<bool> {
        if !self.can_put(node) {
            return Err(KeystoneError::storage(
                "refusing to store a node without a content commitment",
            ));
        }
        // contains + insert under one lock: concurrent puts of the same
        // address converge to a single entry
        let mut entries = self.entries.lock();
        let address = node.address();
        if entries.contains_key(&address) {
            return Ok(false);
        }
        entries.insert(address, node.clone());
        Ok(true)
    }

    fn delete(&self, address: &Address) -> Result<bool> {
        Ok(self.entries.lock().remove(address).is_some())
    }

    fn addresses(&self) -> Result<Vec<Address>> {
        Ok(self.entries.lock().keys().cloned().collect())
    }

    fn optimistic_put(&self) -> bool {
        self.optimistic_put
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_is_idempotent() {
        let effects = Effects::for_test("idempotent_put");
        let repo = InMemoryRepo::new(&effects).unwrap();
        let node = Node::sealed("subject", None, None).unwrap();

        assert!(repo.put(&node).unwrap());
        assert!(!repo.put(&node).unwrap());
        assert_eq!(repo.len(), 1);
    }

    #[test]
    fn test_get_and_delete() {
        let effects = Effects::for_test("get_delete");
        let repo = InMemoryRepo::new(&effects).unwrap();
        let node = Node::sealed("subject", None, None).unwrap();
        let address = node.address();

        assert!(repo.get(&address).unwrap().is_none());
        repo.put(&node).unwrap();
        assert_eq!(repo.get(&address).unwrap(), Some(node));

        assert!(repo.delete(&address).unwrap());
        assert!(!repo.delete(&address).unwrap());
        assert!(repo.get(&address).unwrap().is_none());
    }

    #[test]
    fn test_witnessing_stores_unknown_node() {
        let effects = Effects::for_test("witness_stores");
        let repo = InMemoryRepo::new(&effects).unwrap();
        let node = Node::sealed("subject", None, None).unwrap();

        let admission = repo.witness(&Observed::node(&node)).unwrap();
        assert!(admission.is_allowed());
        assert_eq!(repo.get(&node.address()).unwrap(), Some(node.clone()));

        // witnessing again is a no-op
        repo.witness(&Observed::node(&node)).unwrap();
        assert_eq!(repo.len(), 1);
    }

    #[test]
    fn test_self_witness_never_stores() {
        let effects = Effects::for_test("repo_self_witness");
        let repo = InMemoryRepo::new(&effects).unwrap();

        let admission = repo.witness(&repo.observed()).unwrap();
        assert!(!admission.is_allowed());
        assert!(repo.is_empty());
    }

    #[test]
    fn test_restrictive_policy_declines_unknown() {
        let effects = Effects::for_test("restrictive");
        let repo = InMemoryRepo::with_policy(&effects, false, false).unwrap();
        let node = Node::sealed("subject", None, None).unwrap();

        let admission = repo.witness(&Observed::node(&node)).unwrap();
        assert!(!admission.is_allowed());
        assert!(repo.is_empty());

        // a restrictive repo still admits what it already holds
        repo.put(&node).unwrap();
        let admission = repo.witness(&Observed::node(&node)).unwrap();
        assert!(admission.is_allowed());
        assert_eq!(repo.len(), 1);
    }

    #[test]
    fn test_primitive_cannot_be_put() {
        let effects = Effects::for_test("no_primitive_put");
        let repo = InMemoryRepo::new(&effects).unwrap();
        let seed = Node::primitive("seed").unwrap();

        assert!(!repo.can_put(&seed));
        assert!(matches!(
            repo.put(&seed).unwrap_err(),
            KeystoneError::Storage { .. }
        ));
    }

    #[test]
    fn test_addresses_enumeration() {
        let effects = Effects::for_test("enumeration");
        let repo = InMemoryRepo::new(&effects).unwrap();
        let a = Node::sealed("first", None, None).unwrap();
        let b = Node::sealed("second", None, None).unwrap();
        repo.put(&a).unwrap();
        repo.put(&b).unwrap();

        let mut expected = vec![a.address(), b.address()];
        expected.sort();
        assert_eq!(repo.addresses().unwrap(), expected);
    }

    #[test]
    fn test_snapshot_includes_addresses_when_asked() {
        let effects = Effects::for_test("snapshot");
        let repo = InMemoryRepo::with_policy(&effects, true, true).unwrap();
        let node = Node::sealed("subject", None, None).unwrap();
        repo.put(&node).unwrap();

        let snapshot = repo.snapshot().unwrap();
        let payload = snapshot.payload.as_ref().unwrap();
        assert_eq!(payload["includeAddresses"], json!(true));
        assert_eq!(
            payload["addresses"],
            json!([node.address().as_str()])
        );
        // the snapshot is a derived view; the identity node is unchanged
        assert_ne!(snapshot.hash, repo.node().hash);
    }
}
