//! Repo witness: content-addressable storage with admission control
//!
//! A repo witness specializes the generic witness to storage. Explicit
//! `get`/`put`/`delete` calls are the active interface; the passive one is
//! observation - a repo that witnesses a node it does not hold yet will
//! store it, gated by its put policy. That is the single place where storage
//! side effects happen without an explicit `put`.
//!
//! There is no trait-level override chain here: concrete repos wire their
//! `Witness::can_witness` to [`RepoWitness::repo_admission`] and their
//! `Witness::witness_impl` to [`RepoWitness::repo_store`], composing the
//! storage policy over the base rules instead of inheriting through a class
//! hierarchy.

use crate::witness::{base_admission, Admission, Observed, Witness};
use keystone_core::{Address, Node, Result};

/// Content-addressable storage behind a witness
pub trait RepoWitness: Witness {
    /// Pre-flight: whether `get` would be attempted for this address
    fn can_get(&self, _address: &Address) -> bool {
        true
    }

    /// Fetch a node by address; `Ok(None)` when not held
    fn get(&self, address: &Address) -> Result<Option<Node>>;

    /// Pre-flight: whether `put` would be attempted for this node
    fn can_put(&self, _node: &Node) -> bool {
        true
    }

    /// Store a node; idempotent
    ///
    /// Returns `true` when newly stored, `false` when the address was
    /// already present (not an error - two puts of the same address carry
    /// identical content).
    fn put(&self, node: &Node) -> Result<bool>;

    /// Pre-flight: whether `delete` would be attempted for this address
    fn can_delete(&self, _address: &Address) -> bool {
        true
    }

    /// Remove a node; returns `true` when something was removed
    fn delete(&self, address: &Address) -> Result<bool>;

    /// Every address currently held
    fn addresses(&self) -> Result<Vec<Address>>;

    /// Put policy for observed-but-unknown nodes
    ///
    /// Optimistic repos (the default) store whatever they admit;
    /// restrictive repos silently decline unknown nodes.
    fn optimistic_put(&self) -> bool {
        true
    }

    /// Admission for repos: base witness rules plus the put policy
    fn repo_admission(&self, other: &Observed<'_>) -> Admission {
        let base = base_admission(self.instance_id(), other);
        if !base.proceed {
            return base;
        }
        if !self.optimistic_put() {
            let known = match self.get(&other.node.address()) {
                Ok(held) => held.is_some(),
                Err(err) => {
                    return Admission::deny(format!("storage unavailable: {err}"));
                }
            };
            if !known {
                return Admission::deny("restrictive put policy declines unknown nodes");
            }
        }
        Admission::allow()
    }

    /// Observation behavior for repos: store what is not yet held
    fn repo_store(&self, other: &Node) -> Result<()> {
        let address = other.address();
        if self.get(&address)?.is_some() {
            tracing::trace!(address = %address, "already held, nothing to store");
            return Ok(());
        }
        let stored = self.put(other)?;
        tracing::debug!(address = %address, stored, "stored from observation");
        Ok(())
    }
}
