//! Witness abstraction
//!
//! A witness is a node with exactly one extra behavior: observing other
//! nodes under an admission predicate. Observation is the only place where
//! passive side effects (like storage) may happen, and the predicate always
//! runs first.
//!
//! The original formulation used a class hierarchy; here the contract is a
//! pair of capability traits composed per concrete type:
//!
//! - [`Hashed`] - the type exposes its own content-addressed [`Node`].
//! - [`Witness`] - adds the admission predicate and observation behavior.
//!
//! A witness is `Ready` the moment its constructor finishes (identity node
//! sealed, instance token drawn); there is no later state transition and no
//! close. Witnesses are terminal in their own history: the structural-edit
//! predicates (`can_fork`, `can_mutate`, `can_relate`) always deny, and a
//! successor behavior is a freshly derived witness instead.
//!
//! Self-observation is detected with an ephemeral, process-local
//! [`InstanceId`] compared by value - never by reference identity, and never
//! persisted into the node. Two separate instances representing the same
//! address are NOT self-witnesses of one another.

use keystone_core::{Address, Effects, Node, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Ephemeral process-local identity of a witness instance
///
/// Drawn from the injected effects at construction time; not part of the
/// persisted node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId(Uuid);

impl InstanceId {
    /// Draw a fresh instance token
    pub fn new(effects: &Effects) -> Self {
        Self(effects.gen_uuid())
    }

    /// The inner uuid
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "instance-{}", self.0)
    }
}

/// Admission decision: proceed or decline, with reasons
///
/// A negative admission is an expected outcome, not an error. Callers
/// inspect `reasons` to distinguish "nothing happened" from failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Admission {
    /// Whether the observation may proceed
    pub proceed: bool,
    /// Why not, when declined
    pub reasons: Vec<String>,
}

impl Admission {
    /// Allow the observation
    pub fn allow() -> Self {
        Self {
            proceed: true,
            reasons: Vec::new(),
        }
    }

    /// Decline with a single reason
    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            proceed: false,
            reasons: vec![reason.into()],
        }
    }

    /// Decline with multiple reasons
    pub fn deny_all(reasons: Vec<String>) -> Self {
        Self {
            proceed: false,
            reasons,
        }
    }

    /// Whether the observation may proceed
    pub fn is_allowed(&self) -> bool {
        self.proceed
    }
}

/// A node as seen by a witness: the record plus the observer-side
/// runtime instance token, when the node belongs to a live instance
#[derive(Debug, Clone, Copy)]
pub struct Observed<'a> {
    /// The content-addressed record being observed
    pub node: &'a Node,
    /// Runtime instance token of the record's owner, if it has one
    pub instance: Option<InstanceId>,
}

impl<'a> Observed<'a> {
    /// Observe a bare node (no runtime instance)
    pub fn node(node: &'a Node) -> Self {
        Self {
            node,
            instance: None,
        }
    }

    /// Observe a node owned by a live instance
    pub fn with_instance(node: &'a Node, instance: InstanceId) -> Self {
        Self {
            node,
            instance: Some(instance),
        }
    }
}

impl<'a> From<&'a Node> for Observed<'a> {
    fn from(node: &'a Node) -> Self {
        Self::node(node)
    }
}

/// The type exposes its own content-addressed node
pub trait Hashed {
    /// The identity record
    fn node(&self) -> &Node;

    /// The identity record's address
    fn address(&self) -> Address {
        self.node().address()
    }
}

/// Base admission rules shared by every witness
///
/// - missing identifier or missing/empty hash on `other` declines;
/// - `other` carrying this witness's own instance token declines
///   (instance-scoped, not address-scoped).
pub fn base_admission(own_instance: InstanceId, other: &Observed<'_>) -> Admission {
    let mut reasons = Vec::new();
    if other.node.identifier.is_empty() {
        reasons.push("missing field: identifier".to_string());
    }
    if other.node.hash.as_deref().unwrap_or("").is_empty() {
        reasons.push("missing field: hash".to_string());
    }
    if other.instance == Some(own_instance) {
        reasons.push("cannot witness self".to_string());
    }
    if reasons.is_empty() {
        Admission::allow()
    } else {
        Admission::deny_all(reasons)
    }
}

/// Observation behavior under an admission predicate
pub trait Witness: Hashed {
    /// This instance's ephemeral runtime token
    fn instance_id(&self) -> InstanceId;

    /// This witness as an observable, carrying its instance token
    fn observed(&self) -> Observed<'_> {
        Observed::with_instance(self.node(), self.instance_id())
    }

    /// Admission predicate; must run before [`Witness::witness_impl`]
    ///
    /// The base rule set lives in [`base_admission`]. Implementations may
    /// layer stricter predicates on top, but must keep the base rules.
    fn can_witness(&self, other: &Observed<'_>) -> Admission {
        base_admission(self.instance_id(), other)
    }

    /// The witness's actual behavior, called only on positive admission
    fn witness_impl(&self, other: &Node) -> Result<()>;

    /// Observe another node
    ///
    /// Runs [`Witness::can_witness`]; on positive admission runs
    /// [`Witness::witness_impl`]. A declined admission performs no side
    /// effect and is returned, not raised.
    fn witness(&self, other: &Observed<'_>) -> Result<Admission> {
        let admission = self.can_witness(other);
        if admission.proceed {
            self.witness_impl(other.node)?;
        } else {
            tracing::debug!(
                witness = %self.address(),
                other = %other.node.address(),
                reasons = ?admission.reasons,
                "observation declined"
            );
        }
        Ok(admission)
    }

    /// Witnesses are terminal: forking one is always declined
    fn can_fork(&self) -> Admission {
        Admission::deny("witness is terminal in its own history")
    }

    /// Witnesses are terminal: mutating one is always declined
    fn can_mutate(&self) -> Admission {
        Admission::deny("witness is terminal in its own history")
    }

    /// Witnesses are terminal: relating one is always declined
    fn can_relate(&self) -> Admission {
        Admission::deny("witness is terminal in its own history")
    }
}
