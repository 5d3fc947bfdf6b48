//! Node derivation: fork, mutate, relate
//!
//! The three ways a new node comes from an existing one:
//!
//! - [`fork`] starts a new timeline: the source becomes an `ancestor` and the
//!   past is cleared. A fork may mint a lifecycle stamp (timestamp + uuid),
//!   making the result a temporal-junction node that later derivations of
//!   the same timeline can be traced back to.
//! - [`mutate`] changes intrinsic payload (and optionally the identifier)
//!   within a timeline; the source is appended or linked into `past`.
//! - [`relate`] changes extrinsic relations within a timeline.
//!
//! Every transform returns a fresh sealed [`Node`]; sources are never
//! touched. Relation names listed in `linked_relations` retain only the most
//! recent target; all others accumulate history. Each transform can emit an
//! audit byproduct node recording the operation, related via [`REL_AUDIT`].

use crate::effects::Effects;
use crate::errors::{KeystoneError, Result};
use crate::node::{Address, Node, Payload, Relations};
use crate::time::format_utc;
use serde_json::{Map, Value};

/// Accumulating history within one timeline
pub const REL_PAST: &str = "past";
/// Link back to the timeline a fork came from
pub const REL_ANCESTOR: &str = "ancestor";
/// Audit byproduct nodes describing transforms
pub const REL_AUDIT: &str = "audit";

/// Payload key holding a node's creation timestamp
pub const PAYLOAD_TIMESTAMP: &str = "timestamp";
/// Payload key holding a lifecycle uuid
pub const PAYLOAD_UUID: &str = "uuid";

/// Relation names managed by the transforms themselves
const RESERVED_RELATIONS: [&str; 3] = [REL_PAST, REL_ANCESTOR, REL_AUDIT];

/// Lifecycle stamp minted on fork
#[derive(Debug, Clone, Copy, Default)]
pub struct LifecycleOptions {
    /// Stamp the fork with a creation timestamp
    pub timestamp: bool,
    /// Stamp the fork with a fresh uuid for local uniqueness
    pub uuid: bool,
}

/// Options for [`fork`]
#[derive(Debug, Clone, Default)]
pub struct ForkOptions {
    /// Identifier for the new timeline; defaults to the source's
    pub new_identifier: Option<String>,
    /// Mint a lifecycle stamp, making the fork a temporal-junction node
    pub lifecycle: Option<LifecycleOptions>,
    /// Relation names that keep only their most recent target
    pub linked_relations: Vec<String>,
    /// Carry the source payload into the fork
    pub clone_payload: bool,
    /// Carry the source relations into the fork
    pub clone_relations: bool,
    /// Skip the creation timestamp
    pub no_timestamp: bool,
    /// Emit an audit byproduct node
    pub audit: bool,
}

/// Options for [`mutate`]
#[derive(Debug, Clone, Default)]
pub struct MutateOptions {
    /// Rewrite the identifier without forking the timeline
    pub new_identifier: Option<String>,
    /// Additive/recursive payload patch (arrays replaced whole)
    pub patch: Option<Payload>,
    /// Top-level payload keys to remove
    pub remove: Vec<String>,
    /// Relation names that keep only their most recent target
    pub linked_relations: Vec<String>,
    /// Skip the timestamp refresh
    pub no_timestamp: bool,
    /// Emit an audit byproduct node
    pub audit: bool,
}

/// Options for [`relate`]
#[derive(Debug, Clone, Default)]
pub struct RelateOptions {
    /// Relation targets to add, by relation name
    pub add: Relations,
    /// Relation targets to remove, by relation name
    pub remove: Relations,
    /// Relation names that keep only their most recent target
    pub linked_relations: Vec<String>,
    /// Skip the timestamp refresh
    pub no_timestamp: bool,
    /// Emit an audit byproduct node
    pub audit: bool,
}

/// Result of a transform: the new node plus any audit byproduct
///
/// The caller is responsible for persisting the audit node if a trail is
/// wanted; it is not required for live use of the derived node.
#[derive(Debug, Clone)]
pub struct Derived {
    /// The freshly sealed node
    pub node: Node,
    /// Audit byproduct, when requested
    pub audit: Option<Node>,
}

fn is_linked(linked: &[String], relation: &str) -> bool {
    linked.iter().any(|name| name == relation)
}

fn push_relation(relations: &mut Relations, name: &str, target: Address, linked: &[String]) {
    if is_linked(linked, name) {
        relations.insert(name.to_string(), vec![target]);
    } else {
        let targets = relations.entry(name.to_string()).or_default();
        if !targets.contains(&target) {
            targets.push(target);
        }
    }
}

fn merge_objects(existing: &mut Map<String, Value>, incoming: &Map<String, Value>) {
    for (key, incoming_value) in incoming {
        match (existing.get_mut(key), incoming_value) {
            (Some(Value::Object(nested)), Value::Object(patch)) => merge_objects(nested, patch),
            _ => {
                existing.insert(key.clone(), incoming_value.clone());
            }
        }
    }
}

fn apply_patch(payload: &mut Payload, patch: &Payload) {
    for (key, incoming_value) in patch {
        match (payload.get_mut(key), incoming_value) {
            (Some(Value::Object(nested)), Value::Object(incoming)) => {
                merge_objects(nested, incoming);
            }
            _ => {
                payload.insert(key.clone(), incoming_value.clone());
            }
        }
    }
}

fn audit_node(operation: &str, source: &Address, target_identifier: &str) -> Result<Node> {
    let mut payload = Payload::new();
    payload.insert("op".to_string(), Value::String(operation.to_string()));
    payload.insert("source".to_string(), Value::String(source.to_string()));
    payload.insert(
        "target".to_string(),
        Value::String(target_identifier.to_string()),
    );
    Node::sealed(format!("{REL_AUDIT} {operation}"), Some(payload), None)
}

fn seal(identifier: String, payload: Payload, relations: Relations) -> Result<Node> {
    let payload = if payload.is_empty() {
        None
    } else {
        Some(payload)
    };
    let relations = if relations.is_empty() {
        None
    } else {
        Some(relations)
    };
    Node::sealed(identifier, payload, relations)
}

/// Fork a source node into a new timeline
pub fn fork(effects: &Effects, src: &Node, opts: &ForkOptions) -> Result<Derived> {
    let lifecycle = opts.lifecycle.unwrap_or_default();
    if opts.no_timestamp && lifecycle.timestamp {
        return Err(KeystoneError::invalid(
            "fork cannot both skip the timestamp and mint a lifecycle timestamp",
        ));
    }

    let src_addr = src.address();
    let identifier = opts
        .new_identifier
        .clone()
        .unwrap_or_else(|| src.identifier.clone());

    let mut relations = if opts.clone_relations {
        src.relations.clone().unwrap_or_default()
    } else {
        Relations::new()
    };
    push_relation(
        &mut relations,
        REL_ANCESTOR,
        src_addr.clone(),
        &opts.linked_relations,
    );

    let mut payload = if opts.clone_payload {
        src.payload.clone().unwrap_or_default()
    } else {
        Payload::new()
    };
    if !opts.no_timestamp || lifecycle.timestamp {
        payload.insert(
            PAYLOAD_TIMESTAMP.to_string(),
            Value::String(format_utc(&effects.now_utc()?)),
        );
    }
    if lifecycle.uuid {
        payload.insert(
            PAYLOAD_UUID.to_string(),
            Value::String(effects.gen_uuid().to_string()),
        );
    }

    let audit = if opts.audit {
        let audit = audit_node("fork", &src_addr, &identifier)?;
        push_relation(
            &mut relations,
            REL_AUDIT,
            audit.address(),
            &opts.linked_relations,
        );
        Some(audit)
    } else {
        None
    };

    let node = seal(identifier, payload, relations)?;
    Ok(Derived { node, audit })
}

/// Mutate a source node's intrinsic payload within its timeline
pub fn mutate(effects: &Effects, src: &Node, opts: &MutateOptions) -> Result<Derived> {
    if src.is_primitive() {
        return Err(KeystoneError::invalid("cannot mutate a primitive node"));
    }
    if opts.new_identifier.is_none() && opts.patch.is_none() && opts.remove.is_empty() {
        return Err(KeystoneError::invalid(
            "mutate requires a new identifier, a patch, or keys to remove",
        ));
    }

    let src_addr = src.address();
    let identifier = opts
        .new_identifier
        .clone()
        .unwrap_or_else(|| src.identifier.clone());

    let mut relations = src.relations.clone().unwrap_or_default();
    push_relation(
        &mut relations,
        REL_PAST,
        src_addr.clone(),
        &opts.linked_relations,
    );

    let mut payload = src.payload.clone().unwrap_or_default();
    for key in &opts.remove {
        if key == PAYLOAD_TIMESTAMP {
            return Err(KeystoneError::invalid(format!(
                "cannot remove reserved payload key '{PAYLOAD_TIMESTAMP}'"
            )));
        }
        if payload.remove(key).is_none() {
            tracing::debug!(key = %key, "payload key to remove does not exist");
        }
    }
    if let Some(patch) = &opts.patch {
        apply_patch(&mut payload, patch);
    }
    if !opts.no_timestamp {
        payload.insert(
            PAYLOAD_TIMESTAMP.to_string(),
            Value::String(format_utc(&effects.now_utc()?)),
        );
    }

    let audit = if opts.audit {
        let audit = audit_node("mutate", &src_addr, &identifier)?;
        push_relation(
            &mut relations,
            REL_AUDIT,
            audit.address(),
            &opts.linked_relations,
        );
        Some(audit)
    } else {
        None
    };

    let node = seal(identifier, payload, relations)?;
    Ok(Derived { node, audit })
}

/// Relate or unrelate other nodes, mutating the source extrinsically
pub fn relate(effects: &Effects, src: &Node, opts: &RelateOptions) -> Result<Derived> {
    if src.is_primitive() {
        return Err(KeystoneError::invalid("cannot relate a primitive node"));
    }
    let adding = opts.add.values().any(|targets| !targets.is_empty());
    let removing = opts.remove.values().any(|targets| !targets.is_empty());
    if !adding && !removing {
        return Err(KeystoneError::invalid(
            "relate requires relations to add or remove",
        ));
    }
    for name in opts.add.keys().chain(opts.remove.keys()) {
        if RESERVED_RELATIONS.contains(&name.as_str()) {
            return Err(KeystoneError::invalid(format!(
                "relation '{name}' is managed by the transforms and cannot be edited directly"
            )));
        }
    }

    let src_addr = src.address();
    let mut relations = src.relations.clone().unwrap_or_default();
    push_relation(
        &mut relations,
        REL_PAST,
        src_addr.clone(),
        &opts.linked_relations,
    );

    for (name, targets) in &opts.add {
        for target in targets {
            push_relation(&mut relations, name, target.clone(), &opts.linked_relations);
        }
    }
    for (name, targets) in &opts.remove {
        if let Some(existing) = relations.get_mut(name) {
            existing.retain(|address| !targets.contains(address));
            if existing.is_empty() {
                relations.remove(name);
            }
        } else {
            tracing::debug!(relation = %name, "relation to remove does not exist");
        }
    }

    let mut payload = src.payload.clone().unwrap_or_default();
    if !opts.no_timestamp {
        payload.insert(
            PAYLOAD_TIMESTAMP.to_string(),
            Value::String(format_utc(&effects.now_utc()?)),
        );
    }

    let audit = if opts.audit {
        let audit = audit_node("relate", &src_addr, &src.identifier)?;
        push_relation(
            &mut relations,
            REL_AUDIT,
            audit.address(),
            &opts.linked_relations,
        );
        Some(audit)
    } else {
        None
    };

    let node = seal(src.identifier.clone(), payload, relations)?;
    Ok(Derived { node, audit })
}
