//! Keystone constants
//!
//! Identifier grammar delimiters, length bounds, challenge defaults, and the
//! persisted payload/relation key names. These are enforced on both encode
//! and decode.

/// Primitive seed every keystone timeline forks from
pub const KEYSTONE_PRIMITIVE_IDENTIFIER: &str = "keystone";

/// Fixed identifier of keystone config nodes (no variable fields)
pub const KEYSTONE_CONFIG_IDENTIFIER: &str = "keystone config";

/// Delimiter between top-level identifier fields
pub const FIELD_DELIMITER: char = ' ';

/// Delimiter between a scope base and its subscopes
pub const SCOPE_DELIMITER: char = '_';

/// Placeholder lifecycle hash used while the temporal-junction node does
/// not exist yet (its hash cannot be embedded before it is computed)
pub const UNMINTED_LIFECYCLE: &str = "unminted";

/// Maximum total keystone identifier length
pub const MAX_IDENTIFIER_LEN: usize = 1024;

/// Minimum total keystone identifier length (`keystone _ _`)
pub const MIN_IDENTIFIER_LEN: usize = 12;

/// Maximum extra-label length
pub const MAX_EXTRA_LABEL_LEN: usize = 32;

/// Default challenge pool size
pub const DEFAULT_POOL_SIZE: usize = 10;

/// Default hash iterations from secret to challenge result
pub const DEFAULT_HASH_ITERATIONS: u32 = 5;

/// Entropy drawn per challenge salt, in bytes (rendered as hex)
pub const SALT_ENTROPY_BYTES: usize = 32;

/// Smallest acceptable rendered salt length
pub const MIN_SALT_CHARS: usize = 16;

/// Largest acceptable rendered salt length
pub const MAX_SALT_CHARS: usize = 4096;

/// Keystone config version literal
pub const CONFIG_VERSION: &str = "v1";

/// Relation from a keystone to its shareable config node
pub const REL_CONFIG: &str = "config";

/// Payload key holding the salt-to-commitment map
pub const PAYLOAD_CHALLENGES: &str = "challenges";

/// Payload key holding consumed responses
pub const PAYLOAD_SOLUTIONS: &str = "solutions";

/// Payload key holding the expiration timestamp string
pub const PAYLOAD_EXPIRATION: &str = "expiration";

/// Payload key holding the expiration format tag
pub const PAYLOAD_EXPIRATION_FORMAT: &str = "expirationFormat";
