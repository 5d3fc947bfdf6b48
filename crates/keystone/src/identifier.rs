//! Keystone identifier codec
//!
//! Grammar (field delimiter is a single space):
//!
//! ```text
//! keystone <scope> <lifecycleHash> [extraLabel]
//! ```
//!
//! The lifecycle hash is the hash of the keystone's own temporal-junction
//! node; embedding it binds the capability's identity to one specific
//! issuance event, so a re-issued keystone of the same scope can never be
//! confused with it. Encode and decode enforce the same length bounds, and
//! parsing is the exact inverse of encoding for every valid identifier.

use crate::constants::{
    FIELD_DELIMITER, MAX_EXTRA_LABEL_LEN, MAX_IDENTIFIER_LEN, MIN_IDENTIFIER_LEN,
};
use crate::scope::Scope;
use keystone_core::{KeystoneError, ADDRESS_DELIMITER};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier validation and parse failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentifierError {
    /// Identifier exceeds the maximum length
    #[error("identifier too long: {len} chars, max {max}")]
    TooLong {
        /// Actual length
        len: usize,
        /// Allowed maximum
        max: usize,
    },

    /// Identifier is below the minimum length
    #[error("identifier too short: {len} chars, min {min}")]
    TooShort {
        /// Actual length
        len: usize,
        /// Required minimum
        min: usize,
    },

    /// Identifier does not match the keystone grammar
    #[error("malformed keystone identifier: {0}")]
    Malformed(String),

    /// Scope base is not in the closed enumeration, or a subscope is invalid
    #[error("invalid scope: {0}")]
    InvalidScope(String),

    /// Extra label violates its constraints
    #[error("invalid extra label: {0}")]
    InvalidLabel(String),

    /// Lifecycle hash contains a delimiter or is empty
    #[error("invalid lifecycle hash: {0}")]
    InvalidLifecycleHash(String),
}

impl From<IdentifierError> for KeystoneError {
    fn from(err: IdentifierError) -> Self {
        KeystoneError::invalid(err.to_string())
    }
}

fn validate_field(value: &str, what: impl Fn(String) -> IdentifierError) -> Result<(), IdentifierError> {
    if value.is_empty() {
        return Err(what("empty".to_string()));
    }
    if value.contains(FIELD_DELIMITER) {
        return Err(what(format!("'{value}' contains the field delimiter")));
    }
    if value.contains(ADDRESS_DELIMITER) {
        return Err(what(format!(
            "'{value}' contains the address delimiter '{ADDRESS_DELIMITER}'"
        )));
    }
    Ok(())
}

/// Structured form of a keystone identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeystoneIdentifier {
    /// Authorization scope
    pub scope: Scope,
    /// Hash of the keystone's temporal-junction node
    pub lifecycle_hash: String,
    /// Optional free-form label
    pub extra_label: Option<String>,
}

impl KeystoneIdentifier {
    /// Build a validated identifier
    pub fn new(
        scope: Scope,
        lifecycle_hash: impl Into<String>,
        extra_label: Option<String>,
    ) -> Result<Self, IdentifierError> {
        let lifecycle_hash = lifecycle_hash.into();
        validate_field(&lifecycle_hash, IdentifierError::InvalidLifecycleHash)?;
        if let Some(label) = &extra_label {
            validate_field(label, IdentifierError::InvalidLabel)?;
            if label.len() > MAX_EXTRA_LABEL_LEN {
                return Err(IdentifierError::InvalidLabel(format!(
                    "too long: {} chars, max {MAX_EXTRA_LABEL_LEN}",
                    label.len()
                )));
            }
        }
        let identifier = Self {
            scope,
            lifecycle_hash,
            extra_label,
        };
        // enforce the overall bound on encode as well as decode
        let encoded = identifier.render();
        if encoded.len() > MAX_IDENTIFIER_LEN {
            return Err(IdentifierError::TooLong {
                len: encoded.len(),
                max: MAX_IDENTIFIER_LEN,
            });
        }
        Ok(identifier)
    }

    fn render(&self) -> String {
        let mut rendered = format!(
            "keystone{FIELD_DELIMITER}{}{FIELD_DELIMITER}{}",
            self.scope.encode(),
            self.lifecycle_hash
        );
        if let Some(label) = &self.extra_label {
            rendered.push(FIELD_DELIMITER);
            rendered.push_str(label);
        }
        rendered
    }

    /// Encode to the identifier string
    pub fn encode(&self) -> String {
        self.render()
    }

    /// Parse an identifier string; exact inverse of [`Self::encode`]
    pub fn parse(raw: &str) -> Result<Self, IdentifierError> {
        if raw.len() > MAX_IDENTIFIER_LEN {
            return Err(IdentifierError::TooLong {
                len: raw.len(),
                max: MAX_IDENTIFIER_LEN,
            });
        }
        if raw.len() < MIN_IDENTIFIER_LEN {
            return Err(IdentifierError::TooShort {
                len: raw.len(),
                min: MIN_IDENTIFIER_LEN,
            });
        }

        let fields: Vec<&str> = raw.split(FIELD_DELIMITER).collect();
        if fields.len() < 2 {
            return Err(IdentifierError::Malformed(format!(
                "expected 'keystone <scope> <lifecycleHash> [extraLabel]', got '{raw}'"
            )));
        }
        if fields[0] != "keystone" {
            return Err(IdentifierError::Malformed(format!(
                "does not begin with the 'keystone' field: '{raw}'"
            )));
        }
        if fields.len() > 4 {
            return Err(IdentifierError::Malformed(format!(
                "too many fields ({}): '{raw}'",
                fields.len()
            )));
        }

        let scope = Scope::parse(fields[1])?;
        let lifecycle_hash = fields
            .get(2)
            .filter(|hash| !hash.is_empty())
            .ok_or_else(|| {
                IdentifierError::Malformed(format!("lifecycle hash field missing: '{raw}'"))
            })?;
        let extra_label = fields.get(3).map(|label| label.to_string());

        Self::new(scope, *lifecycle_hash, extra_label)
    }
}

impl fmt::Display for KeystoneIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::ScopeBase;

    fn lifecycle() -> String {
        "A".repeat(64)
    }

    #[test]
    fn test_round_trip_without_label() {
        let identifier =
            KeystoneIdentifier::new(Scope::base(ScopeBase::Owner), lifecycle(), None).unwrap();
        let encoded = identifier.encode();
        assert_eq!(encoded, format!("keystone owner {}", lifecycle()));
        assert_eq!(KeystoneIdentifier::parse(&encoded).unwrap(), identifier);
    }

    #[test]
    fn test_round_trip_with_label_and_subscopes() {
        let scope = Scope::new(ScopeBase::Relate, ["comment"]).unwrap();
        let identifier =
            KeystoneIdentifier::new(scope, lifecycle(), Some("primary".to_string())).unwrap();
        let encoded = identifier.encode();
        assert_eq!(
            encoded,
            format!("keystone relate_comment {} primary", lifecycle())
        );
        assert_eq!(KeystoneIdentifier::parse(&encoded).unwrap(), identifier);
    }

    #[test]
    fn test_parse_length_bounds() {
        let overlong = format!("keystone owner {}", "A".repeat(MAX_IDENTIFIER_LEN));
        assert!(matches!(
            KeystoneIdentifier::parse(&overlong),
            Err(IdentifierError::TooLong { .. })
        ));
        assert!(matches!(
            KeystoneIdentifier::parse("keystone"),
            Err(IdentifierError::TooShort { .. })
        ));
    }

    #[test]
    fn test_parse_malformed() {
        assert!(matches!(
            KeystoneIdentifier::parse("keystones-and-arches"),
            Err(IdentifierError::Malformed(_))
        ));
        assert!(matches!(
            KeystoneIdentifier::parse("witness owner ABCDEF"),
            Err(IdentifierError::Malformed(_))
        ));
        assert!(matches!(
            KeystoneIdentifier::parse("keystone owner AAA BBB CCC"),
            Err(IdentifierError::Malformed(_))
        ));
    }

    #[test]
    fn test_label_constraints() {
        let overlong_label = "l".repeat(MAX_EXTRA_LABEL_LEN + 1);
        assert!(matches!(
            KeystoneIdentifier::new(
                Scope::base(ScopeBase::Owner),
                lifecycle(),
                Some(overlong_label)
            ),
            Err(IdentifierError::InvalidLabel(_))
        ));
        assert!(KeystoneIdentifier::new(
            Scope::base(ScopeBase::Owner),
            lifecycle(),
            Some("has space".to_string())
        )
        .is_err());
    }

    #[test]
    fn test_lifecycle_hash_constraints() {
        assert!(matches!(
            KeystoneIdentifier::new(Scope::base(ScopeBase::Owner), "", None),
            Err(IdentifierError::InvalidLifecycleHash(_))
        ));
        assert!(KeystoneIdentifier::new(
            Scope::base(ScopeBase::Owner),
            "with^delimiter",
            None
        )
        .is_err());
    }
}
