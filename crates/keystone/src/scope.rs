//! Hierarchical authorization scopes
//!
//! A scope is one base value from a closed enumeration plus zero or more
//! free-form subscopes, joined with [`SCOPE_DELIMITER`]. The base names what
//! a keystone may authorize; subscopes narrow it (e.g. `relate_comment`
//! covers relating within the `comment` relation only).

use crate::constants::{MAX_IDENTIFIER_LEN, SCOPE_DELIMITER};
use crate::identifier::IdentifierError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed enumeration of scope bases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeBase {
    /// Most permissive scope, largely equivalent to `Owner`
    Any,
    /// Full control by the keystone holder
    Owner,
    /// Authorizes forking new timelines
    Fork,
    /// Authorizes intrinsic payload changes
    Mutate,
    /// Authorizes extrinsic relation changes
    Relate,
}

impl ScopeBase {
    /// String form of the base
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeBase::Any => "any",
            ScopeBase::Owner => "owner",
            ScopeBase::Fork => "fork",
            ScopeBase::Mutate => "mutate",
            ScopeBase::Relate => "relate",
        }
    }
}

impl fmt::Display for ScopeBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScopeBase {
    type Err = IdentifierError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "any" => Ok(ScopeBase::Any),
            "owner" => Ok(ScopeBase::Owner),
            "fork" => Ok(ScopeBase::Fork),
            "mutate" => Ok(ScopeBase::Mutate),
            "relate" => Ok(ScopeBase::Relate),
            other => Err(IdentifierError::InvalidScope(format!(
                "unknown scope base '{other}'"
            ))),
        }
    }
}

/// Validated scope: base plus ordered subscopes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    base: ScopeBase,
    subscopes: Vec<String>,
}

fn validate_subscope(subscope: &str) -> Result<(), IdentifierError> {
    if subscope.is_empty() {
        return Err(IdentifierError::InvalidScope(
            "subscope cannot be empty".to_string(),
        ));
    }
    if subscope.contains(SCOPE_DELIMITER) {
        return Err(IdentifierError::InvalidScope(format!(
            "subscope '{subscope}' contains the scope delimiter '{SCOPE_DELIMITER}'"
        )));
    }
    if subscope.contains(crate::constants::FIELD_DELIMITER) {
        return Err(IdentifierError::InvalidScope(format!(
            "subscope '{subscope}' contains the field delimiter"
        )));
    }
    Ok(())
}

impl Scope {
    /// A scope with no subscopes
    pub fn base(base: ScopeBase) -> Self {
        Self {
            base,
            subscopes: Vec::new(),
        }
    }

    /// A scope with subscopes, validated
    pub fn new(
        base: ScopeBase,
        subscopes: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Self, IdentifierError> {
        let subscopes: Vec<String> = subscopes.into_iter().map(Into::into).collect();
        for subscope in &subscopes {
            validate_subscope(subscope)?;
        }
        let scope = Self { base, subscopes };
        let encoded = scope.encode();
        if encoded.len() > MAX_IDENTIFIER_LEN {
            return Err(IdentifierError::TooLong {
                len: encoded.len(),
                max: MAX_IDENTIFIER_LEN,
            });
        }
        Ok(scope)
    }

    /// The base value
    pub fn scope_base(&self) -> ScopeBase {
        self.base
    }

    /// The ordered subscopes
    pub fn subscopes(&self) -> &[String] {
        &self.subscopes
    }

    /// Delimiter-joined string form
    pub fn encode(&self) -> String {
        let mut rendered = self.base.as_str().to_string();
        for subscope in &self.subscopes {
            rendered.push(SCOPE_DELIMITER);
            rendered.push_str(subscope);
        }
        rendered
    }

    /// Parse a delimiter-joined scope string
    pub fn parse(raw: &str) -> Result<Self, IdentifierError> {
        if raw.is_empty() {
            return Err(IdentifierError::InvalidScope("scope required".to_string()));
        }
        let mut pieces = raw.split(SCOPE_DELIMITER);
        let base = pieces
            .next()
            .unwrap_or_default()
            .parse::<ScopeBase>()?;
        let subscopes: Vec<String> = pieces.map(str::to_string).collect();
        Self::new(base, subscopes)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for Scope {
    type Err = IdentifierError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::parse(raw)
    }
}
