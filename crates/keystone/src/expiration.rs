//! Keystone expiration stamps
//!
//! An expiration is persisted as a timestamp string plus its format tag.
//! Only the UTC format exists in v1. A keystone is expired exactly when its
//! expiration datetime is before now.

use keystone_core::{format_utc, parse_utc, Effects, KeystoneError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed enumeration of expiration formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpirationFormat {
    /// UTC timestamp string (`Sat, 01 Feb 2025 12:00:00 GMT`)
    #[serde(rename = "UTC")]
    Utc,
}

impl ExpirationFormat {
    /// String form of the tag
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpirationFormat::Utc => "UTC",
        }
    }
}

impl fmt::Display for ExpirationFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExpirationFormat {
    type Err = KeystoneError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw {
            "UTC" => Ok(ExpirationFormat::Utc),
            other => Err(KeystoneError::invalid(format!(
                "unknown expiration format '{other}': only UTC in v1"
            ))),
        }
    }
}

/// Persisted expiration: timestamp string plus format tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expiration {
    /// Rendered timestamp
    pub stamp: String,
    /// Format the stamp was rendered in
    pub format: ExpirationFormat,
}

impl Expiration {
    /// Expiration at an absolute datetime
    pub fn at(datetime: &DateTime<Utc>) -> Self {
        Self {
            stamp: format_utc(datetime),
            format: ExpirationFormat::Utc,
        }
    }

    /// Expiration a number of seconds from the injected clock's now
    pub fn after(effects: &Effects, seconds: u64) -> Result<Self> {
        let seconds = i64::try_from(seconds)
            .map_err(|_| KeystoneError::invalid("expiration offset out of range"))?;
        let datetime = effects
            .now_utc()?
            .checked_add_signed(Duration::seconds(seconds))
            .ok_or_else(|| KeystoneError::invalid("expiration offset out of range"))?;
        Ok(Self::at(&datetime))
    }

    /// Reconstruct from persisted payload fields
    pub fn from_parts(stamp: impl Into<String>, format: &str) -> Result<Self> {
        let expiration = Self {
            stamp: stamp.into(),
            format: format.parse()?,
        };
        // fail fast on an unparseable stamp instead of at verification time
        expiration.datetime()?;
        Ok(expiration)
    }

    /// The parsed expiration datetime
    pub fn datetime(&self) -> Result<DateTime<Utc>> {
        match self.format {
            ExpirationFormat::Utc => parse_utc(&self.stamp),
        }
    }

    /// Whether the expiration has passed at the given Unix time
    pub fn is_expired(&self, now_unix: u64) -> Result<bool> {
        let expires = self.datetime()?.timestamp();
        let now = i64::try_from(now_unix)
            .map_err(|_| KeystoneError::internal("timestamp out of range"))?;
        Ok(expires < now)
    }
}
