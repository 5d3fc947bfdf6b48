//! UTC timestamp rendering
//!
//! Node timestamps and keystone expirations are persisted as human-readable
//! UTC strings (`Sat, 01 Feb 2025 12:00:00 GMT`). Rendering and parsing go
//! through this module so the format stays bit-exact in both directions.

use crate::errors::{KeystoneError, Result};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

/// Persisted UTC timestamp format
pub const UTC_TIMESTAMP_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Render a datetime in the persisted UTC format
pub fn format_utc(datetime: &DateTime<Utc>) -> String {
    datetime.format(UTC_TIMESTAMP_FORMAT).to_string()
}

/// Parse a timestamp previously rendered by [`format_utc`]
pub fn parse_utc(raw: &str) -> Result<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(raw, UTC_TIMESTAMP_FORMAT)
        .map_err(|e| KeystoneError::invalid(format!("unparseable UTC timestamp '{raw}': {e}")))?;
    Ok(Utc.from_utc_datetime(&naive))
}
