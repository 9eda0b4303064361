//! Database access for mediscan-api
//!
//! Schema creation lives in `mediscan_common::db`; this module holds the
//! queries the service runs against it. IDs are stored as UUID strings and
//! timestamps as fixed-width RFC 3339 (UTC, microseconds) so they sort
//! lexically.

pub mod images;
pub mod predictions;
pub mod reports;

use chrono::{DateTime, SecondsFormat, Utc};
use mediscan_common::{Error, Result};
use uuid::Uuid;

pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(column: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Bad timestamp in {}: {} ({})", column, value, e)))
}

pub(crate) fn parse_uuid(column: &str, value: &str) -> Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| Error::Internal(format!("Bad UUID in {}: {} ({})", column, value, e)))
}
