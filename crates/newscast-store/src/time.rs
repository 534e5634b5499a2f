//! Timestamp columns are RFC 3339 text.

use chrono::{DateTime, Utc};

use crate::error::{StoreError, StoreResult};

pub(crate) fn to_text(at: &DateTime<Utc>) -> String {
    at.to_rfc3339()
}

pub(crate) fn opt_to_text(at: &Option<DateTime<Utc>>) -> Option<String> {
    at.as_ref().map(to_text)
}

pub(crate) fn from_text(text: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::invalid_data(format!("bad timestamp {:?}: {}", text, e)))
}

pub(crate) fn opt_from_text(text: Option<String>) -> StoreResult<Option<DateTime<Utc>>> {
    text.as_deref().map(from_text).transpose()
}
