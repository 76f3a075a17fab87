//! EODHD payloads: an array of row objects, each carrying a `date` string.
//! Every other field passes through as a column.

use super::{NormalizedTable, RowSet};
use crate::error::NormalizeError;
use crate::fetch::RawPayload;
use chrono::{DateTime, NaiveDate, NaiveDateTime};

const DATE_FIELD: &str = "date";

pub fn normalize(payload: &RawPayload) -> Result<NormalizedTable, NormalizeError> {
    let rows = payload.as_array().ok_or_else(|| {
        NormalizeError::UnexpectedShape("EODHD payload must be an array of rows".into())
    })?;

    let mut set = RowSet::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        let fields = row
            .as_object()
            .ok_or_else(|| NormalizeError::UnexpectedShape(format!("row {i} is not an object")))?;
        let raw_date = fields
            .get(DATE_FIELD)
            .ok_or(NormalizeError::MissingField { row: i, field: DATE_FIELD })?;
        let ts = raw_date
            .as_str()
            .and_then(parse_date_millis)
            .ok_or_else(|| NormalizeError::InvalidDate {
                row: i,
                value: raw_date.to_string(),
            })?;

        set.push_row(
            ts,
            fields
                .iter()
                .filter(|(name, _)| name.as_str() != DATE_FIELD)
                .map(|(name, value)| (name.clone(), value)),
        );
    }

    set.into_table()
}

/// Accepts `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS` and RFC 3339; naive values
/// are taken as UTC.
fn parse_date_millis(s: &str) -> Option<i64> {
    let s = s.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc().timestamp_millis());
    }
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.timestamp_millis())
}
