//! Polygon aggregates: `{"results": [...]}` with short field codes and an
//! epoch-millisecond `t`.

use super::{NormalizedTable, RowSet};
use crate::error::NormalizeError;
use crate::fetch::RawPayload;
use chrono::DateTime;

const TIMESTAMP_FIELD: &str = "t";

/// Short field code → canonical column name.
const FIELD_NAMES: [(&str, &str); 7] = [
    ("v", "volume"),
    ("vw", "volume_weighted_average_price"),
    ("o", "open"),
    ("c", "close"),
    ("h", "high"),
    ("l", "low"),
    ("n", "number_of_transactions"),
];

fn canonical_name(code: &str) -> &str {
    FIELD_NAMES
        .iter()
        .find(|(short, _)| *short == code)
        .map(|(_, long)| *long)
        .unwrap_or(code)
}

pub fn normalize(payload: &RawPayload) -> Result<NormalizedTable, NormalizeError> {
    let envelope = payload.as_object().ok_or_else(|| {
        NormalizeError::UnexpectedShape("Polygon payload must be an object".into())
    })?;

    // Polygon omits `results` entirely when the range has no bars.
    let rows = match envelope.get("results") {
        None => &[][..],
        Some(results) => results.as_array().map(Vec::as_slice).ok_or_else(|| {
            NormalizeError::UnexpectedShape("`results` must be an array".into())
        })?,
    };

    let mut set = RowSet::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        let fields = row
            .as_object()
            .ok_or_else(|| NormalizeError::UnexpectedShape(format!("result {i} is not an object")))?;
        let raw_ts = fields
            .get(TIMESTAMP_FIELD)
            .ok_or(NormalizeError::MissingField { row: i, field: TIMESTAMP_FIELD })?;
        let ts = raw_ts
            .as_i64()
            .or_else(|| raw_ts.as_f64().map(|f| f as i64))
            .filter(|ms| DateTime::from_timestamp_millis(*ms).is_some())
            .ok_or_else(|| NormalizeError::InvalidDate {
                row: i,
                value: raw_ts.to_string(),
            })?;

        set.push_row(
            ts,
            fields
                .iter()
                .filter(|(code, _)| code.as_str() != TIMESTAMP_FIELD)
                .map(|(code, value)| (canonical_name(code).to_string(), value)),
        );
    }

    set.into_table()
}
