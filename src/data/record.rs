//! Fixed-width numeric records and the text codec that produces them.
//!
//! A raw message is UTF-8 text holding comma-separated decimal literals, for
//! example `"1700000000.25, 0.5, -1.75"`. Parsing happens in two steps, in this
//! order:
//!
//! 1. Every field is parsed as an `f64`. Surrounding whitespace is ignored. Any
//!    failure (non-UTF-8 payload, empty field, empty message, bad literal)
//!    rejects the whole message with [`StreamError::InvalidData`].
//! 2. The number of fields is compared against the expected width. A mismatch
//!    rejects the message with [`StreamError::InvalidWidth`].

use crate::error::{AppResult, StreamError};
use serde::Serialize;
use std::ops::Deref;

/// Separator between fields of a raw message.
pub const FIELD_SEPARATOR: char = ',';

/// One sample: an ordered, fixed-length tuple of floating-point values.
///
/// The listener imposes no meaning on positions. By convention publishers put a
/// timestamp first, which is why [`Record::first`] exists.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record(Box<[f64]>);

impl Record {
    /// Number of values in the record.
    pub fn width(&self) -> usize {
        self.0.len()
    }

    /// The values, in message order.
    pub fn values(&self) -> &[f64] {
        &self.0
    }

    /// First value, conventionally the sample timestamp.
    pub fn first(&self) -> Option<f64> {
        self.0.first().copied()
    }

    /// Consumes the record, returning its values.
    pub fn into_vec(self) -> Vec<f64> {
        self.0.into_vec()
    }
}

impl Deref for Record {
    type Target = [f64];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<f64>> for Record {
    fn from(values: Vec<f64>) -> Self {
        Self(values.into_boxed_slice())
    }
}

impl<const N: usize> From<[f64; N]> for Record {
    fn from(values: [f64; N]) -> Self {
        Self(Box::new(values))
    }
}

/// Parse every field of `raw` without checking the width.
pub fn parse_fields(raw: &[u8]) -> AppResult<Vec<f64>> {
    let text = std::str::from_utf8(raw).map_err(|e| StreamError::InvalidData {
        raw: String::from_utf8_lossy(raw).into_owned(),
        reason: e.to_string(),
    })?;

    text.split(FIELD_SEPARATOR)
        .map(|field| {
            field
                .trim()
                .parse::<f64>()
                .map_err(|e| StreamError::InvalidData {
                    raw: text.to_string(),
                    reason: format!("field '{}': {}", field.trim(), e),
                })
        })
        .collect()
}

/// Parse `raw` into a [`Record`] of exactly `width` values.
///
/// # Example
/// ```
/// use streamplt::data::record::parse_record;
///
/// let record = parse_record(b"1.0, 2.5", 2).unwrap();
/// assert_eq!(record.values(), &[1.0, 2.5]);
/// assert!(parse_record(b"1.0,2.5", 3).is_err());
/// ```
pub fn parse_record(raw: &[u8], width: usize) -> AppResult<Record> {
    let values = parse_fields(raw)?;

    if values.len() != width {
        return Err(StreamError::InvalidWidth {
            expected: width,
            actual: values.len(),
        });
    }

    Ok(Record::from(values))
}
