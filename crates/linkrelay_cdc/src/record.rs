//! The mirrored link record.

use crate::envelope::RowImage;
use crate::error::DecodeResult;
use crate::fields::{parse_id, parse_optional_timestamp, parse_string, parse_timestamp};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A short link as stored on the read side.
///
/// Records are only ever replaced as a whole; there is no partial update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    /// Immutable identifier assigned by the write path.
    pub id: i64,
    /// Short code, unique per record.
    pub short_code: String,
    /// Redirect target.
    pub long_url: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Expiry time; `None` never expires.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl LinkRecord {
    /// Builds a record from a row image.
    ///
    /// # Errors
    ///
    /// Returns a field-named error for the first column that is missing or
    /// has the wrong type.
    pub fn from_image(image: &RowImage) -> DecodeResult<Self> {
        Ok(Self {
            id: parse_id(image, "id")?,
            short_code: parse_string(image, "short_code")?,
            long_url: parse_string(image, "long_url")?,
            created_at: parse_timestamp(image, "created_at")?,
            expires_at: parse_optional_timestamp(image, "expires_at")?,
        })
    }
}
