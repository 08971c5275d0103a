//! Strict field extraction from loosely-typed row images.
//!
//! One parse function per field kind, each with explicit null and type
//! checks. Errors always name the field and the JSON type actually found.

use crate::envelope::RowImage;
use crate::error::{DecodeError, DecodeResult, JsonKind};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Number, Value};

/// Textual timestamp format used by the change log (UTC, literal `Z`).
///
/// Fractional seconds after the seconds field are accepted when parsing.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";

/// Largest magnitude at which every integer is exactly representable as `f64`.
const MAX_EXACT_FLOAT_INT: f64 = 9_007_199_254_740_992.0; // 2^53

/// Extracts a 64-bit identifier.
///
/// Integer and floating-point JSON numbers are both accepted; a float must be
/// finite, integral, and within ±2^53.
pub fn parse_id(image: &RowImage, field: &str) -> DecodeResult<i64> {
    match image.get(field) {
        Some(Value::Number(number)) => number_to_i64(number, field),
        other => Err(type_error(field, "integer", JsonKind::of(other))),
    }
}

/// Extracts a required string field.
pub fn parse_string(image: &RowImage, field: &str) -> DecodeResult<String> {
    match image.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        other => Err(type_error(field, "string", JsonKind::of(other))),
    }
}

/// Extracts a required timestamp field.
pub fn parse_timestamp(image: &RowImage, field: &str) -> DecodeResult<DateTime<Utc>> {
    match image.get(field) {
        Some(Value::String(s)) => parse_timestamp_str(s, field),
        other => Err(type_error(field, "timestamp string", JsonKind::of(other))),
    }
}

/// Extracts an optional timestamp field.
///
/// Missing or null yields `None`; a present value must be valid.
pub fn parse_optional_timestamp(
    image: &RowImage,
    field: &str,
) -> DecodeResult<Option<DateTime<Utc>>> {
    match image.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => parse_timestamp(image, field).map(Some),
    }
}

/// Formats a timestamp the way the change log writes it.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

fn parse_timestamp_str(value: &str, field: &str) -> DecodeResult<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| DecodeError::InvalidTimestamp {
            field: field.to_string(),
            value: value.to_string(),
            reason: e.to_string(),
        })
}

fn number_to_i64(number: &Number, field: &str) -> DecodeResult<i64> {
    if let Some(v) = number.as_i64() {
        return Ok(v);
    }

    let invalid = || DecodeError::InvalidId {
        field: field.to_string(),
        value: number.to_string(),
    };

    // u64 above i64::MAX
    if number.is_u64() {
        return Err(invalid());
    }

    match number.as_f64() {
        Some(f) if f.is_finite() && f.fract() == 0.0 && f.abs() <= MAX_EXACT_FLOAT_INT => {
            Ok(f as i64)
        }
        _ => Err(invalid()),
    }
}

fn type_error(field: &str, expected: &'static str, actual: JsonKind) -> DecodeError {
    if actual.is_absent() {
        DecodeError::MissingField {
            field: field.to_string(),
            actual,
        }
    } else {
        DecodeError::WrongType {
            field: field.to_string(),
            expected,
            actual,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};
    use serde_json::json;

    fn image(value: Value) -> RowImage {
        RowImage::try_from(value).unwrap()
    }

    #[test]
    fn id_accepts_integer_and_integral_float() {
        let img = image(json!({"a": 42, "b": 42.0, "c": -7.0}));
        assert_eq!(parse_id(&img, "a").unwrap(), 42);
        assert_eq!(parse_id(&img, "b").unwrap(), 42);
        assert_eq!(parse_id(&img, "c").unwrap(), -7);
    }

    #[test]
    fn id_rejects_fractional_and_huge_floats() {
        let img = image(json!({"a": 42.5, "b": 1.0e19, "c": 18446744073709551615u64}));
        assert!(matches!(
            parse_id(&img, "a"),
            Err(DecodeError::InvalidId { ref field, .. }) if field == "a"
        ));
        assert!(matches!(parse_id(&img, "b"), Err(DecodeError::InvalidId { .. })));
        assert!(matches!(parse_id(&img, "c"), Err(DecodeError::InvalidId { .. })));
    }

    #[test]
    fn id_rejects_other_types() {
        let img = image(json!({"id": "42", "nil": null}));
        assert_eq!(
            parse_id(&img, "id").unwrap_err(),
            DecodeError::WrongType {
                field: "id".into(),
                expected: "integer",
                actual: JsonKind::String,
            }
        );
        assert_eq!(
            parse_id(&img, "nil").unwrap_err(),
            DecodeError::MissingField {
                field: "nil".into(),
                actual: JsonKind::Null,
            }
        );
        assert_eq!(
            parse_id(&img, "absent").unwrap_err(),
            DecodeError::MissingField {
                field: "absent".into(),
                actual: JsonKind::Missing,
            }
        );
    }

    #[test]
    fn string_requires_string() {
        let img = image(json!({"s": "abc", "n": 5}));
        assert_eq!(parse_string(&img, "s").unwrap(), "abc");
        assert!(matches!(
            parse_string(&img, "n"),
            Err(DecodeError::WrongType { actual: JsonKind::Number, .. })
        ));
    }

    #[test]
    fn timestamp_parses_fixed_format() {
        let img = image(json!({
            "t": "2024-05-01T12:30:45Z",
            "frac": "2024-05-01T12:30:45.250Z",
        }));
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 45).unwrap();
        assert_eq!(parse_timestamp(&img, "t").unwrap(), expected);

        let frac = parse_timestamp(&img, "frac").unwrap();
        assert_eq!(frac.with_nanosecond(0).unwrap(), expected);
        assert_eq!(frac.nanosecond(), 250_000_000);
    }

    #[test]
    fn timestamp_rejects_other_formats() {
        let img = image(json!({
            "offset": "2024-05-01T12:30:45+02:00",
            "date": "2024-05-01",
            "num": 1714566645,
        }));
        assert!(matches!(
            parse_timestamp(&img, "offset"),
            Err(DecodeError::InvalidTimestamp { .. })
        ));
        assert!(matches!(
            parse_timestamp(&img, "date"),
            Err(DecodeError::InvalidTimestamp { .. })
        ));
        assert!(matches!(
            parse_timestamp(&img, "num"),
            Err(DecodeError::WrongType { actual: JsonKind::Number, .. })
        ));
    }

    #[test]
    fn optional_timestamp() {
        let img = image(json!({"nil": null, "bad": "soon", "ok": "2030-01-01T00:00:00Z"}));
        assert_eq!(parse_optional_timestamp(&img, "nil").unwrap(), None);
        assert_eq!(parse_optional_timestamp(&img, "missing").unwrap(), None);
        assert!(parse_optional_timestamp(&img, "ok").unwrap().is_some());
        assert!(matches!(
            parse_optional_timestamp(&img, "bad"),
            Err(DecodeError::InvalidTimestamp { ref field, .. }) if field == "bad"
        ));
    }

    #[test]
    fn format_matches_parse() {
        let ts = Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap();
        assert_eq!(format_timestamp(&ts), "2023-12-31T23:59:59Z");
    }
}
