//! Property-based test generators using proptest.
//!
//! Provides strategies for generating records and change streams. Change
//! streams draw ids and short codes from small pools, so rows are revisited
//! and short codes move between ids.

use chrono::{DateTime, Utc};
use linkrelay_cdc::LinkRecord;
use proptest::prelude::*;

/// Upper bound for generated timestamps (2100-01-01).
const MAX_EPOCH_SECONDS: i64 = 4_102_444_800;

/// Strategy for whole-second UTC timestamps.
pub fn timestamp_strategy() -> impl Strategy<Value = DateTime<Utc>> {
    (0..MAX_EPOCH_SECONDS)
        .prop_map(|secs| DateTime::from_timestamp(secs, 0).expect("timestamp in range"))
}

/// Strategy for URL-safe short codes.
pub fn short_code_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9_-]{1,12}").expect("Invalid regex")
}

/// Strategy for redirect targets.
pub fn long_url_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("https?://[a-z]{1,12}\\.(com|org|io)(/[a-zA-Z0-9%._-]{0,24}){0,3}")
        .expect("Invalid regex")
}

/// Strategy for a record with the given id.
pub fn link_record_for_id(id: i64) -> impl Strategy<Value = LinkRecord> {
    link_record_with_codes(id, short_code_strategy())
}

fn link_record_with_codes(
    id: i64,
    codes: impl Strategy<Value = String>,
) -> impl Strategy<Value = LinkRecord> {
    (
        codes,
        long_url_strategy(),
        timestamp_strategy(),
        prop::option::of(timestamp_strategy()),
    )
        .prop_map(move |(code, long_url, created_at, expires_at)| LinkRecord {
            id,
            short_code: code,
            long_url,
            created_at,
            expires_at,
        })
}

/// Strategy for a record with any positive id.
pub fn link_record_strategy() -> impl Strategy<Value = LinkRecord> {
    (1..i64::MAX).prop_flat_map(link_record_for_id)
}

/// One step of a generated change stream.
#[derive(Debug, Clone)]
pub struct ChangeStep {
    /// Operation code (`c`, `u`, `r` or `d`).
    pub op: &'static str,
    /// Record the operation applies to.
    pub record: LinkRecord,
}

/// Short codes shared by every id in a generated change stream.
const SHARED_CODES: &[&str] = &["j", "k", "m", "n"];

/// Strategy for change streams over small id and short code pools, so ids
/// repeat, updates and deletes hit existing rows, and distinct ids hold the
/// same code.
pub fn change_stream_strategy(max_len: usize) -> impl Strategy<Value = Vec<ChangeStep>> {
    let codes = || prop::sample::select(SHARED_CODES).prop_map(str::to_string);
    prop::collection::vec(
        (
            prop::sample::select(vec!["c", "u", "r", "d"]),
            (1..8i64).prop_flat_map(move |id| link_record_with_codes(id, codes())),
        )
            .prop_map(|(op, record)| ChangeStep { op, record }),
        0..max_len,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::envelope_for;
    use linkrelay_cdc::decode;

    proptest! {
        #[test]
        fn generated_records_survive_the_wire(record in link_record_strategy()) {
            let event = decode(&envelope_for("c", &record)).unwrap();
            prop_assert_eq!(event.link_record().unwrap(), record);
        }

        #[test]
        fn records_keep_their_id(record in link_record_for_id(5)) {
            prop_assert_eq!(record.id, 5);
        }

        #[test]
        fn change_streams_draw_from_shared_codes(steps in change_stream_strategy(16)) {
            for step in &steps {
                prop_assert!(SHARED_CODES.contains(&step.record.short_code.as_str()));
            }
        }
    }
}
