//! Benchmark utilities.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use linkrelay_engine::ScriptedConnector;
use linkrelay_testkit::{delete_envelope, link_envelope};

/// Builds a realistic mix of envelopes: creates, updates, then deletes of
/// every fourth record.
pub fn envelope_batch(count: usize) -> Vec<Vec<u8>> {
    let mut batch = Vec::with_capacity(count);
    for i in 0..count as i64 {
        let code = format!("b{i}");
        let envelope = match i % 4 {
            0 | 1 => link_envelope("c", i, &code, "https://example.com/landing"),
            2 => link_envelope("u", i - 1, &format!("b{}", i - 1), "https://example.com/moved"),
            _ => delete_envelope(i - 3),
        };
        batch.push(envelope);
    }
    batch
}

/// A scripted connector preloaded with `batch`.
pub fn scripted_stream(topic: &str, batch: &[Vec<u8>]) -> ScriptedConnector {
    let connector = ScriptedConnector::new(topic);
    for envelope in batch {
        connector.push_payload(envelope.clone());
    }
    connector
}
