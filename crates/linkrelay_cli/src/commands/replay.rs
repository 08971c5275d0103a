//! Replay command implementation.

use super::{CommandError, OutputFormat};
use linkrelay_engine::{ApplyOutcome, JournalRecordStore, Reconciler, RecordStore};
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Counts of outcomes from a replay.
#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Non-blank lines read.
    pub envelopes: u64,
    /// Records inserted or replaced.
    pub upserted: u64,
    /// Records removed.
    pub deleted: u64,
    /// Deletes of records that were already gone.
    pub already_absent: u64,
    /// Lines that were logged and dropped.
    pub dropped: u64,
    /// Records in the store afterwards.
    pub records: usize,
}

impl ReplaySummary {
    fn record(&mut self, outcome: &ApplyOutcome) {
        match outcome {
            ApplyOutcome::Upserted(_) => self.upserted += 1,
            ApplyOutcome::Deleted(_) => self.deleted += 1,
            ApplyOutcome::AlreadyAbsent(_) => self.already_absent += 1,
            ApplyOutcome::Dropped(_) => self.dropped += 1,
        }
    }
}

/// Applies every envelope in `input` to `store`, one per line.
pub fn replay_into<S: RecordStore>(
    input: impl BufRead,
    store: Arc<S>,
) -> Result<ReplaySummary, CommandError> {
    let reconciler = Reconciler::new(store);
    let mut summary = ReplaySummary::default();

    for line in input.lines() {
        let line = line.map_err(|e| CommandError::Runtime(e.to_string()))?;
        if line.trim().is_empty() {
            continue;
        }
        summary.envelopes += 1;
        let outcome = reconciler.apply_raw(line.as_bytes());
        summary.record(&outcome);
    }
    Ok(summary)
}

/// Runs the replay command.
pub fn run(
    file: &Path,
    journal: &Path,
    compact: bool,
    format: OutputFormat,
) -> Result<(), CommandError> {
    let input = File::open(file).map_err(|e| CommandError::read(file, e))?;
    let store = Arc::new(JournalRecordStore::open(journal)?);

    let mut summary = replay_into(BufReader::new(input), Arc::clone(&store))?;
    summary.records = store.len();
    if compact {
        store.compact()?;
    }
    info!(
        file = %file.display(),
        journal = %journal.display(),
        envelopes = summary.envelopes,
        "replay finished"
    );

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Text => {
            println!("Envelopes:      {}", summary.envelopes);
            println!("Upserted:       {}", summary.upserted);
            println!("Deleted:        {}", summary.deleted);
            println!("Already absent: {}", summary.already_absent);
            println!("Dropped:        {}", summary.dropped);
            println!("Records:        {}", summary.records);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkrelay_engine::MemoryRecordStore;
    use linkrelay_testkit::{delete_envelope, link_envelope, TempJournal};
    use std::io::Cursor;

    fn lines(envelopes: &[Vec<u8>]) -> Vec<u8> {
        let mut out = Vec::new();
        for envelope in envelopes {
            out.extend_from_slice(envelope);
            out.push(b'\n');
        }
        out
    }

    #[test]
    fn counts_outcomes() {
        let mut input = lines(&[
            link_envelope("c", 1, "a", "http://a"),
            link_envelope("u", 1, "a", "http://b"),
            delete_envelope(1),
            delete_envelope(1),
            b"not json".to_vec(),
        ]);
        input.extend_from_slice(b"\n   \n");

        let store = Arc::new(MemoryRecordStore::new());
        let summary = replay_into(Cursor::new(input), Arc::clone(&store)).unwrap();

        assert_eq!(
            summary,
            ReplaySummary {
                envelopes: 5,
                upserted: 2,
                deleted: 1,
                already_absent: 1,
                dropped: 1,
                records: 0,
            }
        );
        assert!(store.is_empty());
    }

    #[test]
    fn replays_file_into_journal() {
        let journal = TempJournal::new();
        let input = journal.path.with_file_name("events.jsonl");
        std::fs::write(
            &input,
            lines(&[
                link_envelope("c", 1, "a", "http://a"),
                link_envelope("c", 2, "b", "http://b"),
            ]),
        )
        .unwrap();

        run(&input, &journal.path, true, OutputFormat::Text).unwrap();

        let store = JournalRecordStore::open(&journal.path).unwrap();
        assert_eq!(store.len(), 2);
    }
}
