use std::sync::Mutex;

use rust_decimal_macros::dec;
use tick_trend::archive::{FsArchive, RawArchive};
use tick_trend::enrichment::{EnrichmentProcessor, RecordOutcome};
use tick_trend::error::ArchiveError;
use tick_trend::invocation::InvocationStatus;
use tick_trend::model::envelope::{TransportBatch, TransportRecord};
use tick_trend::tick_store::{SqliteTickStore, TickStore};

const AAPL_TICK: &str = r#"{"symbol":"AAPL","timestamp":"2024-05-01 14:30:00","open":145,"high":152,"low":144,"price":150,"previous_close":140,"volume":1000}"#;

#[derive(Default)]
struct RecordingArchive {
    keys: Mutex<Vec<String>>,
    fail: bool,
}

impl RawArchive for RecordingArchive {
    fn put_object(&self, key: &str, _body: &[u8], content_type: &str) -> Result<(), ArchiveError> {
        assert_eq!(content_type, "application/json");
        if self.fail {
            return Err(ArchiveError::InvalidKey(key.to_string()));
        }
        self.keys.lock().unwrap().push(key.to_string());
        Ok(())
    }
}

fn tick_json(symbol: &str, timestamp: &str, price: &str) -> String {
    format!(
        r#"{{"symbol":"{}","timestamp":"{}","open":100,"high":110,"low":90,"price":{},"previous_close":100,"volume":5}}"#,
        symbol, timestamp, price
    )
}

/// The reference AAPL tick is archived verbatim and stored with the derived fields.
#[test]
fn reference_tick_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteTickStore::open(dir.path().join("ticks.sqlite")).unwrap();
    let archive = FsArchive::new(dir.path().join("archive"));
    let processor = EnrichmentProcessor::new(&store, archive);

    let outcome = processor.process_batch(&TransportBatch::from_payloads([AAPL_TICK]));
    assert_eq!(outcome.processed(), 1);
    assert_eq!(outcome.anomalies(), 1);
    assert_eq!(outcome.status(), InvocationStatus::ok("Processing Complete"));

    let rec = store.get("AAPL", "2024-05-01 14:30:00").unwrap().unwrap();
    assert_eq!(rec.change, dec!(10.00));
    assert_eq!(rec.change_percent, Some(dec!(7.14)));
    assert!(rec.anomaly);
    assert_eq!(rec.moving_average, dec!(147.75));
    assert_eq!(rec.volume, 1000);

    let archived = std::fs::read_to_string(
        dir.path()
            .join("archive/raw-data/AAPL/2024-05-01 14-30-00.json"),
    )
    .unwrap();
    let archived: serde_json::Value = serde_json::from_str(&archived).unwrap();
    let original: serde_json::Value = serde_json::from_str(AAPL_TICK).unwrap();
    assert_eq!(archived, original);
}

/// Malformed records are skipped without affecting the rest of the batch.
#[test]
fn bad_records_do_not_abort_batch() {
    let store = SqliteTickStore::open_in_memory().unwrap();
    let archive = RecordingArchive::default();
    let processor = EnrichmentProcessor::new(&store, &archive);

    let good_a = tick_json("MSFT", "2024-05-01 14:30:00", "101");
    let good_b = tick_json("MSFT", "2024-05-01 14:30:01", "102");
    let mut batch = TransportBatch::from_payloads([good_a.as_str(), "{oops", good_b.as_str()]);
    batch.records.insert(
        1,
        TransportRecord {
            kinesis: tick_trend::model::envelope::StreamData {
                data: "***".to_string(),
                partition_key: None,
                sequence_number: None,
            },
        },
    );
    batch
        .records
        .push(TransportRecord::encode(r#"{"symbol":"MSFT","price":1}"#));

    let outcome = processor.process_batch(&batch);
    assert_eq!(outcome.records.len(), 5);
    assert_eq!(outcome.processed(), 2);
    assert_eq!(outcome.skipped(), 3);
    assert_eq!(outcome.failed(), 0);
    assert_eq!(store.count("MSFT").unwrap(), 2);
    assert_eq!(outcome.status().status_code, 200);
}

/// Archive keys swap ':' for '-' and use the raw payload timestamp.
#[test]
fn archive_key_uses_raw_timestamp() {
    let store = SqliteTickStore::open_in_memory().unwrap();
    let archive = RecordingArchive::default();
    let processor = EnrichmentProcessor::new(&store, &archive);

    let payload = tick_json("TSLA", "2024-05-01T14:30:00Z", "100");
    processor.process_batch(&TransportBatch::from_payloads([payload.as_str()]));

    let keys = archive.keys.lock().unwrap().clone();
    assert_eq!(keys, vec!["raw-data/TSLA/2024-05-01T14-30-00Z.json".to_string()]);
    assert!(keys.iter().all(|k| !k.contains(':')));
    assert!(store.get("TSLA", "2024-05-01 14:30:00").unwrap().is_some());
}

/// An archive failure is isolated to its record and nothing is stored for it.
#[test]
fn archive_failure_skips_store_write() {
    let store = SqliteTickStore::open_in_memory().unwrap();
    let archive = RecordingArchive {
        fail: true,
        ..Default::default()
    };
    let processor = EnrichmentProcessor::new(&store, &archive);

    let outcome = processor.process_batch(&TransportBatch::from_payloads([AAPL_TICK]));
    assert_eq!(outcome.failed(), 1);
    assert!(matches!(
        &outcome.records[0],
        RecordOutcome::Failed { symbol, .. } if symbol == "AAPL"
    ));
    assert_eq!(store.count("AAPL").unwrap(), 0);
    assert_eq!(outcome.status(), InvocationStatus::ok("Processing Complete"));
}

/// Redelivered ticks overwrite the stored record instead of duplicating it.
#[test]
fn redelivery_is_idempotent() {
    let store = SqliteTickStore::open_in_memory().unwrap();
    let archive = RecordingArchive::default();
    let processor = EnrichmentProcessor::new(&store, &archive);

    let batch = TransportBatch::from_payloads([AAPL_TICK, AAPL_TICK]);
    let outcome = processor.process_batch(&batch);
    processor.process_batch(&batch);

    assert_eq!(outcome.processed(), 2);
    assert_eq!(store.count("AAPL").unwrap(), 1);
    let window = store.query_since("AAPL", "2024-05-01 00:00:00").unwrap();
    assert_eq!(window.len(), 1);
}

/// A zero previous close yields no percent change and no anomaly.
#[test]
fn zero_previous_close_is_stored_without_percent() {
    let store = SqliteTickStore::open_in_memory().unwrap();
    let archive = RecordingArchive::default();
    let processor = EnrichmentProcessor::new(&store, &archive);

    let payload = r#"{"symbol":"NEW","timestamp":"2024-05-01 09:30:00","open":10,"high":12,"low":9,"price":11,"previous_close":0,"volume":42}"#;
    let outcome = processor.process_batch(&TransportBatch::from_payloads([payload]));
    assert_eq!(outcome.processed(), 1);

    let rec = store.get("NEW", "2024-05-01 09:30:00").unwrap().unwrap();
    assert_eq!(rec.change, dec!(11));
    assert_eq!(rec.change_percent, None);
    assert!(!rec.anomaly);
    assert_eq!(rec.moving_average, dec!(10.5));
}

/// Ticks whose arithmetic leaves the decimal range fail alone; later ticks are still stored.
#[test]
fn out_of_range_tick_does_not_abort_batch() {
    let store = SqliteTickStore::open_in_memory().unwrap();
    let archive = RecordingArchive::default();
    let processor = EnrichmentProcessor::new(&store, &archive);

    let tiny_close = r#"{"symbol":"AAPL","timestamp":"2024-05-01 14:30:00","open":100,"high":100,"low":100,"price":100,"previous_close":"1e-27","volume":1}"#;
    let huge_prices = r#"{"symbol":"AAPL","timestamp":"2024-05-01 14:30:01","open":"5e28","high":"5e28","low":"5e28","price":"5e28","previous_close":0,"volume":1}"#;
    let good = tick_json("MSFT", "2024-05-01 14:30:02", "101");
    let batch = TransportBatch::from_payloads([tiny_close, huge_prices, good.as_str()]);

    let outcome = processor.process_batch(&batch);
    assert_eq!(outcome.failed(), 2);
    assert_eq!(outcome.processed(), 1);
    assert!(matches!(
        &outcome.records[0],
        RecordOutcome::Failed { reason, .. } if reason.contains("change_percent")
    ));
    assert!(matches!(
        &outcome.records[1],
        RecordOutcome::Failed { reason, .. } if reason.contains("moving_average")
    ));
    assert_eq!(store.count("AAPL").unwrap(), 0);
    assert_eq!(store.count("MSFT").unwrap(), 1);
    assert_eq!(outcome.status().status_code, 200);
}

/// Producer symbols are stored uppercased so they match the tracked symbol list.
#[test]
fn lowercase_symbol_is_stored_uppercased() {
    let store = SqliteTickStore::open_in_memory().unwrap();
    let archive = RecordingArchive::default();
    let processor = EnrichmentProcessor::new(&store, &archive);

    let payload = tick_json(" aapl ", "2024-05-01 14:30:00", "101");
    let outcome = processor.process_batch(&TransportBatch::from_payloads([payload.as_str()]));
    assert_eq!(outcome.processed(), 1);

    assert_eq!(store.count("AAPL").unwrap(), 1);
    assert_eq!(store.count("aapl").unwrap(), 0);
    assert_eq!(
        archive.keys.lock().unwrap().clone(),
        vec!["raw-data/AAPL/2024-05-01 14-30-00.json".to_string()]
    );
}

/// Volumes beyond the signed 64-bit range are rejected at decode, not clamped.
#[test]
fn oversized_volume_is_skipped() {
    let store = SqliteTickStore::open_in_memory().unwrap();
    let archive = RecordingArchive::default();
    let processor = EnrichmentProcessor::new(&store, &archive);

    let payload = r#"{"symbol":"AAPL","timestamp":"2024-05-01 14:30:00","open":1,"high":1,"low":1,"price":1,"previous_close":1,"volume":18446744073709551615}"#;
    let outcome = processor.process_batch(&TransportBatch::from_payloads([payload]));
    assert_eq!(outcome.skipped(), 1);
    assert_eq!(store.count("AAPL").unwrap(), 0);
}
