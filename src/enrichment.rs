use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::archive::{archive_key, RawArchive, JSON_CONTENT_TYPE};
use crate::error::Overflow;
use crate::indicator::{round_money, typical_price};
use crate::invocation::InvocationStatus;
use crate::model::enriched::EnrichedRecord;
use crate::model::envelope::{DecodedTick, TransportBatch, TransportRecord};
use crate::model::tick::RawTick;
use crate::tick_store::TickStore;

/// Absolute percent move beyond which a tick is flagged.
pub const ANOMALY_THRESHOLD_PERCENT: Decimal = dec!(5);

/// Derive change, percent change, typical price and the anomaly flag.
///
/// `sort_key` is the normalised timestamp the record is stored under.
/// Inputs at the edge of the decimal range fail with [`Overflow`].
pub fn enrich(tick: &RawTick, sort_key: &str) -> Result<EnrichedRecord, Overflow> {
    let change = tick
        .price
        .checked_sub(tick.previous_close)
        .map(round_money)
        .ok_or(Overflow("change"))?;
    let change_percent = if tick.previous_close.is_zero() {
        None
    } else {
        let percent = change
            .checked_div(tick.previous_close)
            .and_then(|ratio| ratio.checked_mul(dec!(100)))
            .ok_or(Overflow("change_percent"))?;
        Some(round_money(percent))
    };
    let anomaly = change_percent.is_some_and(|p| p.abs() > ANOMALY_THRESHOLD_PERCENT);
    let moving_average = typical_price(tick.open, tick.high, tick.low, tick.price)?;

    Ok(EnrichedRecord {
        symbol: tick.symbol.clone(),
        timestamp: sort_key.to_string(),
        open: tick.open,
        high: tick.high,
        low: tick.low,
        price: tick.price,
        previous_close: tick.previous_close,
        volume: tick.volume,
        change,
        change_percent,
        moving_average,
        anomaly,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    Processed {
        symbol: String,
        timestamp: String,
        anomaly: bool,
    },
    /// The record could not be decoded; nothing was written.
    Skipped { reason: String },
    /// Decoded, but archiving, enrichment or persisting failed.
    Failed { symbol: String, reason: String },
}

#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub records: Vec<RecordOutcome>,
}

impl BatchOutcome {
    pub fn processed(&self) -> usize {
        self.count(|o| matches!(o, RecordOutcome::Processed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, RecordOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, RecordOutcome::Failed { .. }))
    }

    pub fn anomalies(&self) -> usize {
        self.count(|o| matches!(o, RecordOutcome::Processed { anomaly: true, .. }))
    }

    fn count(&self, pred: impl Fn(&RecordOutcome) -> bool) -> usize {
        self.records.iter().filter(|o| pred(o)).count()
    }

    /// Partial failures never fail the invocation.
    pub fn status(&self) -> InvocationStatus {
        InvocationStatus::ok("Processing Complete")
    }
}

pub struct EnrichmentProcessor<S, A> {
    store: S,
    archive: A,
}

impl<S: TickStore, A: RawArchive> EnrichmentProcessor<S, A> {
    pub fn new(store: S, archive: A) -> Self {
        Self { store, archive }
    }

    pub fn process_batch(&self, batch: &TransportBatch) -> BatchOutcome {
        let invocation_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("enrichment", %invocation_id, records = batch.records.len());
        let _enter = span.enter();

        let records: Vec<RecordOutcome> = batch
            .records
            .iter()
            .map(|record| self.process_record(record))
            .collect();
        let outcome = BatchOutcome { records };

        tracing::info!(
            processed = outcome.processed(),
            skipped = outcome.skipped(),
            failed = outcome.failed(),
            anomalies = outcome.anomalies(),
            "Batch processed"
        );
        outcome
    }

    pub fn process_record(&self, record: &TransportRecord) -> RecordOutcome {
        let decoded = match record.decode() {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping undecodable record");
                return RecordOutcome::Skipped {
                    reason: e.to_string(),
                };
            }
        };
        tracing::debug!(payload = %decoded.payload, "Processing record");

        match self.archive_and_store(&decoded) {
            Ok(enriched) => {
                tracing::info!(
                    symbol = %enriched.symbol,
                    timestamp = %enriched.timestamp,
                    change = %enriched.change,
                    anomaly = enriched.anomaly,
                    "Tick enriched"
                );
                RecordOutcome::Processed {
                    symbol: enriched.symbol,
                    timestamp: enriched.timestamp,
                    anomaly: enriched.anomaly,
                }
            }
            Err(reason) => {
                tracing::error!(symbol = %decoded.tick.symbol, error = %reason, "Failed to process record");
                RecordOutcome::Failed {
                    symbol: decoded.tick.symbol.clone(),
                    reason,
                }
            }
        }
    }

    fn archive_and_store(&self, decoded: &DecodedTick) -> Result<EnrichedRecord, String> {
        let key = archive_key(&decoded.tick.symbol, &decoded.tick.timestamp);
        let body = serde_json::to_vec(&decoded.payload).map_err(|e| e.to_string())?;
        self.archive
            .put_object(&key, &body, JSON_CONTENT_TYPE)
            .map_err(|e| format!("archive {}: {}", key, e))?;

        let enriched = enrich(&decoded.tick, &decoded.sort_key).map_err(|e| e.to_string())?;
        self.store
            .put_record(&enriched)
            .map_err(|e| format!("store: {}", e))?;
        Ok(enriched)
    }
}
