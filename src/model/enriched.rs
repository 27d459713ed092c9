use rust_decimal::Decimal;
use serde::Serialize;

/// A tick plus the metrics derived from it, as persisted in the time-series store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedRecord {
    pub symbol: String,
    /// Normalised sort key (`YYYY-MM-DD HH:MM:SS`).
    pub timestamp: String,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub price: Decimal,
    pub previous_close: Decimal,
    pub volume: u64,
    pub change: Decimal,
    /// `None` when `previous_close` is zero.
    pub change_percent: Option<Decimal>,
    /// Typical price of this one tick, not a time-series average.
    pub moving_average: Decimal,
    pub anomaly: bool,
}
