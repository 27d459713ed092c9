use rust_decimal::Decimal;

use crate::model::enriched::EnrichedRecord;

/// Trailing history for one symbol, oldest first.
#[derive(Debug, Clone, Default)]
pub struct TrendWindow {
    records: Vec<EnrichedRecord>,
}

impl TrendWindow {
    /// Sorts by timestamp regardless of the order the store returned.
    /// The sort is stable, so duplicate timestamps keep their relative order.
    pub fn new(mut records: Vec<EnrichedRecord>) -> Self {
        records.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[EnrichedRecord] {
        &self.records
    }

    pub fn prices(&self) -> Vec<Decimal> {
        self.records.iter().map(|r| r.price).collect()
    }

    pub fn latest(&self) -> Option<&EnrichedRecord> {
        self.records.last()
    }
}
