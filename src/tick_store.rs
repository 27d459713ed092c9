use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;

use crate::error::StoreError;
use crate::model::enriched::EnrichedRecord;

/// Time-series store keyed by (symbol, timestamp).
pub trait TickStore {
    /// Insert or overwrite the record with the same symbol and timestamp.
    fn put_record(&self, record: &EnrichedRecord) -> Result<(), StoreError>;

    /// All records for `symbol` with `timestamp >= threshold`, oldest first.
    fn query_since(&self, symbol: &str, threshold: &str)
        -> Result<Vec<EnrichedRecord>, StoreError>;
}

impl<T: TickStore + ?Sized> TickStore for &T {
    fn put_record(&self, record: &EnrichedRecord) -> Result<(), StoreError> {
        (**self).put_record(record)
    }

    fn query_since(
        &self,
        symbol: &str,
        threshold: &str,
    ) -> Result<Vec<EnrichedRecord>, StoreError> {
        (**self).query_since(symbol, threshold)
    }
}

impl<T: TickStore + ?Sized> TickStore for std::sync::Arc<T> {
    fn put_record(&self, record: &EnrichedRecord) -> Result<(), StoreError> {
        (**self).put_record(record)
    }

    fn query_since(
        &self,
        symbol: &str,
        threshold: &str,
    ) -> Result<Vec<EnrichedRecord>, StoreError> {
        (**self).query_since(symbol, threshold)
    }
}

pub struct SqliteTickStore {
    conn: Mutex<Connection>,
}

impl SqliteTickStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS enriched_ticks (
                symbol TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                open TEXT NOT NULL,
                high TEXT NOT NULL,
                low TEXT NOT NULL,
                price TEXT NOT NULL,
                previous_close TEXT NOT NULL,
                volume INTEGER NOT NULL,
                change TEXT NOT NULL,
                change_percent TEXT,
                moving_average TEXT NOT NULL,
                anomaly INTEGER NOT NULL,
                PRIMARY KEY(symbol, timestamp)
            );
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Number of stored records for `symbol`.
    pub fn count(&self, symbol: &str) -> Result<u64, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let n = conn.query_row(
            "SELECT COUNT(*) FROM enriched_ticks WHERE symbol = ?1",
            [symbol],
            |row| row.get::<_, i64>(0),
        )?;
        Ok(n as u64)
    }

    pub fn get(&self, symbol: &str, timestamp: &str) -> Result<Option<EnrichedRecord>, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM enriched_ticks WHERE symbol = ?1 AND timestamp = ?2",
                    COLUMNS
                ),
                [symbol, timestamp],
                StoredRow::from_row,
            )
            .optional()?;
        row.map(StoredRow::into_record).transpose()
    }
}

const COLUMNS: &str = "symbol, timestamp, open, high, low, price, previous_close, volume, \
                       change, change_percent, moving_average, anomaly";

impl TickStore for SqliteTickStore {
    fn put_record(&self, record: &EnrichedRecord) -> Result<(), StoreError> {
        let volume =
            i64::try_from(record.volume).map_err(|_| StoreError::VolumeOutOfRange(record.volume))?;
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        conn.execute(
            r#"
            INSERT INTO enriched_ticks (
                symbol, timestamp, open, high, low, price, previous_close, volume,
                change, change_percent, moving_average, anomaly
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ON CONFLICT(symbol, timestamp) DO UPDATE SET
                open = excluded.open,
                high = excluded.high,
                low = excluded.low,
                price = excluded.price,
                previous_close = excluded.previous_close,
                volume = excluded.volume,
                change = excluded.change,
                change_percent = excluded.change_percent,
                moving_average = excluded.moving_average,
                anomaly = excluded.anomaly
            "#,
            params![
                record.symbol,
                record.timestamp,
                record.open.to_string(),
                record.high.to_string(),
                record.low.to_string(),
                record.price.to_string(),
                record.previous_close.to_string(),
                volume,
                record.change.to_string(),
                record.change_percent.map(|p| p.to_string()),
                record.moving_average.to_string(),
                record.anomaly,
            ],
        )?;
        Ok(())
    }

    fn query_since(
        &self,
        symbol: &str,
        threshold: &str,
    ) -> Result<Vec<EnrichedRecord>, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT {}
            FROM enriched_ticks
            WHERE symbol = ?1 AND timestamp >= ?2
            ORDER BY timestamp ASC
            "#,
            COLUMNS
        ))?;

        let rows = stmt.query_map([symbol, threshold], StoredRow::from_row)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?.into_record()?);
        }
        Ok(records)
    }
}

/// Raw column values before the decimal TEXT columns are parsed.
struct StoredRow {
    symbol: String,
    timestamp: String,
    open: String,
    high: String,
    low: String,
    price: String,
    previous_close: String,
    volume: i64,
    change: String,
    change_percent: Option<String>,
    moving_average: String,
    anomaly: bool,
}

impl StoredRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            symbol: row.get(0)?,
            timestamp: row.get(1)?,
            open: row.get(2)?,
            high: row.get(3)?,
            low: row.get(4)?,
            price: row.get(5)?,
            previous_close: row.get(6)?,
            volume: row.get(7)?,
            change: row.get(8)?,
            change_percent: row.get(9)?,
            moving_average: row.get(10)?,
            anomaly: row.get(11)?,
        })
    }

    fn into_record(self) -> Result<EnrichedRecord, StoreError> {
        Ok(EnrichedRecord {
            open: decimal_column("open", &self.open)?,
            high: decimal_column("high", &self.high)?,
            low: decimal_column("low", &self.low)?,
            price: decimal_column("price", &self.price)?,
            previous_close: decimal_column("previous_close", &self.previous_close)?,
            volume: self.volume.max(0) as u64,
            change: decimal_column("change", &self.change)?,
            change_percent: self
                .change_percent
                .as_deref()
                .map(|v| decimal_column("change_percent", v))
                .transpose()?,
            moving_average: decimal_column("moving_average", &self.moving_average)?,
            anomaly: self.anomaly,
            symbol: self.symbol,
            timestamp: self.timestamp,
        })
    }
}

fn decimal_column(column: &'static str, value: &str) -> Result<Decimal, StoreError> {
    Decimal::from_str(value).map_err(|_| StoreError::CorruptDecimal {
        column,
        value: value.to_string(),
    })
}
