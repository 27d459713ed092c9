use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::model::tick::RawTick;

/// A batch of stream records as handed over by the ingestion trigger.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransportBatch {
    #[serde(rename = "Records", default)]
    pub records: Vec<TransportRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportRecord {
    pub kinesis: StreamData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamData {
    /// Base64 encoded UTF-8 JSON tick.
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_number: Option<String>,
}

/// A successfully decoded record: the payload as parsed plus its typed view.
#[derive(Debug, Clone)]
pub struct DecodedTick {
    pub payload: serde_json::Value,
    pub tick: RawTick,
    pub sort_key: String,
}

impl TransportRecord {
    /// Wrap a JSON payload the way the producer side does.
    pub fn encode(payload: &str) -> Self {
        Self {
            kinesis: StreamData {
                data: STANDARD.encode(payload.as_bytes()),
                partition_key: None,
                sequence_number: None,
            },
        }
    }

    pub fn decode(&self) -> Result<DecodedTick, DecodeError> {
        let bytes = STANDARD.decode(self.kinesis.data.trim())?;
        let text = String::from_utf8(bytes)?;
        let payload: serde_json::Value = serde_json::from_str(&text)?;
        let tick = RawTick::from_value(payload.clone())?;
        let sort_key = tick.sort_key()?;
        Ok(DecodedTick {
            payload,
            tick,
            sort_key,
        })
    }
}

impl TransportBatch {
    pub fn from_payloads<'a>(payloads: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            records: payloads.into_iter().map(TransportRecord::encode).collect(),
        }
    }
}
