use thiserror::Error;

/// A transport record that could not be turned into a [`crate::model::tick::RawTick`].
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unrecognised timestamp '{0}'")]
    Timestamp(String),
}

/// Decimal arithmetic left the representable range.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("decimal overflow computing {0}")]
pub struct Overflow(pub &'static str);

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored value '{value}' in column {column} is not a decimal")]
    CorruptDecimal { column: &'static str, value: String },

    #[error("volume {0} exceeds the storable range")]
    VolumeOutOfRange(u64),

    #[error("store connection poisoned")]
    Poisoned,
}

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid archive key '{0}'")]
    InvalidKey(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("notification endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
