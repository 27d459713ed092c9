use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use crate::error::ArchiveError;

pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Write-once blob store for raw payloads.
pub trait RawArchive {
    fn put_object(&self, key: &str, body: &[u8], content_type: &str) -> Result<(), ArchiveError>;
}

impl<T: RawArchive + ?Sized> RawArchive for &T {
    fn put_object(&self, key: &str, body: &[u8], content_type: &str) -> Result<(), ArchiveError> {
        (**self).put_object(key, body, content_type)
    }
}

impl<T: RawArchive + ?Sized> RawArchive for std::sync::Arc<T> {
    fn put_object(&self, key: &str, body: &[u8], content_type: &str) -> Result<(), ArchiveError> {
        (**self).put_object(key, body, content_type)
    }
}

/// `raw-data/{symbol}/{timestamp}.json` with ':' swapped for '-' so the key
/// works as a path segment.
pub fn archive_key(symbol: &str, raw_timestamp: &str) -> String {
    format!("raw-data/{}/{}.json", symbol, raw_timestamp.replace(':', "-"))
}

/// Archive backed by a directory tree; each key becomes a relative file path.
#[derive(Debug, Clone)]
pub struct FsArchive {
    root: PathBuf,
}

#[derive(Serialize)]
struct ObjectMeta<'a> {
    content_type: &'a str,
}

impl FsArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, key: &str) -> Result<PathBuf, ArchiveError> {
        let rel = Path::new(key);
        let valid = !key.is_empty()
            && rel
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(ArchiveError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(rel))
    }
}

impl RawArchive for FsArchive {
    fn put_object(&self, key: &str, body: &[u8], content_type: &str) -> Result<(), ArchiveError> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, body)?;

        let mut meta_path = path.into_os_string();
        meta_path.push(".meta.json");
        std::fs::write(meta_path, serde_json::to_vec(&ObjectMeta { content_type })?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_replaces_colons() {
        assert_eq!(
            archive_key("AAPL", "2024-05-01 14:30:00"),
            "raw-data/AAPL/2024-05-01 14-30-00.json"
        );
        assert!(!archive_key("AAPL", "2024-05-01T14:30:00+02:00").contains(':'));
    }

    #[test]
    fn writes_body_and_content_type() {
        let dir = tempfile::tempdir().unwrap();
        let archive = FsArchive::new(dir.path());
        let key = archive_key("AAPL", "2024-05-01 14:30:00");
        archive
            .put_object(&key, br#"{"symbol":"AAPL"}"#, JSON_CONTENT_TYPE)
            .unwrap();

        let body = std::fs::read_to_string(dir.path().join(&key)).unwrap();
        assert_eq!(body, r#"{"symbol":"AAPL"}"#);
        let meta = std::fs::read_to_string(dir.path().join(format!("{}.meta.json", key))).unwrap();
        assert!(meta.contains("application/json"));
    }

    #[test]
    fn rejects_escaping_keys() {
        let dir = tempfile::tempdir().unwrap();
        let archive = FsArchive::new(dir.path());
        for key in ["", "../outside.json", "/etc/passwd", "raw-data/../../x.json"] {
            let err = archive.put_object(key, b"{}", JSON_CONTENT_TYPE).unwrap_err();
            assert!(matches!(err, ArchiveError::InvalidKey(_)), "{}", key);
        }
    }
}
