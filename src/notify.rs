use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::Serialize;

use crate::error::NotifyError;
use crate::model::signal::Alert;

/// Publish-only alert channel.
pub trait Notifier {
    fn publish(&self, alert: &Alert) -> Result<(), NotifyError>;
}

impl<T: Notifier + ?Sized> Notifier for &T {
    fn publish(&self, alert: &Alert) -> Result<(), NotifyError> {
        (**self).publish(alert)
    }
}

impl<T: Notifier + ?Sized> Notifier for std::sync::Arc<T> {
    fn publish(&self, alert: &Alert) -> Result<(), NotifyError> {
        (**self).publish(alert)
    }
}

impl<T: Notifier + ?Sized> Notifier for Box<T> {
    fn publish(&self, alert: &Alert) -> Result<(), NotifyError> {
        (**self).publish(alert)
    }
}

#[derive(Debug, Serialize)]
struct AlertBody<'a> {
    subject: &'a str,
    message: &'a str,
    symbol: &'a str,
    trend: &'a str,
}

impl<'a> From<&'a Alert> for AlertBody<'a> {
    fn from(alert: &'a Alert) -> Self {
        Self {
            subject: &alert.subject,
            message: &alert.message,
            symbol: &alert.symbol,
            trend: alert.signal.label(),
        }
    }
}

/// Posts each alert as JSON to an HTTP endpoint.
pub struct WebhookNotifier {
    http: reqwest::blocking::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: &str) -> Self {
        Self {
            http: reqwest::blocking::Client::new(),
            url: url.to_string(),
        }
    }
}

impl Notifier for WebhookNotifier {
    fn publish(&self, alert: &Alert) -> Result<(), NotifyError> {
        let resp = self.http.post(&self.url).json(&AlertBody::from(alert)).send()?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(NotifyError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

/// Appends one JSON line per alert to a local file.
pub struct JsonlNotifier {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonlNotifier {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }
}

impl Notifier for JsonlNotifier {
    fn publish(&self, alert: &Alert) -> Result<(), NotifyError> {
        let mut line = serde_json::to_vec(&AlertBody::from(alert))?;
        line.push(b'\n');

        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(&line)?;
        Ok(())
    }
}

/// Pick a channel implementation from the configured topic.
///
/// `http://` and `https://` topics are webhooks; anything else is a file path
/// (an optional `file://` prefix is stripped).
pub fn notifier_for_topic(topic: &str) -> Box<dyn Notifier + Send + Sync> {
    let topic = topic.trim();
    if topic.starts_with("http://") || topic.starts_with("https://") {
        Box::new(WebhookNotifier::new(topic))
    } else {
        let path = topic.strip_prefix("file://").unwrap_or(topic);
        Box::new(JsonlNotifier::new(path))
    }
}
