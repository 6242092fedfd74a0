//! Remote copy of the session log as GELF 1.1 datagrams.
//!
//! Each event becomes one uncompressed JSON datagram. Session fields are sent
//! as `_`-prefixed additional fields so Graylog can index them.

use serde_json::{Map, Value, json};
use tokio::net::{UdpSocket, lookup_host};
use tracing::debug;

use crate::error::{StorageError, StorageResult};
use crate::models::EventRecord;

/// Syslog "informational".
const GELF_LEVEL_INFO: u8 = 6;

/// UDP sender for a Graylog GELF input.
#[derive(Debug)]
pub struct GelfSink {
    socket: UdpSocket,
    endpoint: String,
    host: String,
}

impl GelfSink {
    /// Resolve `endpoint` (`host:port`) and bind a local socket for it.
    ///
    /// `host` is reported as the message source.
    pub async fn connect(endpoint: &str, host: impl Into<String>) -> StorageResult<Self> {
        let target = lookup_host(endpoint)
            .await
            .map_err(|e| StorageError::remote_sink(endpoint, e.to_string()))?
            .next()
            .ok_or_else(|| StorageError::remote_sink(endpoint, "no address"))?;

        let local = if target.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(local).await?;
        socket.connect(target).await?;
        debug!(%endpoint, %target, "GELF sink connected");

        Ok(Self {
            socket,
            endpoint: endpoint.to_string(),
            host: host.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send one event.
    pub async fn send(&self, record: &EventRecord) -> StorageResult<()> {
        let payload = serde_json::to_vec(&gelf_message(record, &self.host))?;
        self.socket.send(&payload).await?;
        Ok(())
    }
}

/// Build the GELF document for an event.
pub fn gelf_message(record: &EventRecord, host: &str) -> Value {
    let mut message = json!({
        "version": "1.1",
        "host": host,
        "short_message": format!("User action: {}", record.action),
        "full_message": record.text_line(),
        "timestamp": record.timestamp.timestamp_millis() as f64 / 1000.0,
        "level": GELF_LEVEL_INFO,
        "_action": record.action.as_str(),
        "_first_name": record.user.first_name,
        "_last_name": record.user.last_name,
        "_permission": record.permission,
        "_station": record.station,
    });

    let mut extra = Map::new();
    if let Some(duration) = record.duration {
        extra.insert("_duration".into(), json!(duration.to_string()));
        extra.insert("_duration_secs".into(), json!(duration.as_secs()));
    }
    if let Some(rating) = record.rating {
        extra.insert("_rating".into(), json!(rating));
    }
    if let Some(comments) = &record.comments {
        extra.insert("_comments".into(), json!(comments));
    }
    if let Some(usage) = record.usage {
        extra.insert("_usage".into(), json!(usage));
    }
    if let Some(unit) = &record.usage_unit {
        extra.insert("_usage_unit".into(), json!(unit));
    }
    if let Value::Object(fields) = &mut message {
        fields.extend(extra);
    }
    message
}
