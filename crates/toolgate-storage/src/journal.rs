//! Session journal: the local event log plus the optional remote copy.

use toolgate_core::StationConfig;
use tracing::{info, warn};

use crate::error::StorageResult;
use crate::event_log::EventLog;
use crate::gelf::GelfSink;
use crate::models::EventRecord;

/// Where every session event is recorded.
///
/// The local log is authoritative: a failed local write is an error. The GELF
/// copy is best effort and its failures are only logged.
#[derive(Debug)]
pub struct SessionJournal {
    log: EventLog,
    remote: Option<GelfSink>,
}

impl SessionJournal {
    pub fn new(log: EventLog) -> Self {
        Self { log, remote: None }
    }

    pub fn with_remote(mut self, remote: GelfSink) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Open the journal described by the station configuration.
    ///
    /// Initializes the local log. A GELF endpoint that cannot be resolved is
    /// reported and skipped.
    pub async fn open(config: &StationConfig) -> StorageResult<Self> {
        let log = EventLog::from_config(&config.logging);
        log.initialize()?;
        let mut journal = Self::new(log);

        if let Some(endpoint) = config.graylog.endpoint() {
            match GelfSink::connect(&endpoint, config.station.workstation_id.clone()).await {
                Ok(sink) => {
                    info!(%endpoint, "Remote logging enabled");
                    journal.remote = Some(sink);
                }
                Err(e) => warn!(%endpoint, "Remote logging disabled: {}", e),
            }
        }
        Ok(journal)
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Append an event locally, then forward it.
    pub async fn record(&self, record: &EventRecord) -> StorageResult<()> {
        self.log.append(record)?;

        if let Some(remote) = &self.remote
            && let Err(e) = remote.send(record).await
        {
            warn!(endpoint = remote.endpoint(), action = %record.action, "GELF send failed: {}", e);
        }
        Ok(())
    }
}
