//! Persistence for the toolgate kiosk.
//!
//! Nothing here is a database. The kiosk keeps an append-only session log on
//! disk (a text file and a CSV mirror), passes the active session between
//! stage processes through a single-use handoff file, and can copy every log
//! event to a Graylog server over GELF/UDP.
//!
//! # Components
//!
//! - [`EventLog`] - text and CSV mirrors of the session log
//! - [`SessionJournal`] - the event log plus the optional [`GelfSink`]
//! - [`HandoffMailbox`] - single-producer, single-consumer context file
//!
//! # Example
//!
//! ```no_run
//! use toolgate_storage::{EventAction, EventLog, EventRecord, HandoffMailbox};
//! use toolgate_core::SessionContext;
//! use chrono::Local;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let log = EventLog::new("SessionLog.txt");
//! log.initialize()?;
//!
//! let context = SessionContext::unknown();
//! log.append(&EventRecord::from_context(EventAction::Start, &context, Local::now()))?;
//!
//! let mailbox = HandoffMailbox::new("temp_user_data.json");
//! mailbox.deposit(&context)?;
//! let resumed = mailbox.collect_or_default();
//! assert_eq!(resumed, context);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod event_log;
pub mod gelf;
pub mod handoff;
pub mod journal;
pub mod models;

pub use error::{StorageError, StorageResult};
pub use event_log::EventLog;
pub use gelf::{GelfSink, gelf_message};
pub use handoff::HandoffMailbox;
pub use journal::SessionJournal;
pub use models::{CSV_HEADER, EventAction, EventRecord, LoggedRow, TIMESTAMP_FORMAT};
