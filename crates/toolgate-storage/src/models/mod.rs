pub mod event;

pub use event::{CSV_HEADER, EventAction, EventRecord, LoggedRow, TIMESTAMP_FORMAT};
