use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use toolgate_core::{SessionContext, SessionDuration, UserName};

/// Timestamp layout used in both log mirrors.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Column header of the tabular log.
pub const CSV_HEADER: [&str; 11] = [
    "Timestamp",
    "Action",
    "First Name",
    "Last Name",
    "Permission",
    "Station",
    "Duration",
    "Rating",
    "Comments",
    "Usage",
    "Usage Unit",
];

/// Session event kinds, spelled as they appear in the logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventAction {
    #[serde(rename = "start")]
    Start,
    #[serde(rename = "end")]
    End,
    #[serde(rename = "Usage")]
    Usage,
    #[serde(rename = "rating")]
    Rating,
    #[serde(rename = "not_me")]
    NotMe,
    #[serde(rename = "nothing_due")]
    NothingDue,
    #[serde(rename = "payment_submitted")]
    PaymentSubmitted,
}

impl EventAction {
    pub fn as_str(self) -> &'static str {
        match self {
            EventAction::Start => "start",
            EventAction::End => "end",
            EventAction::Usage => "Usage",
            EventAction::Rating => "rating",
            EventAction::NotMe => "not_me",
            EventAction::NothingDue => "nothing_due",
            EventAction::PaymentSubmitted => "payment_submitted",
        }
    }

    /// Whether this event closes a session.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            EventAction::NotMe | EventAction::NothingDue | EventAction::PaymentSubmitted
        )
    }

    /// Whether this event gets a row in the tabular log.
    ///
    /// The timer's `end` event is text-only; its duration rides on every
    /// later row of the session instead.
    pub fn in_csv(self) -> bool {
        self != EventAction::End
    }
}

impl fmt::Display for EventAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One append-only log record.
///
/// A record is a snapshot of the session context at the moment of the event:
/// fields the session has not reached yet are empty.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub timestamp: DateTime<Local>,
    pub action: EventAction,
    pub user: UserName,
    pub permission: String,
    pub station: String,
    pub duration: Option<SessionDuration>,
    pub rating: Option<u8>,
    pub comments: Option<String>,
    pub usage: Option<u64>,
    pub usage_unit: Option<String>,
}

impl EventRecord {
    /// Snapshot a session context for an event.
    pub fn from_context(action: EventAction, context: &SessionContext, at: DateTime<Local>) -> Self {
        let feedback = context.feedback();
        let usage = context.usage();

        Self {
            timestamp: at,
            action,
            user: context.user().clone(),
            permission: context.permission().to_string(),
            station: context.station().to_string(),
            duration: context.duration(),
            rating: feedback.map(|f| f.rating),
            comments: feedback.and_then(|f| f.comments.clone()),
            usage: usage.map(|u| u.billed_quantity),
            usage_unit: usage.map(|u| u.unit.clone()),
        }
    }

    pub fn formatted_timestamp(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }

    /// Line for the text log, without the trailing newline.
    ///
    /// `2025-01-01 10:00:00 - Session end for Jane Doe. Duration: 0:01:05.`
    pub fn text_line(&self) -> String {
        let mut line = format!(
            "{} - Session {} for {} {}.",
            self.formatted_timestamp(),
            self.action,
            self.user.first_name,
            self.user.last_name
        );
        if let Some(duration) = self.duration {
            line.push_str(&format!(" Duration: {duration}."));
        }
        line
    }

    /// Row for the tabular log, in [`CSV_HEADER`] order.
    pub fn csv_row(&self) -> [String; 11] {
        fn opt<T: ToString>(value: Option<T>) -> String {
            value.map(|v| v.to_string()).unwrap_or_default()
        }

        [
            self.formatted_timestamp(),
            self.action.to_string(),
            self.user.first_name.clone(),
            self.user.last_name.clone(),
            self.permission.clone(),
            self.station.clone(),
            opt(self.duration),
            opt(self.rating),
            self.comments.clone().unwrap_or_default(),
            opt(self.usage),
            self.usage_unit.clone().unwrap_or_default(),
        ]
    }
}

/// A row read back from the tabular log.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggedRow {
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "Action")]
    pub action: String,
    #[serde(rename = "First Name")]
    pub first_name: String,
    #[serde(rename = "Last Name")]
    pub last_name: String,
    #[serde(rename = "Permission")]
    pub permission: String,
    #[serde(rename = "Station")]
    pub station: String,
    #[serde(rename = "Duration", default)]
    pub duration: String,
    #[serde(rename = "Rating", default)]
    pub rating: String,
    #[serde(rename = "Comments", default)]
    pub comments: String,
    #[serde(rename = "Usage", default)]
    pub usage: String,
    #[serde(rename = "Usage Unit", default)]
    pub usage_unit: String,
}
