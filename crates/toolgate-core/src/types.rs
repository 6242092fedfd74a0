use crate::{
    Result,
    constants::{EMAIL_MARKER, MAX_USAGE_AMOUNT, UNKNOWN},
    error::Error,
};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique handle for one user's session at a station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a fresh random session ID.
    #[must_use]
    pub fn new() -> Self {
        SessionId(Uuid::new_v4())
    }

    /// Get the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which backend query path an identifier uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierKind {
    /// Email address (contains `@`).
    Email,
    /// RFID tag serial or any other non-email token.
    Serial,
}

impl IdentifierKind {
    /// Path segment used by the permission API for this kind.
    #[must_use]
    pub fn endpoint(self) -> &'static str {
        match self {
            IdentifierKind::Email => "email",
            IdentifierKind::Serial => "serial",
        }
    }
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.endpoint())
    }
}

/// Credential presented at the kiosk (email or RFID serial).
///
/// The value is trimmed but otherwise kept exactly as presented, since
/// the backend matches serials and emails verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    /// Create an identifier from raw input.
    ///
    /// # Errors
    /// Returns `Error::InvalidCredential` if the input is empty after trimming.
    pub fn new(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidCredential("empty identifier".to_string()));
        }
        Ok(Identifier(trimmed.to_string()))
    }

    /// Classify the identifier: anything containing `@` is an email.
    #[must_use]
    pub fn kind(&self) -> IdentifierKind {
        if self.0.contains(EMAIL_MARKER) {
            IdentifierKind::Email
        } else {
            IdentifierKind::Serial
        }
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Identifier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Identifier::new(s)
    }
}

/// Name of the user resolved by the access gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserName {
    #[serde(default = "unknown")]
    pub first_name: String,
    #[serde(default = "unknown")]
    pub last_name: String,
}

fn unknown() -> String {
    UNKNOWN.to_string()
}

impl UserName {
    /// Build a name, substituting the sentinel for missing or blank parts.
    pub fn new(first_name: Option<&str>, last_name: Option<&str>) -> Self {
        let pick = |part: Option<&str>| {
            part.map(str::trim)
                .filter(|p| !p.is_empty())
                .map_or_else(unknown, str::to_string)
        };
        Self {
            first_name: pick(first_name),
            last_name: pick(last_name),
        }
    }

    /// The sentinel name used when nothing is known.
    #[must_use]
    pub fn unknown() -> Self {
        Self::new(None, None)
    }
}

impl Default for UserName {
    fn default() -> Self {
        Self::unknown()
    }
}

impl fmt::Display for UserName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.first_name, self.last_name)
    }
}

/// Whole-second session length.
///
/// Formats as `H:MM:SS` (e.g. `0:01:05`) for the log, and as zero-padded
/// `HH:MM:SS` via [`clock_face`](SessionDuration::clock_face) for the timer display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionDuration(u64);

impl SessionDuration {
    #[must_use]
    pub fn from_secs(secs: u64) -> Self {
        SessionDuration(secs)
    }

    /// Duration between two instants, clamped at zero and truncated to whole seconds.
    #[must_use]
    pub fn between(start: DateTime<Local>, end: DateTime<Local>) -> Self {
        let secs = (end - start).num_seconds().max(0);
        SessionDuration(secs.unsigned_abs())
    }

    #[must_use]
    pub fn as_secs(&self) -> u64 {
        self.0
    }

    /// Zero-padded `HH:MM:SS` for the elapsed-time display.
    #[must_use]
    pub fn clock_face(&self) -> String {
        let (h, m, s) = self.split();
        format!("{h:02}:{m:02}:{s:02}")
    }

    fn split(&self) -> (u64, u64, u64) {
        (self.0 / 3600, (self.0 % 3600) / 60, self.0 % 60)
    }
}

impl fmt::Display for SessionDuration {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (h, m, s) = self.split();
        write!(f, "{h}:{m:02}:{s:02}")
    }
}

/// Usage reported by the user for a metered consumable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Amount as entered.
    pub amount: f64,
    /// Amount rounded up to a whole billing unit.
    pub billed_quantity: u64,
    /// Unit label (e.g. "minutes", "grams").
    pub unit: String,
}

impl UsageRecord {
    /// Whether `amount` is a finite number in `0..=MAX_USAGE_AMOUNT`.
    pub fn is_billable(amount: f64) -> bool {
        amount.is_finite() && (0.0..=MAX_USAGE_AMOUNT).contains(&amount)
    }

    /// Validate an amount and compute its billed quantity.
    ///
    /// Billing always rounds up: 5.1 bills 6, 5.0 bills 5.
    ///
    /// # Errors
    /// Returns `Error::InvalidUsage` unless [`UsageRecord::is_billable`].
    pub fn new(amount: f64, unit: impl Into<String>) -> Result<Self> {
        if !Self::is_billable(amount) {
            return Err(Error::InvalidUsage(format!(
                "amount must be between 0 and {MAX_USAGE_AMOUNT}, got {amount}"
            )));
        }
        Ok(Self {
            amount,
            billed_quantity: amount.ceil() as u64,
            unit: unit.into(),
        })
    }
}

/// Satisfaction feedback captured on the settlement screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    pub rating: u8,
    #[serde(default)]
    pub comments: Option<String>,
}

/// The record for one user's session at a station.
///
/// Created when access is granted, filled in by each stage, and discarded
/// once the settlement stage has logged its terminal event. `permission` and
/// `station` are fixed at creation and have no setters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
    #[serde(default)]
    session_id: SessionId,
    #[serde(default = "unknown")]
    identifier: String,
    #[serde(flatten)]
    user: UserName,
    #[serde(default = "unknown")]
    permission: String,
    #[serde(default = "unknown")]
    station: String,
    #[serde(default)]
    start_time: Option<DateTime<Local>>,
    #[serde(default)]
    end_time: Option<DateTime<Local>>,
    #[serde(default)]
    duration: Option<SessionDuration>,
    #[serde(default)]
    usage: Option<UsageRecord>,
    #[serde(default)]
    feedback: Option<Feedback>,
}

impl SessionContext {
    /// Create a context for a freshly granted session.
    pub fn granted(
        identifier: &Identifier,
        user: UserName,
        permission: impl Into<String>,
        station: impl Into<String>,
    ) -> Self {
        Self {
            session_id: SessionId::new(),
            identifier: identifier.as_str().to_string(),
            user,
            permission: permission.into(),
            station: station.into(),
            start_time: None,
            end_time: None,
            duration: None,
            usage: None,
            feedback: None,
        }
    }

    /// The fail-open default used when handoff state is missing or unreadable.
    #[must_use]
    pub fn unknown() -> Self {
        Self {
            session_id: SessionId::new(),
            identifier: unknown(),
            user: UserName::unknown(),
            permission: unknown(),
            station: unknown(),
            start_time: None,
            end_time: None,
            duration: None,
            usage: None,
            feedback: None,
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn user(&self) -> &UserName {
        &self.user
    }

    pub fn permission(&self) -> &str {
        &self.permission
    }

    pub fn station(&self) -> &str {
        &self.station
    }

    pub fn start_time(&self) -> Option<DateTime<Local>> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Local>> {
        self.end_time
    }

    pub fn duration(&self) -> Option<SessionDuration> {
        self.duration
    }

    pub fn usage(&self) -> Option<&UsageRecord> {
        self.usage.as_ref()
    }

    pub fn feedback(&self) -> Option<&Feedback> {
        self.feedback.as_ref()
    }

    /// Mark the timer as started. Returns `false` if it already was.
    pub fn start_timer(&mut self, at: DateTime<Local>) -> bool {
        if self.start_time.is_some() {
            return false;
        }
        self.start_time = Some(at);
        true
    }

    /// Close the timer and record the duration.
    ///
    /// # Errors
    /// Returns `Error::InvalidStateTransition` if the timer never started or
    /// has already been stopped.
    pub fn stop_timer(&mut self, at: DateTime<Local>) -> Result<SessionDuration> {
        let start = self.start_time.ok_or_else(|| Error::InvalidStateTransition {
            from: "NotStarted".to_string(),
            to: "Stopped".to_string(),
        })?;
        if self.duration.is_some() {
            return Err(Error::InvalidStateTransition {
                from: "Stopped".to_string(),
                to: "Stopped".to_string(),
            });
        }
        let duration = SessionDuration::between(start, at);
        self.end_time = Some(at);
        self.duration = Some(duration);
        Ok(duration)
    }

    pub fn record_usage(&mut self, usage: UsageRecord) {
        self.usage = Some(usage);
    }

    /// Attach feedback. Ratings are final once given.
    ///
    /// # Errors
    /// Returns `Error::AlreadyRated` if feedback was already recorded.
    pub fn record_feedback(&mut self, feedback: Feedback) -> Result<()> {
        if self.feedback.is_some() {
            return Err(Error::AlreadyRated);
        }
        self.feedback = Some(feedback);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rstest::rstest;

    #[rstest]
    #[case("user@example.com", IdentifierKind::Email)]
    #[case("a@b", IdentifierKind::Email)]
    #[case("@", IdentifierKind::Email)]
    #[case("000111", IdentifierKind::Serial)]
    #[case("04ABCDEF", IdentifierKind::Serial)]
    #[case("user.example.com", IdentifierKind::Serial)]
    fn test_identifier_kind(#[case] raw: &str, #[case] expected: IdentifierKind) {
        let id = Identifier::new(raw).unwrap();
        assert_eq!(id.kind(), expected);
    }

    #[test]
    fn test_identifier_endpoint_names() {
        assert_eq!(IdentifierKind::Email.endpoint(), "email");
        assert_eq!(IdentifierKind::Serial.endpoint(), "serial");
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("\n")]
    fn test_identifier_rejects_blank(#[case] raw: &str) {
        assert!(matches!(
            Identifier::new(raw),
            Err(Error::InvalidCredential(_))
        ));
    }

    #[test]
    fn test_identifier_is_trimmed() {
        let id = Identifier::new("  000111\n").unwrap();
        assert_eq!(id.as_str(), "000111");
    }

    #[test]
    fn test_user_name_defaults_to_unknown() {
        let name = UserName::new(Some("Jane"), None);
        assert_eq!(name.first_name, "Jane");
        assert_eq!(name.last_name, "Unknown");

        let blank = UserName::new(Some("  "), Some(""));
        assert_eq!(blank, UserName::unknown());
    }

    #[rstest]
    #[case(0, "0:00:00", "00:00:00")]
    #[case(65, "0:01:05", "00:01:05")]
    #[case(3600, "1:00:00", "01:00:00")]
    #[case(36_061, "10:01:01", "10:01:01")]
    fn test_duration_formatting(#[case] secs: u64, #[case] log: &str, #[case] face: &str) {
        let duration = SessionDuration::from_secs(secs);
        assert_eq!(duration.to_string(), log);
        assert_eq!(duration.clock_face(), face);
    }

    #[test]
    fn test_duration_between_truncates_and_clamps() {
        let start = Local.with_ymd_and_hms(2025, 5, 10, 12, 0, 0).unwrap();
        let end = start + Duration::milliseconds(65_900);
        assert_eq!(SessionDuration::between(start, end).as_secs(), 65);
        assert_eq!(SessionDuration::between(end, start).as_secs(), 0);
    }

    #[rstest]
    #[case(5.1, 6)]
    #[case(5.0, 5)]
    #[case(0.0, 0)]
    #[case(0.01, 1)]
    #[case(12.999, 13)]
    #[case(MAX_USAGE_AMOUNT, 1_000_000_000)]
    fn test_usage_rounds_up(#[case] amount: f64, #[case] billed: u64) {
        let usage = UsageRecord::new(amount, "minutes").unwrap();
        assert_eq!(usage.billed_quantity, billed);
    }

    #[rstest]
    #[case(-0.5)]
    #[case(f64::NAN)]
    #[case(f64::INFINITY)]
    #[case(1e20)]
    #[case(MAX_USAGE_AMOUNT + 1.0)]
    fn test_usage_rejects_invalid(#[case] amount: f64) {
        assert!(matches!(
            UsageRecord::new(amount, "minutes"),
            Err(Error::InvalidUsage(_))
        ));
    }

    #[test]
    fn test_timer_start_is_idempotent() {
        let id = Identifier::new("user@example.com").unwrap();
        let mut ctx = SessionContext::granted(&id, UserName::unknown(), "tool", "ws1");
        let t0 = Local.with_ymd_and_hms(2025, 5, 10, 12, 0, 0).unwrap();

        assert!(ctx.start_timer(t0));
        assert!(!ctx.start_timer(t0 + Duration::seconds(5)));
        assert_eq!(ctx.start_time(), Some(t0));
    }

    #[test]
    fn test_duration_defined_only_after_stop() {
        let id = Identifier::new("000111").unwrap();
        let mut ctx = SessionContext::granted(&id, UserName::unknown(), "tool", "ws1");
        let t0 = Local.with_ymd_and_hms(2025, 5, 10, 12, 0, 0).unwrap();

        assert!(ctx.stop_timer(t0).is_err());
        assert!(ctx.duration().is_none());

        ctx.start_timer(t0);
        let d = ctx.stop_timer(t0 + Duration::seconds(65)).unwrap();
        assert_eq!(d.to_string(), "0:01:05");
        assert_eq!(ctx.duration(), Some(d));
        assert!(ctx.stop_timer(t0 + Duration::seconds(70)).is_err());
    }

    #[test]
    fn test_feedback_cannot_be_replaced() {
        let mut ctx = SessionContext::unknown();
        ctx.record_feedback(Feedback {
            rating: 4,
            comments: None,
        })
        .unwrap();

        let again = ctx.record_feedback(Feedback {
            rating: 1,
            comments: Some("changed my mind".into()),
        });
        assert!(matches!(again, Err(Error::AlreadyRated)));
        assert_eq!(ctx.feedback().map(|f| f.rating), Some(4));
    }

    #[test]
    fn test_context_json_fills_missing_fields() {
        let ctx: SessionContext = serde_json::from_str(r#"{"first_name": "Jane"}"#).unwrap();
        assert_eq!(ctx.user().first_name, "Jane");
        assert_eq!(ctx.user().last_name, "Unknown");
        assert_eq!(ctx.permission(), "Unknown");
        assert_eq!(ctx.station(), "Unknown");
        assert!(ctx.start_time().is_none());
    }

    #[test]
    fn test_context_json_uses_flat_name_fields() {
        let id = Identifier::new("user@example.com").unwrap();
        let ctx = SessionContext::granted(&id, UserName::new(Some("Jane"), Some("Doe")), "t", "s");
        let value = serde_json::to_value(&ctx).unwrap();
        assert_eq!(value["first_name"], "Jane");
        assert_eq!(value["last_name"], "Doe");
        assert_eq!(value["permission"], "t");
        assert_eq!(value["station"], "s");
    }
}
