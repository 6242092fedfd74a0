use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Gateway errors
    #[error("Failed to contact server: {0}")]
    Transport(String),

    #[error("Backend authentication failed: {0}")]
    Auth(String),

    #[error("Access denied: {reason}")]
    Denied { reason: String },

    #[error("Malformed data: {0}")]
    Data(String),

    // Handoff errors
    #[error("Handoff persistence error: {0}")]
    Persistence(String),

    // Workflow errors
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("No active session")]
    NoActiveSession,

    #[error("Session {given} is not the active session")]
    SessionMismatch { given: String },

    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    #[error("Invalid usage amount: {0}")]
    InvalidUsage(String),

    #[error("Rating must be {min}-{max}, got {rating}")]
    InvalidRating { rating: u8, min: u8, max: u8 },

    #[error("Session already rated")]
    AlreadyRated,

    #[error("Invalid display line {line} (max {max})")]
    InvalidLine { line: usize, max: usize },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether this error sends the kiosk back to the credential prompt.
    ///
    /// Contact, backend-auth and denial failures all share the same retry
    /// path; everything else is a programming or data error.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Transport(_)
                | Error::Auth(_)
                | Error::Denied { .. }
                | Error::InvalidCredential(_)
        )
    }

    /// Short message suitable for the kiosk display.
    #[must_use]
    pub fn display_message(&self) -> &'static str {
        match self {
            Error::Transport(_) => crate::constants::MSG_CONTACT_FAILED,
            Error::Auth(_) => crate::constants::MSG_LOGIN_FAILED,
            Error::Denied { .. } => crate::constants::MSG_ACCESS_DENIED,
            Error::InvalidCredential(_) => crate::constants::MSG_NO_INPUT,
            _ => crate::constants::MSG_INTERNAL_ERROR,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
