//! Error types for backend operations.

/// Result type alias for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Errors that can occur while talking to the backend.
///
/// Explicit refusals are not errors: they come back as
/// [`AccessDecision::Denied`](crate::AccessDecision::Denied).
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Backend could not be reached or did not answer in time.
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// The kiosk's own backend credentials were rejected.
    #[error("Login rejected with status {status}")]
    Auth { status: u16 },

    /// A response body could not be used.
    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    /// A configured URL is malformed.
    #[error("Invalid URL: {message}")]
    InvalidUrl { message: String },

    /// The HTTP client could not be constructed.
    #[error("Client initialization failed: {message}")]
    ClientInit { message: String },
}

impl GatewayError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn auth(status: u16) -> Self {
        Self::Auth { status }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    pub fn invalid_url(message: impl Into<String>) -> Self {
        Self::InvalidUrl {
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::invalid_response(e.to_string())
        } else if e.is_builder() {
            Self::ClientInit {
                message: e.to_string(),
            }
        } else {
            Self::transport(e.to_string())
        }
    }
}

impl From<url::ParseError> for GatewayError {
    fn from(e: url::ParseError) -> Self {
        Self::invalid_url(e.to_string())
    }
}

impl From<GatewayError> for toolgate_core::Error {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::Transport { message } => toolgate_core::Error::Transport(message),
            GatewayError::Auth { status } => {
                toolgate_core::Error::Auth(format!("login returned HTTP {status}"))
            }
            GatewayError::InvalidResponse { message } => toolgate_core::Error::Data(message),
            GatewayError::InvalidUrl { message } | GatewayError::ClientInit { message } => {
                toolgate_core::Error::Config(message)
            }
        }
    }
}
