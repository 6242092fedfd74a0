//! Core constants for the toolgate kiosk workflow.
//!
//! This module centralizes the fixed values shared by every stage: sentinel
//! names used when session metadata is missing, timing defaults for the
//! retry loop and timer tick, rating bounds, default file names, and the
//! messages shown on the kiosk display.
//!
//! # Usage
//!
//! ```
//! use toolgate_core::constants::*;
//! use std::time::Duration;
//!
//! assert_eq!(UNKNOWN, "Unknown");
//! let retry = Duration::from_millis(DEFAULT_RETRY_DELAY_MS);
//! assert_eq!(retry.as_secs(), 3);
//! ```

// ============================================================================
// Session Metadata
// ============================================================================

/// Sentinel used for any session field the backend or handoff did not supply.
pub const UNKNOWN: &str = "Unknown";

/// Character that marks an identifier as an email address.
pub const EMAIL_MARKER: char = '@';

// ============================================================================
// Timing
// ============================================================================

/// Delay before the credential prompt reappears after a failed attempt.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 3000;

/// Delay between showing the welcome message and starting the timer.
pub const DEFAULT_GRANT_DELAY_MS: u64 = 1500;

/// Refresh period of the elapsed-time display.
pub const DEFAULT_TICK_MS: u64 = 1000;

/// Timeout applied to every backend HTTP request.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

// ============================================================================
// Rating
// ============================================================================

/// Lowest satisfaction rating accepted by the settlement stage.
pub const MIN_RATING: u8 = 1;

/// Highest satisfaction rating accepted by the settlement stage.
pub const MAX_RATING: u8 = 5;

// ============================================================================
// Files and Endpoints
// ============================================================================

/// Default text log file name, created next to the binary's working directory.
pub const DEFAULT_LOG_FILE_NAME: &str = "SessionLog.txt";

/// Default handoff file name.
pub const DEFAULT_HANDOFF_FILE_NAME: &str = "temp_user_data.json";

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE_NAME: &str = "toolgate.toml";

/// Default consumable unit for usage collection.
pub const DEFAULT_USAGE_UNIT: &str = "minutes";

/// Largest usage amount a single session can bill.
pub const MAX_USAGE_AMOUNT: f64 = 1_000_000_000.0;

/// Default base URL for single-material lookups.
pub const DEFAULT_MATERIAL_BASE_URL: &str = "https://www.makehaven.org/api/v0/material/";

/// Default base URL for the permission and equipment APIs.
pub const DEFAULT_API_BASE_URL: &str = "https://www.makehaven.org/api/v0";

/// Default login form URL.
pub const DEFAULT_LOGIN_URL: &str = "https://www.makehaven.org/user/login";

/// Default GELF UDP port.
pub const DEFAULT_GRAYLOG_PORT: u16 = 12201;

// ============================================================================
// Display Messages
// ============================================================================

/// Prompt shown while waiting for a credential.
pub const MSG_PROMPT: &str = "Please scan your RFID tag or enter your email to start the session.";

/// Prompt shown after a failed attempt.
pub const MSG_RETRY_PROMPT: &str = "Please try again. Scan your RFID tag or enter your email:";

/// Shown while the backend is being queried.
pub const MSG_CHECKING: &str = "Checking access...";

/// Shown when the backend explicitly refuses access.
pub const MSG_ACCESS_DENIED: &str = "Access Denied. Please try again.";

/// Shown when the backend cannot be reached.
pub const MSG_CONTACT_FAILED: &str = "Failed to contact server or access denied.";

/// Shown when the kiosk's own backend credentials are rejected.
pub const MSG_LOGIN_FAILED: &str = "Login failed. Please check credentials.";

/// Shown when the prompt is dismissed without input.
pub const MSG_NO_INPUT: &str = "No input detected. Please scan your RFID tag or enter your email.";

/// Shown for errors that are neither retryable nor user-facing.
pub const MSG_INTERNAL_ERROR: &str = "Something went wrong. Please try again.";

/// Default closing message on the settlement screen.
pub const MSG_THANK_YOU: &str = "Thank you for using the workstation.";
