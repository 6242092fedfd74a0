//! Station configuration.
//!
//! Settings are grouped by section the same way the kiosk's config file is
//! laid out. Every key has a fallback default, so a missing file, a missing
//! section or a missing key never stops the kiosk.
//!
//! ```toml
//! [login]
//! login_url = "https://example.org/user/login"
//! username = "kiosk"
//! password = "secret"
//! api_url = "https://example.org/api/v0"
//! tool_id = "laser_cutter"
//!
//! [station]
//! workstation_id = "ws-07"
//! tool_numerical_id = 424
//!
//! [usage_input]
//! enabled = true
//! usage_unit = "minutes"
//! material_id = "1234"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::{Error, Result};

/// Complete kiosk configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    pub login: LoginConfig,
    pub station: StationSection,
    pub logging: LoggingConfig,
    pub session_time: SessionTimeConfig,
    pub usage_input: UsageInputConfig,
    pub ending_page: EndingPageConfig,
    pub graylog: GraylogConfig,
    pub kiosk: KioskConfig,
}

/// Backend credentials and endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginConfig {
    pub login_url: String,
    pub username: String,
    pub password: String,
    /// Base URL of the permission API; `/{email|serial}/{id}/{tool_id}` is appended.
    pub api_url: String,
    /// Permission class checked for this tool.
    pub tool_id: String,
    pub debug_mode: bool,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            login_url: DEFAULT_LOGIN_URL.to_string(),
            username: String::new(),
            password: String::new(),
            api_url: DEFAULT_API_BASE_URL.to_string(),
            tool_id: UNKNOWN.to_string(),
            debug_mode: false,
        }
    }
}

/// Physical workstation identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationSection {
    pub workstation_id: String,
    /// Numeric equipment ID used by the materials catalog.
    pub tool_numerical_id: u32,
}

impl Default for StationSection {
    fn default() -> Self {
        Self {
            workstation_id: UNKNOWN.to_string(),
            tool_numerical_id: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Text log path. The CSV mirror sits next to it with a `.csv` extension.
    pub log_file_path: PathBuf,
    /// Transient handoff file shared by stage processes.
    pub handoff_path: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_file_path: PathBuf::from(DEFAULT_LOG_FILE_NAME),
            handoff_path: PathBuf::from(DEFAULT_HANDOFF_FILE_NAME),
        }
    }
}

impl LoggingConfig {
    /// Path of the tabular mirror of the text log.
    #[must_use]
    pub fn csv_log_path(&self) -> PathBuf {
        self.log_file_path.with_extension("csv")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionTimeConfig {
    pub enable_timer_window: bool,
}

impl Default for SessionTimeConfig {
    fn default() -> Self {
        Self {
            enable_timer_window: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageInputConfig {
    pub enabled: bool,
    pub usage_unit: String,
    /// Catalog ID of the metered consumable. Empty disables the price lookup.
    pub material_id: String,
    pub material_base_url: String,
}

impl Default for UsageInputConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            usage_unit: DEFAULT_USAGE_UNIT.to_string(),
            material_id: String::new(),
            material_base_url: DEFAULT_MATERIAL_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndingPageConfig {
    pub custom_message: String,
    pub show_experience_scale: bool,
    pub show_materials: bool,
    /// Labels for ratings 1 through 5, lowest first.
    pub rating_labels: Vec<String>,
    /// Base URL of the equipment catalog; `/equipment/{tool_numerical_id}` is appended.
    pub catalog_base_url: String,
}

impl Default for EndingPageConfig {
    fn default() -> Self {
        Self {
            custom_message: MSG_THANK_YOU.to_string(),
            show_experience_scale: true,
            show_materials: true,
            rating_labels: ["Very poor", "Poor", "Okay", "Good", "Excellent"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            catalog_base_url: DEFAULT_API_BASE_URL.to_string(),
        }
    }
}

impl EndingPageConfig {
    /// Label for a rating value, falling back to the number itself.
    #[must_use]
    pub fn rating_label(&self, rating: u8) -> String {
        usize::from(rating)
            .checked_sub(1)
            .and_then(|i| self.rating_labels.get(i))
            .cloned()
            .unwrap_or_else(|| rating.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraylogConfig {
    /// GELF server address. Remote logging is off when unset.
    pub server_ip: Option<String>,
    pub server_port: u16,
}

impl Default for GraylogConfig {
    fn default() -> Self {
        Self {
            server_ip: None,
            server_port: DEFAULT_GRAYLOG_PORT,
        }
    }
}

impl GraylogConfig {
    /// `host:port` of the GELF server, if configured.
    #[must_use]
    pub fn endpoint(&self) -> Option<String> {
        self.server_ip
            .as_deref()
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
            .map(|ip| format!("{ip}:{}", self.server_port))
    }
}

/// Timing of the kiosk loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KioskConfig {
    pub retry_delay_ms: u64,
    pub grant_delay_ms: u64,
    pub tick_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for KioskConfig {
    fn default() -> Self {
        Self {
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            grant_delay_ms: DEFAULT_GRANT_DELAY_MS,
            tick_ms: DEFAULT_TICK_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

impl KioskConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn grant_delay(&self) -> Duration {
        Duration::from_millis(self.grant_delay_ms)
    }

    /// Timer refresh period. A zero setting is treated as the default.
    pub fn tick(&self) -> Duration {
        let ms = if self.tick_ms == 0 {
            DEFAULT_TICK_MS
        } else {
            self.tick_ms
        };
        Duration::from_millis(ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl StationConfig {
    /// Parse configuration from TOML text.
    ///
    /// # Errors
    /// Returns `Error::Config` if the text is not valid TOML or a key has the wrong type.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load configuration from a file.
    ///
    /// A missing file yields the defaults.
    ///
    /// # Errors
    /// Returns `Error::Config` if the file exists but cannot be parsed, or
    /// `Error::Io` if it cannot be read.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_toml_str(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Load configuration, falling back to defaults on any error.
    ///
    /// The second element carries the error that forced the fallback so the
    /// caller can log it once its subscriber is installed.
    pub fn load_or_default(path: &Path) -> (Self, Option<Error>) {
        match Self::load(path) {
            Ok(config) => (config, None),
            Err(e) => (Self::default(), Some(e)),
        }
    }
}
