//! HTTP client for the makerspace backend.
//!
//! # Architecture
//!
//! ```text
//! Kiosk
//!   │
//!   └─> HttpGateway ──> GatewaySession (cookie jar, lazy login)
//!          │                  │
//!          │                  └─(POST login form)──> Backend
//!          ├─(GET permission API)──────────────────> Backend
//!          └─(GET equipment / material catalog)────> Backend
//! ```
//!
//! The session logs in on first use and keeps its cookies. A 401 or 403 from
//! the permission API drops the session so the next query logs in again.
//! No call is retried here; retry is driven by renewed operator input.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use toolgate_core::{Identifier, StationConfig, constants::DEFAULT_REQUEST_TIMEOUT_MS};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::catalog::{MaterialCatalog, MaterialItem, parse_materials};
use crate::error::{GatewayError, Result};
use crate::permission::{AccessBackend, AccessDecision, parse_access_response, permission_url};

/// Connection settings for the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    pub login_url: String,
    pub username: String,
    pub password: String,
    /// Base of the permission API.
    pub api_url: String,
    /// Permission class checked by [`AccessBackend::check_access`].
    pub tool_id: String,
    /// Base of the equipment catalog.
    pub catalog_base_url: String,
    /// Base of single-material lookups.
    pub material_base_url: String,
    /// Applied to every request.
    pub timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::from_station(&StationConfig::default())
    }
}

impl GatewayConfig {
    /// Derive gateway settings from the station configuration.
    pub fn from_station(config: &StationConfig) -> Self {
        let timeout = match config.kiosk.request_timeout() {
            t if t.is_zero() => Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            t => t,
        };

        Self {
            login_url: config.login.login_url.clone(),
            username: config.login.username.clone(),
            password: config.login.password.clone(),
            api_url: config.login.api_url.clone(),
            tool_id: config.login.tool_id.clone(),
            catalog_base_url: config.ending_page.catalog_base_url.clone(),
            material_base_url: config.usage_input.material_base_url.clone(),
            timeout,
        }
    }
}

/// Authenticated cookie session with the backend.
#[derive(Debug)]
pub struct GatewaySession {
    client: Client,
    login_url: String,
    username: String,
    password: String,
    authenticated: bool,
}

impl GatewaySession {
    /// Build an unauthenticated session.
    ///
    /// # Errors
    /// Returns `GatewayError::ClientInit` if the HTTP client cannot be built.
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            login_url: config.login_url.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            authenticated: false,
        })
    }

    /// Whether a login has succeeded and not been invalidated since.
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Post the login form.
    ///
    /// # Errors
    ///
    /// - `GatewayError::Transport` if the backend cannot be reached
    /// - `GatewayError::Auth` if it answers with anything but HTTP 200
    pub async fn login(&mut self) -> Result<()> {
        debug!(url = %self.login_url, user = %self.username, "Logging in to backend");

        let form = [
            ("name", self.username.as_str()),
            ("pass", self.password.as_str()),
            ("form_id", "user_login"),
            ("op", "Log in"),
        ];

        let response = self
            .client
            .post(&self.login_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                error!("Login request failed: {}", e);
                GatewayError::from(e)
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            warn!(status = status.as_u16(), "Backend rejected kiosk credentials");
            self.authenticated = false;
            return Err(GatewayError::auth(status.as_u16()));
        }

        info!("Logged in to backend");
        self.authenticated = true;
        Ok(())
    }

    /// Post the login form, reporting only success.
    pub async fn authenticate(&mut self) -> bool {
        self.login().await.is_ok()
    }

    /// Log in unless a session is already held.
    pub async fn ensure_authenticated(&mut self) -> Result<()> {
        if self.authenticated {
            return Ok(());
        }
        self.login().await
    }

    /// Forget the current session. The next request logs in again.
    pub fn invalidate(&mut self) {
        if self.authenticated {
            debug!("Dropping backend session");
        }
        self.authenticated = false;
    }

    async fn get_text(&self, url: Url) -> Result<(StatusCode, String)> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;
        Ok((status, body))
    }
}

/// Backend gateway over HTTP.
#[derive(Debug)]
pub struct HttpGateway {
    config: GatewayConfig,
    session: GatewaySession,
}

impl HttpGateway {
    /// Create a gateway. No request is made until the first query.
    ///
    /// # Errors
    /// Returns `GatewayError::ClientInit` if the HTTP client cannot be built.
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let session = GatewaySession::new(&config)?;
        Ok(Self { config, session })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn session(&self) -> &GatewaySession {
        &self.session
    }

    /// See [`GatewaySession::authenticate`].
    pub async fn authenticate(&mut self) -> bool {
        self.session.authenticate().await
    }

    /// See [`GatewaySession::login`].
    pub async fn login(&mut self) -> Result<()> {
        self.session.login().await
    }

    /// Ask the backend whether `identifier` holds `permission_id`.
    ///
    /// Logs in first if no session is held.
    ///
    /// # Errors
    ///
    /// - `GatewayError::Transport` if the backend cannot be reached
    /// - `GatewayError::Auth` if the lazy login is rejected
    /// - `GatewayError::InvalidUrl` if the API base is malformed
    ///
    /// Every answer the backend does give, including malformed ones, becomes
    /// an [`AccessDecision`].
    pub async fn check_permission(
        &mut self,
        identifier: &Identifier,
        permission_id: &str,
    ) -> Result<AccessDecision> {
        self.session.ensure_authenticated().await?;

        let url = permission_url(&self.config.api_url, identifier, permission_id)?;
        debug!(%url, kind = %identifier.kind(), "Querying permission API");

        let (status, body) = self.session.get_text(url).await.map_err(|e| {
            error!("Permission request failed: {}", e);
            e
        })?;

        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            warn!(status = status.as_u16(), "Permission API refused session");
            self.session.invalidate();
        }

        let decision = parse_access_response(status.as_u16(), &body);
        match &decision {
            AccessDecision::Granted { user } => {
                info!(identifier = %identifier, %user, permission = permission_id, "Access granted");
            }
            AccessDecision::Denied { reason } => {
                info!(identifier = %identifier, permission = permission_id, %reason, "Access denied");
            }
        }
        Ok(decision)
    }

    async fn fetch_materials(&mut self, base: &str, segments: &[&str]) -> Result<Vec<MaterialItem>> {
        let mut url = Url::parse(base)?;
        url.path_segments_mut()
            .map_err(|()| GatewayError::invalid_url(format!("{base} cannot be a base URL")))?
            .pop_if_empty()
            .extend(segments);

        debug!(%url, "Fetching catalog");
        let (status, body) = self.session.get_text(url).await?;
        if !status.is_success() {
            return Err(GatewayError::invalid_response(format!(
                "catalog returned HTTP {}",
                status.as_u16()
            )));
        }
        parse_materials(&body)
    }
}

impl AccessBackend for HttpGateway {
    async fn check_access(&mut self, identifier: &Identifier) -> Result<AccessDecision> {
        let permission = self.config.tool_id.clone();
        self.check_permission(identifier, &permission).await
    }
}

impl MaterialCatalog for HttpGateway {
    async fn equipment_materials(&mut self, tool_numerical_id: u32) -> Result<Vec<MaterialItem>> {
        let base = self.config.catalog_base_url.clone();
        let id = tool_numerical_id.to_string();
        self.fetch_materials(&base, &["equipment", &id]).await
    }

    async fn material(&mut self, material_id: &str) -> Result<Option<MaterialItem>> {
        let material_id = material_id.trim();
        if material_id.is_empty() {
            return Ok(None);
        }
        let base = self.config.material_base_url.clone();
        let items = self.fetch_materials(&base, &[material_id]).await?;
        Ok(items.into_iter().next())
    }
}
