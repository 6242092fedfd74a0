//! Permission decisions and the backend trait the kiosk depends on.
//!
//! The permission API answers `GET <base>/{email|serial}/{identifier}/{permission}`
//! with a JSON array whose first element carries `access` (`"true"` or
//! `"false"`, as a string) plus `first_name` and `last_name`.
//!
//! Parsing fails closed: anything other than HTTP 200 with a first element
//! whose `access` is exactly the string `"true"` is a denial.

#![allow(async_fn_in_trait)]

use serde_json::Value;
use toolgate_core::{Identifier, UserName};
use url::Url;

use crate::error::{GatewayError, Result};

/// Outcome of a permission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    /// The identifier may use the tool.
    Granted { user: UserName },
    /// The backend refused, or its answer could not be trusted.
    Denied { reason: String },
}

impl AccessDecision {
    fn denied(reason: impl Into<String>) -> Self {
        Self::Denied {
            reason: reason.into(),
        }
    }

    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted { .. })
    }
}

/// Backend that decides whether an identifier may use this station's tool.
///
/// # Object Safety
///
/// Like the other async traits in this workspace this uses native `async fn`
/// and is not object-safe. Use generics:
///
/// ```no_run
/// use toolgate_gateway::{AccessBackend, AccessDecision};
/// use toolgate_core::Identifier;
///
/// async fn greet<B: AccessBackend>(backend: &mut B, id: &Identifier) -> String {
///     match backend.check_access(id).await {
///         Ok(AccessDecision::Granted { user }) => format!("Welcome, {user}."),
///         Ok(AccessDecision::Denied { .. }) => "Access Denied.".to_string(),
///         Err(_) => "Failed to contact server.".to_string(),
///     }
/// }
/// ```
pub trait AccessBackend: Send {
    /// Check the identifier against the station's configured permission.
    ///
    /// # Errors
    ///
    /// Returns an error only when no trustworthy decision could be obtained
    /// because of transport failure or rejected kiosk credentials.
    async fn check_access(&mut self, identifier: &Identifier) -> Result<AccessDecision>;
}

/// Build the permission URL for an identifier.
///
/// Path segments are percent-encoded, so identifiers cannot escape their segment.
///
/// # Errors
/// Returns `GatewayError::InvalidUrl` if `base` is not an absolute hierarchical URL.
///
/// # Examples
///
/// ```
/// use toolgate_gateway::permission_url;
/// use toolgate_core::Identifier;
///
/// let id = Identifier::new("user@example.com").unwrap();
/// let url = permission_url("https://example.org/api/v0", &id, "laser").unwrap();
/// assert_eq!(url.as_str(), "https://example.org/api/v0/email/user@example.com/laser");
/// ```
pub fn permission_url(base: &str, identifier: &Identifier, permission_id: &str) -> Result<Url> {
    let mut url = Url::parse(base)?;
    url.path_segments_mut()
        .map_err(|()| GatewayError::invalid_url(format!("{base} cannot be a base URL")))?
        .pop_if_empty()
        .push(identifier.kind().endpoint())
        .push(identifier.as_str())
        .push(permission_id);
    Ok(url)
}

/// Interpret a permission API response.
///
/// Absent or null names fall back to the `Unknown` sentinel; a name field of
/// the wrong JSON type is treated as a malformed response and denied.
pub fn parse_access_response(status: u16, body: &str) -> AccessDecision {
    if status != 200 {
        return AccessDecision::denied(format!("permission API returned HTTP {status}"));
    }

    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(e) => return AccessDecision::denied(format!("invalid JSON: {e}")),
    };

    let Some(first) = value.as_array().and_then(|list| list.first()) else {
        return AccessDecision::denied("expected a non-empty list");
    };

    let Some(entry) = first.as_object() else {
        return AccessDecision::denied("first element is not an object");
    };

    match entry.get("access") {
        Some(Value::String(flag)) if flag == "true" => {}
        Some(other) => return AccessDecision::denied(format!("access = {other}")),
        None => return AccessDecision::denied("missing access field"),
    }

    let name_part = |key: &str| -> std::result::Result<Option<&str>, String> {
        match entry.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(format!("{key} has unexpected type: {other}")),
        }
    };

    match (name_part("first_name"), name_part("last_name")) {
        (Ok(first_name), Ok(last_name)) => AccessDecision::Granted {
            user: UserName::new(first_name, last_name),
        },
        (Err(reason), _) | (_, Err(reason)) => AccessDecision::denied(reason),
    }
}
