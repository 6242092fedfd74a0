//! Backend access for the toolgate kiosk.
//!
//! This crate talks to the makerspace backend: it holds the authenticated
//! cookie session, asks the permission API whether an identifier may use
//! the station's tool, and reads material pricing from the catalog.
//!
//! # Components
//!
//! - **GatewaySession**: lazy cookie-session login against the backend
//! - **HttpGateway**: permission checks and catalog lookups over that session
//! - **MockGateway**: scripted backend for tests and offline demos
//!
//! The orchestrator only sees the [`AccessBackend`] and [`MaterialCatalog`]
//! traits, so stages can be exercised without a network.
//!
//! # Example
//!
//! ```no_run
//! use toolgate_gateway::{AccessBackend, GatewayConfig, HttpGateway};
//! use toolgate_core::Identifier;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut gateway = HttpGateway::new(GatewayConfig::default())?;
//! let decision = gateway
//!     .check_access(&Identifier::new("user@example.com")?)
//!     .await?;
//! println!("granted: {}", decision.is_granted());
//! # Ok(())
//! # }
//! ```

mod catalog;
mod client;
mod error;
pub mod mock;
mod permission;

pub use catalog::{MaterialCatalog, MaterialItem, parse_materials};
pub use client::{GatewayConfig, GatewaySession, HttpGateway};
pub use error::{GatewayError, Result};
pub use mock::MockGateway;
pub use permission::{AccessBackend, AccessDecision, parse_access_response, permission_url};
