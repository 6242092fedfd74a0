//! Scripted backend for tests and offline runs.
//!
//! Clones share state, so a test can keep one handle for scripting and
//! assertions while the kiosk owns another.
//!
//! # Example
//!
//! ```
//! use toolgate_gateway::{AccessBackend, MockGateway};
//! use toolgate_core::Identifier;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let handle = MockGateway::granting("Jane", "Doe");
//! let mut backend = handle.clone();
//!
//! let decision = backend
//!     .check_access(&Identifier::new("user@example.com").unwrap())
//!     .await
//!     .unwrap();
//! assert!(decision.is_granted());
//! assert_eq!(handle.access_checks().len(), 1);
//! # }
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use toolgate_core::{Identifier, UserName};
use tracing::debug;

use crate::catalog::{MaterialCatalog, MaterialItem};
use crate::error::{GatewayError, Result};
use crate::permission::{AccessBackend, AccessDecision};

#[derive(Debug)]
struct MockState {
    scripted: VecDeque<Result<AccessDecision>>,
    fallback: AccessDecision,
    equipment: Vec<MaterialItem>,
    materials: HashMap<String, MaterialItem>,
    catalog_down: bool,
    access_checks: Vec<Identifier>,
    catalog_queries: usize,
}

/// In-memory [`AccessBackend`] and [`MaterialCatalog`].
#[derive(Debug, Clone)]
pub struct MockGateway {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGateway {
    /// A backend that denies everyone and lists no materials.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                scripted: VecDeque::new(),
                fallback: AccessDecision::Denied {
                    reason: "no access scripted".to_string(),
                },
                equipment: Vec::new(),
                materials: HashMap::new(),
                catalog_down: false,
                access_checks: Vec::new(),
                catalog_queries: 0,
            })),
        }
    }

    /// A backend that grants every identifier as the given user.
    pub fn granting(first_name: &str, last_name: &str) -> Self {
        let mock = Self::new();
        mock.lock().fallback = AccessDecision::Granted {
            user: UserName::new(Some(first_name), Some(last_name)),
        };
        mock
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Answer given once scripted responses run out.
    pub fn set_fallback(&self, decision: AccessDecision) {
        self.lock().fallback = decision;
    }

    /// Queue a decision for the next access check.
    pub fn push_decision(&self, decision: AccessDecision) {
        self.lock().scripted.push_back(Ok(decision));
    }

    /// Queue a failure for the next access check.
    pub fn push_error(&self, error: GatewayError) {
        self.lock().scripted.push_back(Err(error));
    }

    /// Set the equipment materials list.
    pub fn set_equipment_materials(&self, items: Vec<MaterialItem>) {
        self.lock().equipment = items;
    }

    /// Register a single material under its catalog ID.
    pub fn insert_material(&self, material_id: &str, item: MaterialItem) {
        self.lock().materials.insert(material_id.to_string(), item);
    }

    /// Make every catalog query fail with a transport error.
    pub fn set_catalog_down(&self, down: bool) {
        self.lock().catalog_down = down;
    }

    /// Identifiers checked so far, in order.
    pub fn access_checks(&self) -> Vec<Identifier> {
        self.lock().access_checks.clone()
    }

    /// Number of catalog queries made so far.
    pub fn catalog_queries(&self) -> usize {
        self.lock().catalog_queries
    }
}

impl AccessBackend for MockGateway {
    async fn check_access(&mut self, identifier: &Identifier) -> Result<AccessDecision> {
        let mut state = self.lock();
        state.access_checks.push(identifier.clone());
        let answer = match state.scripted.pop_front() {
            Some(answer) => answer,
            None => Ok(state.fallback.clone()),
        };
        debug!(identifier = %identifier, ?answer, "Mock access check");
        answer
    }
}

impl MaterialCatalog for MockGateway {
    async fn equipment_materials(&mut self, tool_numerical_id: u32) -> Result<Vec<MaterialItem>> {
        let mut state = self.lock();
        state.catalog_queries += 1;
        if state.catalog_down {
            return Err(GatewayError::transport(format!(
                "catalog unavailable for equipment {tool_numerical_id}"
            )));
        }
        Ok(state.equipment.clone())
    }

    async fn material(&mut self, material_id: &str) -> Result<Option<MaterialItem>> {
        let mut state = self.lock();
        state.catalog_queries += 1;
        if state.catalog_down {
            return Err(GatewayError::transport(format!(
                "catalog unavailable for material {material_id}"
            )));
        }
        Ok(state.materials.get(material_id).cloned())
    }
}
