//! Usage collection.
//!
//! The operator types a quantity of the configured consumable. Anything that
//! is not a non-negative number counts as "no usage data": the session moves
//! on to settlement without billing.

use toolgate_core::UsageRecord;
use toolgate_core::config::UsageInputConfig;
use toolgate_gateway::{MaterialCatalog, MaterialItem};
use tracing::{debug, warn};

/// What `collect_usage` hands back.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageReceipt {
    pub usage: UsageRecord,
    /// The consumable as priced by the catalog, if the lookup worked.
    pub material: Option<MaterialItem>,
    /// Purchase link with the billed quantity appended.
    pub payment_reference: Option<String>,
}

impl UsageReceipt {
    pub fn billed_quantity(&self) -> u64 {
        self.usage.billed_quantity
    }
}

/// Parse an operator's usage entry.
///
/// Returns `None` for blank or non-numeric input, and for amounts
/// [`UsageRecord::is_billable`] rejects.
///
/// # Examples
///
/// ```
/// use toolgate_kiosk::parse_usage_input;
///
/// assert_eq!(parse_usage_input(" 5.1 "), Some(5.1));
/// assert_eq!(parse_usage_input("-1"), None);
/// assert_eq!(parse_usage_input("lots"), None);
/// assert_eq!(parse_usage_input("1e20"), None);
/// ```
pub fn parse_usage_input(raw: &str) -> Option<f64> {
    let amount: f64 = raw.trim().parse().ok()?;
    UsageRecord::is_billable(amount).then_some(amount)
}

/// Look up the usage consumable. Failures are logged and yield `None`.
pub async fn lookup_material<C: MaterialCatalog>(
    catalog: &mut C,
    config: &UsageInputConfig,
) -> Option<MaterialItem> {
    if config.material_id.trim().is_empty() {
        return None;
    }
    match catalog.material(&config.material_id).await {
        Ok(Some(item)) => Some(item),
        Ok(None) => {
            debug!(material_id = %config.material_id, "Material not in catalog");
            None
        }
        Err(e) => {
            warn!(material_id = %config.material_id, error = %e, "Material lookup failed");
            None
        }
    }
}

/// Price prompt shown above the usage entry.
pub fn usage_prompt(config: &UsageInputConfig, material: Option<&MaterialItem>) -> String {
    match material {
        Some(item) => format!(
            "How much {} did you use? {} costs {} per {}.",
            config.usage_unit, item.label, item.cost, item.unit
        ),
        None => format!("How much {} did you use?", config.usage_unit),
    }
}

/// Payment reference for a billed quantity, if the material has a usable link.
pub fn payment_reference(material: Option<&MaterialItem>, billed_quantity: u64) -> Option<String> {
    material
        .and_then(|item| item.purchase_link_with_quantity(billed_quantity))
        .map(String::from)
}
