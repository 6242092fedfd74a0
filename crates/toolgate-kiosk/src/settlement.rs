//! Settlement screen and terminal outcomes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use toolgate_core::{Error, SessionDuration, SessionId, StationConfig, UserName};
use toolgate_gateway::{MaterialCatalog, MaterialItem};
use toolgate_storage::EventAction;
use tracing::warn;

/// The three ways a session can end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementOutcome {
    /// Nothing to pay.
    NoCharge,
    /// The user paid through the purchase link.
    Paid,
    /// The user says the session was not theirs.
    NotMe,
}

impl SettlementOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettlementOutcome::NoCharge => "no_charge",
            SettlementOutcome::Paid => "paid",
            SettlementOutcome::NotMe => "not_me",
        }
    }

    /// The terminal log action written for this outcome.
    pub fn action(&self) -> EventAction {
        match self {
            SettlementOutcome::NoCharge => EventAction::NothingDue,
            SettlementOutcome::Paid => EventAction::PaymentSubmitted,
            SettlementOutcome::NotMe => EventAction::NotMe,
        }
    }
}

impl fmt::Display for SettlementOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettlementOutcome {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "no_charge" | "nothing_due" => Ok(SettlementOutcome::NoCharge),
            "paid" | "payment_submitted" => Ok(SettlementOutcome::Paid),
            "not_me" => Ok(SettlementOutcome::NotMe),
            other => Err(Error::Data(format!("unknown settlement outcome: {other}"))),
        }
    }
}

/// What `settle` hands back once the terminal event is written.
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementReceipt {
    pub session_id: SessionId,
    pub outcome: SettlementOutcome,
    pub user: UserName,
    pub duration: Option<SessionDuration>,
    pub billed_quantity: Option<u64>,
}

/// One catalog entry as shown on the settlement screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialLine {
    pub label: String,
    pub unit: String,
    pub cost: String,
    /// Purchase link, rendered as a QR code on a graphical kiosk.
    pub qr_payload: String,
}

impl From<MaterialItem> for MaterialLine {
    fn from(item: MaterialItem) -> Self {
        Self {
            label: item.label,
            unit: item.unit,
            cost: item.cost,
            qr_payload: item.purchase,
        }
    }
}

/// Content of the settlement screen.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SettlementScreen {
    pub message: String,
    pub materials: Vec<MaterialLine>,
    /// Set when the materials section is enabled but the catalog failed.
    pub materials_unavailable: bool,
    /// Rating labels, lowest first. `None` hides the rating controls.
    pub rating_labels: Option<Vec<String>>,
}

impl SettlementScreen {
    /// Build the screen, querying the equipment catalog if materials are shown.
    ///
    /// Catalog failures degrade the screen and never fail the stage.
    pub async fn load<C: MaterialCatalog>(config: &StationConfig, catalog: &mut C) -> Self {
        let ending = &config.ending_page;
        let mut screen = Self {
            message: ending.custom_message.clone(),
            rating_labels: ending
                .show_experience_scale
                .then(|| ending.rating_labels.clone()),
            ..Self::default()
        };

        if ending.show_materials {
            match catalog
                .equipment_materials(config.station.tool_numerical_id)
                .await
            {
                Ok(items) => screen.materials = items.into_iter().map(MaterialLine::from).collect(),
                Err(e) => {
                    warn!(
                        tool = config.station.tool_numerical_id,
                        error = %e,
                        "Equipment catalog unavailable"
                    );
                    screen.materials_unavailable = true;
                }
            }
        }
        screen
    }

    pub fn shows_rating(&self) -> bool {
        self.rating_labels.is_some()
    }

    /// Plain-text rendering for a terminal.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![self.message.clone()];
        if self.materials_unavailable {
            lines.push("Materials list unavailable.".to_string());
        }
        for m in &self.materials {
            lines.push(format!("{} - {} per {} - {}", m.label, m.cost, m.unit, m.qr_payload));
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use toolgate_gateway::MockGateway;

    fn filament() -> MaterialItem {
        MaterialItem {
            label: "PLA filament".into(),
            unit: "gram".into(),
            cost: "0.05".into(),
            purchase: "https://example.org/buy?id=7".into(),
            image: None,
        }
    }

    #[rstest]
    #[case(SettlementOutcome::NoCharge, EventAction::NothingDue)]
    #[case(SettlementOutcome::Paid, EventAction::PaymentSubmitted)]
    #[case(SettlementOutcome::NotMe, EventAction::NotMe)]
    fn test_outcome_actions(#[case] outcome: SettlementOutcome, #[case] action: EventAction) {
        assert_eq!(outcome.action(), action);
        assert!(action.is_terminal());
        assert_eq!(outcome.as_str().parse::<SettlementOutcome>().unwrap(), outcome);
    }

    #[test]
    fn test_unknown_outcome() {
        assert!("refund".parse::<SettlementOutcome>().is_err());
    }

    #[tokio::test]
    async fn test_screen_lists_materials() {
        let mut gateway = MockGateway::new();
        gateway.set_equipment_materials(vec![filament()]);
        let config = StationConfig::default();

        let screen = SettlementScreen::load(&config, &mut gateway).await;
        assert_eq!(screen.message, config.ending_page.custom_message);
        assert_eq!(screen.materials.len(), 1);
        assert_eq!(screen.materials[0].qr_payload, "https://example.org/buy?id=7");
        assert!(screen.shows_rating());
        assert!(!screen.materials_unavailable);
    }

    #[tokio::test]
    async fn test_screen_degrades_when_catalog_down() {
        let mut gateway = MockGateway::new();
        gateway.set_catalog_down(true);

        let screen = SettlementScreen::load(&StationConfig::default(), &mut gateway).await;
        assert!(screen.materials.is_empty());
        assert!(screen.materials_unavailable);
        assert_eq!(screen.lines().len(), 2);
    }

    #[tokio::test]
    async fn test_hidden_sections() {
        let mut gateway = MockGateway::new();
        gateway.set_equipment_materials(vec![filament()]);
        let mut config = StationConfig::default();
        config.ending_page.show_materials = false;
        config.ending_page.show_experience_scale = false;
        config.ending_page.custom_message = "Bye".into();

        let screen = SettlementScreen::load(&config, &mut gateway).await;
        assert!(screen.materials.is_empty());
        assert!(!screen.shows_rating());
        assert_eq!(screen.lines(), vec!["Bye"]);
        assert_eq!(gateway.catalog_queries(), 0);
    }
}
