//! Shared fixtures for kiosk integration tests.
//!
//! Each [`Station`] lives in its own temp directory with its own log and
//! handoff files. Kiosks built from the same station share those files, the
//! way stage processes on one machine do.

#![allow(dead_code)]

use std::sync::Arc;

use tempfile::TempDir;
use toolgate_core::{FakeClock, StationConfig};
use toolgate_gateway::{MaterialItem, MockGateway};
use toolgate_kiosk::{Kiosk, Stage};
use toolgate_storage::{EventLog, LoggedRow, SessionJournal};

pub const PERMISSION: &str = "printer";
pub const STATION: &str = "ws-03";
pub const MATERIAL_ID: &str = "42";

pub struct Station {
    pub dir: TempDir,
    pub config: StationConfig,
    pub gateway: MockGateway,
    pub clock: FakeClock,
}

impl Station {
    pub fn new(gateway: MockGateway) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = StationConfig::default();
        config.logging.log_file_path = dir.path().join("SessionLog.txt");
        config.logging.handoff_path = dir.path().join("temp_user_data.json");
        config.login.tool_id = PERMISSION.to_string();
        config.station.workstation_id = STATION.to_string();
        config.station.tool_numerical_id = 424;
        config.usage_input.material_id = MATERIAL_ID.to_string();
        config.usage_input.usage_unit = "grams".to_string();

        gateway.insert_material(MATERIAL_ID, filament());
        gateway.set_equipment_materials(vec![filament()]);

        Self {
            dir,
            config,
            gateway,
            clock: FakeClock::new(),
        }
    }

    pub fn journal(&self) -> SessionJournal {
        let log = EventLog::from_config(&self.config.logging);
        log.initialize().unwrap();
        SessionJournal::new(log)
    }

    pub fn kiosk(&self) -> Kiosk<MockGateway> {
        Kiosk::new(
            self.config.clone(),
            self.gateway.clone(),
            self.journal(),
            Arc::new(self.clock.clone()),
        )
    }

    /// A kiosk as started by a stage process.
    pub async fn resume(&self, stage: Stage) -> Kiosk<MockGateway> {
        Kiosk::resume(
            stage,
            self.config.clone(),
            self.gateway.clone(),
            self.journal(),
            Arc::new(self.clock.clone()),
        )
        .await
        .unwrap()
    }

    pub fn rows(&self) -> Vec<LoggedRow> {
        EventLog::from_config(&self.config.logging)
            .read_rows()
            .unwrap()
    }

    pub fn text_lines(&self) -> Vec<String> {
        EventLog::from_config(&self.config.logging)
            .read_text_lines()
            .unwrap()
    }

    pub fn actions(&self) -> Vec<String> {
        self.rows().into_iter().map(|r| r.action).collect()
    }
}

pub fn filament() -> MaterialItem {
    MaterialItem {
        label: "PLA filament".to_string(),
        unit: "gram".to_string(),
        cost: "0.05".to_string(),
        purchase: "https://example.org/buy?id=7".to_string(),
        image: None,
    }
}
