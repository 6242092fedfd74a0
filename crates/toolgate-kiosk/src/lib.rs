//! Kiosk workflow for toolgate.
//!
//! This crate contains the session state machine, the [`Kiosk`] orchestrator
//! that walks one user from credential to settlement, the stage logic for the
//! timer, usage and settlement screens, and the operator input seam.

pub mod display;
pub mod input;
pub mod runner;
pub mod settlement;
pub mod state_machine;
pub mod timer;
pub mod usage;
pub mod workflow;

pub use display::{
    Alignment, VirtualDisplay, VirtualDisplayBuilder, align_text, truncate_text, wrap_text,
};
pub use input::{OperatorEvent, OperatorInput, ScriptedInput, ScriptedInputHandle, TerminalInput};
pub use runner::{login_stage, run, run_cycle, settlement_stage, timer_stage, usage_stage};
pub use settlement::{MaterialLine, SettlementOutcome, SettlementReceipt, SettlementScreen};
pub use state_machine::{KioskState, StateMachine, StateMachineBuilder, StateTransition};
pub use timer::SessionTimer;
pub use usage::{UsageReceipt, parse_usage_input};
pub use workflow::{Kiosk, Stage, StageTransition};
