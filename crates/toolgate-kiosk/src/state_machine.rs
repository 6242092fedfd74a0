//! Kiosk session state machine.
//!
//! This module enforces the order of the kiosk workflow, from waiting for a
//! credential through the access decision, the session timer, the optional
//! usage prompt and settlement, back to waiting for the next user.
//!
//! # States
//!
//! - `AwaitingCredential`: Prompt shown, waiting for an RFID scan or email
//! - `Authenticating`: Backend permission query in flight
//! - `AccessGranted`: Welcome shown, session context created
//! - `AccessDenied`: Refusal or contact failure shown, waiting out the retry delay
//! - `TimerRunning`: Session clock running
//! - `UsageInput`: Asking how much consumable was used
//! - `Settlement`: Materials, rating and payment screen
//! - `Terminal`: Terminal event logged, context discarded
//!
//! # Valid Transitions
//!
//! - AwaitingCredential → Authenticating → AccessGranted/AccessDenied
//! - AccessDenied → AwaitingCredential
//! - AccessGranted → TimerRunning → UsageInput/Settlement
//! - UsageInput → Settlement → Terminal → AwaitingCredential
//!
//! # Examples
//!
//! ```
//! use toolgate_kiosk::{KioskState, StateMachine};
//!
//! let mut machine = StateMachine::new();
//! assert_eq!(machine.current_state(), &KioskState::AwaitingCredential);
//!
//! machine.transition_to(KioskState::Authenticating).unwrap();
//! assert!(machine.transition_to(KioskState::Settlement).is_err());
//! ```
//!
//! # Builder Pattern
//!
//! A stage process resuming mid-session starts the machine where the previous
//! process left off:
//!
//! ```
//! use toolgate_kiosk::{KioskState, StateMachine};
//!
//! let machine = StateMachine::builder()
//!     .with_initial_state(KioskState::Settlement)
//!     .build();
//!
//! assert_eq!(machine.current_state(), &KioskState::Settlement);
//! ```

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

use toolgate_core::{Error, Result};

/// Maximum number of state transitions to keep in history.
///
/// One complete session is six transitions, so this holds the last dozen or so
/// sessions at a station.
const MAX_HISTORY_SIZE: usize = 100;

/// Every state of the kiosk workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KioskState {
    /// Waiting for an RFID scan or email address.
    AwaitingCredential,

    /// Querying the backend permission API.
    Authenticating,

    /// Access granted; a session context exists.
    AccessGranted,

    /// Access refused or backend unreachable.
    AccessDenied,

    /// Session clock running.
    TimerRunning,

    /// Asking for the consumed quantity.
    UsageInput,

    /// Materials, rating and payment.
    Settlement,

    /// Session closed; about to return to the prompt.
    Terminal,
}

impl fmt::Display for KioskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state_str = match self {
            KioskState::AwaitingCredential => "AwaitingCredential",
            KioskState::Authenticating => "Authenticating",
            KioskState::AccessGranted => "AccessGranted",
            KioskState::AccessDenied => "AccessDenied",
            KioskState::TimerRunning => "TimerRunning",
            KioskState::UsageInput => "UsageInput",
            KioskState::Settlement => "Settlement",
            KioskState::Terminal => "Terminal",
        };
        write!(f, "{}", state_str)
    }
}

impl KioskState {
    /// Check if transition to target state is valid from this state.
    ///
    /// # Examples
    ///
    /// ```
    /// use toolgate_kiosk::KioskState;
    ///
    /// assert!(KioskState::TimerRunning.can_transition_to(&KioskState::Settlement));
    /// assert!(!KioskState::AccessDenied.can_transition_to(&KioskState::TimerRunning));
    /// ```
    pub fn can_transition_to(&self, target: &KioskState) -> bool {
        matches!(
            (self, target),
            (KioskState::AwaitingCredential, KioskState::Authenticating)
                | (
                    KioskState::Authenticating,
                    KioskState::AccessGranted | KioskState::AccessDenied
                )
                | (KioskState::AccessDenied, KioskState::AwaitingCredential)
                | (KioskState::AccessGranted, KioskState::TimerRunning)
                | (
                    KioskState::TimerRunning,
                    KioskState::UsageInput | KioskState::Settlement
                )
                | (KioskState::UsageInput, KioskState::Settlement)
                | (KioskState::Settlement, KioskState::Terminal)
                | (KioskState::Terminal, KioskState::AwaitingCredential)
        )
    }

    /// Whether a session context must exist in this state.
    pub fn has_session(&self) -> bool {
        matches!(
            self,
            KioskState::AccessGranted
                | KioskState::TimerRunning
                | KioskState::UsageInput
                | KioskState::Settlement
        )
    }
}

/// One validated move between two states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: KioskState,
    pub to: KioskState,
}

impl StateTransition {
    pub fn new(from: KioskState, to: KioskState) -> Self {
        Self { from, to }
    }

    /// Whether this move discards the session context.
    pub fn ends_session(&self) -> bool {
        self.from.has_session() && !self.to.has_session()
    }
}

/// State machine for the kiosk workflow.
///
/// The machine only validates and records transitions. Session data lives in
/// the orchestrator that drives it.
///
/// # Examples
///
/// ```
/// use toolgate_kiosk::{KioskState, StateMachine};
///
/// let mut machine = StateMachine::new();
/// machine.transition_to(KioskState::Authenticating).unwrap();
/// machine.transition_to(KioskState::AccessDenied).unwrap();
/// machine.transition_to(KioskState::AwaitingCredential).unwrap();
///
/// assert_eq!(machine.history().len(), 3);
/// ```
#[derive(Debug)]
pub struct StateMachine {
    current: KioskState,
    history: VecDeque<StateTransition>,
}

impl StateMachine {
    /// Create a new state machine waiting for a credential.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> StateMachineBuilder {
        StateMachineBuilder::default()
    }

    pub fn current_state(&self) -> &KioskState {
        &self.current
    }

    /// Recent transitions, oldest first.
    pub fn history(&self) -> &VecDeque<StateTransition> {
        &self.history
    }

    /// Transition to a new state, validating the transition.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidStateTransition` if the transition is not allowed
    /// from the current state. The machine is left unchanged.
    ///
    /// # Examples
    ///
    /// ```
    /// use toolgate_kiosk::{KioskState, StateMachine};
    ///
    /// let mut machine = StateMachine::new();
    ///
    /// let transition = machine.transition_to(KioskState::Authenticating).unwrap();
    /// assert_eq!(transition.from, KioskState::AwaitingCredential);
    ///
    /// assert!(machine.transition_to(KioskState::Terminal).is_err());
    /// assert_eq!(machine.current_state(), &KioskState::Authenticating);
    /// ```
    pub fn transition_to(&mut self, next: KioskState) -> Result<StateTransition> {
        if !self.current.can_transition_to(&next) {
            return Err(Error::InvalidStateTransition {
                from: self.current.to_string(),
                to: next.to_string(),
            });
        }
        Ok(self.enter(next))
    }

    /// Force the machine back to `AwaitingCredential`.
    ///
    /// Used for recovery when a stage fails in a way the workflow cannot
    /// continue from.
    pub fn reset(&mut self) -> StateTransition {
        self.enter(KioskState::AwaitingCredential)
    }

    fn enter(&mut self, next: KioskState) -> StateTransition {
        let transition = StateTransition::new(self.current, next);
        self.current = next;
        if self.history.len() == MAX_HISTORY_SIZE {
            self.history.pop_front();
        }
        self.history.push_back(transition);
        transition
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for restoring a `StateMachine` mid-workflow.
#[derive(Debug, Default)]
pub struct StateMachineBuilder {
    initial_state: Option<KioskState>,
}

impl StateMachineBuilder {
    pub fn with_initial_state(mut self, state: KioskState) -> Self {
        self.initial_state = Some(state);
        self
    }

    pub fn build(self) -> StateMachine {
        StateMachine {
            current: self.initial_state.unwrap_or(KioskState::AwaitingCredential),
            history: VecDeque::with_capacity(MAX_HISTORY_SIZE),
        }
    }
}
