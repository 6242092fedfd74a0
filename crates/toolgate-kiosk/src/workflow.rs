//! Session orchestrator.
//!
//! [`Kiosk`] owns the state machine, the active [`SessionContext`], the
//! session journal and the display. Every operation checks the current state
//! and the session id, writes its log event, and only then commits the state
//! change, so a failed write leaves the session where it was.
//!
//! ```text
//! submit_credential ──► advance_to_timer ──► end_timer ──┬─► collect_usage ─┬─► rate? ──► settle
//!        │                                               └─► skip_usage ────┘
//!        └─(refused)─► await_retry ──► (prompt again)
//! ```
//!
//! A kiosk can also run one stage per process: [`Kiosk::hand_off`] writes the
//! context to the handoff mailbox and [`Kiosk::resume`] picks it up in the
//! next process.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use toolgate_core::constants::{MAX_RATING, MIN_RATING, MSG_RETRY_PROMPT};
use toolgate_core::{
    Clock, Error, Feedback, Identifier, Result, SessionContext, SessionDuration, SessionId,
    StationConfig, UsageRecord,
};
use toolgate_gateway::{AccessBackend, AccessDecision, MaterialCatalog, MaterialItem};
use toolgate_storage::{EventAction, EventRecord, HandoffMailbox, SessionJournal};
use tracing::{debug, error, info, warn};

use crate::display::VirtualDisplay;
use crate::settlement::{SettlementOutcome, SettlementReceipt, SettlementScreen};
use crate::state_machine::{KioskState, StateMachine};
use crate::timer::SessionTimer;
use crate::usage::{UsageReceipt, lookup_material, payment_reference};

/// A stage a separate process can be resumed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Timer,
    Usage,
    Settlement,
}

impl Stage {
    /// The machine state a resumed process starts in.
    pub fn state(&self) -> KioskState {
        match self {
            Stage::Timer => KioskState::TimerRunning,
            Stage::Usage => KioskState::UsageInput,
            Stage::Settlement => KioskState::Settlement,
        }
    }

    /// The stage that handles a machine state, if any.
    pub fn for_state(state: KioskState) -> Option<Stage> {
        match state {
            KioskState::TimerRunning => Some(Stage::Timer),
            KioskState::UsageInput => Some(Stage::Usage),
            KioskState::Settlement => Some(Stage::Settlement),
            _ => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Timer => "timer",
            Stage::Usage => "usage",
            Stage::Settlement => "settle",
        };
        f.write_str(name)
    }
}

/// Result of a stage-advancing operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageTransition {
    Advanced { from: KioskState, to: KioskState },
    /// The operation had already happened; nothing was written.
    Unchanged { state: KioskState },
}

impl StageTransition {
    /// State after the operation.
    pub fn state(&self) -> KioskState {
        match self {
            StageTransition::Advanced { to, .. } => *to,
            StageTransition::Unchanged { state } => *state,
        }
    }

    pub fn is_advanced(&self) -> bool {
        matches!(self, StageTransition::Advanced { .. })
    }
}

/// The kiosk at one station.
pub struct Kiosk<B> {
    config: StationConfig,
    backend: B,
    journal: SessionJournal,
    mailbox: HandoffMailbox,
    clock: Arc<dyn Clock>,
    machine: StateMachine,
    display: VirtualDisplay,
    session: Option<SessionContext>,
    // Outer None: not looked up yet for this session.
    usage_material: Option<Option<MaterialItem>>,
}

impl<B> fmt::Debug for Kiosk<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kiosk")
            .field("state", self.machine.current_state())
            .field("session", &self.session.as_ref().map(|s| s.session_id()))
            .field("station", &self.config.station.workstation_id)
            .finish_non_exhaustive()
    }
}

impl<B: AccessBackend + MaterialCatalog> Kiosk<B> {
    /// Create a kiosk waiting for a credential.
    ///
    /// The handoff mailbox lives at `config.logging.handoff_path`.
    pub fn new(
        config: StationConfig,
        backend: B,
        journal: SessionJournal,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let mailbox = HandoffMailbox::new(config.logging.handoff_path.clone());
        Self {
            config,
            backend,
            journal,
            mailbox,
            clock,
            machine: StateMachine::new(),
            display: VirtualDisplay::default(),
            session: None,
            usage_material: None,
        }
    }

    /// Start a kiosk in the middle of a session, from the handoff mailbox.
    ///
    /// The mailbox is consumed. A missing or corrupt handoff yields the
    /// unknown context. A context resumed into the timer without a start time
    /// starts now and logs its `start` event.
    ///
    /// # Errors
    /// Fails only if that `start` event cannot be written.
    pub async fn resume(
        stage: Stage,
        config: StationConfig,
        backend: B,
        journal: SessionJournal,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let mut kiosk = Self::new(config, backend, journal, clock);
        let mut context = kiosk.mailbox.collect_or_default();

        let now = kiosk.clock.now();
        if stage == Stage::Timer && context.start_timer(now) {
            warn!(session_id = %context.session_id(), "Resumed session had no start time");
            kiosk.record(EventAction::Start, &context, now).await?;
        }

        let state = stage.state();
        kiosk.machine = StateMachine::builder().with_initial_state(state).build();
        kiosk.display.update_from_state(&state);
        info!(
            stage = %stage,
            session_id = %context.session_id(),
            user = %context.user(),
            "Resumed session"
        );
        kiosk.session = Some(context);
        Ok(kiosk)
    }

    pub fn state(&self) -> &KioskState {
        self.machine.current_state()
    }

    pub fn machine(&self) -> &StateMachine {
        &self.machine
    }

    pub fn display(&self) -> &VirtualDisplay {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut VirtualDisplay {
        &mut self.display
    }

    pub fn session(&self) -> Option<&SessionContext> {
        self.session.as_ref()
    }

    pub fn config(&self) -> &StationConfig {
        &self.config
    }

    pub fn journal(&self) -> &SessionJournal {
        &self.journal
    }

    pub fn mailbox(&self) -> &HandoffMailbox {
        &self.mailbox
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// The active session, if it is `session_id`.
    ///
    /// # Errors
    /// `Error::NoActiveSession` without a session, `Error::SessionMismatch`
    /// for any other id.
    pub fn active_session(&self, session_id: SessionId) -> Result<&SessionContext> {
        let context = self.session.as_ref().ok_or(Error::NoActiveSession)?;
        if context.session_id() != session_id {
            return Err(Error::SessionMismatch {
                given: session_id.to_string(),
            });
        }
        Ok(context)
    }

    /// Check a credential against the backend.
    ///
    /// On success the kiosk is in `AccessGranted` with a new session. On any
    /// failure it is in `AccessDenied` and the reason is on the display; call
    /// [`Kiosk::await_retry`] to get back to the prompt.
    ///
    /// # Errors
    /// - `Error::InvalidCredential` for blank input, before any network call
    /// - `Error::Transport` or `Error::Auth` when the backend cannot answer
    /// - `Error::Denied` when the backend refuses access
    /// - `Error::InvalidStateTransition` when not waiting for a credential
    pub async fn submit_credential(&mut self, raw: &str) -> Result<SessionContext> {
        self.transition(KioskState::Authenticating)?;

        let identifier = match Identifier::new(raw) {
            Ok(identifier) => identifier,
            Err(e) => return Err(self.refuse(e)),
        };

        info!(identifier = %identifier, kind = %identifier.kind(), "Checking access");
        let decision = self.backend.check_access(&identifier).await;

        match decision {
            Ok(AccessDecision::Granted { user }) => {
                let context = SessionContext::granted(
                    &identifier,
                    user,
                    &self.config.login.tool_id,
                    &self.config.station.workstation_id,
                );
                self.transition(KioskState::AccessGranted)?;
                self.display.show_welcome(context.user());
                info!(
                    session_id = %context.session_id(),
                    user = %context.user(),
                    permission = context.permission(),
                    "Access granted"
                );
                self.session = Some(context.clone());
                self.usage_material = None;
                Ok(context)
            }
            Ok(AccessDecision::Denied { reason }) => Err(self.refuse(Error::Denied { reason })),
            Err(e) => Err(self.refuse(e.into())),
        }
    }

    /// Wait out the retry delay and return to the credential prompt.
    ///
    /// # Errors
    /// `Error::InvalidStateTransition` unless access was just refused.
    pub async fn await_retry(&mut self) -> Result<()> {
        self.ensure_can(KioskState::AwaitingCredential)?;
        let delay = self.config.kiosk.retry_delay();
        debug!(delay_ms = delay.as_millis() as u64, "Waiting before retry");
        tokio::time::sleep(delay).await;

        self.machine.transition_to(KioskState::AwaitingCredential)?;
        self.display.show_message(MSG_RETRY_PROMPT);
        Ok(())
    }

    /// Start the session clock and log the `start` event.
    ///
    /// Calling it again for a running timer returns
    /// [`StageTransition::Unchanged`] and writes nothing.
    pub async fn advance_to_timer(&mut self, session_id: SessionId) -> Result<StageTransition> {
        let mut context = self.active_session(session_id)?.clone();
        let from = *self.machine.current_state();
        if from == KioskState::TimerRunning {
            return Ok(StageTransition::Unchanged { state: from });
        }
        self.ensure_can(KioskState::TimerRunning)?;

        let now = self.clock.now();
        context.start_timer(now);
        self.record(EventAction::Start, &context, now).await?;

        self.machine.transition_to(KioskState::TimerRunning)?;
        let start = context.start_time().unwrap_or(now);
        self.display.show_elapsed(SessionDuration::between(start, now));
        info!(session_id = %session_id, "Session timer started");
        self.session = Some(context);

        Ok(StageTransition::Advanced {
            from,
            to: KioskState::TimerRunning,
        })
    }

    /// Refresh the elapsed time on the display until `cancel` fires.
    ///
    /// Returns at once when the timer window is disabled.
    pub async fn run_timer(&mut self, session_id: SessionId, cancel: CancellationToken) -> Result<u64> {
        let start = self.active_session(session_id)?.start_time();
        self.require_state(KioskState::TimerRunning, "Timer")?;
        let start = start.unwrap_or_else(|| self.clock.now());

        let timer = SessionTimer::from_config(&self.config);
        Ok(timer
            .run(&mut self.display, self.clock.as_ref(), start, cancel)
            .await)
    }

    /// Stop the session clock and log the `end` event.
    ///
    /// Moves to `UsageInput` when usage collection is enabled, otherwise to
    /// `Settlement`. Calling it again after the timer stopped returns the
    /// recorded duration.
    pub async fn end_timer(&mut self, session_id: SessionId) -> Result<SessionDuration> {
        let mut context = self.active_session(session_id)?.clone();
        let from = *self.machine.current_state();
        if matches!(from, KioskState::UsageInput | KioskState::Settlement)
            && let Some(duration) = context.duration()
        {
            return Ok(duration);
        }

        let to = if self.config.usage_input.enabled {
            KioskState::UsageInput
        } else {
            KioskState::Settlement
        };
        self.ensure_can(to)?;

        let now = self.clock.now();
        let duration = context.stop_timer(now)?;
        self.record(EventAction::End, &context, now).await?;

        self.transition(to)?;
        info!(session_id = %session_id, duration = %duration, "Session timer stopped");
        self.session = Some(context);
        Ok(duration)
    }

    /// The usage consumable as priced by the catalog, looked up once per session.
    pub async fn usage_material(&mut self) -> Option<MaterialItem> {
        if let Some(cached) = &self.usage_material {
            return cached.clone();
        }
        let item = lookup_material(&mut self.backend, &self.config.usage_input).await;
        self.usage_material = Some(item.clone());
        item
    }

    /// Record the used quantity and log the `Usage` event.
    ///
    /// The payment reference is `None` when the catalog lookup failed.
    ///
    /// # Errors
    /// `Error::InvalidUsage` for a negative or non-finite amount; the kiosk
    /// stays in `UsageInput`.
    pub async fn collect_usage(
        &mut self,
        session_id: SessionId,
        amount: f64,
        unit: &str,
    ) -> Result<UsageReceipt> {
        let mut context = self.active_session(session_id)?.clone();
        self.require_state(KioskState::UsageInput, "Usage")?;
        let usage = UsageRecord::new(amount, unit)?;

        let material = self.usage_material().await;
        let payment_reference = payment_reference(material.as_ref(), usage.billed_quantity);

        context.record_usage(usage.clone());
        self.record(EventAction::Usage, &context, self.clock.now())
            .await?;

        self.transition(KioskState::Settlement)?;
        info!(
            session_id = %session_id,
            amount,
            billed = usage.billed_quantity,
            unit = %usage.unit,
            has_payment_link = payment_reference.is_some(),
            "Usage recorded"
        );
        self.session = Some(context);

        Ok(UsageReceipt {
            usage,
            material,
            payment_reference,
        })
    }

    /// Move on to settlement without usage data. Nothing is billed or logged.
    pub async fn skip_usage(&mut self, session_id: SessionId) -> Result<StageTransition> {
        self.active_session(session_id)?;
        self.require_state(KioskState::UsageInput, "Settlement")?;
        self.transition(KioskState::Settlement)?;
        info!(session_id = %session_id, "No usage data, nothing billed");
        Ok(StageTransition::Advanced {
            from: KioskState::UsageInput,
            to: KioskState::Settlement,
        })
    }

    /// Build the settlement screen. Catalog failures degrade it silently.
    pub async fn settlement_screen(&mut self) -> SettlementScreen {
        SettlementScreen::load(&self.config, &mut self.backend).await
    }

    /// Record a satisfaction rating and log the `rating` event.
    ///
    /// Blank comments are dropped.
    ///
    /// # Errors
    /// `Error::InvalidRating` outside 1 to 5, `Error::AlreadyRated` on a
    /// second call.
    pub async fn rate(
        &mut self,
        session_id: SessionId,
        rating: u8,
        comment: Option<String>,
    ) -> Result<()> {
        let mut context = self.active_session(session_id)?.clone();
        self.require_state(KioskState::Settlement, "Rated")?;
        if !(MIN_RATING..=MAX_RATING).contains(&rating) {
            return Err(Error::InvalidRating {
                rating,
                min: MIN_RATING,
                max: MAX_RATING,
            });
        }

        let comments = comment
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        context.record_feedback(Feedback { rating, comments })?;
        self.record(EventAction::Rating, &context, self.clock.now())
            .await?;

        info!(
            session_id = %session_id,
            rating,
            label = %self.config.ending_page.rating_label(rating),
            "Session rated"
        );
        self.session = Some(context);
        Ok(())
    }

    /// Log the terminal event, discard the session and return to the prompt.
    ///
    /// # Errors
    /// `Error::NoActiveSession` once the session is settled.
    pub async fn settle(
        &mut self,
        session_id: SessionId,
        outcome: SettlementOutcome,
    ) -> Result<SettlementReceipt> {
        let context = self.active_session(session_id)?.clone();
        self.ensure_can(KioskState::Terminal)?;

        self.record(outcome.action(), &context, self.clock.now())
            .await?;
        self.transition(KioskState::Terminal)?;
        self.session = None;
        self.usage_material = None;

        info!(
            session_id = %session_id,
            outcome = %outcome,
            user = %context.user(),
            "Session settled"
        );

        self.machine.transition_to(KioskState::AwaitingCredential)?;
        self.display.reset_to_default();

        Ok(SettlementReceipt {
            session_id,
            outcome,
            user: context.user().clone(),
            duration: context.duration(),
            billed_quantity: context.usage().map(|u| u.billed_quantity),
        })
    }

    /// Write the active session to the handoff mailbox for the next stage process.
    pub fn hand_off(&self) -> Result<()> {
        let context = self.session.as_ref().ok_or(Error::NoActiveSession)?;
        self.mailbox.deposit(context)?;
        debug!(
            session_id = %context.session_id(),
            path = %self.mailbox.path().display(),
            "Session handed off"
        );
        Ok(())
    }

    /// Drop any session and go back to the prompt without logging.
    ///
    /// Recovery path for errors the workflow cannot continue from.
    pub fn abort_session(&mut self) {
        let context = self.session.take();
        self.usage_material = None;
        let transition = self.machine.reset();
        self.display.reset_to_default();
        if let Some(context) = context
            && transition.ends_session()
        {
            warn!(
                session_id = %context.session_id(),
                from = %transition.from,
                "Session aborted"
            );
        }
    }

    fn transition(&mut self, to: KioskState) -> Result<()> {
        self.machine.transition_to(to)?;
        self.display.update_from_state(&to);
        Ok(())
    }

    fn ensure_can(&self, to: KioskState) -> Result<()> {
        let from = self.machine.current_state();
        if from.can_transition_to(&to) {
            Ok(())
        } else {
            Err(Error::InvalidStateTransition {
                from: from.to_string(),
                to: to.to_string(),
            })
        }
    }

    fn require_state(&self, expected: KioskState, action: &str) -> Result<()> {
        let current = self.machine.current_state();
        if *current == expected {
            Ok(())
        } else {
            Err(Error::InvalidStateTransition {
                from: current.to_string(),
                to: action.to_string(),
            })
        }
    }

    /// Move to `AccessDenied` and show why. Returns the error for the caller.
    fn refuse(&mut self, reason: Error) -> Error {
        if let Err(e) = self.transition(KioskState::AccessDenied) {
            error!(error = %e, "Could not enter AccessDenied");
        }
        self.display.show_message(reason.display_message());
        if reason.is_retryable() {
            warn!(error = %reason, "Access refused");
        } else {
            error!(error = %reason, "Access check failed");
        }
        reason
    }

    async fn record(
        &self,
        action: EventAction,
        context: &SessionContext,
        at: DateTime<Local>,
    ) -> Result<()> {
        let record = EventRecord::from_context(action, context, at);
        self.journal.record(&record).await?;
        Ok(())
    }
}
