//! Drives a [`Kiosk`] with operator input.
//!
//! [`run`] is the perpetual single-process loop. The stage functions are the
//! same steps split at the handoff points, for stage-per-process operation.

use tokio_util::sync::CancellationToken;
use toolgate_core::{Error, Result, SessionDuration, SessionId};
use toolgate_gateway::{AccessBackend, MaterialCatalog};
use tracing::{error, info, warn};

use crate::input::OperatorInput;
use crate::settlement::SettlementReceipt;
use crate::state_machine::KioskState;
use crate::usage::{UsageReceipt, parse_usage_input, usage_prompt};
use crate::workflow::Kiosk;

/// Run sessions until the operator input closes. Returns the number settled.
///
/// Errors inside a session abort that session and the loop continues.
pub async fn run<B, I>(kiosk: &mut Kiosk<B>, input: &mut I) -> Result<u64>
where
    B: AccessBackend + MaterialCatalog,
    I: OperatorInput,
{
    let mut settled = 0;
    loop {
        match run_cycle(kiosk, input).await {
            Ok(Some(receipt)) => {
                settled += 1;
                info!(
                    session_id = %receipt.session_id,
                    outcome = %receipt.outcome,
                    settled,
                    "Cycle complete"
                );
            }
            Ok(None) => {
                info!(settled, "Operator input closed, stopping");
                return Ok(settled);
            }
            Err(e) => {
                error!(error = %e, "Session failed");
                kiosk.abort_session();
            }
        }
    }
}

/// One full cycle: login, timer, usage (if enabled) and settlement.
///
/// Returns `Ok(None)` if the input closed before the session was settled.
pub async fn run_cycle<B, I>(kiosk: &mut Kiosk<B>, input: &mut I) -> Result<Option<SettlementReceipt>>
where
    B: AccessBackend + MaterialCatalog,
    I: OperatorInput,
{
    let Some(session_id) = login_stage(kiosk, input).await? else {
        return Ok(None);
    };
    if timer_stage(kiosk, input, session_id).await?.is_none() {
        return Ok(None);
    }
    if *kiosk.state() == KioskState::UsageInput {
        usage_stage(kiosk, input, session_id).await?;
    }
    settlement_stage(kiosk, input, session_id).await
}

/// Prompt for credentials until one is granted, then start the timer.
///
/// Every refusal shows its reason, waits the retry delay and prompts again.
/// Returns `Ok(None)` when the input closes.
pub async fn login_stage<B, I>(kiosk: &mut Kiosk<B>, input: &mut I) -> Result<Option<SessionId>>
where
    B: AccessBackend + MaterialCatalog,
    I: OperatorInput,
{
    loop {
        input.show(&kiosk.display().render()).await?;
        let Some(raw) = input.read_credential().await? else {
            return Ok(None);
        };

        match kiosk.submit_credential(&raw).await {
            Ok(context) => {
                input.show(&kiosk.display().render()).await?;
                tokio::time::sleep(kiosk.config().kiosk.grant_delay()).await;
                kiosk.advance_to_timer(context.session_id()).await?;
                return Ok(Some(context.session_id()));
            }
            Err(e) if *kiosk.state() == KioskState::AccessDenied => {
                input.show(&kiosk.display().render()).await?;
                if !e.is_retryable() {
                    warn!(error = %e, "Unexpected access failure, retrying");
                }
                kiosk.await_retry().await?;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Run the session clock until the operator ends it, then stop the timer.
///
/// Returns `Ok(None)` if the input closes first. The timer keeps running and
/// no `end` event is written.
pub async fn timer_stage<B, I>(
    kiosk: &mut Kiosk<B>,
    input: &mut I,
    session_id: SessionId,
) -> Result<Option<SessionDuration>>
where
    B: AccessBackend + MaterialCatalog,
    I: OperatorInput,
{
    kiosk.active_session(session_id)?;

    if kiosk.config().session_time.enable_timer_window {
        input.show(&kiosk.display().render()).await?;
        let cancel = CancellationToken::new();
        let stopper = cancel.clone();

        let (ticks, ended) = tokio::join!(kiosk.run_timer(session_id, cancel), async move {
            let ended = input.wait_end_session().await;
            stopper.cancel();
            ended
        });
        ticks?;
        if !ended? {
            info!(session_id = %session_id, "Operator input closed during the timer");
            return Ok(None);
        }
    }

    kiosk.end_timer(session_id).await.map(Some)
}

/// Ask for the used quantity and bill it, or skip on unusable input.
pub async fn usage_stage<B, I>(
    kiosk: &mut Kiosk<B>,
    input: &mut I,
    session_id: SessionId,
) -> Result<Option<UsageReceipt>>
where
    B: AccessBackend + MaterialCatalog,
    I: OperatorInput,
{
    kiosk.active_session(session_id)?;
    let material = kiosk.usage_material().await;
    let unit = kiosk.config().usage_input.usage_unit.clone();
    let prompt = usage_prompt(&kiosk.config().usage_input, material.as_ref());
    kiosk.display_mut().show_message(&prompt);
    input.show(&kiosk.display().render()).await?;

    let amount = input
        .read_usage(&unit)
        .await?
        .as_deref()
        .and_then(parse_usage_input);

    let Some(amount) = amount else {
        kiosk.skip_usage(session_id).await?;
        return Ok(None);
    };

    let receipt = kiosk.collect_usage(session_id, amount, &unit).await?;
    if let Some(link) = &receipt.payment_reference {
        input
            .show(&format!(
                "Pay for {} {unit}: {link}",
                receipt.billed_quantity()
            ))
            .await?;
    }
    Ok(Some(receipt))
}

/// Show materials, take an optional rating, and settle.
///
/// Returns `Ok(None)` if the input closes before a settlement choice.
pub async fn settlement_stage<B, I>(
    kiosk: &mut Kiosk<B>,
    input: &mut I,
    session_id: SessionId,
) -> Result<Option<SettlementReceipt>>
where
    B: AccessBackend + MaterialCatalog,
    I: OperatorInput,
{
    kiosk.active_session(session_id)?;
    let screen = kiosk.settlement_screen().await;
    input.show(&screen.lines().join("\n")).await?;

    if let Some(labels) = &screen.rating_labels
        && let Some(rating) = input.read_rating(labels).await?
    {
        let comment = input.read_comment().await?;
        match kiosk.rate(session_id, rating, comment).await {
            Ok(()) => {}
            Err(e @ (Error::InvalidRating { .. } | Error::AlreadyRated)) => {
                warn!(error = %e, "Rating ignored");
            }
            Err(e) => return Err(e),
        }
    }

    let Some(outcome) = input.choose_settlement().await? else {
        return Ok(None);
    };
    let receipt = kiosk.settle(session_id, outcome).await?;
    input.show(&kiosk.config().ending_page.custom_message).await?;
    Ok(Some(receipt))
}
