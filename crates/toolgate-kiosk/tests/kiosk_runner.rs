//! Integration tests for the kiosk loop
//!
//! A scripted operator queues every answer up front; the loop consumes them
//! in order and stops once the script runs out. Time is paused, so retry and
//! grant delays elapse instantly.

mod common;

use common::{STATION, Station};
use toolgate_gateway::{AccessDecision, MockGateway};
use toolgate_kiosk::{KioskState, ScriptedInput, SettlementOutcome, run, run_cycle};

#[tokio::test(start_paused = true)]
async fn test_full_cycle_with_usage_and_rating() {
    let station = Station::new(MockGateway::granting("Jane", "Doe"));
    let mut kiosk = station.kiosk();
    let (mut input, handle) = ScriptedInput::new();

    handle.text("user@example.com");
    handle.end_session();
    handle.text("5.1");
    handle.text("4");
    handle.text("Nice machine");
    handle.settle(SettlementOutcome::Paid);

    let receipt = run_cycle(&mut kiosk, &mut input).await.unwrap().unwrap();
    assert_eq!(receipt.outcome, SettlementOutcome::Paid);
    assert_eq!(receipt.billed_quantity, Some(6));
    assert_eq!(kiosk.state(), &KioskState::AwaitingCredential);

    assert_eq!(
        station.actions(),
        ["start", "Usage", "rating", "payment_submitted"]
    );
    let rows = station.rows();
    assert!(rows.iter().all(|r| r.station == STATION));
    assert_eq!(rows[1].usage, "6");
    assert_eq!(rows[2].rating, "4");
    assert_eq!(rows[2].comments, "Nice machine");

    let screens = handle.screens();
    assert!(
        screens
            .iter()
            .any(|s| s == "Pay for 6 grams: https://example.org/buy?id=7&quantity=6")
    );
    assert!(screens.iter().any(|s| s.contains("PLA filament")));
}

#[tokio::test(start_paused = true)]
async fn test_denied_serial_prompts_again_after_delay() {
    let station = Station::new(MockGateway::new());
    station.gateway.set_fallback(AccessDecision::Denied {
        reason: "access is false".to_string(),
    });
    let mut kiosk = station.kiosk();
    let (mut input, handle) = ScriptedInput::new();
    handle.text("000111");
    drop(handle);

    let started = tokio::time::Instant::now();
    let settled = run(&mut kiosk, &mut input).await.unwrap();
    assert_eq!(settled, 0);
    assert!(started.elapsed() >= station.config.kiosk.retry_delay());

    let screens = input.screens();
    assert_eq!(screens.len(), 3);
    assert!(screens[0].contains("Please scan your RFID tag"));
    assert!(screens[1].contains("Access Denied"));
    assert!(screens[2].contains("Please try again"));

    assert_eq!(kiosk.state(), &KioskState::AwaitingCredential);
    assert!(kiosk.session().is_none());
    assert!(station.rows().is_empty());
    assert!(!kiosk.mailbox().is_pending());
    assert_eq!(station.gateway.access_checks().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_loop_survives_refusals_and_runs_many_sessions() {
    let mut station = Station::new(MockGateway::granting("Jane", "Doe"));
    station.config.usage_input.enabled = false;
    station.config.ending_page.show_experience_scale = false;
    station.gateway.push_decision(AccessDecision::Denied {
        reason: "no permission".to_string(),
    });
    let mut kiosk = station.kiosk();
    let (mut input, handle) = ScriptedInput::new();

    // Refused, then blank, then two full sessions
    handle.text("04ABCDEF");
    handle.cancel();
    handle.text("04ABCDEF");
    handle.end_session();
    handle.settle(SettlementOutcome::NoCharge);
    handle.text("user@example.com");
    handle.end_session();
    handle.settle(SettlementOutcome::NotMe);
    drop(handle);

    let settled = run(&mut kiosk, &mut input).await.unwrap();
    assert_eq!(settled, 2);
    assert_eq!(
        station.actions(),
        ["start", "nothing_due", "start", "not_me"]
    );
    // The blank attempt never reached the backend
    assert_eq!(station.gateway.access_checks().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_usage_skips_billing() {
    let mut station = Station::new(MockGateway::granting("Jane", "Doe"));
    station.config.ending_page.show_experience_scale = false;
    let mut kiosk = station.kiosk();
    let (mut input, handle) = ScriptedInput::new();

    handle.text("user@example.com");
    handle.end_session();
    handle.text("a handful");
    handle.settle(SettlementOutcome::NoCharge);

    let receipt = run_cycle(&mut kiosk, &mut input).await.unwrap().unwrap();
    assert_eq!(receipt.billed_quantity, None);
    assert_eq!(station.actions(), ["start", "nothing_due"]);
}

#[tokio::test(start_paused = true)]
async fn test_timer_window_disabled_ends_at_once() {
    let mut station = Station::new(MockGateway::granting("Jane", "Doe"));
    station.config.session_time.enable_timer_window = false;
    station.config.usage_input.enabled = false;
    station.config.ending_page.show_experience_scale = false;
    let mut kiosk = station.kiosk();
    let (mut input, handle) = ScriptedInput::new();

    // No end-session press is needed
    handle.text("user@example.com");
    handle.settle(SettlementOutcome::NoCharge);

    let receipt = run_cycle(&mut kiosk, &mut input).await.unwrap().unwrap();
    assert_eq!(receipt.duration.map(|d| d.as_secs()), Some(0));
    assert_eq!(station.actions(), ["start", "nothing_due"]);
}

#[tokio::test(start_paused = true)]
async fn test_input_closed_mid_session_leaves_no_terminal_row() {
    let mut station = Station::new(MockGateway::granting("Jane", "Doe"));
    station.config.usage_input.enabled = false;
    let mut kiosk = station.kiosk();
    let (mut input, handle) = ScriptedInput::new();

    handle.text("user@example.com");
    handle.end_session();
    drop(handle);

    let outcome = run_cycle(&mut kiosk, &mut input).await.unwrap();
    assert!(outcome.is_none());
    assert_eq!(kiosk.state(), &KioskState::Settlement);
    assert_eq!(station.actions(), ["start"]);
}

#[tokio::test(start_paused = true)]
async fn test_input_closed_during_timer_keeps_session_open() {
    let station = Station::new(MockGateway::granting("Jane", "Doe"));
    let mut kiosk = station.kiosk();
    let (mut input, handle) = ScriptedInput::new();

    handle.text("user@example.com");
    drop(handle);

    let outcome = run_cycle(&mut kiosk, &mut input).await.unwrap();
    assert!(outcome.is_none());
    assert_eq!(kiosk.state(), &KioskState::TimerRunning);
    let context = kiosk.session().unwrap();
    assert!(context.start_time().is_some());
    assert!(context.duration().is_none());

    // No end event in either log
    assert_eq!(station.actions(), ["start"]);
    assert_eq!(station.text_lines().len(), 1);
}
