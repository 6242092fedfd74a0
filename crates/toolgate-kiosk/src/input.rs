//! Operator-facing prompts.
//!
//! Every question the kiosk asks goes through [`OperatorInput`], so the
//! workflow can run against a terminal or against a scripted operator in
//! tests. All methods use native `async fn`; use generics rather than trait
//! objects.

#![allow(async_fn_in_trait)]

use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin, Stdout};
use tokio::sync::mpsc;
use toolgate_core::Result;
use tracing::debug;

use crate::settlement::SettlementOutcome;

/// Source of operator input and sink for screens.
pub trait OperatorInput {
    /// Show a rendered screen.
    async fn show(&mut self, screen: &str) -> Result<()>;

    /// Wait for a credential (RFID scan or typed email).
    ///
    /// Returns `Ok(None)` once the input source is closed. A dismissed prompt
    /// is reported as an empty string.
    async fn read_credential(&mut self) -> Result<Option<String>>;

    /// Wait until the operator ends the session.
    ///
    /// Returns `Ok(false)` if the input closed instead.
    async fn wait_end_session(&mut self) -> Result<bool>;

    /// Ask for the used quantity. `None` means the prompt was cancelled.
    async fn read_usage(&mut self, unit: &str) -> Result<Option<String>>;

    /// Ask for a satisfaction rating. `None` means the operator skipped it.
    async fn read_rating(&mut self, labels: &[String]) -> Result<Option<u8>>;

    /// Ask for an optional comment after a rating.
    async fn read_comment(&mut self) -> Result<Option<String>>;

    /// Wait for one of the terminal settlement actions.
    ///
    /// Returns `Ok(None)` once the input source is closed.
    async fn choose_settlement(&mut self) -> Result<Option<SettlementOutcome>>;
}

/// Line-oriented operator console on stdin/stdout.
///
/// RFID readers that act as keyboards type the serial followed by Enter, so a
/// scan and a typed email arrive the same way.
#[derive(Debug)]
pub struct TerminalInput {
    lines: Lines<BufReader<Stdin>>,
    stdout: Stdout,
}

impl Default for TerminalInput {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalInput {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
            stdout: tokio::io::stdout(),
        }
    }

    async fn prompt(&mut self, text: &str) -> Result<Option<String>> {
        self.stdout.write_all(text.as_bytes()).await?;
        self.stdout.flush().await?;
        Ok(self.lines.next_line().await?.map(|l| l.trim().to_string()))
    }
}

impl OperatorInput for TerminalInput {
    async fn show(&mut self, screen: &str) -> Result<()> {
        self.stdout.write_all(screen.as_bytes()).await?;
        self.stdout.write_all(b"\n").await?;
        self.stdout.flush().await?;
        Ok(())
    }

    async fn read_credential(&mut self) -> Result<Option<String>> {
        self.prompt("> ").await
    }

    async fn wait_end_session(&mut self) -> Result<bool> {
        let line = self.prompt("Press Enter to end the session.\n").await?;
        Ok(line.is_some())
    }

    async fn read_usage(&mut self, unit: &str) -> Result<Option<String>> {
        let line = self
            .prompt(&format!("Enter the amount of {unit} used (blank to skip): "))
            .await?;
        Ok(line.filter(|l| !l.is_empty()))
    }

    async fn read_rating(&mut self, labels: &[String]) -> Result<Option<u8>> {
        let scale = labels
            .iter()
            .enumerate()
            .map(|(i, label)| format!("{}={label}", i + 1))
            .collect::<Vec<_>>()
            .join("  ");
        let line = self
            .prompt(&format!("How was your experience? {scale} (blank to skip): "))
            .await?;
        Ok(line.and_then(|l| l.parse().ok()))
    }

    async fn read_comment(&mut self) -> Result<Option<String>> {
        let line = self.prompt("Comments (optional): ").await?;
        Ok(line.filter(|l| !l.is_empty()))
    }

    async fn choose_settlement(&mut self) -> Result<Option<SettlementOutcome>> {
        loop {
            let Some(line) = self
                .prompt("[1] Nothing to pay  [2] I paid  [3] This is not me: ")
                .await?
            else {
                return Ok(None);
            };
            let choice = match line.as_str() {
                "1" => Some(SettlementOutcome::NoCharge),
                "2" => Some(SettlementOutcome::Paid),
                "3" => Some(SettlementOutcome::NotMe),
                other => other.parse().ok(),
            };
            if choice.is_some() {
                return Ok(choice);
            }
        }
    }
}

/// Events a scripted operator can produce.
#[derive(Debug, Clone, PartialEq)]
pub enum OperatorEvent {
    /// Text typed or scanned.
    Text(String),
    /// Prompt dismissed without input.
    Cancel,
    /// "End Session" pressed.
    EndSession,
    /// A settlement button pressed.
    Settle(SettlementOutcome),
}

/// Operator driven by a [`ScriptedInputHandle`].
///
/// Each prompt consumes the next queued event. Events that do not answer the
/// current prompt are skipped. When the handle is dropped and the queue is
/// empty, the input reports itself closed.
///
/// # Examples
///
/// ```
/// use toolgate_kiosk::{OperatorInput, ScriptedInput};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> toolgate_core::Result<()> {
/// let (mut input, handle) = ScriptedInput::new();
/// handle.text("user@example.com");
/// drop(handle);
///
/// assert_eq!(input.read_credential().await?.as_deref(), Some("user@example.com"));
/// assert_eq!(input.read_credential().await?, None);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ScriptedInput {
    event_rx: mpsc::UnboundedReceiver<OperatorEvent>,
    screens: Arc<Mutex<Vec<String>>>,
}

/// Control side of a [`ScriptedInput`].
#[derive(Debug, Clone)]
pub struct ScriptedInputHandle {
    event_tx: mpsc::UnboundedSender<OperatorEvent>,
    screens: Arc<Mutex<Vec<String>>>,
}

impl ScriptedInput {
    pub fn new() -> (Self, ScriptedInputHandle) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let screens = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                event_rx,
                screens: screens.clone(),
            },
            ScriptedInputHandle { event_tx, screens },
        )
    }

    /// Every screen shown so far, oldest first.
    pub fn screens(&self) -> Vec<String> {
        self.screens
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    async fn next_event(&mut self) -> Option<OperatorEvent> {
        let event = self.event_rx.recv().await;
        debug!(?event, "Scripted operator event");
        event
    }
}

impl ScriptedInputHandle {
    pub fn push(&self, event: OperatorEvent) {
        // A send only fails once the input is gone, and then nobody is listening.
        let _ = self.event_tx.send(event);
    }

    pub fn text(&self, text: &str) {
        self.push(OperatorEvent::Text(text.to_string()));
    }

    pub fn cancel(&self) {
        self.push(OperatorEvent::Cancel);
    }

    pub fn end_session(&self) {
        self.push(OperatorEvent::EndSession);
    }

    pub fn settle(&self, outcome: SettlementOutcome) {
        self.push(OperatorEvent::Settle(outcome));
    }

    /// Every screen shown so far, oldest first.
    pub fn screens(&self) -> Vec<String> {
        self.screens
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl OperatorInput for ScriptedInput {
    async fn show(&mut self, screen: &str) -> Result<()> {
        self.screens
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(screen.to_string());
        Ok(())
    }

    async fn read_credential(&mut self) -> Result<Option<String>> {
        while let Some(event) = self.next_event().await {
            match event {
                OperatorEvent::Text(text) => return Ok(Some(text)),
                OperatorEvent::Cancel => return Ok(Some(String::new())),
                _ => continue,
            }
        }
        Ok(None)
    }

    async fn wait_end_session(&mut self) -> Result<bool> {
        while let Some(event) = self.next_event().await {
            if event == OperatorEvent::EndSession {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn read_usage(&mut self, _unit: &str) -> Result<Option<String>> {
        while let Some(event) = self.next_event().await {
            match event {
                OperatorEvent::Text(text) => return Ok(Some(text)),
                OperatorEvent::Cancel => return Ok(None),
                _ => continue,
            }
        }
        Ok(None)
    }

    async fn read_rating(&mut self, _labels: &[String]) -> Result<Option<u8>> {
        while let Some(event) = self.next_event().await {
            match event {
                OperatorEvent::Text(text) => return Ok(text.trim().parse().ok()),
                OperatorEvent::Cancel => return Ok(None),
                _ => continue,
            }
        }
        Ok(None)
    }

    async fn read_comment(&mut self) -> Result<Option<String>> {
        self.read_usage("").await
    }

    async fn choose_settlement(&mut self) -> Result<Option<SettlementOutcome>> {
        while let Some(event) = self.next_event().await {
            if let OperatorEvent::Settle(outcome) = event {
                return Ok(Some(outcome));
            }
        }
        Ok(None)
    }
}
