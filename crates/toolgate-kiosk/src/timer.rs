//! Session timer stage.
//!
//! Refreshes the elapsed time on the display until the operator ends the
//! session. There is no automatic timeout: the only way out is the
//! cancellation token.

use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use toolgate_core::{Clock, SessionDuration, StationConfig};
use tracing::{debug, trace};

use crate::display::VirtualDisplay;

/// Elapsed-time ticker for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimer {
    tick: Duration,
    enabled: bool,
}

impl SessionTimer {
    pub fn new(tick: Duration, enabled: bool) -> Self {
        Self { tick, enabled }
    }

    pub fn from_config(config: &StationConfig) -> Self {
        Self::new(config.kiosk.tick(), config.session_time.enable_timer_window)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Run until `cancel` fires. Returns the number of refreshes.
    ///
    /// A disabled timer returns at once without touching the display.
    pub async fn run(
        &self,
        display: &mut VirtualDisplay,
        clock: &dyn Clock,
        start: DateTime<Local>,
        cancel: CancellationToken,
    ) -> u64 {
        if !self.enabled {
            debug!("Timer window disabled, ending at once");
            return 0;
        }

        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut ticks = 0;

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!(ticks, "Timer stopped by operator");
                    break;
                }

                _ = interval.tick() => {
                    let elapsed = SessionDuration::between(start, clock.now());
                    display.show_elapsed(elapsed);
                    ticks += 1;
                    trace!(elapsed = %elapsed.clock_face(), "Timer tick");
                }
            }
        }
        ticks
    }
}
