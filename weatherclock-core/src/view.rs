//! Which screen is showing, and when the forecast screen gives way again.
//!
//! The controller does no I/O and reads no clock: every event carries its
//! own timestamp. The owner arms one timer per forecast entry using
//! [`ForecastTimer::deadline`] and hands it back through
//! [`ViewController::timer_expired`]; a handle from an earlier entry is
//! recognized and ignored.

use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::error::ViewError;

/// Taps closer together than this count as one physical touch.
pub const TAP_DEBOUNCE: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    Main,
    Forecast { entered_at: Instant },
}

impl ViewState {
    pub fn is_forecast(&self) -> bool {
        matches!(self, ViewState::Forecast { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapZone {
    Temperature,
    Anywhere,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TapEvent {
    pub zone: TapZone,
    pub at: Instant,
}

impl TapEvent {
    pub fn new(zone: TapZone, at: Instant) -> Self {
        Self { zone, at }
    }
}

/// Auto-return timer for one stay in the forecast view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForecastTimer {
    id: u64,
    deadline: Instant,
}

impl ForecastTimer {
    pub fn deadline(&self) -> Instant {
        self.deadline
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnReason {
    Tap,
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Event had no effect.
    None,
    EnteredForecast(ForecastTimer),
    ReturnedToMain(ReturnReason),
}

#[derive(Debug)]
pub struct ViewController {
    state: ViewState,
    forecast_timeout: Duration,
    debounce: Duration,
    last_accepted_tap: Option<Instant>,
    timer: Option<ForecastTimer>,
    next_timer_id: u64,
}

impl ViewController {
    pub fn new(forecast_timeout: Duration) -> Result<Self, ViewError> {
        if forecast_timeout.is_zero() {
            return Err(ViewError::ZeroTimeout);
        }
        Ok(Self {
            state: ViewState::Main,
            forecast_timeout,
            debounce: TAP_DEBOUNCE,
            last_accepted_tap: None,
            timer: None,
            next_timer_id: 0,
        })
    }

    pub fn state(&self) -> ViewState {
        self.state
    }

    pub fn forecast_timeout(&self) -> Duration {
        self.forecast_timeout
    }

    /// Timer armed for the current forecast stay, if any.
    pub fn active_timer(&self) -> Option<ForecastTimer> {
        self.timer
    }

    /// Time left before auto-return, for the countdown.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.timer.map(|t| t.deadline.saturating_duration_since(now))
    }

    pub fn handle_tap(&mut self, tap: TapEvent) -> Transition {
        if self.is_bounce(tap.at) {
            debug!(zone = ?tap.zone, "Tap ignored by debounce");
            return Transition::None;
        }

        let transition = match (self.state, tap.zone) {
            (ViewState::Main, TapZone::Temperature) => {
                Transition::EnteredForecast(self.enter_forecast(tap.at))
            }
            (ViewState::Main, TapZone::Anywhere) => Transition::None,
            (ViewState::Forecast { .. }, _) => {
                self.return_to_main();
                Transition::ReturnedToMain(ReturnReason::Tap)
            }
        };

        if transition != Transition::None {
            self.last_accepted_tap = Some(tap.at);
        }
        transition
    }

    /// Deliver a fired timer. Stale handles and early calls do nothing.
    pub fn timer_expired(&mut self, timer: ForecastTimer, now: Instant) -> Transition {
        if self.timer != Some(timer) {
            debug!(timer = timer.id, "Ignoring timer from an earlier forecast stay");
            return Transition::None;
        }
        self.poll(now)
    }

    /// Return to main if the forecast stay has run its course.
    pub fn poll(&mut self, now: Instant) -> Transition {
        match self.state {
            ViewState::Forecast { entered_at }
                if now.saturating_duration_since(entered_at) >= self.forecast_timeout =>
            {
                self.return_to_main();
                Transition::ReturnedToMain(ReturnReason::Timeout)
            }
            _ => Transition::None,
        }
    }

    fn is_bounce(&self, at: Instant) -> bool {
        self.last_accepted_tap
            .is_some_and(|last| at.saturating_duration_since(last) < self.debounce)
    }

    fn enter_forecast(&mut self, now: Instant) -> ForecastTimer {
        self.next_timer_id += 1;
        let timer = ForecastTimer {
            id: self.next_timer_id,
            deadline: now + self.forecast_timeout,
        };
        self.state = ViewState::Forecast { entered_at: now };
        self.timer = Some(timer);
        debug!(timeout_secs = self.forecast_timeout.as_secs(), "Switching to forecast view");
        timer
    }

    fn return_to_main(&mut self) {
        self.state = ViewState::Main;
        self.timer = None;
        debug!("Switching to main view");
    }
}
