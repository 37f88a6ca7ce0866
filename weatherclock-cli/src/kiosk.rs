//! Terminal kiosk loop.
//!
//! One task owns the view controller and the screen. Weather arrives from
//! the refresh scheduler over a `watch` channel; taps arrive as stdin lines.

use anyhow::{Context, Result};
use chrono::Utc;
use std::{future::pending, sync::Arc, time::Duration};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    signal,
    time::{Instant, MissedTickBehavior, interval, sleep_until},
};
use tracing::{debug, info, warn};
use weatherclock_core::{
    Config, IpApiLocator, LocationResolver, RefreshScheduler, RefreshSettings, SyncUpdate, TapEvent,
    TapZone, Transition, ViewController, ViewState, WeatherSync, provider::provider_from_config,
};

use crate::{clock::ClockFace, render::TerminalRenderer};

/// What a line typed on stdin means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KioskInput {
    Tap(TapZone),
    Refresh,
    Quit,
}

impl KioskInput {
    pub fn parse(line: &str) -> Self {
        match line.trim().to_ascii_lowercase().as_str() {
            "t" => KioskInput::Tap(TapZone::Temperature),
            "r" => KioskInput::Refresh,
            "q" => KioskInput::Quit,
            _ => KioskInput::Tap(TapZone::Anywhere),
        }
    }
}

/// View state plus the latest weather, as seen by the screen.
#[derive(Debug)]
pub struct Kiosk {
    view: ViewController,
    clock: ClockFace,
    latest: SyncUpdate,
}

impl Kiosk {
    pub fn new(forecast_timeout: Duration, clock: ClockFace) -> Result<Self> {
        let view = ViewController::new(forecast_timeout).context("Invalid forecast timeout")?;
        Ok(Self {
            view,
            clock,
            latest: SyncUpdate::default(),
        })
    }

    pub fn view(&self) -> &ViewController {
        &self.view
    }

    #[cfg(test)]
    pub fn latest(&self) -> &SyncUpdate {
        &self.latest
    }

    #[cfg(test)]
    pub fn clock(&self) -> &ClockFace {
        &self.clock
    }

    pub fn apply_update(&mut self, update: SyncUpdate) {
        match (self.latest.is_offline(), update.is_offline()) {
            (false, true) => {
                warn!(failures = update.status.consecutive_failures, "Weather is offline")
            }
            (true, false) => info!("Weather is back online"),
            _ => {}
        }

        if let Some(zone) = update.location_timezone.as_deref() {
            self.clock.follow_location_zone(zone);
        }

        // A failed cycle keeps showing the last snapshot we had.
        let snapshot = update.snapshot.clone().or_else(|| self.latest.snapshot.clone());
        self.latest = SyncUpdate { snapshot, ..update };
    }

    /// Forward a tap to the view. There is nothing to show in the forecast
    /// view before the first snapshot, so temperature taps wait for one.
    pub fn tap(&mut self, zone: TapZone, at: Instant) -> Transition {
        if zone == TapZone::Temperature
            && !self.view.state().is_forecast()
            && self.latest.snapshot.is_none()
        {
            debug!("Ignoring forecast tap, no weather yet");
            return Transition::None;
        }
        self.view.handle_tap(TapEvent::new(zone, at))
    }

    pub fn frame(&self, renderer: &TerminalRenderer, now: Instant) -> Vec<String> {
        let wall = Utc::now();
        match (self.view.state(), &self.latest.snapshot) {
            (ViewState::Forecast { .. }, Some(snap)) => {
                renderer.forecast_frame(snap, self.clock.today(wall), self.view.remaining(now))
            }
            _ => renderer.main_frame(
                &self.clock.time_text(wall),
                &self.clock.date_text(wall),
                &self.latest,
                wall,
            ),
        }
    }
}

pub async fn run(config: Config) -> Result<()> {
    let timezone = config.timezone()?;
    let provider = provider_from_config(&config)?;
    let sync = Arc::new(WeatherSync::with_policy(provider, config.retry_policy()));
    let resolver = Arc::new(
        LocationResolver::new(&config.location, Arc::new(IpApiLocator::new()))
            .context("Invalid [location] configuration")?,
    );
    if !resolver.is_configured() {
        info!("No coordinates configured, using IP geolocation");
    }
    let settings = RefreshSettings {
        interval: config.weather_interval(),
        unit: config.display.temperature_unit,
        timezone: config.provider_timezone(),
        request_timeout: config.request_timeout(),
    };

    let (scheduler, mut updates) = RefreshScheduler::spawn(sync, resolver, settings);
    let clock = ClockFace::new(&config.display, timezone);
    let mut kiosk = Kiosk::new(config.forecast_timeout(), clock)?;
    let renderer = TerminalRenderer::new(config.display.temperature_unit);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut tick = interval(Duration::from_secs(1));
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let ctrl_c = signal::ctrl_c();
    tokio::pin!(ctrl_c);

    info!("Kiosk started");

    loop {
        let timer = kiosk.view().active_timer();
        let timer_fired = async move {
            match timer {
                Some(t) => {
                    sleep_until(t.deadline()).await;
                    t
                }
                None => pending().await,
            }
        };

        tokio::select! {
            _ = tick.tick() => {}
            changed = updates.changed() => {
                if changed.is_err() {
                    warn!("Weather refresh stopped");
                    break;
                }
                let update = updates.borrow_and_update().clone();
                kiosk.apply_update(update);
            }
            line = lines.next_line(), if stdin_open => {
                match line.context("Failed to read from stdin")? {
                    Some(line) => match KioskInput::parse(&line) {
                        KioskInput::Tap(zone) => {
                            kiosk.tap(zone, Instant::now());
                        }
                        KioskInput::Refresh => scheduler.refresh_now(),
                        KioskInput::Quit => break,
                    },
                    None => {
                        debug!("stdin closed, taps disabled");
                        stdin_open = false;
                    }
                }
            }
            fired = timer_fired => {
                kiosk.view.timer_expired(fired, Instant::now());
            }
            res = &mut ctrl_c => {
                if let Err(e) = res {
                    warn!(error = %e, "Failed to listen for Ctrl+C");
                }
                info!("Received Ctrl+C, shutting down");
                break;
            }
        }

        renderer
            .draw(&kiosk.frame(&renderer, Instant::now()))
            .context("Failed to draw frame")?;
    }

    scheduler.shutdown();
    Ok(())
}
