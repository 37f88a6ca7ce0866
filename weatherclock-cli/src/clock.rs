use chrono::{DateTime, Local, NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::{debug, info};
use weatherclock_core::{DisplayConfig, TimeFormat};

/// Time and date text for the main view.
#[derive(Debug, Clone)]
pub struct ClockFace {
    time_format: TimeFormat,
    show_seconds: bool,
    /// Zone named in the config. Always wins.
    configured: Option<Tz>,
    /// Zone of a geolocated position, used when the config says `auto`.
    located: Option<Tz>,
}

impl ClockFace {
    pub fn new(display: &DisplayConfig, configured: Option<Tz>) -> Self {
        Self {
            time_format: display.time_format,
            show_seconds: display.show_seconds,
            configured,
            located: None,
        }
    }

    /// Follow the zone reported for the kiosk's location, so the clock and
    /// the forecast days agree with the provider's `auto` timezone.
    pub fn follow_location_zone(&mut self, name: &str) {
        if self.configured.is_some() {
            return;
        }
        match name.parse::<Tz>() {
            Ok(tz) if self.located != Some(tz) => {
                info!(timezone = %tz, "Clock follows the location's timezone");
                self.located = Some(tz);
            }
            Ok(_) => {}
            Err(_) => debug!(timezone = name, "Ignoring unknown location timezone"),
        }
    }

    /// `None` means the system local zone.
    fn zone(&self) -> Option<Tz> {
        self.configured.or(self.located)
    }

    pub fn time_text(&self, now: DateTime<Utc>) -> String {
        let pattern = match (self.time_format, self.show_seconds) {
            (TimeFormat::TwelveHour, true) => "%-I:%M:%S %p",
            (TimeFormat::TwelveHour, false) => "%-I:%M %p",
            (TimeFormat::TwentyFourHour, true) => "%H:%M:%S",
            (TimeFormat::TwentyFourHour, false) => "%H:%M",
        };
        self.format(now, pattern)
    }

    /// Long date, e.g. `Monday, October 19, 2026`.
    pub fn date_text(&self, now: DateTime<Utc>) -> String {
        self.format(now, "%A, %B %-d, %Y")
    }

    /// Calendar day on the wall, used to label the forecast.
    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        match self.zone() {
            Some(tz) => now.with_timezone(&tz).date_naive(),
            None => now.with_timezone(&Local).date_naive(),
        }
    }

    fn format(&self, now: DateTime<Utc>, pattern: &str) -> String {
        match self.zone() {
            Some(tz) => now.with_timezone(&tz).format(pattern).to_string(),
            None => now.with_timezone(&Local).format(pattern).to_string(),
        }
    }
}
