//! Plain-text frames for the terminal kiosk.

use chrono::{DateTime, NaiveDate, Utc};
use std::{
    io::{self, Write},
    time::Duration,
};
use weatherclock_core::{SyncUpdate, TemperatureUnit, WeatherSnapshot};

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

#[derive(Debug, Clone, Copy)]
pub struct TerminalRenderer {
    unit: TemperatureUnit,
}

impl TerminalRenderer {
    pub fn new(unit: TemperatureUnit) -> Self {
        Self { unit }
    }

    pub fn main_frame(
        &self,
        time: &str,
        date: &str,
        update: &SyncUpdate,
        now: DateTime<Utc>,
    ) -> Vec<String> {
        let mut lines = vec![
            time.to_string(),
            date.to_string(),
            String::new(),
            update.location_name.clone().unwrap_or_else(|| "Locating...".to_string()),
        ];

        match &update.snapshot {
            Some(snap) => {
                let current = &snap.current;
                lines.push(format!(
                    "{}  {}",
                    self.unit.format(current.temperature),
                    current.condition()
                ));
                lines.push(current.feels_like_display(self.unit));
                if let Some(humidity) = current.humidity {
                    lines.push(format!("Humidity {humidity}%"));
                }
                if snap.stale {
                    let minutes = snap.age(now).num_minutes().max(0);
                    lines.push(format!("Offline: showing weather from {minutes} min ago"));
                }
            }
            None if update.problem.is_some() => lines.push("Weather unavailable".to_string()),
            None => lines.push("Loading weather...".to_string()),
        }

        if update.status.offline_alert {
            lines.push("! Offline: check network connection".to_string());
        }

        lines.push(String::new());
        lines.push("[t] forecast  [enter] tap  [r] refresh  [q] quit".to_string());
        lines
    }

    pub fn forecast_frame(
        &self,
        snapshot: &WeatherSnapshot,
        today: NaiveDate,
        remaining: Option<Duration>,
    ) -> Vec<String> {
        let mut lines = vec!["5-Day Forecast".to_string(), String::new()];

        for day in &snapshot.forecast {
            let name = if day.is_today(today) { "Today".to_string() } else { day.day_name() };
            lines.push(format!(
                "{:<10} {:<7} H {:>5}  L {:>5}",
                name,
                day.condition().display_text(),
                self.unit.format(day.high_temp),
                self.unit.format(day.low_temp),
            ));
        }

        lines.push(String::new());
        if let Some(left) = remaining {
            lines.push(format!("Auto-return in {}s", countdown_secs(left)));
        }
        lines.push("Tap anywhere to return".to_string());
        lines
    }

    /// Redraw the whole terminal with `lines`.
    pub fn draw(&self, lines: &[String]) -> io::Result<()> {
        let mut out = io::stdout().lock();
        write!(out, "{CLEAR_SCREEN}")?;
        for line in lines {
            writeln!(out, "{line}")?;
        }
        out.flush()
    }
}

/// Whole seconds left, rounded up so the display never shows `0s` early.
fn countdown_secs(left: Duration) -> u64 {
    left.as_millis().div_ceil(1000) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Arc;
    use weatherclock_core::{CurrentWeather, DailyForecast, ForecastPayload, SyncStatus};

    fn snapshot(fetched_at: DateTime<Utc>) -> WeatherSnapshot {
        let start = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let codes = [3, 61, 3, 71, 0];
        let days: Vec<_> = codes
            .iter()
            .enumerate()
            .map(|(i, &code)| {
                DailyForecast::new(start + chrono::Days::new(i as u64), code, 52.4, 40.0)
            })
            .collect();
        WeatherSnapshot::fresh(
            ForecastPayload {
                current: CurrentWeather::new(45.2, 41.0, 3, Some(72), fetched_at, true),
                forecast: days.try_into().unwrap(),
            },
            fetched_at,
        )
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
    }

    #[test]
    fn main_frame_shows_current_conditions() {
        let update = SyncUpdate {
            snapshot: Some(Arc::new(snapshot(noon()))),
            location_name: Some("New York".into()),
            ..SyncUpdate::default()
        };
        let renderer = TerminalRenderer::new(TemperatureUnit::Fahrenheit);
        let lines = renderer.main_frame("12:00 PM", "Monday", &update, noon());

        assert!(lines.contains(&"New York".to_string()));
        assert!(lines.contains(&"45°F  Cloudy".to_string()));
        assert!(lines.contains(&"Feels like 41°F".to_string()));
        assert!(lines.contains(&"Humidity 72%".to_string()));
        assert!(!lines.iter().any(|l| l.contains("Offline")));
    }

    #[test]
    fn stale_snapshot_and_alert_are_flagged() {
        let update = SyncUpdate {
            snapshot: Some(Arc::new(snapshot(noon()).into_stale())),
            status: SyncStatus {
                consecutive_failures: 3,
                offline_alert: true,
            },
            ..SyncUpdate::default()
        };
        let later = noon() + chrono::Duration::minutes(45);
        let renderer = TerminalRenderer::new(TemperatureUnit::Fahrenheit);
        let lines = renderer.main_frame("", "", &update, later);

        assert!(lines.contains(&"45°F  Cloudy".to_string()));
        assert!(lines.contains(&"Offline: showing weather from 45 min ago".to_string()));
        assert!(lines.contains(&"! Offline: check network connection".to_string()));
    }

    #[test]
    fn main_frame_before_first_refresh() {
        let renderer = TerminalRenderer::new(TemperatureUnit::Celsius);
        let lines = renderer.main_frame("", "", &SyncUpdate::default(), noon());
        assert!(lines.contains(&"Locating...".to_string()));
        assert!(lines.contains(&"Loading weather...".to_string()));
    }

    #[test]
    fn forecast_frame_lists_five_days_with_countdown() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let lines = TerminalRenderer::new(TemperatureUnit::Fahrenheit).forecast_frame(
            &snapshot(noon()),
            today,
            Some(Duration::from_millis(27_300)),
        );

        let rows: Vec<_> = lines.iter().filter(|l| l.contains(" H ")).collect();
        assert_eq!(rows.len(), 5);
        assert!(rows[0].starts_with("Today"));
        assert!(rows[0].contains("Cloudy"));
        assert!(rows[1].starts_with("Tuesday"));
        assert!(rows[1].contains("Rain"));
        assert!(rows[3].contains("Snow"));
        assert!(rows[4].contains("Sunny"));
        assert!(rows[0].contains("52°F"));
        assert!(lines.contains(&"Auto-return in 28s".to_string()));
    }

    #[test]
    fn countdown_rounds_up() {
        assert_eq!(countdown_secs(Duration::from_secs(30)), 30);
        assert_eq!(countdown_secs(Duration::from_millis(1)), 1);
        assert_eq!(countdown_secs(Duration::ZERO), 0);
    }
}
