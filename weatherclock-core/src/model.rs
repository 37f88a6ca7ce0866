use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::{convert::TryFrom, fmt};

use crate::error::LocationError;

/// Number of days in every forecast handed to the renderer.
pub const FORECAST_DAYS: usize = 5;

/// Validated latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinates {
    latitude: f64,
    longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, LocationError> {
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(LocationError::InvalidCoordinates {
                latitude,
                longitude,
            });
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Fahrenheit,
    Celsius,
}

impl TemperatureUnit {
    /// Value of the provider's `temperature_unit` query parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            TemperatureUnit::Fahrenheit => "fahrenheit",
            TemperatureUnit::Celsius => "celsius",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            TemperatureUnit::Fahrenheit => "°F",
            TemperatureUnit::Celsius => "°C",
        }
    }

    pub const fn all() -> &'static [TemperatureUnit] {
        &[TemperatureUnit::Fahrenheit, TemperatureUnit::Celsius]
    }

    /// Rounded temperature with unit symbol, e.g. `45°F`.
    pub fn format(&self, value: f64) -> String {
        format!("{:.0}{}", value, self.symbol())
    }
}

impl fmt::Display for TemperatureUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for TemperatureUnit {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "fahrenheit" | "f" => Ok(TemperatureUnit::Fahrenheit),
            "celsius" | "c" => Ok(TemperatureUnit::Celsius),
            _ => Err(anyhow::anyhow!(
                "Unknown temperature unit '{value}'. Supported units: fahrenheit, celsius."
            )),
        }
    }
}

/// Coarse sky state shown on the kiosk, projected from a WMO weather code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    Sunny,
    Cloudy,
    Rain,
    Snow,
}

impl Condition {
    /// Map a WMO weather code. Checked Sunny, Cloudy, Snow in that order;
    /// everything else, including undocumented codes, is Rain.
    pub fn from_wmo_code(code: i32) -> Self {
        match code {
            0 | 1 => Condition::Sunny,
            2 | 3 | 45 | 48 => Condition::Cloudy,
            71 | 73 | 75 | 77 | 85 | 86 => Condition::Snow,
            _ => Condition::Rain,
        }
    }

    pub fn display_text(&self) -> &'static str {
        match self {
            Condition::Sunny => "Sunny",
            Condition::Cloudy => "Cloudy",
            Condition::Rain => "Rain",
            Condition::Snow => "Snow",
        }
    }

}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_text())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentWeather {
    pub temperature: f64,
    pub feels_like: f64,
    weather_code: i32,
    pub humidity: Option<u8>,
    pub observed_at: DateTime<Utc>,
    pub is_day: bool,
}

impl CurrentWeather {
    pub fn new(
        temperature: f64,
        feels_like: f64,
        weather_code: i32,
        humidity: Option<u8>,
        observed_at: DateTime<Utc>,
        is_day: bool,
    ) -> Self {
        Self {
            temperature,
            feels_like,
            weather_code,
            humidity: humidity.map(|h| h.min(100)),
            observed_at,
            is_day,
        }
    }

    pub fn weather_code(&self) -> i32 {
        self.weather_code
    }

    pub fn condition(&self) -> Condition {
        Condition::from_wmo_code(self.weather_code)
    }

    pub fn feels_like_display(&self, unit: TemperatureUnit) -> String {
        format!("Feels like {}", unit.format(self.feels_like))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyForecast {
    pub date: NaiveDate,
    pub high_temp: f64,
    pub low_temp: f64,
    weather_code: i32,
}

impl DailyForecast {
    pub fn new(date: NaiveDate, weather_code: i32, high_temp: f64, low_temp: f64) -> Self {
        Self {
            date,
            high_temp,
            low_temp,
            weather_code,
        }
    }

    pub fn weather_code(&self) -> i32 {
        self.weather_code
    }

    pub fn condition(&self) -> Condition {
        Condition::from_wmo_code(self.weather_code)
    }

    /// Full weekday name, e.g. `Monday`.
    pub fn day_name(&self) -> String {
        self.date.format("%A").to_string()
    }

    pub fn is_today(&self, today: NaiveDate) -> bool {
        self.date == today
    }
}

/// Current conditions plus the five-day outlook, as parsed from one response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastPayload {
    pub current: CurrentWeather,
    pub forecast: [DailyForecast; FORECAST_DAYS],
}

/// Immutable bundle published to the renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherSnapshot {
    pub current: CurrentWeather,
    pub forecast: [DailyForecast; FORECAST_DAYS],
    pub fetched_at: DateTime<Utc>,
    /// Served from cache after a failed refresh.
    pub stale: bool,
}

impl WeatherSnapshot {
    pub fn fresh(payload: ForecastPayload, fetched_at: DateTime<Utc>) -> Self {
        Self {
            current: payload.current,
            forecast: payload.forecast,
            fetched_at,
            stale: false,
        }
    }

    /// Same data, flagged as served from cache.
    pub fn into_stale(self) -> Self {
        Self {
            stale: true,
            ..self
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now.signed_duration_since(self.fetched_at)
    }

    /// Same weather content, ignoring fetch metadata.
    pub fn same_weather(&self, other: &WeatherSnapshot) -> bool {
        self.current.temperature == other.current.temperature
            && self.current.feels_like == other.current.feels_like
            && self.current.weather_code == other.current.weather_code
            && self.current.humidity == other.current.humidity
            && self.current.is_day == other.current.is_day
            && self.forecast == other.forecast
    }
}
