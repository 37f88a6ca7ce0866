use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::{
    error::FetchError,
    model::{CurrentWeather, DailyForecast, FORECAST_DAYS, ForecastPayload},
    provider::{ForecastRequest, WeatherProvider},
};

pub const DEFAULT_BASE_URL: &str = "https://api.open-meteo.com/v1/forecast";

const CURRENT_VARIABLES: &str =
    "temperature_2m,apparent_temperature,weather_code,relative_humidity_2m,is_day";
const DAILY_VARIABLES: &str = "weather_code,temperature_2m_max,temperature_2m_min";

/// Open-Meteo forecast API. Free, no API key.
#[derive(Debug, Clone)]
pub struct OpenMeteoProvider {
    base_url: String,
    http: Client,
}

impl OpenMeteoProvider {
    pub fn new(base_url: String) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("weatherclock/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client for Open-Meteo")?;

        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn query_params(request: &ForecastRequest) -> Vec<(&'static str, String)> {
        vec![
            ("latitude", request.coordinates.latitude().to_string()),
            ("longitude", request.coordinates.longitude().to_string()),
            ("current", CURRENT_VARIABLES.to_string()),
            ("daily", DAILY_VARIABLES.to_string()),
            ("temperature_unit", request.unit.as_str().to_string()),
            ("timezone", request.timezone.clone()),
            ("forecast_days", FORECAST_DAYS.to_string()),
        ]
    }
}

#[async_trait]
impl WeatherProvider for OpenMeteoProvider {
    async fn fetch(&self, request: &ForecastRequest) -> Result<ForecastPayload, FetchError> {
        debug!(
            url = %self.base_url,
            coords = %request.coordinates,
            "Requesting Open-Meteo forecast"
        );

        let res = self
            .http
            .get(&self.base_url)
            .query(&Self::query_params(request))
            .timeout(request.timeout)
            .send()
            .await
            .map_err(|e| FetchError::from_transport(&e))?;

        let status = res.status();
        let body = res.text().await.map_err(|e| FetchError::from_transport(&e))?;

        if !status.is_success() {
            return Err(FetchError::InvalidResponse(format!(
                "Open-Meteo request failed with status {}: {}",
                status,
                truncate_body(&body),
            )));
        }

        parse_forecast(&body, Utc::now())
    }
}

#[derive(Debug, Deserialize)]
struct OmResponse {
    current: Option<OmCurrent>,
    daily: Option<OmDaily>,
}

#[derive(Debug, Deserialize)]
struct OmCurrent {
    temperature_2m: f64,
    apparent_temperature: f64,
    weather_code: i32,
    relative_humidity_2m: Option<f64>,
    is_day: Option<u8>,
}

#[derive(Debug, Deserialize)]
struct OmDaily {
    time: Vec<String>,
    weather_code: Vec<i32>,
    temperature_2m_max: Vec<f64>,
    temperature_2m_min: Vec<f64>,
}

/// Parse and validate an Open-Meteo body. Anything short of a complete
/// five-day response is rejected as a whole.
pub fn parse_forecast(
    body: &str,
    observed_at: DateTime<Utc>,
) -> Result<ForecastPayload, FetchError> {
    let parsed: OmResponse = serde_json::from_str(body)
        .map_err(|e| FetchError::InvalidResponse(format!("malformed JSON: {e}")))?;

    let current = parsed
        .current
        .ok_or_else(|| FetchError::InvalidResponse("missing `current` object".to_string()))?;
    let daily = parsed
        .daily
        .ok_or_else(|| FetchError::InvalidResponse("missing `daily` object".to_string()))?;

    Ok(ForecastPayload {
        current: CurrentWeather::new(
            current.temperature_2m,
            current.apparent_temperature,
            current.weather_code,
            current.relative_humidity_2m.map(|h| h.round().clamp(0.0, 100.0) as u8),
            observed_at,
            current.is_day.unwrap_or(1) != 0,
        ),
        forecast: parse_daily(&daily)?,
    })
}

fn parse_daily(daily: &OmDaily) -> Result<[DailyForecast; FORECAST_DAYS], FetchError> {
    let lengths = [
        ("time", daily.time.len()),
        ("weather_code", daily.weather_code.len()),
        ("temperature_2m_max", daily.temperature_2m_max.len()),
        ("temperature_2m_min", daily.temperature_2m_min.len()),
    ];
    if let Some((name, len)) = lengths.iter().find(|(_, len)| *len != FORECAST_DAYS) {
        return Err(FetchError::InvalidResponse(format!(
            "daily `{name}` has {len} entries, expected {FORECAST_DAYS}"
        )));
    }

    let mut days = Vec::with_capacity(FORECAST_DAYS);
    for i in 0..FORECAST_DAYS {
        let date = NaiveDate::parse_from_str(&daily.time[i], "%Y-%m-%d").map_err(|e| {
            FetchError::InvalidResponse(format!("invalid date '{}': {e}", daily.time[i]))
        })?;

        if let Some(prev) = days.last().map(|d: &DailyForecast| d.date) {
            if date <= prev {
                return Err(FetchError::InvalidResponse(format!(
                    "daily dates out of order: {date} follows {prev}"
                )));
            }
        }

        days.push(DailyForecast::new(
            date,
            daily.weather_code[i],
            daily.temperature_2m_max[i],
            daily.temperature_2m_min[i],
        ));
    }

    <[DailyForecast; FORECAST_DAYS]>::try_from(days).map_err(|v| {
        FetchError::InvalidResponse(format!("expected {FORECAST_DAYS} days, got {}", v.len()))
    })
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
