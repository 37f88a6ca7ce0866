use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc, time::Duration};
use tracing::debug;

use crate::{
    config::Config,
    error::FetchError,
    model::{Coordinates, ForecastPayload, TemperatureUnit},
    provider::open_meteo::OpenMeteoProvider,
};

pub mod open_meteo;

/// Everything one weather request needs.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRequest {
    pub coordinates: Coordinates,
    pub unit: TemperatureUnit,
    /// IANA timezone name, or `auto` to let the provider pick from the coordinates.
    pub timezone: String,
    /// Upper bound for a single try.
    pub timeout: Duration,
}

impl ForecastRequest {
    pub fn new(coordinates: Coordinates, unit: TemperatureUnit, timeout: Duration) -> Self {
        Self {
            coordinates,
            unit,
            timezone: "auto".to_string(),
            timeout,
        }
    }

    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = timezone.into();
        self
    }
}

/// A weather source. One call is one try; retrying is the caller's business.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn fetch(&self, request: &ForecastRequest) -> Result<ForecastPayload, FetchError>;
}

/// Construct the provider described by the `[provider]` section.
pub fn provider_from_config(config: &Config) -> anyhow::Result<Arc<dyn WeatherProvider>> {
    let provider = OpenMeteoProvider::new(config.provider.base_url.clone())?;
    debug!(base_url = provider.base_url(), "Using Open-Meteo weather provider");
    Ok(Arc::new(provider))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_defaults_to_auto_timezone() {
        let coords = Coordinates::new(40.7128, -74.0060).unwrap();
        let req =
            ForecastRequest::new(coords, TemperatureUnit::Fahrenheit, Duration::from_secs(10));
        assert_eq!(req.timezone, "auto");

        let req = req.with_timezone("America/New_York");
        assert_eq!(req.timezone, "America/New_York");
    }

    #[test]
    fn provider_from_default_config() {
        let cfg = Config::default();
        assert!(provider_from_config(&cfg).is_ok());
    }
}
