//! Where the kiosk is.
//!
//! Configured coordinates win. Without them the kiosk falls back to an
//! IP-based lookup, which is approximate but needs no setup.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, sync::Arc, time::Duration};
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::{config::LocationConfig, error::LocationError, model::Coordinates};

pub const IP_API_URL: &str = "http://ip-api.com/json/";
const LOOKUP_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedLocation {
    pub coordinates: Coordinates,
    pub name: String,
    /// IANA timezone reported by the lookup, if any.
    pub timezone: Option<String>,
}

/// Best-effort coordinates when nothing is configured.
#[async_trait]
pub trait Geolocator: Send + Sync + Debug {
    async fn locate(&self) -> Result<ResolvedLocation, LocationError>;
}

/// Geolocation through the free ip-api.com service.
#[derive(Debug, Clone)]
pub struct IpApiLocator {
    url: String,
    http: Client,
}

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    status: String,
    message: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
    city: Option<String>,
    #[serde(rename = "regionName")]
    region_name: Option<String>,
    timezone: Option<String>,
}

impl IpApiLocator {
    pub fn new() -> Self {
        Self::with_url(IP_API_URL)
    }

    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            http: Client::new(),
        }
    }
}

impl Default for IpApiLocator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Geolocator for IpApiLocator {
    async fn locate(&self) -> Result<ResolvedLocation, LocationError> {
        info!("Attempting to auto-detect location");

        let res = self
            .http
            .get(&self.url)
            .timeout(Duration::from_secs(LOOKUP_TIMEOUT_SECS))
            .send()
            .await
            .map_err(|e| LocationError::Unresolved(format!("location lookup failed: {e}")))?;

        if !res.status().is_success() {
            return Err(LocationError::Unresolved(format!(
                "location lookup returned status {}",
                res.status()
            )));
        }

        let body: IpApiResponse = res
            .json()
            .await
            .map_err(|e| LocationError::Unresolved(format!("unreadable location response: {e}")))?;

        location_from_response(body)
    }
}

fn location_from_response(body: IpApiResponse) -> Result<ResolvedLocation, LocationError> {
    if body.status != "success" {
        return Err(LocationError::Unresolved(format!(
            "location lookup status '{}': {}",
            body.status,
            body.message.as_deref().unwrap_or("no message")
        )));
    }

    let (Some(lat), Some(lon)) = (body.lat, body.lon) else {
        return Err(LocationError::Unresolved("location response without coordinates".into()));
    };

    let name = [body.city, body.region_name]
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(", ");

    Ok(ResolvedLocation {
        coordinates: Coordinates::new(lat, lon)?,
        name,
        timezone: body.timezone,
    })
}

/// Resolves coordinates once and remembers them for the process lifetime.
#[derive(Debug)]
pub struct LocationResolver {
    configured: Option<ResolvedLocation>,
    geolocator: Arc<dyn Geolocator>,
    resolved: OnceCell<ResolvedLocation>,
}

impl LocationResolver {
    /// Invalid configured coordinates are an error here, not a silent fallback.
    pub fn new(
        config: &LocationConfig,
        geolocator: Arc<dyn Geolocator>,
    ) -> Result<Self, LocationError> {
        let configured = match (config.latitude, config.longitude) {
            (Some(lat), Some(lon)) => Some(ResolvedLocation {
                coordinates: Coordinates::new(lat, lon)?,
                name: if config.name.is_empty() {
                    "Configured Location".to_string()
                } else {
                    config.name.clone()
                },
                timezone: None,
            }),
            _ => None,
        };

        Ok(Self {
            configured,
            geolocator,
            resolved: OnceCell::new(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.configured.is_some()
    }

    pub async fn resolve(&self) -> Result<ResolvedLocation, LocationError> {
        if let Some(loc) = &self.configured {
            return Ok(loc.clone());
        }

        let loc = self
            .resolved
            .get_or_try_init(|| async {
                let loc = self.geolocator.locate().await.inspect_err(|e| {
                    warn!(error = %e, "Could not determine location");
                })?;
                info!(name = %loc.name, coords = %loc.coordinates, "Location detected");
                Ok::<_, LocationError>(loc)
            })
            .await?;

        Ok(loc.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, Default)]
    struct CountingLocator {
        calls: AtomicU32,
        fail: bool,
    }

    #[async_trait]
    impl Geolocator for CountingLocator {
        async fn locate(&self) -> Result<ResolvedLocation, LocationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(LocationError::Unresolved("offline".into()));
            }
            Ok(ResolvedLocation {
                coordinates: Coordinates::new(51.5, -0.12).unwrap(),
                name: "London, England".into(),
                timezone: Some("Europe/London".into()),
            })
        }
    }

    fn unconfigured() -> LocationConfig {
        LocationConfig::default()
    }

    #[tokio::test]
    async fn configured_coordinates_skip_lookup() {
        let locator = Arc::new(CountingLocator::default());
        let cfg = LocationConfig {
            latitude: Some(40.7128),
            longitude: Some(-74.0060),
            name: "New York".into(),
            ..LocationConfig::default()
        };
        let resolver = LocationResolver::new(&cfg, locator.clone()).unwrap();

        let loc = resolver.resolve().await.unwrap();
        assert_eq!(loc.name, "New York");
        assert_eq!(locator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn lookup_result_is_cached() {
        let locator = Arc::new(CountingLocator::default());
        let resolver = LocationResolver::new(&unconfigured(), locator.clone()).unwrap();
        assert!(!resolver.is_configured());

        let first = resolver.resolve().await.unwrap();
        let second = resolver.resolve().await.unwrap();
        assert_eq!(locator.calls.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);
        assert_eq!(second.name, "London, England");
        assert_eq!(second.timezone.as_deref(), Some("Europe/London"));
    }

    #[tokio::test]
    async fn failed_lookup_is_retried_next_time() {
        let locator = Arc::new(CountingLocator {
            fail: true,
            ..Default::default()
        });
        let resolver = LocationResolver::new(&unconfigured(), locator.clone()).unwrap();

        assert!(matches!(resolver.resolve().await, Err(LocationError::Unresolved(_))));
        assert!(resolver.resolve().await.is_err());
        assert_eq!(locator.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn half_configured_location_counts_as_unconfigured() {
        let cfg = LocationConfig {
            latitude: Some(10.0),
            ..LocationConfig::default()
        };
        let resolver = LocationResolver::new(&cfg, Arc::new(CountingLocator::default())).unwrap();
        assert!(!resolver.is_configured());
    }

    #[test]
    fn configured_out_of_range_is_rejected() {
        let cfg = LocationConfig {
            latitude: Some(123.0),
            longitude: Some(0.0),
            ..LocationConfig::default()
        };
        let err = LocationResolver::new(&cfg, Arc::new(CountingLocator::default())).unwrap_err();
        assert!(matches!(err, LocationError::InvalidCoordinates { .. }));
    }

    #[test]
    fn ip_api_failure_status() {
        let body: IpApiResponse =
            serde_json::from_str(r#"{"status":"fail","message":"reserved range"}"#).unwrap();
        let err = location_from_response(body).unwrap_err();
        assert!(err.to_string().contains("reserved range"));
    }

    #[test]
    fn ip_api_success_builds_name() {
        let body: IpApiResponse = serde_json::from_value(serde_json::json!({
            "status": "success",
            "lat": 47.6,
            "lon": -122.3,
            "city": "Seattle",
            "regionName": "Washington",
            "timezone": "America/Los_Angeles"
        }))
        .unwrap();
        let loc = location_from_response(body).unwrap();
        assert_eq!(loc.name, "Seattle, Washington");
        assert_eq!(loc.timezone.as_deref(), Some("America/Los_Angeles"));
    }
}
