use anyhow::{Context, Result, anyhow, bail};
use chrono_tz::Tz;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::{info, warn};

use crate::{model::TemperatureUnit, provider::open_meteo::DEFAULT_BASE_URL, sync::RetryPolicy};

pub const DEFAULT_WEATHER_INTERVAL_SECS: u64 = 900;
pub const MIN_WEATHER_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_FORECAST_TIMEOUT_SECS: u64 = 30;
pub const FORECAST_TIMEOUT_RANGE_SECS: (u64, u64) = (5, 300);
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const LOG_FILE_NAME: &str = "app.log";

/// Where the kiosk stands.
///
/// Example TOML:
/// [location]
/// latitude = 40.7128
/// longitude = -74.006
/// name = "New York"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    pub name: String,
    /// IANA timezone for the provider and the clock, or `auto`.
    pub timezone: String,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            latitude: None,
            longitude: None,
            name: String::new(),
            timezone: "auto".to_string(),
        }
    }
}

impl LocationConfig {
    /// Both coordinates are needed; one alone is ignored.
    pub fn is_configured(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TimeFormat {
    #[default]
    #[serde(rename = "12h")]
    TwelveHour,
    #[serde(rename = "24h")]
    TwentyFourHour,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub temperature_unit: TemperatureUnit,
    pub time_format: TimeFormat,
    pub show_seconds: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            temperature_unit: TemperatureUnit::default(),
            time_format: TimeFormat::default(),
            show_seconds: true,
        }
    }
}

/// Timings, all in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    pub weather_interval: u64,
    pub forecast_timeout: u64,
    pub max_tries: u32,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            weather_interval: DEFAULT_WEATHER_INTERVAL_SECS,
            forecast_timeout: DEFAULT_FORECAST_TIMEOUT_SECS,
            max_tries: RetryPolicy::DEFAULT_MAX_TRIES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    pub request_timeout: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub location: LocationConfig,
    pub display: DisplayConfig,
    pub refresh: RefreshConfig,
    pub provider: ProviderConfig,
}

impl Config {
    /// Load config from `path` (or the platform default), falling back to
    /// defaults when the file doesn't exist yet.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_file_path()?,
        };

        if !path.exists() {
            info!(path = %path.display(), "No config file found, using defaults");
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg = Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to load config file: {}", path.display()))?;

        info!(path = %path.display(), "Configuration loaded");
        Ok(cfg)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let cfg: Config = toml::from_str(contents).context("Failed to parse configuration TOML")?;
        cfg.validated()
    }

    /// Clamp out-of-range timings and reject values that cannot be fixed up.
    pub fn validated(mut self) -> Result<Self> {
        let refresh = &mut self.refresh;
        if refresh.weather_interval < MIN_WEATHER_INTERVAL_SECS {
            warn!(
                "weather_interval {} too low, using {}",
                refresh.weather_interval, MIN_WEATHER_INTERVAL_SECS
            );
            refresh.weather_interval = MIN_WEATHER_INTERVAL_SECS;
        }

        let (lo, hi) = FORECAST_TIMEOUT_RANGE_SECS;
        if !(lo..=hi).contains(&refresh.forecast_timeout) {
            let clamped = refresh.forecast_timeout.clamp(lo, hi);
            warn!("forecast_timeout {} out of range, using {}", refresh.forecast_timeout, clamped);
            refresh.forecast_timeout = clamped;
        }

        let max_tries = refresh.max_tries.clamp(1, RetryPolicy::DEFAULT_DELAYS.len() as u32 + 1);
        if max_tries != refresh.max_tries {
            warn!("max_tries {} out of range, using {}", refresh.max_tries, max_tries);
            refresh.max_tries = max_tries;
        }

        if self.provider.request_timeout == 0 {
            warn!("request_timeout 0 is invalid, using {}", DEFAULT_REQUEST_TIMEOUT_SECS);
            self.provider.request_timeout = DEFAULT_REQUEST_TIMEOUT_SECS;
        }

        let loc = &self.location;
        if let Some(lat) = loc.latitude {
            if !(-90.0..=90.0).contains(&lat) {
                bail!("location.latitude {lat} is outside -90..=90");
            }
        }
        if let Some(lon) = loc.longitude {
            if !(-180.0..=180.0).contains(&lon) {
                bail!("location.longitude {lon} is outside -180..=180");
            }
        }

        self.timezone()?;
        Ok(self)
    }

    /// Save config to `path` (or the platform default), creating parent directories as needed.
    pub fn save(&self, path: Option<&Path>) -> Result<PathBuf> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_file_path()?,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(path)
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weatherclock", "weatherclock")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Kiosk log file: the platform state directory where there is one
    /// (`$XDG_STATE_HOME/weatherclock` on Linux), else local data.
    pub fn log_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weatherclock", "weatherclock")
            .ok_or_else(|| anyhow!("Could not determine platform state directory"))?;

        let dir = dirs.state_dir().unwrap_or_else(|| dirs.data_local_dir());
        Ok(dir.join(LOG_FILE_NAME))
    }

    /// Configured timezone; `None` means `auto`.
    pub fn timezone(&self) -> Result<Option<Tz>> {
        let name = self.location.timezone.trim();
        if name.is_empty() || name.eq_ignore_ascii_case("auto") {
            return Ok(None);
        }
        name.parse::<Tz>()
            .map(Some)
            .map_err(|_| anyhow!("Unknown timezone '{name}' in location.timezone"))
    }

    /// Value for the provider's `timezone` query parameter.
    pub fn provider_timezone(&self) -> String {
        match self.timezone() {
            Ok(Some(tz)) => tz.name().to_string(),
            _ => "auto".to_string(),
        }
    }

    pub fn weather_interval(&self) -> Duration {
        Duration::from_secs(self.refresh.weather_interval)
    }

    pub fn forecast_timeout(&self) -> Duration {
        Duration::from_secs(self.refresh.forecast_timeout)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.provider.request_timeout)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default().with_max_tries(self.refresh.max_tries)
    }
}
