//! Core library for the `weatherclock` kiosk.
//!
//! This crate defines:
//! - Configuration loading and validation
//! - Weather fetching with retries and a last-good cache (`WeatherSync`)
//! - The main/forecast view state machine (`ViewController`)
//! - Location resolution with an IP geolocation fallback
//! - A background refresh scheduler
//!
//! Rendering is left to the binary; it only reads snapshots and view state.

pub mod config;
pub mod error;
pub mod location;
pub mod model;
pub mod provider;
pub mod scheduler;
pub mod sync;
pub mod view;

pub use config::{Config, DisplayConfig, LocationConfig, RefreshConfig, TimeFormat};
pub use error::{FetchError, LocationError, ViewError, WeatherClockError};
pub use location::{Geolocator, IpApiLocator, LocationResolver, ResolvedLocation};
pub use model::{
    Condition, Coordinates, CurrentWeather, DailyForecast, FORECAST_DAYS, ForecastPayload,
    TemperatureUnit, WeatherSnapshot,
};
pub use provider::{ForecastRequest, WeatherProvider, open_meteo::OpenMeteoProvider};
pub use scheduler::{RefreshScheduler, RefreshSettings, SyncUpdate};
pub use sync::{OFFLINE_ALERT_THRESHOLD, RetryPolicy, SyncStatus, WeatherSync};
pub use view::{
    ForecastTimer, ReturnReason, TapEvent, TapZone, Transition, ViewController, ViewState,
};
