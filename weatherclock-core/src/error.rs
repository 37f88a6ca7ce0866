use thiserror::Error;

/// Failure of a weather refresh.
///
/// `Timeout`, `NetworkUnreachable` and `InvalidResponse` describe a single
/// try and stay inside the retry loop of [`crate::WeatherSync`]. Callers of
/// `refresh` only ever see `Unavailable`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("weather request timed out")]
    Timeout,

    #[error("weather provider unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("invalid weather response: {0}")]
    InvalidResponse(String),

    #[error("weather data unavailable: all tries failed and nothing is cached")]
    Unavailable,
}

impl FetchError {
    /// Classify a transport error coming out of reqwest.
    pub(crate) fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if err.is_decode() || err.is_body() {
            FetchError::InvalidResponse(err.to_string())
        } else {
            FetchError::NetworkUnreachable(err.to_string())
        }
    }
}

/// Failure to obtain usable coordinates.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LocationError {
    #[error("location unresolved: {0}")]
    Unresolved(String),

    #[error("invalid coordinates ({latitude}, {longitude}), expected -90..=90 and -180..=180")]
    InvalidCoordinates { latitude: f64, longitude: f64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewError {
    #[error("forecast timeout must be greater than zero")]
    ZeroTimeout,
}

/// The problems a kiosk has to show to the user while the clock keeps running.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WeatherClockError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Location(#[from] LocationError),
}

impl WeatherClockError {
    pub fn is_location_unresolved(&self) -> bool {
        matches!(self, WeatherClockError::Location(_))
    }
}
