//! Weather synchronization: fetch with bounded retries, fall back to the
//! last good snapshot, and publish snapshots atomically.

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use std::{
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::{
    error::FetchError,
    model::WeatherSnapshot,
    provider::{ForecastRequest, WeatherProvider},
};

/// Consecutive failed refreshes after which the kiosk shows an offline alert.
pub const OFFLINE_ALERT_THRESHOLD: u32 = 3;

/// How many tries one refresh gets and how long to wait between them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_tries: u32,
    delays: Vec<Duration>,
}

impl RetryPolicy {
    pub const DEFAULT_MAX_TRIES: u32 = 3;
    pub const DEFAULT_DELAYS: [Duration; 3] =
        [Duration::from_secs(5), Duration::from_secs(15), Duration::from_secs(45)];

    pub fn new(max_tries: u32, delays: Vec<Duration>) -> Self {
        Self {
            max_tries: max_tries.max(1),
            delays,
        }
    }

    pub fn with_max_tries(mut self, max_tries: u32) -> Self {
        self.max_tries = max_tries.max(1);
        self
    }

    pub fn max_tries(&self) -> u32 {
        self.max_tries
    }

    /// Wait before try number `attempt` (0-based). Nothing before the first
    /// try; past the end of the schedule the last delay repeats.
    pub fn delay_before(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 {
            return None;
        }
        let idx = (attempt - 1) as usize;
        self.delays.get(idx).or(self.delays.last()).copied()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_TRIES, Self::DEFAULT_DELAYS.to_vec())
    }
}

/// Health of the refresh loop as the renderer sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncStatus {
    pub consecutive_failures: u32,
    pub offline_alert: bool,
}

/// Owns the provider, the retry loop and the single-slot cache.
#[derive(Debug)]
pub struct WeatherSync {
    provider: Arc<dyn WeatherProvider>,
    policy: RetryPolicy,
    cache: ArcSwapOption<WeatherSnapshot>,
    failures: AtomicU32,
    in_flight: Mutex<()>,
}

impl WeatherSync {
    pub fn new(provider: Arc<dyn WeatherProvider>) -> Self {
        Self::with_policy(provider, RetryPolicy::default())
    }

    pub fn with_policy(provider: Arc<dyn WeatherProvider>, policy: RetryPolicy) -> Self {
        Self {
            provider,
            policy,
            cache: ArcSwapOption::empty(),
            failures: AtomicU32::new(0),
            in_flight: Mutex::new(()),
        }
    }

    /// Latest published snapshot. Never observed half-updated.
    pub fn snapshot(&self) -> Option<Arc<WeatherSnapshot>> {
        self.cache.load_full()
    }

    pub fn has_cached_data(&self) -> bool {
        self.cache.load().is_some()
    }

    pub fn cache_age(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        self.cache.load_full().map(|snap| snap.age(now))
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.failures.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> SyncStatus {
        let consecutive_failures = self.consecutive_failures();
        SyncStatus {
            consecutive_failures,
            offline_alert: consecutive_failures >= OFFLINE_ALERT_THRESHOLD,
        }
    }

    /// One logical refresh: up to `max_tries` tries separated by the
    /// policy's delays. A cache hit after total failure is `Ok` with
    /// `stale = true`; only an empty cache yields `Unavailable`.
    ///
    /// Concurrent calls are serialized.
    pub async fn refresh(
        &self,
        request: &ForecastRequest,
    ) -> Result<Arc<WeatherSnapshot>, FetchError> {
        let _guard = self.in_flight.lock().await;
        self.refresh_locked(request).await
    }

    async fn refresh_locked(
        &self,
        request: &ForecastRequest,
    ) -> Result<Arc<WeatherSnapshot>, FetchError> {
        let mut last_error = None;

        for attempt in 0..self.policy.max_tries {
            if let Some(delay) = self.policy.delay_before(attempt) {
                info!("Retrying weather fetch in {}s", delay.as_secs());
                tokio::time::sleep(delay).await;
            }

            debug!(attempt = attempt + 1, max = self.policy.max_tries, "Weather fetch try");

            match self.provider.fetch(request).await {
                Ok(payload) => {
                    let snapshot = Arc::new(WeatherSnapshot::fresh(payload, Utc::now()));
                    self.cache.store(Some(Arc::clone(&snapshot)));
                    self.failures.store(0, Ordering::SeqCst);
                    info!(
                        temperature = snapshot.current.temperature,
                        condition = %snapshot.current.condition(),
                        "Weather data fetched successfully"
                    );
                    return Ok(snapshot);
                }
                Err(e) => {
                    warn!(attempt = attempt + 1, error = %e, "Weather fetch try failed");
                    last_error = Some(e);
                }
            }
        }

        let failures = self.failures.fetch_add(1, Ordering::SeqCst) + 1;
        if failures >= OFFLINE_ALERT_THRESHOLD {
            warn!(failures, "Weather refresh keeps failing, raising offline alert");
        }

        match self.cache.load_full() {
            Some(cached) => {
                warn!(
                    last_error = ?last_error,
                    fetched_at = %cached.fetched_at,
                    "Using cached weather data"
                );
                let stale = Arc::new(cached.as_ref().clone().into_stale());
                self.cache.store(Some(Arc::clone(&stale)));
                Ok(stale)
            }
            None => {
                error!(
                    last_error = ?last_error,
                    tries = self.policy.max_tries,
                    "Failed to fetch weather data and nothing is cached"
                );
                Err(FetchError::Unavailable)
            }
        }
    }
}
