//! Periodic refresh worker.
//!
//! Network I/O runs on its own task; results reach the view owner through a
//! `watch` channel, so a slow fetch never holds up the clock or taps.

use std::{sync::Arc, time::Duration};
use tokio::{
    sync::{Notify, watch},
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};
use tracing::{debug, info, warn};

use crate::{
    error::WeatherClockError,
    location::LocationResolver,
    model::{TemperatureUnit, WeatherSnapshot},
    provider::ForecastRequest,
    sync::{SyncStatus, WeatherSync},
};

#[derive(Debug, Clone)]
pub struct RefreshSettings {
    pub interval: Duration,
    pub unit: TemperatureUnit,
    /// `auto` or an IANA name.
    pub timezone: String,
    pub request_timeout: Duration,
}

/// What the renderer needs after each refresh cycle.
#[derive(Debug, Clone, Default)]
pub struct SyncUpdate {
    pub snapshot: Option<Arc<WeatherSnapshot>>,
    pub status: SyncStatus,
    /// Set when the last cycle produced no usable weather.
    pub problem: Option<WeatherClockError>,
    pub location_name: Option<String>,
    /// IANA zone reported for a geolocated position.
    pub location_timezone: Option<String>,
}

impl SyncUpdate {
    pub fn is_offline(&self) -> bool {
        self.problem.is_some() || self.snapshot.as_ref().is_some_and(|s| s.stale)
    }
}

/// Handle to the background refresh task.
#[derive(Debug)]
pub struct RefreshScheduler {
    trigger: Arc<Notify>,
    task: JoinHandle<()>,
}

impl RefreshScheduler {
    /// Start refreshing immediately, then every `settings.interval`.
    ///
    /// Ticks that come due while a refresh is still running are skipped, so
    /// refreshes never overlap.
    pub fn spawn(
        sync: Arc<WeatherSync>,
        resolver: Arc<LocationResolver>,
        settings: RefreshSettings,
    ) -> (Self, watch::Receiver<SyncUpdate>) {
        let (tx, rx) = watch::channel(SyncUpdate::default());
        let trigger = Arc::new(Notify::new());

        let task = tokio::spawn(run(sync, resolver, settings, tx, Arc::clone(&trigger)));

        (Self { trigger, task }, rx)
    }

    /// Ask for a refresh now instead of waiting for the next tick.
    pub fn refresh_now(&self) {
        self.trigger.notify_one();
    }

    pub fn shutdown(self) {
        self.task.abort();
    }
}

async fn run(
    sync: Arc<WeatherSync>,
    resolver: Arc<LocationResolver>,
    settings: RefreshSettings,
    tx: watch::Sender<SyncUpdate>,
    trigger: Arc<Notify>,
) {
    let mut ticker = interval(settings.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => debug!("Scheduled weather refresh"),
            () = trigger.notified() => {
                debug!("Manual weather refresh");
                ticker.reset();
            }
        }

        let update = refresh_cycle(&sync, &resolver, &settings).await;
        if tx.send(update).is_err() {
            info!("No display left to update, stopping weather refresh");
            break;
        }
    }
}

/// Resolve the location, then refresh. Each cycle ends in an update.
pub async fn refresh_cycle(
    sync: &WeatherSync,
    resolver: &LocationResolver,
    settings: &RefreshSettings,
) -> SyncUpdate {
    let location = match resolver.resolve().await {
        Ok(loc) => loc,
        Err(e) => {
            warn!(error = %e, "Skipping weather refresh until the location is known");
            return SyncUpdate {
                snapshot: sync.snapshot(),
                status: sync.status(),
                problem: Some(e.into()),
                ..SyncUpdate::default()
            };
        }
    };

    let request =
        ForecastRequest::new(location.coordinates, settings.unit, settings.request_timeout)
            .with_timezone(settings.timezone.clone());

    let (snapshot, problem) = match sync.refresh(&request).await {
        Ok(snapshot) => (Some(snapshot), None),
        Err(e) => (None, Some(e.into())),
    };

    SyncUpdate {
        snapshot,
        status: sync.status(),
        problem,
        location_name: Some(location.name),
        location_timezone: location.timezone,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::LocationConfig,
        error::{FetchError, LocationError},
        location::{Geolocator, ResolvedLocation},
        model::{Coordinates, CurrentWeather, DailyForecast, ForecastPayload},
        provider::WeatherProvider,
    };
    use async_trait::async_trait;
    use chrono::{NaiveDate, Utc};
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, Default)]
    struct CountingProvider {
        calls: AtomicU32,
        fail: bool,
    }

    #[async_trait]
    impl WeatherProvider for CountingProvider {
        async fn fetch(&self, request: &ForecastRequest) -> Result<ForecastPayload, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(request.timezone, "America/New_York");
            if self.fail {
                return Err(FetchError::Timeout);
            }
            Ok(sample_payload())
        }
    }

    /// Takes longer than one refresh interval and tracks how many fetches overlap.
    #[derive(Debug, Default)]
    struct SlowProvider {
        active: AtomicU32,
        max_active: AtomicU32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl WeatherProvider for SlowProvider {
        async fn fetch(&self, _request: &ForecastRequest) -> Result<ForecastPayload, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now_active, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(400)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(sample_payload())
        }
    }

    fn sample_payload() -> ForecastPayload {
        let start = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let days: Vec<_> = (0..5)
            .map(|i| DailyForecast::new(start + chrono::Days::new(i), 0, 60.0, 45.0))
            .collect();
        ForecastPayload {
            current: CurrentWeather::new(52.0, 50.0, 0, None, Utc::now(), true),
            forecast: days.try_into().unwrap(),
        }
    }

    #[derive(Debug)]
    struct NoLocation;

    #[derive(Debug)]
    struct FixedLocator;

    #[async_trait]
    impl Geolocator for FixedLocator {
        async fn locate(&self) -> Result<ResolvedLocation, LocationError> {
            Ok(ResolvedLocation {
                coordinates: Coordinates::new(-33.8688, 151.2093).unwrap(),
                name: "Sydney, New South Wales".into(),
                timezone: Some("Australia/Sydney".into()),
            })
        }
    }

    #[async_trait]
    impl Geolocator for NoLocation {
        async fn locate(&self) -> Result<ResolvedLocation, LocationError> {
            Err(LocationError::Unresolved("no network".into()))
        }
    }

    fn settings() -> RefreshSettings {
        RefreshSettings {
            interval: Duration::from_secs(900),
            unit: TemperatureUnit::Fahrenheit,
            timezone: "America/New_York".into(),
            request_timeout: Duration::from_secs(10),
        }
    }

    fn configured_resolver() -> Arc<LocationResolver> {
        let cfg = LocationConfig {
            latitude: Some(40.7128),
            longitude: Some(-74.0060),
            name: "New York".into(),
            ..LocationConfig::default()
        };
        Arc::new(LocationResolver::new(&cfg, Arc::new(NoLocation)).unwrap())
    }

    #[tokio::test(start_paused = true)]
    async fn first_refresh_runs_immediately_then_on_interval() {
        let provider = Arc::new(CountingProvider::default());
        let sync = Arc::new(WeatherSync::new(provider.clone()));
        let (scheduler, mut updates) =
            RefreshScheduler::spawn(sync, configured_resolver(), settings());

        updates.changed().await.unwrap();
        {
            let update = updates.borrow_and_update();
            assert_eq!(update.location_name.as_deref(), Some("New York"));
            assert!(update.snapshot.is_some());
            assert!(update.problem.is_none());
            assert!(!update.is_offline());
        }
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        updates.changed().await.unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);

        scheduler.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn manual_trigger_refreshes_early() {
        let provider = Arc::new(CountingProvider::default());
        let sync = Arc::new(WeatherSync::new(provider.clone()));
        let (scheduler, mut updates) =
            RefreshScheduler::spawn(sync, configured_resolver(), settings());
        updates.changed().await.unwrap();

        let before = tokio::time::Instant::now();
        scheduler.refresh_now();
        updates.changed().await.unwrap();
        assert!(before.elapsed() < Duration::from_secs(900));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);

        scheduler.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn unresolved_location_is_reported_without_fetching() {
        let provider = Arc::new(CountingProvider::default());
        let sync = WeatherSync::new(provider.clone());
        let resolver =
            LocationResolver::new(&LocationConfig::default(), Arc::new(NoLocation)).unwrap();

        let update = refresh_cycle(&sync, &resolver, &settings()).await;
        assert!(update.problem.as_ref().is_some_and(|p| p.is_location_unresolved()));
        assert!(update.snapshot.is_none());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn unavailable_weather_is_reported() {
        let provider = Arc::new(CountingProvider {
            fail: true,
            ..Default::default()
        });
        let sync = WeatherSync::new(provider.clone());

        let update = refresh_cycle(&sync, &configured_resolver(), &settings()).await;
        assert!(matches!(
            update.problem,
            Some(WeatherClockError::Fetch(FetchError::Unavailable))
        ));
        assert_eq!(update.status.consecutive_failures, 1);
        assert!(update.is_offline());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_refreshes_never_overlap() {
        let provider = Arc::new(SlowProvider::default());
        let sync = Arc::new(WeatherSync::new(provider.clone()));
        let settings = RefreshSettings {
            interval: Duration::from_secs(300),
            ..settings()
        };
        let (scheduler, mut updates) =
            RefreshScheduler::spawn(sync, configured_resolver(), settings);

        // Ask again while the first refresh is still running.
        tokio::task::yield_now().await;
        scheduler.refresh_now();
        scheduler.refresh_now();

        for _ in 0..3 {
            updates.changed().await.unwrap();
        }

        assert_eq!(provider.max_active.load(Ordering::SeqCst), 1);
        assert!(provider.calls.load(Ordering::SeqCst) >= 3);
        scheduler.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn geolocated_timezone_is_passed_on() {
        let provider = Arc::new(CountingProvider::default());
        let sync = WeatherSync::new(provider.clone());
        let resolver =
            LocationResolver::new(&LocationConfig::default(), Arc::new(FixedLocator)).unwrap();

        let update = refresh_cycle(&sync, &resolver, &settings()).await;
        assert_eq!(update.location_name.as_deref(), Some("Sydney, New South Wales"));
        assert_eq!(update.location_timezone.as_deref(), Some("Australia/Sydney"));
        assert!(update.snapshot.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn configured_location_has_no_reported_timezone() {
        let sync = WeatherSync::new(Arc::new(CountingProvider::default()));
        let update = refresh_cycle(&sync, &configured_resolver(), &settings()).await;
        assert_eq!(update.location_name.as_deref(), Some("New York"));
        assert!(update.location_timezone.is_none());
    }
}
