use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use clap::{Parser, Subcommand};
use inquire::{Confirm, CustomType, Select, Text};
use std::{path::PathBuf, sync::Arc};
use tracing::info;
use weatherclock_core::{
    Config, Coordinates, Geolocator, IpApiLocator, LocationResolver, RefreshSettings,
    TemperatureUnit, TimeFormat, WeatherSync, provider::provider_from_config,
    scheduler::refresh_cycle,
};

use crate::{clock::ClockFace, kiosk, render::TerminalRenderer};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weatherclock", version, about = "Kiosk clock with weather")]
pub struct Cli {
    /// Config file to use instead of the platform default.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, global = true)]
    pub debug: bool,

    /// Log file for `run`, instead of the platform state directory.
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the kiosk in this terminal.
    ///
    /// Each line on stdin is a tap: `t` taps the temperature, anything
    /// else taps elsewhere. `r` refreshes now, `q` quits.
    Run,

    /// Refresh once and print the weather.
    Fetch {
        /// Print the snapshot as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show where IP geolocation places this machine.
    Locate,

    /// Interactively write the config file.
    Configure,
}

impl Cli {
    /// The kiosk owns the terminal, so only `run` logs to a file.
    pub fn logs_to_file(&self) -> bool {
        matches!(self.command, Command::Run)
    }

    pub async fn run(self) -> Result<()> {
        let path = self.config.as_deref();

        match self.command {
            Command::Run => kiosk::run(Config::load(path)?).await,
            Command::Fetch { json } => fetch(Config::load(path)?, json).await,
            Command::Locate => locate().await,
            Command::Configure => configure(Config::load(path)?, path.map(PathBuf::from)),
        }
    }
}

async fn fetch(config: Config, json: bool) -> Result<()> {
    let sync = WeatherSync::with_policy(provider_from_config(&config)?, config.retry_policy());
    let resolver = LocationResolver::new(&config.location, Arc::new(IpApiLocator::new()))
        .context("Invalid [location] configuration")?;
    if !resolver.is_configured() {
        info!("No coordinates configured, using IP geolocation");
    }
    let settings = RefreshSettings {
        interval: config.weather_interval(),
        unit: config.display.temperature_unit,
        timezone: config.provider_timezone(),
        request_timeout: config.request_timeout(),
    };

    let update = refresh_cycle(&sync, &resolver, &settings).await;
    if let Some(problem) = update.problem {
        return Err(anyhow!(problem).context("Weather refresh failed"));
    }
    let snapshot = update.snapshot.ok_or_else(|| anyhow!("Weather refresh produced no data"))?;

    if json {
        let out = serde_json::to_string_pretty(snapshot.as_ref())
            .context("Failed to serialize weather snapshot")?;
        println!("{out}");
        return Ok(());
    }

    let mut clock = ClockFace::new(&config.display, config.timezone()?);
    if let Some(zone) = update.location_timezone.as_deref() {
        clock.follow_location_zone(zone);
    }
    let renderer = TerminalRenderer::new(config.display.temperature_unit);
    let now = Utc::now();
    println!("{}", update.location_name.as_deref().unwrap_or("Unknown location"));
    let current = &snapshot.current;
    println!(
        "{}  {}  ({})",
        config.display.temperature_unit.format(current.temperature),
        current.condition(),
        current.feels_like_display(config.display.temperature_unit)
    );
    println!();
    for line in renderer.forecast_frame(&snapshot, clock.today(now), None) {
        println!("{line}");
    }
    Ok(())
}

async fn locate() -> Result<()> {
    let location = IpApiLocator::new().locate().await.context("Location lookup failed")?;

    println!("Location:    {}", location.name);
    println!("Coordinates: {}", location.coordinates);
    if let Some(tz) = &location.timezone {
        println!("Timezone:    {tz}");
    }
    Ok(())
}

fn configure(mut config: Config, path: Option<PathBuf>) -> Result<()> {
    let manual = Confirm::new("Set coordinates manually? (otherwise IP lookup is used)")
        .with_default(config.location.is_configured())
        .prompt()?;

    if manual {
        let latitude = CustomType::<f64>::new("Latitude:")
            .with_error_message("Please type a number, e.g. 40.7128")
            .prompt()?;
        let longitude = CustomType::<f64>::new("Longitude:")
            .with_error_message("Please type a number, e.g. -74.006")
            .prompt()?;
        Coordinates::new(latitude, longitude)?;

        config.location.latitude = Some(latitude);
        config.location.longitude = Some(longitude);
        config.location.name = Text::new("Location name:")
            .with_default(&config.location.name)
            .prompt()?;
    } else {
        config.location.latitude = None;
        config.location.longitude = None;
    }

    config.location.timezone = Text::new("Timezone (IANA name or auto):")
        .with_default(&config.location.timezone)
        .prompt()?;

    config.display.temperature_unit =
        Select::new("Temperature unit:", TemperatureUnit::all().to_vec()).prompt()?;

    let time_format = Select::new("Time format:", vec!["12h", "24h"]).prompt()?;
    config.display.time_format = match time_format {
        "24h" => TimeFormat::TwentyFourHour,
        _ => TimeFormat::TwelveHour,
    };

    let config = config.validated()?;
    let saved = config.save(path.as_deref())?;
    println!("Configuration saved to {}", saved.display());
    Ok(())
}
