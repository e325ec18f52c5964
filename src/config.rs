use std::env;
use std::fs;
use log::LevelFilter;
use serde::Deserialize;
use crate::errors::ConfigError;

#[derive(Deserialize)]
pub struct Forecast {
    #[serde(default)]
    pub api_key: String,
    pub lat: f64,
    pub long: f64,
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: u64,
    #[serde(default)]
    pub fixture: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

#[derive(Deserialize)]
pub struct Location {
    #[serde(default = "default_location_name")]
    pub name: String,
}

impl Default for Location {
    fn default() -> Self {
        Location { name: default_location_name() }
    }
}

#[derive(Deserialize, Clone, Copy, PartialEq, Debug)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    Metrics,
    Sqlite,
    Influx,
}

#[derive(Deserialize)]
pub struct Sink {
    pub kind: SinkKind,
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
    #[serde(default)]
    pub db_path: Option<String>,
    #[serde(default)]
    pub influx_url: Option<String>,
    #[serde(default)]
    pub influx_db: Option<String>,
}

#[derive(Deserialize)]
pub struct General {
    #[serde(default)]
    pub log_path: Option<String>,
    pub log_level: LevelFilter,
    pub log_to_stdout: bool,
}

#[derive(Deserialize)]
pub struct Config {
    pub forecast: Forecast,
    #[serde(default)]
    pub location: Location,
    pub sink: Sink,
    pub general: General,
}

fn default_refresh_interval() -> u64 { 120 }
fn default_base_url() -> String { "https://api.darksky.net/forecast".to_string() }
fn default_timeout() -> u64 { 30 }
fn default_location_name() -> String { "home".to_string() }
fn default_metrics_port() -> u16 { 8080 }

/// Loads the configuration file and returns a struct with all configuration items.
/// The environment variables WEATHER_API_KEY and WEATHER_FIXTURE override the
/// corresponding file settings.
///
/// # Arguments
///
/// * 'config_path' - path to the configuration file
pub fn load_config(config_path: &str) -> Result<Config, ConfigError> {
    let toml = fs::read_to_string(config_path)?;
    let mut config = parse_config(&toml)?;

    if let Ok(api_key) = env::var("WEATHER_API_KEY") {
        config.forecast.api_key = api_key;
    }
    if let Ok(fixture) = env::var("WEATHER_FIXTURE") {
        config.forecast.fixture = Some(fixture);
    }

    validate(&config)?;

    Ok(config)
}

/// Parses configuration from a toml string without applying any overrides
///
/// # Arguments
///
/// * 'toml' - the configuration document
fn parse_config(toml: &str) -> Result<Config, ConfigError> {
    Ok(toml::from_str(toml)?)
}

/// Checks that the configuration is usable
///
/// # Arguments
///
/// * 'config' - the configuration to check
fn validate(config: &Config) -> Result<(), ConfigError> {
    let forecast = &config.forecast;
    if forecast.fixture.is_none() && forecast.api_key.trim().is_empty() {
        return Err(ConfigError::from("an api key is required unless a fixture is given"));
    }
    if forecast.refresh_interval == 0 {
        return Err(ConfigError::from("refresh interval must be greater than zero"));
    }
    if !(-90.0..=90.0).contains(&forecast.lat) || !(-180.0..=180.0).contains(&forecast.long) {
        return Err(ConfigError(format!("coordinates out of range: {},{}", forecast.lat, forecast.long)));
    }

    match config.sink.kind {
        SinkKind::Metrics => Ok(()),
        SinkKind::Sqlite if config.sink.db_path.is_none() => {
            Err(ConfigError::from("sqlite sink requires db_path"))
        },
        SinkKind::Influx if config.sink.influx_url.is_none() || config.sink.influx_db.is_none() => {
            Err(ConfigError::from("influx sink requires influx_url and influx_db"))
        },
        _ => Ok(()),
    }
}
