pub mod errors;

use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use chrono::{DateTime, Days, DurationRound, Local, NaiveTime, TimeDelta, TimeZone};
use log::{debug, info};
use serde_json::{Map, Value};
use ureq::Agent;
use crate::config::Forecast;
use crate::manager_forecast::errors::FetchError;
use crate::models::forecast::ForecastDocument;
use crate::models::snapshot::{ForecastSnapshot, Observation};

/// Anything able to produce one forecast snapshot per poll cycle
pub trait ForecastSource {
    fn fetch(&self) -> Result<ForecastSnapshot, FetchError>;
}

/// Struct for fetching forecasts from a Dark Sky compatible provider
pub struct DarkSky {
    agent: Agent,
    base_url: String,
    api_key: String,
    lat: f64,
    long: f64,
}

impl DarkSky {
    /// Returns a DarkSky struct ready for fetching forecasts for one location
    ///
    /// # Arguments
    ///
    /// * 'config' - forecast section of the configuration
    pub fn new(config: &Forecast) -> DarkSky {
        let agent_config = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout)))
            .build();

        let agent = agent_config.into();

        Self {
            agent,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            lat: config.lat,
            long: config.long,
        }
    }
}

impl ForecastSource for DarkSky {
    /// Retrieves a forecast with SI units from the provider.
    /// Any non 2xx response is reported as a FetchError::Status.
    ///
    fn fetch(&self) -> Result<ForecastSnapshot, FetchError> {
        let url = format!("{}/{}/{},{}", self.base_url, self.api_key, self.lat, self.long);

        let json = self.agent
            .get(&url)
            .query("units", "si")
            .call()?
            .body_mut()
            .read_to_string()?;

        let document: ForecastDocument = serde_json::from_str(&json)?;
        let snapshot = snapshot_from_document(&document)?;
        info!("successfully fetched forecast");

        Ok(snapshot)
    }
}

/// Reads a forecast from a local json document instead of the provider.
/// The document has the same shape as a provider response but carries no timestamps,
/// those are synthesized relative to the time of loading.
pub struct Fixture {
    path: PathBuf,
}

impl Fixture {
    pub fn new(path: &str) -> Fixture {
        Fixture { path: PathBuf::from(path) }
    }

    /// Loads the fixture and stamps its entries relative to the given instant
    ///
    /// # Arguments
    ///
    /// * 'now' - the instant to synthesize timestamps from
    pub fn load_at<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<ForecastSnapshot, FetchError> {
        let json = fs::read_to_string(&self.path)?;
        let document: ForecastDocument = serde_json::from_str(&json)?;
        let snapshot = populate_timestamps(&document, now)?;
        info!("successfully loaded forecast fixture {}", self.path.display());

        Ok(snapshot)
    }
}

impl ForecastSource for Fixture {
    fn fetch(&self) -> Result<ForecastSnapshot, FetchError> {
        self.load_at(&Local::now())
    }
}

/// The forecast source selected by configuration
pub enum Fetcher {
    Remote(DarkSky),
    Fixture(Fixture),
}

impl ForecastSource for Fetcher {
    fn fetch(&self) -> Result<ForecastSnapshot, FetchError> {
        match self {
            Fetcher::Remote(d) => d.fetch(),
            Fetcher::Fixture(f) => f.fetch(),
        }
    }
}

/// Builds a snapshot from a provider document where every entry carries its own timestamp
///
/// # Arguments
///
/// * 'document' - the parsed provider document
fn snapshot_from_document(document: &ForecastDocument) -> Result<ForecastSnapshot, FetchError> {
    let current = Observation::from_entry(entry_time(&document.currently, "currently", 0)?, &document.currently);

    let mut hourly = Vec::with_capacity(document.hourly.data.len());
    for (i, entry) in document.hourly.data.iter().enumerate() {
        hourly.push(Observation::from_entry(entry_time(entry, "hourly", i)?, entry));
    }

    let mut daily = Vec::with_capacity(document.daily.data.len());
    for (i, entry) in document.daily.data.iter().enumerate() {
        daily.push(Observation::from_entry(entry_time(entry, "daily", i)?, entry));
    }

    let snapshot = ForecastSnapshot { current, hourly, daily };
    if let Some(series) = snapshot.out_of_order() {
        return Err(FetchError::Parse(format!("{} series is not ordered by time", series)));
    }

    Ok(snapshot)
}

/// Synthesizes timestamps for a fixture document. Current gets 'now', daily entries are the
/// local midnights of consecutive calendar days starting today, hourly entries start at the top
/// of the current hour and step one hour, all in document order.
///
/// # Arguments
///
/// * 'document' - the parsed fixture document
/// * 'now' - the instant to synthesize timestamps from
fn populate_timestamps<Tz: TimeZone>(document: &ForecastDocument, now: &DateTime<Tz>) -> Result<ForecastSnapshot, FetchError> {
    let top_of_hour = now.clone()
        .duration_trunc(TimeDelta::hours(1))
        .map_err(|e| FetchError::Parse(format!("unable to truncate to hour: {}", e)))?
        .timestamp();

    let mut daily = Vec::with_capacity(document.daily.data.len());
    for (i, entry) in document.daily.data.iter().enumerate() {
        daily.push(Observation::from_entry(local_midnight(now, i as u64)?, entry));
    }

    debug!("fixture timestamps start at {} (hourly)", top_of_hour);

    Ok(ForecastSnapshot {
        current: Observation::from_entry(now.timestamp(), &document.currently),
        hourly: stamp_series(&document.hourly.data, top_of_hour, 3600),
        daily,
    })
}

/// Returns the timestamp of local midnight a number of calendar days after the date of 'now'.
/// Days are stepped on the local calendar so a daylight saving change keeps entries on midnight.
///
/// # Arguments
///
/// * 'now' - the instant whose local date is day zero
/// * 'days' - number of calendar days to step
fn local_midnight<Tz: TimeZone>(now: &DateTime<Tz>, days: u64) -> Result<i64, FetchError> {
    let date = now.date_naive()
        .checked_add_days(Days::new(days))
        .ok_or_else(|| FetchError::Parse(format!("date out of range {} days after {}", days, now.date_naive())))?;

    let midnight = now.timezone()
        .from_local_datetime(&date.and_time(NaiveTime::MIN))
        .earliest()
        .ok_or_else(|| FetchError::Parse(format!("no local midnight for {}", date)))?;

    Ok(midnight.timestamp())
}

fn stamp_series(entries: &[Map<String, Value>], start: i64, step: i64) -> Vec<Observation> {
    entries.iter()
        .enumerate()
        .map(|(i, entry)| Observation::from_entry(start + step * i as i64, entry))
        .collect()
}

/// Returns the timestamp of a provider entry
///
/// # Arguments
///
/// * 'entry' - the raw entry
/// * 'series' - name of the series the entry belongs to, for error reporting
/// * 'index' - position of the entry in its series, for error reporting
fn entry_time(entry: &Map<String, Value>, series: &str, index: usize) -> Result<i64, FetchError> {
    entry.get("time")
        .and_then(Value::as_i64)
        .ok_or_else(|| FetchError::Parse(format!("{} entry {} has no valid time", series, index)))
}
