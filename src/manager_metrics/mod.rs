pub mod server;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use log::{debug, info};
use prometheus::{GaugeVec, Opts, Registry, TextEncoder};
use crate::errors::SinkError;
use crate::models::snapshot::FieldValue;
use crate::projection::{Bucket, Projection, Window};
use crate::sink::Sink;

const CURRENT_AND_HOURLY: &[Window] = &[Window::Current, Window::Hourly];
const CURRENT: &[Window] = &[Window::Current];
const DAILY: &[Window] = &[Window::Daily];

/// One exported gauge family and the projected field feeding it.
/// Text fields are exported as an info style gauge with the text as an extra label.
struct GaugeSpec {
    name: &'static str,
    help: &'static str,
    field: &'static str,
    windows: &'static [Window],
    text: bool,
}

const fn gauge(name: &'static str, help: &'static str, field: &'static str, windows: &'static [Window]) -> GaugeSpec {
    GaugeSpec { name, help, field, windows, text: false }
}
const fn info_gauge(name: &'static str, help: &'static str, windows: &'static [Window]) -> GaugeSpec {
    GaugeSpec { name, help, field: "summary", windows, text: true }
}

const GAUGES: [GaugeSpec; 16] = [
    gauge("forecast_temperature", "forecasted apparent temperature (C)", "apparentTemperature", CURRENT_AND_HOURLY),
    gauge("forecast_real_temperature", "current real temperature (C)", "temperature", CURRENT),
    gauge("forecast_precipitation_probability", "forecasted precipitation probability (0-1)", "precipProbability", CURRENT_AND_HOURLY),
    gauge("forecast_precipitation_intensity", "forecasted precipitation intensity (mm/h)", "precipIntensity", CURRENT_AND_HOURLY),
    gauge("forecast_humidity", "forecasted relative humidity (0-1)", "humidity", CURRENT_AND_HOURLY),
    gauge("forecast_wind_speed", "forecasted wind speed (m/s)", "windSpeed", CURRENT_AND_HOURLY),
    info_gauge("forecast_summary_info", "forecast summary text as label", CURRENT_AND_HOURLY),
    gauge("forecast_daily_temperature_high", "forecasted daily high apparent temperature (C)", "apparentTemperatureHigh", DAILY),
    gauge("forecast_daily_temperature_low", "forecasted daily low apparent temperature (C)", "apparentTemperatureLow", DAILY),
    gauge("forecast_daily_temperature_high_time", "unix time of the daily high apparent temperature", "apparentTemperatureHighTime", DAILY),
    gauge("forecast_daily_temperature_low_time", "unix time of the daily low apparent temperature", "apparentTemperatureLowTime", DAILY),
    gauge("forecast_daily_precipitation_probability", "forecasted daily precipitation probability (0-1)", "precipProbability", DAILY),
    gauge("forecast_daily_precipitation_intensity", "forecasted daily precipitation intensity (mm/h)", "precipIntensity", DAILY),
    gauge("forecast_daily_humidity", "forecasted daily relative humidity (0-1)", "humidity", DAILY),
    gauge("forecast_daily_wind_speed", "forecasted daily wind speed (m/s)", "windSpeed", DAILY),
    info_gauge("forecast_daily_summary_info", "daily forecast summary text as label", DAILY),
];

impl GaugeSpec {
    fn label_keys(&self) -> Vec<&'static str> {
        let mut keys = vec!["location", "day"];
        if !self.windows.contains(&Window::Daily) {
            keys.push("time");
        }
        if self.text {
            keys.push("summary");
        }
        keys
    }
}

/// One exported series, i.e. a gauge family and the full set of label values
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct Series {
    gauge: usize,
    labels: Vec<String>,
}

struct GaugeState {
    registry: Registry,
    gauges: Vec<GaugeVec>,
    series: HashMap<Bucket, Vec<Series>>,
}

/// Gauge registry shared between the poll loop (writer) and the exposition endpoint (reader).
/// A single lock covers a whole publish so a scrape never sees half a cycle.
#[derive(Clone)]
pub struct GaugeRegistry {
    state: Arc<RwLock<GaugeState>>,
}

impl GaugeRegistry {
    /// Returns a registry with all forecast gauge families registered
    ///
    pub fn new() -> Result<GaugeRegistry, SinkError> {
        let registry = Registry::new();
        let mut gauges = Vec::with_capacity(GAUGES.len());

        for spec in &GAUGES {
            let g = GaugeVec::new(Opts::new(spec.name, spec.help), spec.label_keys().as_slice())?;
            registry.register(Box::new(g.clone()))?;
            gauges.push(g);
        }

        let state = GaugeState { registry, gauges, series: HashMap::new() };

        Ok(GaugeRegistry { state: Arc::new(RwLock::new(state)) })
    }

    /// Renders all current gauge values in the Prometheus text format
    ///
    pub fn encode(&self) -> Result<String, SinkError> {
        let state = self.state.read()
            .map_err(|e| SinkError::Write(format!("registry lock poisoned: {}", e)))?;

        let families = state.registry.gather();
        let mut buffer = String::new();
        TextEncoder::new().encode_utf8(&families, &mut buffer)?;

        Ok(buffer)
    }

    /// Sets all projected values and then removes series of stale buckets, as well as series
    /// a republished bucket no longer has (e.g. a changed summary). A series set in this call
    /// is never removed, even when a stale bucket maps to it. Returns the number of removed series.
    ///
    /// # Arguments
    ///
    /// * 'location' - value of the location label
    /// * 'projections' - projections to set
    /// * 'stale' - buckets to retract
    fn apply(&self, location: &str, projections: &[Projection], stale: &[Bucket]) -> Result<usize, SinkError> {
        let mut guard = self.state.write()
            .map_err(|e| SinkError::Write(format!("registry lock poisoned: {}", e)))?;
        let state = &mut *guard;
        let mut live: HashSet<Series> = HashSet::new();
        let mut retired: Vec<Series> = Vec::new();

        for p in projections {
            let values = series_for(location, p);
            for (s, v) in &values {
                let labels = s.labels.iter().map(String::as_str).collect::<Vec<&str>>();
                state.gauges[s.gauge].get_metric_with_label_values(labels.as_slice())?.set(*v);
            }

            let new = values.into_iter().map(|(s, _)| s).collect::<Vec<Series>>();
            live.extend(new.iter().cloned());
            if let Some(old) = state.series.insert(p.bucket.clone(), new) {
                retired.extend(old);
            }
        }

        for bucket in stale {
            if let Some(old) = state.series.remove(bucket) {
                retired.extend(old);
            }
        }

        let removed: usize = retired.iter()
            .filter(|s| !live.contains(*s))
            .map(|s| remove_series(&state.gauges, s))
            .sum();

        Ok(removed)
    }
}

/// Builds the series and values a projection is exported as
///
/// # Arguments
///
/// * 'location' - value of the location label
/// * 'projection' - the projection to export
fn series_for(location: &str, projection: &Projection) -> Vec<(Series, f64)> {
    let bucket = &projection.bucket;

    GAUGES.iter()
        .enumerate()
        .filter(|(_, spec)| spec.windows.contains(&bucket.window))
        .filter_map(|(gauge, spec)| {
            let mut labels = vec![location.to_string(), bucket.label.day.clone()];
            if bucket.window != Window::Daily {
                labels.push(bucket.label.time.clone());
            }

            match (projection.values.get(spec.field)?, spec.text) {
                (FieldValue::Number(n), false) => Some((Series { gauge, labels }, *n)),
                (FieldValue::Text(t), true) => {
                    labels.push(t.clone());
                    Some((Series { gauge, labels }, 1.0))
                },
                _ => None,
            }
        })
        .collect()
}

fn remove_series(gauges: &[GaugeVec], series: &Series) -> usize {
    let labels = series.labels.iter().map(String::as_str).collect::<Vec<&str>>();
    match gauges[series.gauge].remove_label_values(labels.as_slice()) {
        Ok(()) => 1,
        Err(e) => {
            debug!("series {:?} already gone: {}", series.labels, e);
            0
        }
    }
}

/// Sink exporting projections as labeled gauges for scraping
pub struct MetricsSink {
    registry: GaugeRegistry,
    location: String,
}

impl MetricsSink {
    /// Returns a new sink writing to the given registry
    ///
    /// # Arguments
    ///
    /// * 'registry' - registry also served by the exposition endpoint
    /// * 'location' - value of the location label
    pub fn new(registry: GaugeRegistry, location: &str) -> MetricsSink {
        MetricsSink { registry, location: location.to_string() }
    }
}

impl Sink for MetricsSink {
    fn name(&self) -> &'static str {
        "metrics"
    }

    fn publish(&mut self, projections: &[Projection], stale: &[Bucket]) -> Result<(), SinkError> {
        let removed = self.registry.apply(&self.location, projections, stale)?;
        info!("published {} buckets to gauge registry, retracted {} stale buckets ({} series)",
            projections.len(), stale.len(), removed);

        Ok(())
    }

    fn tracks_labels(&self) -> bool {
        true
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use crate::time_buckets::BucketLabel;

    /// Looks up a sample in exposition text, labels may appear in any order
    pub(crate) fn sample(text: &str, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
        let prefix = format!("{}{{", name);
        text.lines()
            .filter(|l| l.starts_with(&prefix))
            .find(|l| labels.iter().all(|(k, v)| l.contains(&format!("{}=\"{}\"", k, v))))
            .and_then(|l| l.rsplit(' ').next()?.parse().ok())
    }

    fn projection(window: Window, day: &str, time: &str, values: &[(&'static str, FieldValue)]) -> Projection {
        Projection {
            bucket: Bucket { window, label: BucketLabel::new(day, time) },
            time: 0,
            values: values.iter().cloned().collect::<BTreeMap<_, _>>(),
        }
    }

    fn hourly(time: &str, temp: f64, summary: &str) -> Projection {
        projection(Window::Hourly, "today", time, &[
            ("apparentTemperature", FieldValue::Number(temp)),
            ("humidity", FieldValue::Number(0.5)),
            ("summary", FieldValue::Text(summary.to_string())),
        ])
    }

    #[test]
    fn label_keys_follow_window() {
        assert_eq!(GAUGES[0].label_keys(), vec!["location", "day", "time"]);
        assert_eq!(GAUGES[6].label_keys(), vec!["location", "day", "time", "summary"]);
        assert_eq!(GAUGES[7].label_keys(), vec!["location", "day"]);
        assert_eq!(GAUGES[15].label_keys(), vec!["location", "day", "summary"]);
    }

    #[test]
    fn publish_sets_gauges() {
        let registry = GaugeRegistry::new().unwrap();
        let mut sink = MetricsSink::new(registry.clone(), "home");

        let current = projection(Window::Current, "today", "now", &[
            ("apparentTemperature", FieldValue::Number(15.0)),
            ("temperature", FieldValue::Number(16.5)),
        ]);
        let daily = projection(Window::Daily, "tomorrow", "00:00", &[
            ("apparentTemperatureHigh", FieldValue::Number(21.0)),
            ("summary", FieldValue::Text("Mild".to_string())),
        ]);
        sink.publish(&[current, hourly("11:00", 12.5, "Clear"), daily], &[]).unwrap();

        let text = registry.encode().unwrap();
        let now = [("location", "home"), ("day", "today"), ("time", "now")];
        assert_eq!(sample(&text, "forecast_temperature", &now), Some(15.0));
        assert_eq!(sample(&text, "forecast_real_temperature", &now), Some(16.5));
        assert_eq!(sample(&text, "forecast_temperature", &[("time", "11:00")]), Some(12.5));
        assert_eq!(sample(&text, "forecast_humidity", &[("time", "11:00")]), Some(0.5));
        assert_eq!(sample(&text, "forecast_summary_info", &[("time", "11:00"), ("summary", "Clear")]), Some(1.0));
        assert_eq!(sample(&text, "forecast_daily_temperature_high", &[("day", "tomorrow")]), Some(21.0));
        assert_eq!(sample(&text, "forecast_daily_summary_info", &[("summary", "Mild")]), Some(1.0));
    }

    #[test]
    fn stale_buckets_are_retracted() {
        let registry = GaugeRegistry::new().unwrap();
        let mut sink = MetricsSink::new(registry.clone(), "home");

        let first = [hourly("10:00", 14.0, "Clear"), hourly("11:00", 13.0, "Clear")];
        sink.publish(&first, &[]).unwrap();

        let stale = [first[0].bucket.clone()];
        sink.publish(&first[1..], &stale).unwrap();

        let text = registry.encode().unwrap();
        assert_eq!(sample(&text, "forecast_temperature", &[("time", "10:00")]), None);
        assert_eq!(sample(&text, "forecast_summary_info", &[("time", "10:00")]), None);
        assert_eq!(sample(&text, "forecast_temperature", &[("time", "11:00")]), Some(13.0));
    }

    #[test]
    fn changed_summary_replaces_info_series() {
        let registry = GaugeRegistry::new().unwrap();
        let mut sink = MetricsSink::new(registry.clone(), "home");

        sink.publish(&[hourly("10:00", 14.0, "Clear")], &[]).unwrap();
        sink.publish(&[hourly("10:00", 14.0, "Rain")], &[]).unwrap();

        let text = registry.encode().unwrap();
        assert_eq!(sample(&text, "forecast_summary_info", &[("summary", "Clear")]), None);
        assert_eq!(sample(&text, "forecast_summary_info", &[("summary", "Rain")]), Some(1.0));
    }

    #[test]
    fn retracting_unknown_bucket_is_harmless() {
        let registry = GaugeRegistry::new().unwrap();
        let removed = registry.apply("home", &[], &[hourly("09:00", 1.0, "x").bucket]).unwrap();

        assert_eq!(removed, 0);
    }

    #[test]
    fn hourly_and_daily_with_same_label_are_distinct() {
        let registry = GaugeRegistry::new().unwrap();
        let mut sink = MetricsSink::new(registry.clone(), "home");

        let hour = projection(Window::Hourly, "today", "00:00", &[("apparentTemperature", FieldValue::Number(3.0))]);
        let day = projection(Window::Daily, "today", "00:00", &[("apparentTemperatureHigh", FieldValue::Number(9.0))]);
        sink.publish(&[hour.clone(), day], &[]).unwrap();
        sink.publish(&[hour.clone()], &[Bucket { window: Window::Daily, label: hour.bucket.label.clone() }]).unwrap();

        let text = registry.encode().unwrap();
        assert_eq!(sample(&text, "forecast_temperature", &[("time", "00:00")]), Some(3.0));
        assert_eq!(sample(&text, "forecast_daily_temperature_high", &[("day", "today")]), None);
    }

    #[test]
    fn stale_bucket_sharing_series_with_new_bucket_keeps_new_value() {
        let registry = GaugeRegistry::new().unwrap();
        let mut sink = MetricsSink::new(registry.clone(), "home");

        let before = projection(Window::Daily, "today", "22:00", &[("apparentTemperatureHigh", FieldValue::Number(10.0))]);
        let after = projection(Window::Daily, "today", "23:00", &[("apparentTemperatureHigh", FieldValue::Number(12.0))]);
        sink.publish(&[before.clone()], &[]).unwrap();
        sink.publish(&[after], &[before.bucket]).unwrap();

        let text = registry.encode().unwrap();
        assert_eq!(sample(&text, "forecast_daily_temperature_high", &[("day", "today")]), Some(12.0));
    }
}
