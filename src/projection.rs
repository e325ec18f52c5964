use std::collections::BTreeMap;
use std::fmt;
use std::fmt::{Display, Formatter};
use log::warn;
use crate::errors::ProjectionError;
use crate::models::snapshot::{FieldValue, ForecastSnapshot, Observation};
use crate::time_buckets::BucketLabel;

/// The forecast window an observation belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Window {
    Current,
    Hourly,
    Daily,
}

impl Display for Window {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Window::Current => write!(f, "current"),
            Window::Hourly => write!(f, "hourly"),
            Window::Daily => write!(f, "daily"),
        }
    }
}

/// Identity of a published bucket. Hourly and daily buckets may share a label
/// (e.g. "today 00:00") so the window is part of the identity.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Bucket {
    pub window: Window,
    pub label: BucketLabel,
}

impl Display for Bucket {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{} {}", self.window, self.label)
    }
}

#[derive(Clone, Copy, PartialEq)]
enum FieldKind {
    Number,
    Text,
}

struct FieldSpec {
    name: &'static str,
    kind: FieldKind,
    required: bool,
}

const fn number(name: &'static str) -> FieldSpec {
    FieldSpec { name, kind: FieldKind::Number, required: true }
}
const fn text(name: &'static str) -> FieldSpec {
    FieldSpec { name, kind: FieldKind::Text, required: true }
}
const fn pass_through(name: &'static str) -> FieldSpec {
    FieldSpec { name, kind: FieldKind::Number, required: false }
}

const CURRENT_FIELDS: [FieldSpec; 7] = [
    number("apparentTemperature"),
    number("temperature"),
    number("precipProbability"),
    number("precipIntensity"),
    number("humidity"),
    number("windSpeed"),
    text("summary"),
];

const HOURLY_FIELDS: [FieldSpec; 6] = [
    number("apparentTemperature"),
    number("precipProbability"),
    number("precipIntensity"),
    number("humidity"),
    number("windSpeed"),
    text("summary"),
];

const DAILY_FIELDS: [FieldSpec; 9] = [
    number("apparentTemperatureHigh"),
    number("apparentTemperatureLow"),
    pass_through("apparentTemperatureHighTime"),
    pass_through("apparentTemperatureLowTime"),
    text("summary"),
    number("precipProbability"),
    number("precipIntensity"),
    number("humidity"),
    number("windSpeed"),
];

/// Selected fields of one forecast entry under its published bucket
#[derive(Clone, Debug, PartialEq)]
pub struct Projection {
    pub bucket: Bucket,
    pub time: i64,
    pub values: BTreeMap<&'static str, FieldValue>,
}

impl Projection {
    pub fn number(&self, field: &str) -> Option<f64> {
        match self.values.get(field) {
            Some(FieldValue::Number(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn text(&self, field: &str) -> Option<&str> {
        match self.values.get(field) {
            Some(FieldValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }
}

/// Projects a snapshot into labeled observations, current first, then hourly and daily
/// in snapshot order. Entries missing a required field are logged and skipped.
///
/// # Arguments
///
/// * 'snapshot' - the fetched forecast
/// * 'bucket_fn' - maps an entry timestamp to its bucket label
pub fn project<F>(snapshot: &ForecastSnapshot, bucket_fn: F) -> Vec<Projection>
where
    F: Fn(i64) -> Option<BucketLabel>,
{
    let mut projections = Vec::with_capacity(1 + snapshot.hourly.len() + snapshot.daily.len());

    let entries = std::iter::once((Window::Current, &snapshot.current))
        .chain(snapshot.hourly.iter().map(|o| (Window::Hourly, o)))
        .chain(snapshot.daily.iter().map(|o| (Window::Daily, o)));

    for (window, observation) in entries {
        match project_entry(window, observation, &bucket_fn) {
            Ok(p) => projections.push(p),
            Err(e) => warn!("skipping forecast entry: {}", e),
        }
    }

    projections
}

/// Projects a single entry
///
/// # Arguments
///
/// * 'window' - the window the entry belongs to
/// * 'observation' - the entry
/// * 'bucket_fn' - maps an entry timestamp to its bucket label
fn project_entry<F>(window: Window, observation: &Observation, bucket_fn: &F) -> Result<Projection, ProjectionError>
where
    F: Fn(i64) -> Option<BucketLabel>,
{
    let time = observation.time;
    let specs: &[FieldSpec] = match window {
        Window::Current => &CURRENT_FIELDS,
        Window::Hourly => &HOURLY_FIELDS,
        Window::Daily => &DAILY_FIELDS,
    };

    let mut values = BTreeMap::new();
    for spec in specs {
        match (observation.get(spec.name), spec.kind) {
            (Some(v @ FieldValue::Number(_)), FieldKind::Number) | (Some(v @ FieldValue::Text(_)), FieldKind::Text) => {
                values.insert(spec.name, v.clone());
            },
            (Some(_), _) if spec.required => {
                return Err(ProjectionError::FieldType { window, time, field: spec.name });
            },
            (None, _) if spec.required => {
                return Err(ProjectionError::FieldMissing { window, time, field: spec.name });
            },
            _ => {},
        }
    }

    let label = match window {
        Window::Current => BucketLabel::now(),
        _ => bucket_fn(time).ok_or(ProjectionError::Timestamp { window, time })?,
    };

    Ok(Projection { bucket: Bucket { window, label }, time, values })
}
