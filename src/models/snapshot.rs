use std::collections::BTreeMap;
use serde_json::{Map, Value};

/// A single forecast value, either numeric or free text (e.g. summary)
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

/// One forecast entry, i.e. the fields describing one instant together with its timestamp
#[derive(Clone, Debug, PartialEq)]
pub struct Observation {
    pub time: i64,
    pub fields: BTreeMap<String, FieldValue>,
}

impl Observation {
    /// Builds an observation from a raw provider entry.
    /// Only scalar values are kept, nested objects, arrays, booleans and nulls are dropped.
    ///
    /// # Arguments
    ///
    /// * 'time' - unix timestamp the entry describes
    /// * 'entry' - the raw json entry
    pub fn from_entry(time: i64, entry: &Map<String, Value>) -> Observation {
        let fields = entry.iter()
            .filter_map(|(k, v)| match v {
                Value::Number(n) => n.as_f64().map(|n| (k.clone(), FieldValue::Number(n))),
                Value::String(s) => Some((k.clone(), FieldValue::Text(s.clone()))),
                _ => None,
            })
            .collect();

        Observation { time, fields }
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }
}

/// One fetched forecast, immutable for the duration of one poll cycle
#[derive(Clone, Debug)]
pub struct ForecastSnapshot {
    pub current: Observation,
    pub hourly: Vec<Observation>,
    pub daily: Vec<Observation>,
}

impl ForecastSnapshot {
    /// Returns the name of the first series that is not ordered by time, if any
    ///
    pub fn out_of_order(&self) -> Option<&'static str> {
        let ordered = |series: &[Observation]| series.windows(2).all(|w| w[0].time <= w[1].time);

        if !ordered(&self.hourly) {
            Some("hourly")
        } else if !ordered(&self.daily) {
            Some("daily")
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_entry_keeps_scalars_only() {
        let entry = json!({
            "summary": "Light rain, then clear.",
            "humidity": 0.81,
            "icon": "rain",
            "alerts": ["x"],
            "isDaylight": true,
            "ozone": null,
        });

        let obs = Observation::from_entry(42, entry.as_object().unwrap());

        assert_eq!(obs.time, 42);
        assert_eq!(obs.get("summary"), Some(&FieldValue::Text("Light rain, then clear.".to_string())));
        assert_eq!(obs.get("humidity"), Some(&FieldValue::Number(0.81)));
        assert!(obs.get("alerts").is_none());
        assert!(obs.get("isDaylight").is_none());
        assert!(obs.get("ozone").is_none());
        assert_eq!(obs.fields.len(), 3);
    }

    #[test]
    fn out_of_order_detects_unsorted_series() {
        let at = |time| Observation { time, fields: BTreeMap::new() };
        let mut snapshot = ForecastSnapshot {
            current: at(0),
            hourly: vec![at(0), at(3600), at(3600)],
            daily: vec![at(0), at(86400)],
        };
        assert_eq!(snapshot.out_of_order(), None);

        snapshot.daily = vec![at(86400), at(0)];
        assert_eq!(snapshot.out_of_order(), Some("daily"));

        snapshot.hourly = vec![at(7200), at(3600)];
        assert_eq!(snapshot.out_of_order(), Some("hourly"));
    }
}
