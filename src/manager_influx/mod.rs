use std::time::Duration;
use log::info;
use ureq::Agent;
use crate::errors::SinkError;
use crate::models::snapshot::FieldValue;
use crate::projection::{Bucket, Projection};
use crate::sink::Sink;

const MEASUREMENT: &str = "forecast";

/// Sink writing projections as InfluxDB line protocol points
pub struct InfluxSink {
    agent: Agent,
    write_url: String,
    location: String,
}

impl InfluxSink {
    /// Returns a new InfluxSink
    ///
    /// # Arguments
    ///
    /// * 'url' - base url of the InfluxDB server, e.g. http://localhost:8086
    /// * 'db' - database to write to
    /// * 'location' - value of the location tag
    pub fn new(url: &str, db: &str, location: &str) -> InfluxSink {
        let config = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(30)))
            .build();

        let agent = config.into();

        InfluxSink {
            agent,
            write_url: format!("{}/write?db={}&precision=s", url.trim_end_matches('/'), db),
            location: location.to_string(),
        }
    }
}

impl Sink for InfluxSink {
    fn name(&self) -> &'static str {
        "influx"
    }

    fn publish(&mut self, projections: &[Projection], _stale: &[Bucket]) -> Result<(), SinkError> {
        let body = line_protocol(&self.location, projections);
        if body.is_empty() {
            return Ok(());
        }

        let _ = self.agent
            .post(&self.write_url)
            .content_type("text/plain; charset=utf-8")
            .send(body)?;

        info!("wrote {} points to influx", projections.len());

        Ok(())
    }
}

/// Renders projections as line protocol, one point per projection
///
/// # Arguments
///
/// * 'location' - value of the location tag
/// * 'projections' - projections to render
fn line_protocol(location: &str, projections: &[Projection]) -> String {
    let mut lines = String::new();

    for p in projections {
        if p.values.is_empty() {
            continue;
        }

        let fields = p.values.iter()
            .map(|(name, value)| match value {
                FieldValue::Number(n) => format!("{}={}", escape_key(name), n),
                FieldValue::Text(s) => format!("{}=\"{}\"", escape_key(name), escape_string(s)),
            })
            .collect::<Vec<String>>()
            .join(",");

        lines += &format!("{},location={},window={},day={},time={} {} {}\n",
            MEASUREMENT,
            escape_key(location),
            p.bucket.window,
            escape_key(&p.bucket.label.day),
            escape_key(&p.bucket.label.time),
            fields,
            p.time);
    }

    lines
}

/// Escapes tag keys, tag values and field keys
fn escape_key(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace(',', "\\,")
        .replace('=', "\\=")
        .replace(' ', "\\ ")
}

/// Escapes string field values
fn escape_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
