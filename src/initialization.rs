use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use anyhow::{Context, Result};
use log::info;
use crate::config::{Config, SinkKind};
use crate::manager_forecast::{DarkSky, Fetcher, Fixture};
use crate::manager_influx::InfluxSink;
use crate::manager_metrics::server::{self, Endpoint};
use crate::manager_metrics::{GaugeRegistry, MetricsSink};
use crate::manager_sqlite::SqliteSink;
use crate::sink::Sink;
use crate::worker::Pipeline;

/// Everything the poll loop needs
pub struct Mgr {
    pub pipeline: Pipeline<Fetcher, Box<dyn Sink>>,
    pub endpoint: Option<Endpoint>,
}

/// Instantiates the fetcher and the configured sink. For the metrics sink the exposition
/// endpoint is started on its own thread, raising 'shutdown' should it ever stop.
///
/// # Arguments
///
/// * 'config' - the loaded configuration
/// * 'shutdown' - shutdown flag of the poll loop
pub fn init(config: &Config, shutdown: &Arc<AtomicBool>) -> Result<Mgr> {
    info!("weather-exporter version: {}", env!("CARGO_PKG_VERSION"));

    let fetcher = match &config.forecast.fixture {
        Some(path) => {
            info!("test mode, reading forecast from {}", path);
            Fetcher::Fixture(Fixture::new(path))
        },
        None => Fetcher::Remote(DarkSky::new(&config.forecast)),
    };

    let location = config.location.name.as_str();

    let mut endpoint = None;
    let sink: Box<dyn Sink> = match config.sink.kind {
        SinkKind::Metrics => {
            let registry = GaugeRegistry::new().context("unable to create gauge registry")?;
            endpoint = Some(server::start(registry.clone(), config.sink.metrics_port, shutdown.clone())
                .with_context(|| format!("unable to serve metrics on port {}", config.sink.metrics_port))?);
            Box::new(MetricsSink::new(registry, location))
        },
        SinkKind::Sqlite => {
            let db_path = config.sink.db_path.as_deref().context("sqlite sink requires db_path")?;
            Box::new(SqliteSink::open(db_path).with_context(|| format!("unable to open database {}", db_path))?)
        },
        SinkKind::Influx => {
            let url = config.sink.influx_url.as_deref().context("influx sink requires influx_url")?;
            let db = config.sink.influx_db.as_deref().context("influx sink requires influx_db")?;
            Box::new(InfluxSink::new(url, db, location))
        },
    };

    Ok(Mgr { pipeline: Pipeline::new(fetcher, sink), endpoint })
}
