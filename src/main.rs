use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use log::{error, warn};
use crate::config::load_config;
use crate::initialization::init;
use crate::logging::setup_logger;

mod config;
mod errors;
mod initialization;
mod logging;
mod manager_forecast;
mod manager_influx;
mod manager_metrics;
mod manager_sqlite;
mod models;
mod projection;
mod reconcile;
mod sink;
mod time_buckets;
mod worker;

fn main() -> ExitCode {
    let config_path = match env::args().nth(1).or_else(|| env::var("CONFIG_PATH").ok()) {
        Some(p) => p,
        None => {
            eprintln!("usage: weather-exporter <config.toml> (or set CONFIG_PATH)");
            return ExitCode::FAILURE;
        }
    };

    let config = match load_config(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = setup_logger(&config.general) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        if let Err(e) = ctrlc::set_handler(move || shutdown.store(true, Ordering::SeqCst)) {
            warn!("unable to install signal handler, only process termination will stop: {}", e);
        }
    }

    let mut mgr = match init(&config, &shutdown) {
        Ok(m) => m,
        Err(e) => {
            error!("initialization failed: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    worker::run(&mut mgr.pipeline, Duration::from_secs(config.forecast.refresh_interval), &shutdown);

    if let Some(endpoint) = mgr.endpoint.as_ref().filter(|e| !e.is_running()) {
        error!("metrics endpoint on {} is gone, exiting", endpoint.addr);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
