use thiserror::Error;
use crate::manager_forecast::errors::FetchError;
use crate::projection::Window;

#[derive(Error, Debug)]
#[error("ConfigError: {0}")]
pub struct ConfigError(pub String);

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self { ConfigError(format!("unable to read config: {}", e)) }
}
impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self { ConfigError(format!("config document error: {}", e)) }
}
impl From<&str> for ConfigError {
    fn from(e: &str) -> Self { ConfigError(e.to_string()) }
}

#[derive(Error, Debug)]
#[error("LoggingError: {0}")]
pub struct LoggingError(pub String);

/// Problems with a single forecast entry, these never fail a whole cycle
#[derive(Error, Debug, PartialEq)]
pub enum ProjectionError {
    #[error("{window} entry at {time} is missing field {field}")]
    FieldMissing { window: Window, time: i64, field: &'static str },
    #[error("{window} entry at {time} has field {field} of unexpected type")]
    FieldType { window: Window, time: i64, field: &'static str },
    #[error("{window} entry has a timestamp out of range: {time}")]
    Timestamp { window: Window, time: i64 },
}

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("SinkError::Transaction: {0}")]
    Transaction(String),
    #[error("SinkError::Write: {0}")]
    Write(String),
}

impl From<rusqlite::Error> for SinkError {
    fn from(e: rusqlite::Error) -> Self { SinkError::Transaction(e.to_string()) }
}
impl From<prometheus::Error> for SinkError {
    fn from(e: prometheus::Error) -> Self { SinkError::Write(format!("registry error: {}", e)) }
}
impl From<ureq::Error> for SinkError {
    fn from(e: ureq::Error) -> Self { SinkError::Write(format!("http request error: {}", e)) }
}

/// Reasons for a poll cycle to end without publishing
#[derive(Error, Debug)]
pub enum CycleError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("publish failed: {0}")]
    Sink(#[from] SinkError),
}
