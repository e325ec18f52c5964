use serde::Deserialize;
use serde_json::{Map, Value};

/// Raw forecast document as returned by the provider (or read from a fixture).
/// Entries are kept as plain json maps, selection of fields is done when projecting.
#[derive(Deserialize)]
pub struct ForecastDocument {
    pub currently: Map<String, Value>,
    pub hourly: DataBlock,
    pub daily: DataBlock,
}

#[derive(Deserialize)]
pub struct DataBlock {
    pub data: Vec<Map<String, Value>>,
}
