use log::info;
use rusqlite::{params, Connection};
use crate::errors::SinkError;
use crate::projection::{Bucket, Projection, Window};
use crate::sink::Sink;

const TABLE: &str = "hourly";

struct Column {
    name: &'static str,
    sql_type: &'static str,
}

const HOURLY_COLUMNS: [Column; 9] = [
    Column { name: "row", sql_type: "SMALLINT" },
    Column { name: "day", sql_type: "TEXT" },
    Column { name: "hour", sql_type: "TEXT" },
    Column { name: "summary", sql_type: "TEXT" },
    Column { name: "precipProbability", sql_type: "FLOAT" },
    Column { name: "precipIntensity", sql_type: "FLOAT" },
    Column { name: "windSpeed", sql_type: "FLOAT" },
    Column { name: "humidity", sql_type: "FLOAT" },
    Column { name: "temperature", sql_type: "FLOAT" },
];

fn create_table_sql() -> String {
    let columns = HOURLY_COLUMNS.iter()
        .map(|c| format!("\"{}\" {}", c.name, c.sql_type))
        .collect::<Vec<String>>()
        .join(", ");

    format!("CREATE TABLE IF NOT EXISTS {} ({})", TABLE, columns)
}

fn insert_sql() -> String {
    let names = HOURLY_COLUMNS.iter()
        .map(|c| format!("\"{}\"", c.name))
        .collect::<Vec<String>>()
        .join(", ");
    let placeholders = (1..=HOURLY_COLUMNS.len())
        .map(|i| format!("?{}", i))
        .collect::<Vec<String>>()
        .join(", ");

    format!("INSERT INTO {} ({}) VALUES ({})", TABLE, names, placeholders)
}

/// Sink keeping the hourly forecast in a relational table which is fully
/// replaced, inside one transaction, every cycle
pub struct SqliteSink {
    conn: Connection,
}

impl SqliteSink {
    /// Opens (or creates) the database file and makes sure the table exists
    ///
    /// # Arguments
    ///
    /// * 'db_path' - path to the database file
    pub fn open(db_path: &str) -> Result<SqliteSink, SinkError> {
        SqliteSink::with_connection(Connection::open(db_path)?)
    }

    /// Wraps an existing connection and makes sure the table exists
    ///
    /// # Arguments
    ///
    /// * 'conn' - database connection
    pub fn with_connection(conn: Connection) -> Result<SqliteSink, SinkError> {
        conn.execute_batch(&create_table_sql())?;
        Ok(SqliteSink { conn })
    }
}

impl Sink for SqliteSink {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    /// Replaces all rows with the hourly projections. Current and daily projections are not
    /// stored and stale buckets need no handling since the table is rewritten.
    fn publish(&mut self, projections: &[Projection], _stale: &[Bucket]) -> Result<(), SinkError> {
        let tx = self.conn.transaction()?;
        tx.execute(&format!("DELETE FROM {}", TABLE), [])?;

        let mut rows: i64 = 0;
        {
            let mut stmt = tx.prepare(&insert_sql())?;
            for p in projections.iter().filter(|p| p.bucket.window == Window::Hourly) {
                stmt.execute(params![
                    rows,
                    p.bucket.label.day,
                    p.bucket.label.time,
                    p.text("summary"),
                    p.number("precipProbability"),
                    p.number("precipIntensity"),
                    p.number("windSpeed"),
                    p.number("humidity"),
                    p.number("apparentTemperature"),
                ])?;
                rows += 1;
            }
        }

        tx.commit()?;
        info!("replaced {} table with {} rows", TABLE, rows);

        Ok(())
    }
}
