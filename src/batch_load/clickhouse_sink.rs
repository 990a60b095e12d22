use std::time::Duration;

use reqwest::blocking::Client;
use tracing::{debug, info};

use crate::batch_load::cell::Cell;
use crate::batch_load::sink::{PreparedBatch, Sink};
use crate::batch_load::statement::Dialect;
use crate::error::SinkError;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_HTTP_PORT: u16 = 8123;
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Connection settings for the ClickHouse HTTP interface
#[derive(Debug, Clone)]
pub struct ClickHouseConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    pub connect_timeout: Duration,
}

impl Default for ClickHouseConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_HTTP_PORT,
            database: "default".to_string(),
            user: "default".to_string(),
            password: String::new(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl ClickHouseConfig {
    pub fn endpoint(&self) -> String {
        format!("http://{}:{}/", self.host, self.port)
    }
}

// Sink that posts every batch to ClickHouse as a single INSERT request
pub struct ClickHouseSink {
    client: Client,
    config: ClickHouseConfig,
}

impl ClickHouseSink {
    // Build the client and check the server answers before any data is read
    pub fn connect(config: ClickHouseConfig) -> Result<Self, SinkError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()?;
        let sink = Self { client, config };
        sink.ping()?;
        info!(endpoint = %sink.config.endpoint(), database = %sink.config.database, "Connected to ClickHouse");
        Ok(sink)
    }

    fn ping(&self) -> Result<(), SinkError> {
        let response = self
            .client
            .get(format!("{}ping", self.config.endpoint()))
            .send()?;
        check_response(response)
    }

    pub fn config(&self) -> &ClickHouseConfig {
        &self.config
    }

    fn post(&self, body: String) -> Result<(), SinkError> {
        let response = self
            .client
            .post(self.config.endpoint())
            .header("X-ClickHouse-User", &self.config.user)
            .header("X-ClickHouse-Key", &self.config.password)
            .header("X-ClickHouse-Database", &self.config.database)
            .body(body)
            .send()?;
        check_response(response)
    }
}

fn check_response(response: reqwest::blocking::Response) -> Result<(), SinkError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = match response.text() {
        Ok(body) => body,
        Err(e) => {
            debug!(error = %e, "Could not read ClickHouse error body");
            String::new()
        }
    };
    Err(SinkError::Rejected {
        status: status.as_u16(),
        body: body.trim_end().to_string(),
    })
}

impl Sink for ClickHouseSink {
    fn dialect(&self) -> Dialect {
        Dialect::ClickHouse
    }

    fn prepare_batch(&mut self, statement: &str) -> Result<Box<dyn PreparedBatch + '_>, SinkError> {
        Ok(Box::new(ClickHouseBatch {
            sink: self,
            body: json_insert_head(statement),
            rows: 0,
        }))
    }
}

// Rows are shipped as JSONCompactEachRow, so the trailing VALUES keyword
// is swapped for the FORMAT clause
fn json_insert_head(statement: &str) -> String {
    let trimmed = statement.trim_end();
    let columns = trimmed.strip_suffix("VALUES").unwrap_or(trimmed).trim_end();
    format!("{} FORMAT JSONCompactEachRow\n", columns)
}

struct ClickHouseBatch<'a> {
    sink: &'a ClickHouseSink,
    body: String,
    rows: usize,
}

impl PreparedBatch for ClickHouseBatch<'_> {
    fn append(&mut self, row: &[Cell]) -> Result<(), SinkError> {
        self.body.push_str(&json_row(row)?);
        self.body.push('\n');
        self.rows += 1;
        Ok(())
    }

    fn send(self: Box<Self>) -> Result<(), SinkError> {
        debug!(rows = self.rows, bytes = self.body.len(), "Posting batch to ClickHouse");
        self.sink.post(self.body)
    }
}

// One row as a JSON array: integers as numbers, text as strings
pub(crate) fn json_row(row: &[Cell]) -> Result<String, SinkError> {
    let values: Vec<serde_json::Value> = row
        .iter()
        .map(|cell| match cell {
            Cell::Integer(v) => serde_json::Value::from(*v),
            Cell::Text(s) => serde_json::Value::from(s.as_str()),
        })
        .collect();
    Ok(serde_json::to_string(&values)?)
}
