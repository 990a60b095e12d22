use std::path::Path;

use duckdb::types::{ToSql, ToSqlOutput, Value};
use duckdb::{params_from_iter, Connection, Transaction};
use tracing::debug;

use crate::batch_load::cell::Cell;
use crate::batch_load::sink::{PreparedBatch, Sink};
use crate::batch_load::statement::Dialect;
use crate::error::SinkError;

impl ToSql for Cell {
    fn to_sql(&self) -> duckdb::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Cell::Integer(v) => ToSqlOutput::Owned(Value::UBigInt(*v)),
            Cell::Text(s) => ToSqlOutput::Owned(Value::Text(s.clone())),
        })
    }
}

/// Sink writing into a DuckDB database.
/// Every batch runs in its own transaction so it lands completely or not at all.
pub struct DuckDbSink {
    conn: Connection,
}

impl DuckDbSink {
    // Open (or create) a database file, ":memory:" gives a throwaway database
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SinkError> {
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

impl Sink for DuckDbSink {
    fn dialect(&self) -> Dialect {
        Dialect::DuckDb
    }

    fn prepare_batch(&mut self, statement: &str) -> Result<Box<dyn PreparedBatch + '_>, SinkError> {
        let tx = self.conn.transaction()?;
        Ok(Box::new(DuckDbBatch {
            tx,
            statement: statement.to_string(),
            rows: 0,
        }))
    }
}

struct DuckDbBatch<'a> {
    tx: Transaction<'a>,
    statement: String,
    rows: usize,
}

impl PreparedBatch for DuckDbBatch<'_> {
    fn append(&mut self, row: &[Cell]) -> Result<(), SinkError> {
        let query = format!("{} ({})", self.statement, placeholders(row.len()));
        let mut stmt = self.tx.prepare_cached(&query)?;
        stmt.execute(params_from_iter(row.iter()))?;
        self.rows += 1;
        Ok(())
    }

    fn send(self: Box<Self>) -> Result<(), SinkError> {
        let batch = *self;
        debug!(rows = batch.rows, "Committing DuckDB batch");
        batch.tx.commit()?;
        Ok(())
    }
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}
