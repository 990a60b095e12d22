//! Batch loader for delimited text files.
//!
//! Rows are read from a CSV (or a zip archive holding one), coerced cell by
//! cell to either an unsigned integer or text, and submitted to a columnar
//! database in fixed-size batches.

pub mod batch_load;
pub mod error;
pub mod file_load;

pub use batch_load::cell::{coerce_cell, coerce_record, Cell};
pub use batch_load::clickhouse_sink::{ClickHouseConfig, ClickHouseSink};
pub use batch_load::core_loader::{flush, BatchLoader, IngestSummary};
pub use batch_load::duckdb_sink::DuckDbSink;
pub use batch_load::sink::{PreparedBatch, Sink};
pub use batch_load::statement::{build_insert_statement, Dialect};
pub use error::{LoadError, SinkError};
pub use file_load::{open_source, CsvSource, InputKind, Record, RecordSource};
