pub mod cell;
pub mod clickhouse_sink;
pub mod core_loader;
pub mod duckdb_sink;
pub mod sink;
pub mod statement;
