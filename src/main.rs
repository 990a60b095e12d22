use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use clap::builder::{NonEmptyStringValueParser, RangedU64ValueParser};
use tracing_subscriber::EnvFilter;

use csv_clickhouse::batch_load::clickhouse_sink::{DEFAULT_HOST, DEFAULT_HTTP_PORT};
use csv_clickhouse::batch_load::core_loader::DEFAULT_BATCH_SIZE;
use csv_clickhouse::{open_source, BatchLoader, ClickHouseConfig, ClickHouseSink, DuckDbSink, Sink};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Target {
    Clickhouse,
    Duckdb,
}

/// Load a delimited text file into a database table in fixed-size batches.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// ClickHouse host.
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,

    /// ClickHouse HTTP port.
    #[arg(long, default_value_t = DEFAULT_HTTP_PORT)]
    port: u16,

    /// Number of records sent per insert.
    #[arg(
        long = "batch",
        default_value_t = DEFAULT_BATCH_SIZE,
        value_parser = RangedU64ValueParser::<usize>::new().range(1..)
    )]
    batch_size: usize,

    /// ClickHouse database.
    #[arg(long, default_value = "default")]
    database: String,

    /// ClickHouse user.
    #[arg(long, default_value = "default")]
    user: String,

    /// ClickHouse password.
    #[arg(long, env = "CLICKHOUSE_PASSWORD", default_value = "", hide_env_values = true)]
    password: String,

    /// Target table name.
    #[arg(long, value_parser = NonEmptyStringValueParser::new())]
    table: String,

    /// Path to the CSV file (or a zip archive containing one).
    #[arg(long = "csv", value_parser = NonEmptyStringValueParser::new())]
    csv_path: String,

    /// Field delimiter, a single ASCII character.
    #[arg(long, default_value_t = ',')]
    delimiter: char,

    /// Connection timeout in milliseconds.
    #[arg(long, default_value_t = 1000)]
    connect_timeout_ms: u64,

    /// Database to load into.
    #[arg(long, value_enum, default_value_t = Target::Clickhouse)]
    target: Target,

    /// DuckDB database file, used with --target duckdb.
    #[arg(long, required_if_eq("target", "duckdb"))]
    duckdb_path: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let delimiter = match u8::try_from(args.delimiter) {
        Ok(b) if b.is_ascii() => b,
        _ => bail!("--delimiter must be a single ASCII character, got '{}'", args.delimiter),
    };
    let loader = BatchLoader::new(&args.table, args.batch_size)?;

    let (mut sink, target_name): (Box<dyn Sink>, &str) = match args.target {
        Target::Clickhouse => {
            let config = ClickHouseConfig {
                host: args.host,
                port: args.port,
                database: args.database,
                user: args.user,
                password: args.password,
                connect_timeout: Duration::from_millis(args.connect_timeout_ms),
            };
            let sink = ClickHouseSink::connect(config).context("failed to connect to ClickHouse")?;
            (Box::new(sink) as Box<dyn Sink>, "ClickHouse")
        }
        Target::Duckdb => {
            let path = args
                .duckdb_path
                .context("--duckdb-path is required with --target duckdb")?;
            let sink = DuckDbSink::open(&path)
                .with_context(|| format!("failed to open DuckDB database '{}'", path.display()))?;
            (Box::new(sink) as Box<dyn Sink>, "DuckDB")
        }
    };

    let mut source = open_source(Path::new(&args.csv_path), delimiter)?;

    let start = Instant::now();
    loader.ingest(&mut source, sink.as_mut())?;

    println!(
        "Data successfully inserted into {}. Time taken: {:?}",
        target_name,
        start.elapsed()
    );
    Ok(())
}
