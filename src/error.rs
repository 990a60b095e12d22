use std::io;
use std::path::PathBuf;

/// Everything that can stop a load. Every variant is fatal for the run.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("invalid loader configuration: {0}")]
    Config(String),

    #[error("failed to open input file '{}'", .path.display())]
    Open { path: PathBuf, source: io::Error },

    #[error("failed to read archive '{}'", .path.display())]
    Archive {
        path: PathBuf,
        source: zip::result::ZipError,
    },

    #[error("no .csv entry found in archive '{}'", .path.display())]
    NoCsvEntry { path: PathBuf },

    #[error("failed to read header: input is empty")]
    MissingHeader,

    #[error("failed to read record")]
    Read(#[from] csv::Error),

    #[error("failed to prepare batch")]
    Prepare(#[source] SinkError),

    #[error("failed to append record {row} of batch")]
    Append { row: usize, source: SinkError },

    #[error("failed to send batch")]
    Send(#[source] SinkError),
}

/// Errors raised by a database sink.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("http request failed")]
    Http(#[from] reqwest::Error),

    #[error("failed to encode row")]
    Encode(#[from] serde_json::Error),

    #[error("server responded with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("duckdb error")]
    DuckDb(#[from] duckdb::Error),
}
