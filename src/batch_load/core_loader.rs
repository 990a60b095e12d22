use tracing::{debug, info};

use crate::batch_load::cell::coerce_record;
use crate::batch_load::sink::Sink;
use crate::batch_load::statement::build_insert_statement;
use crate::error::LoadError;
use crate::file_load::{Record, RecordSource};

pub const DEFAULT_BATCH_SIZE: usize = 3000;

// Upper bound on the rows reserved up front; larger batches grow as rows arrive
const MAX_PREALLOCATED_ROWS: usize = 4096;

/// Counts reported once a load has finished
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub struct IngestSummary {
    pub records: u64,
    pub batches: usize,
}

// Drives the read, buffer and flush loop for one target table.
// Holds no state between runs: the batch buffer lives inside `ingest`.
pub struct BatchLoader {
    table: String,
    batch_size: usize,
}

impl BatchLoader {
    pub fn new(table: &str, batch_size: usize) -> Result<Self, LoadError> {
        if table.trim().is_empty() {
            return Err(LoadError::Config("target table name must not be empty".to_string()));
        }
        if batch_size == 0 {
            return Err(LoadError::Config("batch size must be greater than zero".to_string()));
        }
        Ok(Self {
            table: table.to_string(),
            batch_size,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    // Read the header, then stream records into batches of `batch_size`.
    // Any failure aborts the load; batches already sent stay committed.
    #[tracing::instrument(skip_all, fields(table = %self.table, batch_size = self.batch_size))]
    pub fn ingest(
        &self,
        source: &mut dyn RecordSource,
        sink: &mut dyn Sink,
    ) -> Result<IngestSummary, LoadError> {
        let headers = source.read_record()?.ok_or(LoadError::MissingHeader)?;
        let statement = build_insert_statement(sink.dialect(), &self.table, &headers);
        debug!(%statement, columns = headers.len(), "Built insert statement");

        let mut summary = IngestSummary::default();
        let capacity = self.batch_size.min(MAX_PREALLOCATED_ROWS);
        let mut batch: Vec<Record> = Vec::with_capacity(capacity);

        while let Some(record) = source.read_record()? {
            batch.push(record);
            summary.records += 1;

            if batch.len() >= self.batch_size {
                let full = std::mem::replace(&mut batch, Vec::with_capacity(capacity));
                summary.batches += 1;
                debug!(batch = summary.batches, rows = full.len(), "Flushing batch");
                flush(sink, &statement, full)?;
            }
        }

        if !batch.is_empty() {
            summary.batches += 1;
            debug!(batch = summary.batches, rows = batch.len(), "Flushing final batch");
            flush(sink, &statement, batch)?;
        }

        info!(
            records = summary.records,
            batches = summary.batches,
            "Finished loading"
        );
        Ok(summary)
    }
}

// Coerce every record of the batch and submit it as one unit
pub fn flush(sink: &mut dyn Sink, statement: &str, batch: Vec<Record>) -> Result<(), LoadError> {
    let mut prepared = sink.prepare_batch(statement).map_err(LoadError::Prepare)?;
    for (row, record) in batch.into_iter().enumerate() {
        prepared
            .append(&coerce_record(record))
            .map_err(|source| LoadError::Append { row, source })?;
    }
    prepared.send().map_err(LoadError::Send)
}
