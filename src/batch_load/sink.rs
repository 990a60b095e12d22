use crate::batch_load::cell::Cell;
use crate::batch_load::statement::Dialect;
use crate::error::SinkError;

/// Destination for batched inserts.
/// Each database gets its own implementation; the loader only talks to this trait.
pub trait Sink {
    /// Dialect used to quote the column list of the insert statement
    fn dialect(&self) -> Dialect;

    /// Prepare a parameterized batch for the given `INSERT ... VALUES` statement
    fn prepare_batch(&mut self, statement: &str) -> Result<Box<dyn PreparedBatch + '_>, SinkError>;
}

/// A batch in flight. Rows are appended in order and sent as one unit;
/// dropping a batch without sending it discards everything appended.
pub trait PreparedBatch {
    fn append(&mut self, row: &[Cell]) -> Result<(), SinkError>;

    fn send(self: Box<Self>) -> Result<(), SinkError>;
}
