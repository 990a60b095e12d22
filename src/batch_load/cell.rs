use std::fmt;

use crate::file_load::Record;

/// A typed value ready to be appended to a sink.
/// Only two shapes exist: an unsigned 64 bit integer or the raw text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Integer(u64),
    Text(String),
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Integer(v) => write!(f, "{}", v),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

// Coerce a raw cell: base-10 digits that fit in a u64 become an Integer,
// anything else (signs, whitespace, decimals, overflow, empty) stays Text.
pub fn coerce_cell<S: Into<String>>(value: S) -> Cell {
    let value = value.into();
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Cell::Text(value);
    }
    match lexical_core::parse::<u64>(value.as_bytes()) {
        Ok(v) => Cell::Integer(v),
        Err(_) => Cell::Text(value),
    }
}

// Coerce every cell of a record, keeping column order
pub fn coerce_record(record: Record) -> Vec<Cell> {
    record.into_iter().map(coerce_cell).collect()
}
