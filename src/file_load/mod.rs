use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};
use tracing::info;
use zip::ZipArchive;

use crate::error::LoadError;

/// One row of raw fields, in file order
pub type Record = Vec<String>;

/// Kinds of input the loader accepts
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum InputKind {
    Delimited,
    ZipArchive,
}

/// Anything that yields records one at a time.
/// The first record is the header. `Ok(None)` means the input is exhausted,
/// which is not an error.
pub trait RecordSource {
    fn read_record(&mut self) -> Result<Option<Record>, LoadError>;
}

// Record source over any reader holding delimited text
pub struct CsvSource<R: Read> {
    reader: csv::Reader<R>,
    record: StringRecord,
}

impl<R: Read> CsvSource<R> {
    pub fn from_reader(reader: R, delimiter: u8) -> Self {
        // Headers are handed out as the first record, and every record must
        // have as many fields as the first one
        let reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(false)
            .delimiter(delimiter)
            .from_reader(reader);
        Self {
            reader,
            record: StringRecord::new(),
        }
    }
}

impl<R: Read> RecordSource for CsvSource<R> {
    fn read_record(&mut self) -> Result<Option<Record>, LoadError> {
        if !self.reader.read_record(&mut self.record)? {
            return Ok(None);
        }
        Ok(Some(self.record.iter().map(str::to_owned).collect()))
    }
}

// Determine the input kind from the magic number at the start of the file
pub fn detect_input_kind(path: &Path) -> Result<InputKind, LoadError> {
    let mut file = open_file(path)?;
    let mut header = [0u8; 4];
    let mut filled = 0;
    while filled < header.len() {
        let n = file
            .read(&mut header[filled..])
            .map_err(|source| open_error(path, source))?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(match &header[..filled] {
        [0x50, 0x4B, 0x03, 0x04] => InputKind::ZipArchive,
        _ => InputKind::Delimited,
    })
}

// Open the input as a record source, unpacking zip archives first
pub fn open_source(path: &Path, delimiter: u8) -> Result<CsvSource<File>, LoadError> {
    let kind = detect_input_kind(path)?;
    info!(path = %path.display(), kind = ?kind, "Opening input");
    let file = match kind {
        InputKind::Delimited => open_file(path)?,
        InputKind::ZipArchive => extract_csv_entry(path)?,
    };
    Ok(CsvSource::from_reader(file, delimiter))
}

// Find the first .csv entry in a zip archive
pub fn find_csv_entry<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<Option<String>, zip::result::ZipError> {
    for i in 0..archive.len() {
        let entry = archive.by_index(i)?;
        if entry.is_file() && entry.name().to_ascii_lowercase().ends_with(".csv") {
            return Ok(Some(entry.name().to_string()));
        }
    }
    Ok(None)
}

// Spool the csv entry into an anonymous temp file so only one batch is ever held in memory
fn extract_csv_entry(path: &Path) -> Result<File, LoadError> {
    let archive_error = |source| LoadError::Archive {
        path: path.to_path_buf(),
        source,
    };
    let mut archive = ZipArchive::new(open_file(path)?).map_err(archive_error)?;
    let name = find_csv_entry(&mut archive)
        .map_err(archive_error)?
        .ok_or_else(|| LoadError::NoCsvEntry {
            path: path.to_path_buf(),
        })?;
    info!(entry = %name, "Found csv entry in archive");

    let mut entry = archive.by_name(&name).map_err(archive_error)?;
    let mut spool = tempfile::tempfile().map_err(|source| open_error(path, source))?;
    io::copy(&mut entry, &mut spool).map_err(|source| open_error(path, source))?;
    spool
        .seek(SeekFrom::Start(0))
        .map_err(|source| open_error(path, source))?;
    Ok(spool)
}

fn open_file(path: &Path) -> Result<File, LoadError> {
    File::open(path).map_err(|source| open_error(path, source))
}

fn open_error(path: &Path, source: io::Error) -> LoadError {
    LoadError::Open {
        path: path.to_path_buf(),
        source,
    }
}
