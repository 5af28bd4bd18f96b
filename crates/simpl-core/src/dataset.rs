//! Tabular datasets (CSV with a header row).

use std::io::Read;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

/// Records read by [`detect_columns`] to validate an upload.
pub const SAMPLE_ROWS: usize = 5;

/// Hex characters of the content digest prefixed to stored uploads.
const DIGEST_PREFIX_LEN: usize = 12;

const FALLBACK_FILENAME: &str = "dataset.csv";

/// Errors produced while reading a dataset.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("Dataset not found at {}", .0.display())]
    NotFound(PathBuf),

    #[error("malformed dataset: {0}")]
    Malformed(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<csv::Error> for DatasetError {
    fn from(err: csv::Error) -> Self {
        let message = err.to_string();
        match err.into_kind() {
            csv::ErrorKind::Io(io) => DatasetError::Io(io),
            _ => DatasetError::Malformed(message),
        }
    }
}

/// An in-memory dataset: named columns and string cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    columns: Vec<String>,
    records: Vec<Vec<String>>,
}

impl Dataset {
    /// Load a CSV file. A missing file is `DatasetError::NotFound`.
    pub fn from_path(path: &Path) -> Result<Self, DatasetError> {
        if !path.exists() {
            return Err(DatasetError::NotFound(path.to_path_buf()));
        }
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, DatasetError> {
        let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
        let columns = read_header(&mut rdr)?;
        let records = rdr
            .records()
            .map(|record| record.map(|r| r.iter().map(str::to_string).collect()))
            .collect::<Result<Vec<Vec<String>>, csv::Error>>()?;
        Ok(Self { columns, records })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Cells of column `name`, one per row.
    pub fn column(&self, name: &str) -> Option<Vec<&str>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(self.records.iter().map(|r| r[idx].as_str()).collect())
    }

    /// Row `idx` as a JSON object keyed by column name.
    pub fn row_object(&self, idx: usize) -> Map<String, Value> {
        let mut row = Map::new();
        if let Some(record) = self.records.get(idx) {
            for (column, cell) in self.columns.iter().zip(record) {
                row.insert(column.clone(), Value::String(cell.clone()));
            }
        }
        row
    }
}

fn read_header<R: Read>(rdr: &mut csv::Reader<R>) -> Result<Vec<String>, DatasetError> {
    let headers = rdr.headers()?;
    let columns: Vec<String> = headers.iter().map(|h| h.trim().to_string()).collect();
    if columns.is_empty() || columns.iter().all(String::is_empty) {
        return Err(DatasetError::Malformed("missing header row".to_string()));
    }
    Ok(columns)
}

/// Read the header and up to `sample_rows` records, returning the column names.
///
/// Used to reject unparseable uploads before they are referenced by a run.
pub fn detect_columns(path: &Path, sample_rows: usize) -> Result<Vec<String>, DatasetError> {
    if !path.exists() {
        return Err(DatasetError::NotFound(path.to_path_buf()));
    }
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)?;
    let columns = read_header(&mut rdr)?;
    for record in rdr.records().take(sample_rows) {
        record?;
    }
    Ok(columns)
}

/// A stored, validated upload.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredUpload {
    pub path: PathBuf,
    pub columns: Vec<String>,
}

/// Store an uploaded file as `<upload_dir>/<digest-prefix>-<basename>` and
/// validate it with [`detect_columns`].
///
/// Only the final component of `filename` is kept. A file that fails
/// validation is removed again.
pub fn store_upload(
    upload_dir: &Path,
    filename: &str,
    bytes: &[u8],
) -> Result<StoredUpload, DatasetError> {
    let digest = hex::encode(Sha256::digest(bytes));
    let basename = Path::new(filename)
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .unwrap_or(FALLBACK_FILENAME);
    let path = upload_dir.join(format!("{}-{}", &digest[..DIGEST_PREFIX_LEN], basename));

    std::fs::create_dir_all(upload_dir)?;
    std::fs::write(&path, bytes)?;

    match detect_columns(&path, SAMPLE_ROWS) {
        Ok(columns) => {
            debug!(path = %path.display(), columns = columns.len(), "dataset stored");
            Ok(StoredUpload { path, columns })
        }
        Err(err) => {
            if let Err(rm) = std::fs::remove_file(&path) {
                warn!(path = %path.display(), error = %rm, "failed to remove rejected upload");
            }
            Err(err)
        }
    }
}
