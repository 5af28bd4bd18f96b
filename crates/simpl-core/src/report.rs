//! Row-detail reports: paginated reads of a run's stored row table.
//!
//! Artifacts are read lazily on each request. The reader is picked by file
//! extension: `.parquet` goes through Arrow, anything else is parsed as JSON
//! (an array of row objects, or a `{"columns": [...], "data": [[...]]}`
//! split table).

use std::fs::File;
use std::path::Path;

use arrow::json::ArrayWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use simpl_state::EvalStore;
use tracing::debug;
use uuid::Uuid;

use crate::domain::{EvalError, Result};

/// Default rows per page.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Errors raised while reading a row-detail artifact.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("page and page_size must be at least 1")]
    InvalidPagination,

    #[error("failed to read report {path}: {reason}")]
    Unreadable { path: String, reason: String },
}

impl ReportError {
    fn unreadable(path: &Path, reason: impl ToString) -> Self {
        ReportError::Unreadable {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}

/// One page of row records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowPage {
    pub items: Vec<Value>,
    pub total: usize,
    pub page: usize,
    pub pages: usize,
}

impl RowPage {
    /// "No data yet" page.
    pub fn empty(page: usize) -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            page,
            pages: 0,
        }
    }
}

/// Slice `rows` into 1-based page `page` of `page_size`.
///
/// A page past the end is empty but still reports `total` and `pages`.
pub fn paginate(
    rows: Vec<Value>,
    page: usize,
    page_size: usize,
) -> std::result::Result<RowPage, ReportError> {
    if page == 0 || page_size == 0 {
        return Err(ReportError::InvalidPagination);
    }
    let total = rows.len();
    let pages = total.div_ceil(page_size);
    let start = (page - 1).saturating_mul(page_size);
    let items = rows.into_iter().skip(start).take(page_size).collect();
    Ok(RowPage {
        items,
        total,
        page,
        pages,
    })
}

/// Load every row of an artifact.
pub fn load_rows(path: &Path) -> std::result::Result<Vec<Value>, ReportError> {
    let is_parquet = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("parquet"));
    if is_parquet {
        load_parquet_rows(path)
    } else {
        load_json_rows(path)
    }
}

fn load_json_rows(path: &Path) -> std::result::Result<Vec<Value>, ReportError> {
    let bytes = std::fs::read(path).map_err(|e| ReportError::unreadable(path, e))?;
    let value: Value =
        serde_json::from_slice(&bytes).map_err(|e| ReportError::unreadable(path, e))?;
    match value {
        Value::Array(rows) => Ok(rows),
        Value::Object(table) => split_table_rows(path, table),
        _ => Err(ReportError::unreadable(
            path,
            "expected a JSON array of rows",
        )),
    }
}

/// Expand a split-oriented table into row objects.
fn split_table_rows(
    path: &Path,
    mut table: Map<String, Value>,
) -> std::result::Result<Vec<Value>, ReportError> {
    let (Some(Value::Array(columns)), Some(Value::Array(data))) =
        (table.remove("columns"), table.remove("data"))
    else {
        return Err(ReportError::unreadable(
            path,
            "expected a JSON array of rows or a columns/data table",
        ));
    };
    let names: Vec<String> = columns
        .into_iter()
        .map(|c| match c {
            Value::String(s) => s,
            other => other.to_string(),
        })
        .collect();

    data.into_iter()
        .map(|record| match record {
            Value::Array(cells) if cells.len() == names.len() => Ok(Value::Object(
                names.iter().cloned().zip(cells).collect::<Map<String, Value>>(),
            )),
            _ => Err(ReportError::unreadable(
                path,
                "row does not match the column list",
            )),
        })
        .collect()
}

fn load_parquet_rows(path: &Path) -> std::result::Result<Vec<Value>, ReportError> {
    let file = File::open(path).map_err(|e| ReportError::unreadable(path, e))?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .and_then(|builder| builder.build())
        .map_err(|e| ReportError::unreadable(path, e))?;

    let mut writer = ArrayWriter::new(Vec::new());
    for batch in reader {
        let batch = batch.map_err(|e| ReportError::unreadable(path, e))?;
        writer
            .write(&batch)
            .map_err(|e| ReportError::unreadable(path, e))?;
    }
    writer
        .finish()
        .map_err(|e| ReportError::unreadable(path, e))?;

    let buf = writer.into_inner();
    if buf.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_slice(&buf).map_err(|e| ReportError::unreadable(path, e))
}

/// Page through an artifact, treating "no artifact" as an empty report.
pub async fn read_page(
    row_details_path: Option<&str>,
    page: usize,
    page_size: usize,
) -> std::result::Result<RowPage, ReportError> {
    if page == 0 || page_size == 0 {
        return Err(ReportError::InvalidPagination);
    }
    let Some(raw) = row_details_path else {
        return Ok(RowPage::empty(page));
    };
    let path = Path::new(raw).to_path_buf();
    if !path.exists() {
        debug!(path = %path.display(), "row details artifact missing");
        return Ok(RowPage::empty(page));
    }

    let load_path = path.clone();
    let rows = tokio::task::spawn_blocking(move || load_rows(&load_path))
        .await
        .map_err(|e| ReportError::unreadable(&path, e))??;
    paginate(rows, page, page_size)
}

/// Row-detail page for a run. Unknown runs are `EvalError::RunNotFound`.
pub async fn run_rows(
    store: &dyn EvalStore,
    run_id: Uuid,
    page: usize,
    page_size: usize,
) -> Result<RowPage> {
    let run = store.get_run(run_id).await.map_err(|err| {
        if err.is_not_found() {
            EvalError::RunNotFound(run_id)
        } else {
            EvalError::Storage(err)
        }
    })?;
    Ok(read_page(run.row_details_path.as_deref(), page, page_size).await?)
}
