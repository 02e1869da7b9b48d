//! Source file loaders.

use std::path::Path;

use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::error::{IngestionError, Result};
use crate::models::{PlasmidRecord, PLASMID_FIELDS};

/// Cells that pandas-style exports use for "no value".
fn is_missing(cell: &str) -> bool {
    let cell = cell.trim();
    cell.is_empty() || cell.eq_ignore_ascii_case("nan") || cell.eq_ignore_ascii_case("n/a")
}

/// Load the Addgene gRNA snapshot (tab-separated, header row required).
///
/// Extra columns are ignored; any of the eight schema columns missing from
/// the header is an error. Rows are numbered from 0 in file order.
#[instrument]
pub fn load_plasmid_tsv(path: &Path) -> Result<Vec<PlasmidRecord>> {
    if !path.exists() {
        return Err(IngestionError::MissingFile(path.to_path_buf()));
    }
    let csv_err = |source| IngestionError::Csv { path: path.to_path_buf(), source };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_path(path)
        .map_err(csv_err)?;

    let headers = reader.headers().map_err(csv_err)?.clone();
    let mut columns = Vec::with_capacity(PLASMID_FIELDS.len());
    for (column, key) in PLASMID_FIELDS {
        let idx = headers
            .iter()
            .position(|h| h.trim() == column)
            .ok_or_else(|| IngestionError::MissingColumn {
                path: path.to_path_buf(),
                column: column.to_string(),
            })?;
        columns.push((key, idx));
    }

    let mut records = Vec::new();
    for (row_index, row) in reader.records().enumerate() {
        let row = row.map_err(csv_err)?;
        let mut record = PlasmidRecord { row_index, ..Default::default() };
        for (key, idx) in &columns {
            let value = row
                .get(*idx)
                .filter(|cell| !is_missing(cell))
                .map(|cell| cell.trim().to_string());
            record.set(key, value);
        }
        records.push(record);
    }

    info!(rows = records.len(), path = %path.display(), "Loaded plasmid snapshot");
    Ok(records)
}

/// Load a JSON dump whose top level is an object holding a list of records
/// under `key`.
#[instrument]
pub fn load_json_records(path: &Path, key: &str) -> Result<Vec<Value>> {
    if !path.exists() {
        return Err(IngestionError::MissingFile(path.to_path_buf()));
    }
    let raw = std::fs::read_to_string(path)
        .map_err(|source| IngestionError::Io { path: path.to_path_buf(), source })?;
    let mut root: Value = serde_json::from_str(&raw)?;

    let records = match root.get_mut(key).map(Value::take) {
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(IngestionError::Schema(format!(
                "'{key}' must be a list, found {}",
                json_kind(&other)
            )))
        }
        None => {
            return Err(IngestionError::Schema(format!(
                "top-level object has no '{key}' list"
            )))
        }
    };
    debug!(n = records.len(), key, "Loaded JSON records");
    Ok(records)
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}
