use std::fs;
use std::path::Path;

use atlas_match::{DroppedRow, FlatTable, HierarchyKey, Reindexed};
use atlas_ontology::RegionId;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// One data row; every column except the id.
pub type Row = serde_json::Map<String, Value>;

/// Columns written by [`KeyedRow`] ahead of the row values.
pub const KEY_COLUMNS: [&str; 3] = ["coarse", "mid", "fine"];

#[derive(Debug, Error)]
pub enum TableError {
    #[error("table must be a JSON array of row objects")]
    NotAnArray,
    #[error("row {row} is not a JSON object")]
    NotAnObject { row: usize },
    #[error("row {row} has no usable region id in field {field:?}")]
    MissingId { row: usize, field: String },
    #[error("row {row} has a column named {field:?}, which is reserved for the hierarchy key")]
    ReservedColumn { row: usize, field: String },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Parse `[{"<id_field>": 385, ...}, ...]` into a flat table keyed by region id.
///
/// The id column may hold a number or a numeric string; it is removed from
/// the row so it only lives in the key. Other columns must not be named like
/// the key columns (see [`KEY_COLUMNS`]).
pub fn parse_flat_table(raw: &str, id_field: &str) -> Result<FlatTable<Row>, TableError> {
    let value: Value = serde_json::from_str(raw)?;
    let Value::Array(items) = value else {
        return Err(TableError::NotAnArray);
    };

    let mut table = FlatTable::new();
    for (idx, item) in items.into_iter().enumerate() {
        let Value::Object(mut row) = item else {
            return Err(TableError::NotAnObject { row: idx });
        };
        let id = row
            .remove(id_field)
            .as_ref()
            .and_then(region_id)
            .ok_or_else(|| TableError::MissingId {
                row: idx,
                field: id_field.to_string(),
            })?;
        if let Some(field) = KEY_COLUMNS.iter().find(|c| row.contains_key(**c)) {
            return Err(TableError::ReservedColumn {
                row: idx,
                field: field.to_string(),
            });
        }
        table.push(id, row);
    }
    Ok(table)
}

pub fn read_flat_table(
    path: impl AsRef<Path>,
    id_field: &str,
) -> Result<FlatTable<Row>, TableError> {
    let raw = fs::read_to_string(path)?;
    parse_flat_table(&raw, id_field)
}

fn region_id(value: &Value) -> Option<RegionId> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()).map(RegionId),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// A re-indexed row: the three key columns followed by the original values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyedRow {
    #[serde(flatten)]
    pub key: HierarchyKey,
    #[serde(flatten)]
    pub values: Row,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReindexReport {
    pub rows: Vec<KeyedRow>,
    pub dropped: Vec<DroppedRow>,
}

impl From<Reindexed<Row>> for ReindexReport {
    fn from(reindexed: Reindexed<Row>) -> Self {
        let rows = reindexed
            .table
            .into_rows()
            .into_iter()
            .map(|(key, values)| KeyedRow { key, values })
            .collect();
        Self {
            rows,
            dropped: reindexed.dropped,
        }
    }
}
