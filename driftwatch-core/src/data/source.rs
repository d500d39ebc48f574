//! Tabular data batches and the file sources that produce them.

use crate::error::DriftError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::path::{Path, PathBuf};

/// The type of data source to load from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DataSourceType {
    Csv {
        path: PathBuf,
        #[serde(default = "default_delimiter")]
        delimiter: char,
    },
    Json {
        path: PathBuf,
    },
    Jsonl {
        path: PathBuf,
    },
}

fn default_delimiter() -> char {
    ','
}

impl DataSourceType {
    /// Pick a source type from a file extension (`.csv`, `.tsv`, `.json`, `.jsonl`/`.ndjson`).
    pub fn from_path(path: &Path) -> Result<Self, DriftError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        let path = path.to_path_buf();
        match ext.as_str() {
            "csv" => Ok(Self::Csv {
                path,
                delimiter: ',',
            }),
            "tsv" => Ok(Self::Csv {
                path,
                delimiter: '\t',
            }),
            "json" => Ok(Self::Json { path }),
            "jsonl" | "ndjson" => Ok(Self::Jsonl { path }),
            other => Err(DriftError::dataset(format!(
                "unsupported file extension '{other}' for {}",
                path.display()
            ))),
        }
    }

    /// Build the loader for this source.
    pub fn into_source(self) -> Box<dyn DataSource> {
        match self {
            Self::Csv { path, delimiter } => Box::new(CsvSource { path, delimiter }),
            Self::Json { path } => Box::new(JsonSource { path }),
            Self::Jsonl { path } => Box::new(JsonlSource { path }),
        }
    }
}

/// An ordered table of rows with named columns.
///
/// Missing values are `Value::Null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataBatch {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

impl DataBatch {
    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Create a batch, rejecting rows whose width differs from the header.
    pub fn new(
        columns: Vec<String>,
        rows: Vec<Vec<serde_json::Value>>,
    ) -> Result<Self, DriftError> {
        if let Some((idx, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(DriftError::dataset(format!(
                "row {idx} has {} values but there are {} columns",
                row.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    /// Build a batch from named columns of equal length.
    pub fn from_columns(
        columns: Vec<(String, Vec<serde_json::Value>)>,
    ) -> Result<Self, DriftError> {
        let n_rows = columns.first().map(|(_, v)| v.len()).unwrap_or(0);
        if let Some((name, values)) = columns.iter().find(|(_, v)| v.len() != n_rows) {
            return Err(DriftError::dataset(format!(
                "column '{name}' has {} values, expected {n_rows}",
                values.len()
            )));
        }
        let names = columns.iter().map(|(name, _)| name.clone()).collect();
        let mut rows = vec![Vec::with_capacity(columns.len()); n_rows];
        for (_, values) in columns {
            for (row, value) in rows.iter_mut().zip(values) {
                row.push(value);
            }
        }
        Ok(Self {
            columns: names,
            rows,
        })
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Names from `required` that are not columns of this batch, in the order given.
    pub fn missing_columns(&self, required: &[String]) -> Vec<String> {
        required
            .iter()
            .filter(|name| self.column_index(name).is_none())
            .cloned()
            .collect()
    }

    /// Append a column, replacing any existing column of the same name.
    pub fn with_column(
        mut self,
        name: impl Into<String>,
        values: Vec<serde_json::Value>,
    ) -> Result<Self, DriftError> {
        let name = name.into();
        if values.len() != self.rows.len() {
            return Err(DriftError::dataset(format!(
                "column '{name}' has {} values, expected {}",
                values.len(),
                self.rows.len()
            )));
        }
        match self.column_index(&name) {
            Some(idx) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[idx] = value;
                }
            }
            None => {
                self.columns.push(name);
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
        Ok(self)
    }

    /// Concatenate another batch with the same columns below this one.
    pub fn concat(mut self, other: DataBatch) -> Result<Self, DriftError> {
        if self.columns != other.columns {
            return Err(DriftError::dataset(format!(
                "cannot concatenate batches with different columns: {:?} vs {:?}",
                self.columns, other.columns
            )));
        }
        self.rows.extend(other.rows);
        Ok(self)
    }

    pub fn as_slice(&self) -> BatchSlice<'_> {
        BatchSlice {
            columns: &self.columns,
            rows: &self.rows,
        }
    }

    /// Borrow a contiguous row range.
    pub fn slice(&self, range: Range<usize>) -> BatchSlice<'_> {
        BatchSlice {
            columns: &self.columns,
            rows: &self.rows[range],
        }
    }
}

static MISSING: serde_json::Value = serde_json::Value::Null;

/// A borrowed, contiguous view of a [`DataBatch`].
#[derive(Debug, Clone, Copy)]
pub struct BatchSlice<'a> {
    pub columns: &'a [String],
    pub rows: &'a [Vec<serde_json::Value>],
}

impl<'a> BatchSlice<'a> {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Values of the column at `idx`, one per row.
    pub fn column(self, idx: usize) -> impl Iterator<Item = &'a serde_json::Value> + use<'a> {
        self.rows
            .iter()
            .map(move |row| row.get(idx).unwrap_or(&MISSING))
    }

    /// Values of the named column, or a data-validation error naming it.
    pub fn column_by_name(
        self,
        name: &str,
    ) -> Result<impl Iterator<Item = &'a serde_json::Value> + use<'a>, DriftError> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| DriftError::missing_columns(&[name.to_string()]))?;
        Ok(self.column(idx))
    }

    pub fn to_batch(&self) -> DataBatch {
        DataBatch {
            columns: self.columns.to_vec(),
            rows: self.rows.to_vec(),
        }
    }
}

/// Trait for loading data from a source.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Load data from this source, optionally limiting the number of rows.
    async fn load(&self, limit: Option<usize>) -> Result<DataBatch, DriftError>;

    /// Human-readable location of this source, used in log events.
    fn location(&self) -> String;
}

/// Parse a raw text cell into a typed JSON value.
///
/// Empty strings and the usual NaN spellings become `Null`.
pub fn parse_cell(raw: &str) -> serde_json::Value {
    let s = raw.trim().trim_matches('"');
    if s.is_empty() || matches!(s, "NaN" | "nan" | "NA" | "null" | "None") {
        return serde_json::Value::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return serde_json::Value::Number(i.into());
    }
    if let Ok(f) = s.parse::<f64>() {
        return serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null);
    }
    match s {
        "true" | "True" => serde_json::Value::Bool(true),
        "false" | "False" => serde_json::Value::Bool(false),
        _ => serde_json::Value::String(s.to_string()),
    }
}

// ---------------------------------------------------------------------------
// CsvSource
// ---------------------------------------------------------------------------

/// CSV file data source.
pub struct CsvSource {
    pub path: PathBuf,
    pub delimiter: char,
}

#[async_trait]
impl DataSource for CsvSource {
    async fn load(&self, limit: Option<usize>) -> Result<DataBatch, DriftError> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let mut lines = content.lines();

        let columns: Vec<String> = lines
            .next()
            .ok_or_else(|| DriftError::dataset(format!("empty CSV file {}", self.path.display())))?
            .split(self.delimiter)
            .map(|s| s.trim().trim_matches('"').to_string())
            .collect();

        let mut rows = Vec::new();
        for line in lines {
            if line.trim().is_empty() {
                continue;
            }
            if limit.is_some_and(|max| rows.len() >= max) {
                break;
            }
            let row: Vec<serde_json::Value> = line.split(self.delimiter).map(parse_cell).collect();
            rows.push(row);
        }

        DataBatch::new(columns, rows)
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

// ---------------------------------------------------------------------------
// JsonSource
// ---------------------------------------------------------------------------

/// JSON file data source: an array of objects, one per row.
pub struct JsonSource {
    pub path: PathBuf,
}

#[async_trait]
impl DataSource for JsonSource {
    async fn load(&self, limit: Option<usize>) -> Result<DataBatch, DriftError> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let value: serde_json::Value = serde_json::from_str(&content)?;

        let items = match value {
            serde_json::Value::Array(arr) => arr,
            obj @ serde_json::Value::Object(_) => vec![obj],
            _ => return Err(DriftError::dataset("JSON must be an array or object")),
        };
        let limited: Vec<_> = match limit {
            Some(max) => items.into_iter().take(max).collect(),
            None => items,
        };
        batch_from_objects(&limited)
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

// ---------------------------------------------------------------------------
// JsonlSource
// ---------------------------------------------------------------------------

/// JSON Lines (JSONL) file data source, one JSON object per line.
pub struct JsonlSource {
    pub path: PathBuf,
}

#[async_trait]
impl DataSource for JsonlSource {
    async fn load(&self, limit: Option<usize>) -> Result<DataBatch, DriftError> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let mut items = Vec::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if limit.is_some_and(|max| items.len() >= max) {
                break;
            }
            items.push(serde_json::from_str::<serde_json::Value>(line)?);
        }
        batch_from_objects(&items)
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// Columns come from the first object; keys absent from later objects become `Null`.
fn batch_from_objects(items: &[serde_json::Value]) -> Result<DataBatch, DriftError> {
    let columns: Vec<String> = match items.first() {
        Some(serde_json::Value::Object(map)) => map.keys().cloned().collect(),
        Some(_) => return Err(DriftError::dataset("JSON rows must be objects")),
        None => return Ok(DataBatch::empty()),
    };

    let rows = items
        .iter()
        .map(|item| {
            columns
                .iter()
                .map(|col| item.get(col).cloned().unwrap_or(serde_json::Value::Null))
                .collect()
        })
        .collect();

    DataBatch::new(columns, rows)
}
