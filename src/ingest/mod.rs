//! Dataset ingestion: CSV uploads into an in-memory table, a lightweight
//! profile for routing, and free-text rows for the evidence store.
//!
//! All extraction is deterministic. Column lookups are case-insensitive.

use serde::Serialize;
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::path::Path;
use thiserror::Error;

/// Header names treated as customer segment
const SEGMENT_COLUMNS: &[&str] = &["segment", "user_segment", "customer_segment"];
/// Header fragments that indicate a time dimension
const TIME_MARKERS: &[&str] = &["date", "timestamp", "time", "month", "week"];
/// Categorical summaries keep this many top values
const TOP_VALUES: usize = 3;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: String,
        source: std::io::Error,
    },
    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("file has no header row")]
    NoHeader,
    #[error("unsupported file type '{0}', expected .csv")]
    UnsupportedType(String),
}

/// Uploaded tabular data; rows are padded or truncated to the header width
#[derive(Debug, Clone, Default)]
pub struct DataTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    source: Option<String>,
    /// blake3 of the uploaded bytes, set when loaded from a path
    checksum: Option<String>,
}

/// Shape summary used for logging and prompts
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DatasetProfile {
    pub row_count: usize,
    pub columns: Vec<String>,
    pub numeric_columns: Vec<String>,
    pub has_segment: bool,
    pub has_time_dimension: bool,
}

impl DataTable {
    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self, IngestError> {
        let path = path.as_ref();
        let bytes = read_csv_bytes(path)?;
        let mut table = Self::from_csv_reader(bytes.as_slice())?;
        table.source = Some(path.display().to_string());
        table.checksum = Some(utils::content_checksum(&bytes));
        Ok(table)
    }

    /// Content checksum of a CSV upload without parsing it
    pub fn file_checksum(path: impl AsRef<Path>) -> Result<String, IngestError> {
        let bytes = read_csv_bytes(path.as_ref())?;
        Ok(utils::content_checksum(&bytes))
    }

    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, IngestError> {
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();
        if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
            return Err(IngestError::NoHeader);
        }

        let width = headers.len();
        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            let mut row: Vec<String> = record.iter().take(width).map(|c| c.to_string()).collect();
            row.resize(width, String::new());
            rows.push(row);
        }

        tracing::debug!(rows = rows.len(), columns = width, "csv parsed");
        Ok(Self {
            headers,
            rows,
            source: None,
            checksum: None,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn checksum(&self) -> Option<&str> {
        self.checksum.as_deref()
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.eq_ignore_ascii_case(name))
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Non-empty cells of a column
    pub fn column(&self, name: &str) -> Option<Vec<&str>> {
        let idx = self.column_index(name)?;
        Some(
            self.rows
                .iter()
                .map(|r| r[idx].as_str())
                .filter(|c| !c.is_empty())
                .collect(),
        )
    }

    /// Parsed values when every non-empty cell is numeric
    pub fn numeric_column(&self, name: &str) -> Option<Vec<f64>> {
        let cells = self.column(name)?;
        if cells.is_empty() {
            return None;
        }
        cells.iter().map(|c| c.parse::<f64>().ok()).collect()
    }

    /// Statistics for one column; None when the column is absent or empty
    pub fn summarize(&self, name: &str) -> Option<Value> {
        if let Some(values) = self.numeric_column(name) {
            let count = values.len();
            let mean = values.iter().sum::<f64>() / count as f64;
            let min = values.iter().copied().fold(f64::INFINITY, f64::min);
            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            return Some(json!({
                "type": "numeric",
                "count": count,
                "mean": round2(mean),
                "min": min,
                "max": max,
            }));
        }

        let cells = self.column(name)?;
        if cells.is_empty() {
            return None;
        }
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for c in &cells {
            *counts.entry(c).or_default() += 1;
        }
        let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        let distinct = ranked.len();
        let top: Vec<Value> = ranked
            .into_iter()
            .take(TOP_VALUES)
            .map(|(v, n)| json!({"value": v, "count": n}))
            .collect();
        Some(json!({
            "type": "categorical",
            "count": cells.len(),
            "distinct": distinct,
            "top": top,
        }))
    }

    pub fn profile(&self) -> DatasetProfile {
        let numeric_columns = self
            .headers
            .iter()
            .filter(|h| self.numeric_column(h).is_some())
            .cloned()
            .collect();
        let has_segment = self.segment_column().is_some();
        let has_time_dimension = self.headers.iter().any(|h| {
            let lower = h.to_lowercase();
            TIME_MARKERS.iter().any(|m| lower.contains(m))
        });
        DatasetProfile {
            row_count: self.rows.len(),
            columns: self.headers.clone(),
            numeric_columns,
            has_segment,
            has_time_dimension,
        }
    }

    fn segment_column(&self) -> Option<usize> {
        SEGMENT_COLUMNS.iter().find_map(|c| self.column_index(c))
    }

    /// Free-text cells from the configured text columns, one document per
    /// non-empty cell, with source metadata and segment when known
    pub fn text_documents(&self, text_columns: &[String]) -> Vec<TextDocument> {
        let segment_idx = self.segment_column();
        let source = self.source.clone().unwrap_or_else(|| "upload".to_string());
        let mut docs = Vec::new();

        for (col_idx, header) in self.headers.iter().enumerate() {
            if !text_columns.iter().any(|t| t.eq_ignore_ascii_case(header)) {
                continue;
            }
            for (row_idx, row) in self.rows.iter().enumerate() {
                let text = row[col_idx].trim();
                if text.is_empty() {
                    continue;
                }
                let mut metadata = BTreeMap::new();
                metadata.insert("source".to_string(), source.clone());
                metadata.insert("column".to_string(), header.clone());
                metadata.insert("row".to_string(), row_idx.to_string());
                if let Some(si) = segment_idx
                    && !row[si].is_empty()
                {
                    metadata.insert("segment".to_string(), row[si].clone());
                }
                docs.push(TextDocument {
                    id: utils::evidence_id(&source, header, row_idx, text),
                    text: text.to_string(),
                    metadata,
                });
            }
        }
        docs
    }
}

fn read_csv_bytes(path: &Path) -> Result<Vec<u8>, IngestError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("csv") => {}
        Some(ext) => return Err(IngestError::UnsupportedType(ext.to_string())),
        None => return Err(IngestError::UnsupportedType(String::new())),
    }
    std::fs::read(path).map_err(|source| IngestError::Open {
        path: path.display().to_string(),
        source,
    })
}

/// One free-text cell ready for the evidence store
#[derive(Debug, Clone, PartialEq)]
pub struct TextDocument {
    pub id: String,
    pub text: String,
    pub metadata: BTreeMap<String, String>,
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Common utility functions
pub mod utils {
    use chrono::Utc;

    /// Stable id for an ingested text cell
    pub fn evidence_id(source: &str, column: &str, row: usize, text: &str) -> String {
        let hash = blake3::hash(format!("evidence:{}:{}:{}:{}", source, column, row, text).as_bytes());
        hash.to_hex()[..16].to_string()
    }

    /// blake3 of raw uploaded bytes
    pub fn content_checksum(bytes: &[u8]) -> String {
        blake3::hash(bytes).to_hex().to_string()
    }

    /// Stable id for a manually supplied note
    pub fn note_id(text: &str) -> String {
        let hash = blake3::hash(format!("note:{}", text).as_bytes());
        hash.to_hex()[..16].to_string()
    }

    /// Get current timestamp as ISO string
    pub fn current_timestamp() -> String {
        Utc::now().to_rfc3339()
    }
}
