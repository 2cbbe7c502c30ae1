use crate::error::ExtractionError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Text,
}

impl DocumentKind {
    /// `.pdf` (any case) is a PDF; everything else is read as UTF-8 text.
    pub fn from_path(path: &Path) -> Self {
        let is_pdf = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            DocumentKind::Pdf
        } else {
            DocumentKind::Text
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Pdf => "pdf",
            DocumentKind::Text => "text",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    pub path: PathBuf,
    pub name: String,
    pub kind: DocumentKind,
}

impl SourceDocument {
    pub fn new(path: impl Into<PathBuf>, name: impl Into<String>, kind: DocumentKind) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            kind,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, ExtractionError> {
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| ExtractionError::MissingFileName(path.display().to_string()))?;

        Ok(Self {
            path: path.to_path_buf(),
            name: name.to_string(),
            kind: DocumentKind::from_path(path),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub index: usize,
    pub total_chunks: usize,
    pub text: String,
    /// Number of leading chars repeated from the previous chunk.
    pub overlap_chars: usize,
}

impl Chunk {
    /// The part of the chunk that is not shared with its predecessor.
    pub fn body(&self) -> &str {
        match self.text.char_indices().nth(self.overlap_chars) {
            Some((offset, _)) => &self.text[offset..],
            None => "",
        }
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Metadata attached to every uploaded vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub file: String,
    pub original_file: String,
    pub file_type: DocumentKind,
    pub chunk: usize,
    pub total_chunks: usize,
    pub checksum: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: RecordMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkFailure {
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadReport {
    pub document: String,
    pub namespace: String,
    pub total_chunks: usize,
    pub embedded_count: usize,
    /// Vectors the index acknowledged.
    pub succeeded_count: usize,
    pub failed_chunks: usize,
    pub failures: Vec<ChunkFailure>,
    pub batches_submitted: usize,
    pub batch_splits: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl UploadReport {
    pub fn is_partial(&self) -> bool {
        self.failed_chunks > 0
    }

    pub fn is_empty(&self) -> bool {
        self.succeeded_count == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct NamespaceStats {
    pub vector_count: u64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct IndexStats {
    pub dimension: Option<usize>,
    pub total_vector_count: u64,
    pub namespaces: BTreeMap<String, NamespaceStats>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryMatch {
    pub id: String,
    pub score: f64,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}
