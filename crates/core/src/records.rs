use crate::error::UploadError;
use crate::identifiers::{encode_filename, make_record_key};
use crate::models::{Chunk, RecordMetadata, SourceDocument, VectorRecord};

/// Appended to excerpts that were cut, so readers can tell the text is lossy.
pub const TRUNCATION_MARKER: &str = "... (truncated)";

pub const DEFAULT_EXCERPT_MAX_BYTES: usize = 30_000;

/// Pinecone's per-record metadata limit is 40 KB.
pub const DEFAULT_METADATA_MAX_BYTES: usize = 40_960;

/// Cuts `text` to at most `max_bytes` UTF-8 bytes, marker included, on a char boundary.
pub fn truncate_excerpt(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }

    let cut = floor_char_boundary(text, max_bytes.saturating_sub(TRUNCATION_MARKER.len()));
    format!("{}{}", &text[..cut], TRUNCATION_MARKER)
}

fn floor_char_boundary(text: &str, index: usize) -> usize {
    let mut cut = index.min(text.len());
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    cut
}

pub fn metadata_size(metadata: &RecordMetadata) -> Result<usize, serde_json::Error> {
    serde_json::to_vec(metadata).map(|bytes| bytes.len())
}

/// Assembles vector records for the chunks of one document.
#[derive(Debug, Clone)]
pub struct RecordBuilder<'a> {
    document: &'a SourceDocument,
    encoded_name: String,
    checksum: &'a str,
    excerpt_max_bytes: usize,
    metadata_max_bytes: usize,
}

impl<'a> RecordBuilder<'a> {
    pub fn new(
        document: &'a SourceDocument,
        checksum: &'a str,
        excerpt_max_bytes: usize,
        metadata_max_bytes: usize,
    ) -> Self {
        Self {
            document,
            encoded_name: encode_filename(&document.name),
            checksum,
            excerpt_max_bytes,
            metadata_max_bytes,
        }
    }

    pub fn encoded_name(&self) -> &str {
        &self.encoded_name
    }

    pub fn record_key(&self, chunk_index: usize) -> String {
        make_record_key(&self.encoded_name, chunk_index)
    }

    pub fn build(&self, chunk: &Chunk, values: Vec<f32>) -> Result<VectorRecord, UploadError> {
        let id = self.record_key(chunk.index);
        let mut excerpt_budget = self.excerpt_max_bytes;

        loop {
            let metadata = RecordMetadata {
                file: self.encoded_name.clone(),
                original_file: self.document.name.clone(),
                file_type: self.document.kind,
                chunk: chunk.index,
                total_chunks: chunk.total_chunks,
                checksum: self.checksum.to_string(),
                text: truncate_excerpt(&chunk.text, excerpt_budget),
            };

            let size = metadata_size(&metadata)?;
            if size <= self.metadata_max_bytes {
                return Ok(VectorRecord { id, values, metadata });
            }

            // escaping inflates the serialized excerpt, so shrink the raw budget by the overflow
            let overflow = size - self.metadata_max_bytes;
            let current = metadata.text.len();
            let shrunk = if overflow < current {
                current - overflow
            } else {
                current / 2
            };
            if shrunk <= TRUNCATION_MARKER.len() {
                return Err(UploadError::MetadataTooLarge {
                    key: id,
                    ceiling: self.metadata_max_bytes,
                });
            }
            excerpt_budget = shrunk;
        }
    }
}
