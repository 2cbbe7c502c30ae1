use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("pdf parse error in {path}: {details}")]
    PdfParse { path: String, details: String },

    #[error("file is not valid utf-8: {path} (invalid byte at offset {offset})")]
    InvalidUtf8 { path: String, offset: usize },

    #[error("path has no file name: {0}")]
    MissingFileName(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkingError {
    #[error("max_chunk_chars must be greater than zero")]
    ZeroChunkSize,

    #[error("overlap of {overlap} chars must be smaller than max chunk size {max}")]
    OverlapTooLarge { overlap: usize, max: usize },
}

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("embedding service returned {status}: {body}")]
    Service { status: u16, body: String },

    #[error("embedding has {actual} dimensions, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("embedding service returned no vector")]
    EmptyResponse,

    #[error("embedding service returned {actual} vectors for {expected} inputs")]
    ResponseCount { expected: usize, actual: usize },

    #[error("no tokenizer available for model {model}: {details}")]
    Tokenizer { model: String, details: String },
}

#[derive(Debug, Error)]
pub enum IndexError {
    /// The provider refused the request because its serialized body was too large.
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("index returned {status}: {details}")]
    Service { status: u16, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid index request: {0}")]
    Request(String),
}

impl IndexError {
    pub fn is_payload_too_large(&self) -> bool {
        matches!(self, IndexError::PayloadTooLarge(_))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required configuration: {}", .0.join(", "))]
    MissingVariables(Vec<String>),

    #[error("invalid value for {key}: {details}")]
    InvalidValue { key: String, details: String },
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("invalid chunking config: {0}")]
    Chunking(#[from] ChunkingError),

    #[error("record {key} exceeds the index payload limit on its own: {details}")]
    RecordTooLarge { key: String, details: String },

    #[error("upload of batch starting at chunk {first_chunk} ({len} records) failed: {source}")]
    Batch {
        first_chunk: usize,
        len: usize,
        #[source]
        source: IndexError,
    },

    #[error("metadata for {key} cannot fit within {ceiling} bytes")]
    MetadataTooLarge { key: String, ceiling: usize },

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = UploadError> = std::result::Result<T, E>;
