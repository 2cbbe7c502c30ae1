pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod identifiers;
pub mod ingest;
pub mod inspector;
pub mod models;
pub mod pipeline;
pub mod records;
pub mod stores;
pub mod traits;

pub use chunking::{split_text, ChunkingConfig, DEFAULT_SEPARATORS};
pub use config::{ServiceConfig, UploadConfig, DEFAULT_NAMESPACE};
pub use embeddings::{
    CharacterNgramEmbedder, Embedder, OpenAiEmbedder, OpenAiSettings,
    DEFAULT_EMBEDDING_DIMENSIONS,
};
pub use error::{
    ChunkingError, ConfigError, EmbeddingError, ExtractionError, IndexError, UploadError,
};
pub use extractor::{extract_text, read_source, LopdfExtractor, PageText, PdfExtractor};
pub use identifiers::{decode_filename, encode_filename, make_record_key};
pub use ingest::{digest_bytes, discover_documents};
pub use inspector::{IndexInspector, DEFAULT_SAMPLE_SIZE, MAX_SAMPLE_SIZE};
pub use models::{
    Chunk, ChunkFailure, DocumentKind, IndexStats, NamespaceStats, QueryMatch, RecordMetadata,
    SourceDocument, UploadReport, VectorRecord,
};
pub use pipeline::{UploadEvent, UploadPipeline, UploadStage};
pub use records::{truncate_excerpt, RecordBuilder, TRUNCATION_MARKER};
pub use stores::{PineconeSettings, PineconeStore, PAYLOAD_TOO_LARGE_MARKER};
pub use traits::VectorIndex;
