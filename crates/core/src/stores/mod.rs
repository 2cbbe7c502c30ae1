pub mod pinecone;

pub use pinecone::{PineconeSettings, PineconeStore, PAYLOAD_TOO_LARGE_MARKER};
