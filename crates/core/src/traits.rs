use crate::error::IndexError;
use crate::models::{IndexStats, QueryMatch, VectorRecord};
use async_trait::async_trait;

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Inserts or replaces `records` in `namespace`, returning how many the index acknowledged.
    async fn upsert(&self, records: &[VectorRecord], namespace: &str) -> Result<usize, IndexError>;

    async fn query(
        &self,
        probe: &[f32],
        top_k: usize,
        namespace: &str,
        include_metadata: bool,
    ) -> Result<Vec<QueryMatch>, IndexError>;

    async fn describe_stats(&self) -> Result<IndexStats, IndexError>;
}

#[async_trait]
impl<T: VectorIndex + ?Sized> VectorIndex for std::sync::Arc<T> {
    async fn upsert(&self, records: &[VectorRecord], namespace: &str) -> Result<usize, IndexError> {
        (**self).upsert(records, namespace).await
    }

    async fn query(
        &self,
        probe: &[f32],
        top_k: usize,
        namespace: &str,
        include_metadata: bool,
    ) -> Result<Vec<QueryMatch>, IndexError> {
        (**self)
            .query(probe, top_k, namespace, include_metadata)
            .await
    }

    async fn describe_stats(&self) -> Result<IndexStats, IndexError> {
        (**self).describe_stats().await
    }
}
