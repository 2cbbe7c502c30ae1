//! Read-only views of what the index holds.
//!
//! There is no document catalog besides the vectors themselves, so listing
//! documents means issuing one broad query and collecting filenames from the
//! metadata of whatever comes back. Documents whose chunks never rank within
//! `sample_size` are not reported; the listing is a sample, not an inventory.

use crate::error::IndexError;
use crate::identifiers::decode_filename;
use crate::models::NamespaceStats;
use crate::traits::VectorIndex;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use tracing::{info, warn};

pub const DEFAULT_SAMPLE_SIZE: usize = 100;

/// Pinecone rejects `topK` above this when metadata is requested.
pub const MAX_SAMPLE_SIZE: usize = 1000;

pub struct IndexInspector<V> {
    index: V,
    dimension: usize,
}

impl<V: VectorIndex> IndexInspector<V> {
    pub fn new(index: V, dimension: usize) -> Self {
        Self { index, dimension }
    }

    pub async fn stats(&self, namespace: &str) -> Result<NamespaceStats, IndexError> {
        let stats = self.index.describe_stats().await?;
        Ok(stats
            .namespaces
            .get(namespace)
            .copied()
            .unwrap_or_default())
    }

    /// Sorted, de-duplicated filenames seen among the top `sample_size` matches.
    pub async fn list_documents(
        &self,
        namespace: &str,
        sample_size: usize,
    ) -> Result<BTreeSet<String>, IndexError> {
        if sample_size == 0 {
            return Ok(BTreeSet::new());
        }
        if sample_size > MAX_SAMPLE_SIZE {
            warn!(
                sample_size,
                max = MAX_SAMPLE_SIZE,
                "sample size exceeds the query limit; clamping"
            );
        }
        let sample_size = sample_size.min(MAX_SAMPLE_SIZE);

        let probe = probe_vector(self.dimension);
        let matches = self
            .index
            .query(&probe, sample_size, namespace, true)
            .await?;

        let documents: BTreeSet<String> = matches
            .iter()
            .filter_map(|hit| document_name(&hit.metadata))
            .collect();

        if matches.len() >= sample_size {
            warn!(
                namespace,
                sample_size,
                "document listing hit the sample size; some documents may be missing"
            );
        }
        info!(
            namespace,
            sampled = matches.len(),
            documents = documents.len(),
            "listed documents"
        );

        Ok(documents)
    }
}

/// A uniform unit vector: equally similar to everything, and never all-zero.
pub fn probe_vector(dimension: usize) -> Vec<f32> {
    let dimension = dimension.max(1);
    vec![1.0 / (dimension as f32).sqrt(); dimension]
}

/// Prefers the stored `original_file`, falling back to decoding `file`.
pub fn document_name(metadata: &Map<String, Value>) -> Option<String> {
    let non_empty = |key: &str| {
        metadata
            .get(key)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
    };

    non_empty("original_file")
        .map(str::to_string)
        .or_else(|| non_empty("file").map(|encoded| decode_filename(encoded).to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifiers::encode_filename;
    use crate::models::{IndexStats, QueryMatch, VectorRecord};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    struct FixedIndex {
        matches: Vec<QueryMatch>,
        stats: IndexStats,
        probes: Mutex<Vec<(usize, usize)>>,
    }

    impl FixedIndex {
        fn with_metadata(metadata: Vec<Value>) -> Self {
            let matches = metadata
                .into_iter()
                .enumerate()
                .map(|(position, value)| QueryMatch {
                    id: format!("doc_{position}"),
                    score: 0.5,
                    metadata: value.as_object().cloned().unwrap_or_default(),
                })
                .collect();
            Self {
                matches,
                stats: IndexStats::default(),
                probes: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl VectorIndex for FixedIndex {
        async fn upsert(
            &self,
            records: &[VectorRecord],
            _namespace: &str,
        ) -> Result<usize, IndexError> {
            Ok(records.len())
        }

        async fn query(
            &self,
            probe: &[f32],
            top_k: usize,
            _namespace: &str,
            _include_metadata: bool,
        ) -> Result<Vec<QueryMatch>, IndexError> {
            self.probes
                .lock()
                .expect("lock")
                .push((probe.len(), top_k));
            Ok(self.matches.iter().take(top_k).cloned().collect())
        }

        async fn describe_stats(&self) -> Result<IndexStats, IndexError> {
            Ok(self.stats.clone())
        }
    }

    #[tokio::test]
    async fn two_documents_are_listed_sorted_and_deduplicated() -> Result<(), IndexError> {
        let index = FixedIndex::with_metadata(vec![
            json!({ "file": encode_filename("ב.pdf"), "original_file": "ב.pdf", "chunk": 0 }),
            json!({ "file": encode_filename("א.txt"), "chunk": 0 }),
            json!({ "file": encode_filename("ב.pdf"), "original_file": "ב.pdf", "chunk": 1 }),
            json!({ "file": encode_filename("א.txt"), "chunk": 1 }),
            json!({ "unrelated": true }),
        ]);
        let inspector = IndexInspector::new(index, 16);

        let documents = inspector.list_documents("Default", 100).await?;

        assert_eq!(
            documents.into_iter().collect::<Vec<_>>(),
            vec!["א.txt".to_string(), "ב.pdf".to_string()]
        );
        Ok(())
    }

    #[tokio::test]
    async fn probe_matches_dimension_and_sample_size() -> Result<(), IndexError> {
        let inspector = IndexInspector::new(FixedIndex::with_metadata(Vec::new()), 3072);

        inspector.list_documents("Default", 25).await?;

        let probes = inspector.index.probes.lock().expect("lock").clone();
        assert_eq!(probes, vec![(3072, 25)]);
        Ok(())
    }

    #[tokio::test]
    async fn oversized_sample_is_clamped_to_query_limit() -> Result<(), IndexError> {
        let inspector = IndexInspector::new(FixedIndex::with_metadata(Vec::new()), 8);

        inspector.list_documents("Default", 5000).await?;

        let probes = inspector.index.probes.lock().expect("lock").clone();
        assert_eq!(probes, vec![(8, MAX_SAMPLE_SIZE)]);
        Ok(())
    }

    #[tokio::test]
    async fn stats_default_to_zero_for_unknown_namespace() -> Result<(), IndexError> {
        let mut index = FixedIndex::with_metadata(Vec::new());
        index.stats = IndexStats {
            dimension: Some(8),
            total_vector_count: 12,
            namespaces: BTreeMap::from([(
                "Default".to_string(),
                NamespaceStats { vector_count: 12 },
            )]),
        };
        let inspector = IndexInspector::new(index, 8);

        assert_eq!(inspector.stats("Default").await?.vector_count, 12);
        assert_eq!(inspector.stats("other").await?.vector_count, 0);
        Ok(())
    }

    #[test]
    fn probe_vector_is_unit_length() {
        let probe = probe_vector(3072);
        let norm: f32 = probe.iter().map(|value| value * value).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-3);
    }

    #[test]
    fn legacy_unencoded_file_field_is_returned_as_is() {
        let metadata = json!({ "file": "plain" });
        let name = document_name(metadata.as_object().expect("object"));
        assert_eq!(name.as_deref(), Some("plain"));
    }
}
