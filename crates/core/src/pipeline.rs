//! One document, start to finish: extract, chunk, embed, batch, upsert.
//!
//! The pipeline is sequential. Progress is reported through a caller-supplied
//! callback receiving [`UploadEvent`]s after every unit of work, and the only
//! deliberate pause is the courtesy delay between successful batch submissions.

use crate::chunking::split_text;
use crate::config::UploadConfig;
use crate::embeddings::Embedder;
use crate::error::UploadError;
use crate::extractor::{extract_text_with, read_source, LopdfExtractor};
use crate::ingest::digest_bytes;
use crate::models::{Chunk, ChunkFailure, SourceDocument, UploadReport, VectorRecord};
use crate::records::RecordBuilder;
use crate::traits::VectorIndex;
use chrono::Utc;
use std::collections::VecDeque;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStage {
    Idle,
    Extracting,
    Chunking,
    Embedding,
    Uploading,
    Completed,
    Aborted,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    Stage(UploadStage),
    Chunked {
        total_chunks: usize,
    },
    ChunkEmbedded {
        index: usize,
        total_chunks: usize,
    },
    ChunkSkipped {
        index: usize,
        reason: String,
    },
    /// An oversized batch was halved; both halves are queued in order.
    BatchSplit {
        first_chunk: usize,
        len: usize,
    },
    BatchSubmitted {
        first_chunk: usize,
        len: usize,
        sent: usize,
        total: usize,
        progress: f32,
    },
    Failed {
        message: String,
    },
}

#[derive(Debug, Default)]
struct UploadOutcome {
    persisted: usize,
    batches_submitted: usize,
    batch_splits: usize,
}

pub struct UploadPipeline<E, V> {
    embedder: E,
    index: V,
    config: UploadConfig,
}

impl<E, V> UploadPipeline<E, V>
where
    E: Embedder,
    V: VectorIndex,
{
    pub fn new(embedder: E, index: V, config: UploadConfig) -> Result<Self, UploadError> {
        config.validate()?;
        config.chunking.validate()?;
        Ok(Self {
            embedder,
            index,
            config,
        })
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Uploads `document`, reporting progress to `on_event`.
    ///
    /// Chunks whose embedding fails are skipped and counted. Extraction failures
    /// and non-size upload failures abort; batches already accepted by the index
    /// stay there.
    pub async fn upload<F>(
        &self,
        document: &SourceDocument,
        mut on_event: F,
    ) -> Result<UploadReport, UploadError>
    where
        F: FnMut(&UploadEvent),
    {
        on_event(&UploadEvent::Stage(UploadStage::Idle));

        match self.run(document, &mut on_event).await {
            Ok(report) => {
                on_event(&UploadEvent::Stage(UploadStage::Completed));
                info!(
                    document = %report.document,
                    total_chunks = report.total_chunks,
                    persisted = report.succeeded_count,
                    failed_chunks = report.failed_chunks,
                    batch_splits = report.batch_splits,
                    "upload completed"
                );
                Ok(report)
            }
            Err(error) => {
                warn!(document = %document.name, error = %error, "upload aborted");
                on_event(&UploadEvent::Failed {
                    message: error.to_string(),
                });
                on_event(&UploadEvent::Stage(UploadStage::Aborted));
                Err(error)
            }
        }
    }

    async fn run<F>(
        &self,
        document: &SourceDocument,
        on_event: &mut F,
    ) -> Result<UploadReport, UploadError>
    where
        F: FnMut(&UploadEvent),
    {
        let started_at = Utc::now();

        on_event(&UploadEvent::Stage(UploadStage::Extracting));
        info!(document = %document.name, kind = document.kind.as_str(), "extracting text");
        let bytes = read_source(&document.path)?;
        let checksum = digest_bytes(&bytes);
        let text = extract_text_with(&LopdfExtractor, document, bytes)?;

        on_event(&UploadEvent::Stage(UploadStage::Chunking));
        let chunks = split_text(&text, &self.config.chunking)?;
        let total_chunks = chunks.len();
        info!(document = %document.name, total_chunks, chars = text.chars().count(), "split into chunks");
        on_event(&UploadEvent::Chunked { total_chunks });

        on_event(&UploadEvent::Stage(UploadStage::Embedding));
        let builder = RecordBuilder::new(
            document,
            &checksum,
            self.config.excerpt_max_bytes,
            self.config.metadata_max_bytes,
        );
        let (records, failures) = self.embed_chunks(&chunks, &builder, on_event).await?;

        on_event(&UploadEvent::Stage(UploadStage::Uploading));
        let outcome = if records.is_empty() {
            warn!(document = %document.name, "no vectors were created; nothing to upload");
            UploadOutcome::default()
        } else {
            self.upload_records(&records, on_event).await?
        };

        Ok(UploadReport {
            document: document.name.clone(),
            namespace: self.config.namespace.clone(),
            total_chunks,
            embedded_count: records.len(),
            succeeded_count: outcome.persisted,
            failed_chunks: failures.len(),
            failures,
            batches_submitted: outcome.batches_submitted,
            batch_splits: outcome.batch_splits,
            started_at,
            finished_at: Utc::now(),
        })
    }

    async fn embed_chunks<F>(
        &self,
        chunks: &[Chunk],
        builder: &RecordBuilder<'_>,
        on_event: &mut F,
    ) -> Result<(Vec<VectorRecord>, Vec<ChunkFailure>), UploadError>
    where
        F: FnMut(&UploadEvent),
    {
        let mut records = Vec::with_capacity(chunks.len());
        let mut failures = Vec::new();

        for chunk in chunks {
            match self.embedder.embed(&chunk.text).await {
                Ok(values) => {
                    records.push(builder.build(chunk, values)?);
                    on_event(&UploadEvent::ChunkEmbedded {
                        index: chunk.index,
                        total_chunks: chunk.total_chunks,
                    });
                }
                Err(error) => {
                    warn!(chunk = chunk.index, error = %error, "embedding failed; skipping chunk");
                    let reason = error.to_string();
                    on_event(&UploadEvent::ChunkSkipped {
                        index: chunk.index,
                        reason: reason.clone(),
                    });
                    failures.push(ChunkFailure {
                        index: chunk.index,
                        reason,
                    });
                }
            }
        }

        Ok((records, failures))
    }

    async fn upload_records<F>(
        &self,
        records: &[VectorRecord],
        on_event: &mut F,
    ) -> Result<UploadOutcome, UploadError>
    where
        F: FnMut(&UploadEvent),
    {
        let namespace = self.config.namespace.as_str();
        let total = records.len();
        let mut pending: VecDeque<&[VectorRecord]> =
            records.chunks(self.config.batch_size).collect();
        let mut outcome = UploadOutcome::default();
        let mut sent = 0usize;

        while let Some(batch) = pending.pop_front() {
            let first_chunk = batch[0].metadata.chunk;

            match self.index.upsert(batch, namespace).await {
                Ok(acknowledged) => {
                    sent += batch.len();
                    outcome.persisted += acknowledged;
                    outcome.batches_submitted += 1;
                    debug!(first_chunk, len = batch.len(), acknowledged, "batch uploaded");
                    on_event(&UploadEvent::BatchSubmitted {
                        first_chunk,
                        len: batch.len(),
                        sent,
                        total,
                        progress: sent as f32 / total as f32,
                    });

                    if !pending.is_empty() && !self.config.batch_delay.is_zero() {
                        tokio::time::sleep(self.config.batch_delay).await;
                    }
                }
                Err(error) if error.is_payload_too_large() => {
                    if batch.len() == 1 {
                        return Err(UploadError::RecordTooLarge {
                            key: batch[0].id.clone(),
                            details: error.to_string(),
                        });
                    }

                    let (left, right) = batch.split_at(batch.len() / 2);
                    warn!(
                        first_chunk,
                        len = batch.len(),
                        left = left.len(),
                        right = right.len(),
                        "batch exceeds payload limit; halving"
                    );
                    outcome.batch_splits += 1;
                    on_event(&UploadEvent::BatchSplit {
                        first_chunk,
                        len: batch.len(),
                    });
                    pending.push_front(right);
                    pending.push_front(left);
                }
                Err(error) => {
                    return Err(UploadError::Batch {
                        first_chunk,
                        len: batch.len(),
                        source: error,
                    });
                }
            }
        }

        Ok(outcome)
    }
}
