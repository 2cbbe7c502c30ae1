use anyhow::Context;
use chrono::Utc;
use clap::builder::RangedU64ValueParser;
use clap::{Parser, Subcommand};
use doc_upload_core::config::embedding_dimensions_from_env;
use doc_upload_core::{
    discover_documents, CharacterNgramEmbedder, ChunkingConfig, Embedder, IndexInspector,
    OpenAiEmbedder, PineconeSettings, PineconeStore, ServiceConfig, SourceDocument, UploadConfig,
    UploadEvent, UploadPipeline, UploadReport, UploadStage, DEFAULT_SAMPLE_SIZE,
    MAX_SAMPLE_SIZE,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "doc-upload", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Pinecone namespace that holds the document vectors.
    #[arg(long, env = "PINECONE_NAMESPACE", default_value = "Default")]
    namespace: String,

    /// Records per upsert request before any halving.
    #[arg(long, env = "UPLOAD_BATCH_SIZE", default_value = "4")]
    batch_size: usize,

    /// Maximum chunk length in characters.
    #[arg(long, env = "CHUNK_SIZE", default_value = "80000")]
    chunk_size: usize,

    /// Characters repeated from the previous chunk.
    #[arg(long, env = "CHUNK_OVERLAP", default_value = "20000")]
    chunk_overlap: usize,

    /// Pause between successful batch uploads, in milliseconds.
    #[arg(long, env = "UPLOAD_BATCH_DELAY_MS", default_value = "1000")]
    batch_delay_ms: u64,

    /// Embed with the local trigram hasher instead of OpenAI.
    #[arg(long, default_value_t = false)]
    offline: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Upload a single PDF or text file.
    Upload {
        #[arg(long)]
        file: PathBuf,
    },
    /// Upload every PDF and text file under a folder, one at a time.
    UploadDir {
        #[arg(long)]
        folder: PathBuf,
    },
    /// Show how many vectors the namespace holds.
    Stats,
    /// List the documents found in a sample of the namespace.
    List {
        /// Number of matches to sample (Pinecone caps metadata queries at 1000).
        #[arg(
            long,
            default_value_t = DEFAULT_SAMPLE_SIZE,
            value_parser = RangedU64ValueParser::<usize>::new().range(1..=MAX_SAMPLE_SIZE as u64)
        )]
        sample_size: usize,
    },
}

impl Cli {
    fn upload_config(&self) -> UploadConfig {
        UploadConfig {
            namespace: self.namespace.clone(),
            batch_size: self.batch_size,
            chunking: ChunkingConfig::new(self.chunk_size, self.chunk_overlap),
            batch_delay: Duration::from_millis(self.batch_delay_ms),
            ..UploadConfig::default()
        }
    }

    fn embedder(&self) -> anyhow::Result<Arc<dyn Embedder>> {
        if self.offline {
            let dimensions = embedding_dimensions_from_env()?;
            return Ok(Arc::new(CharacterNgramEmbedder::new(dimensions)));
        }

        let config = ServiceConfig::from_env()?;
        Ok(Arc::new(OpenAiEmbedder::new(config.openai)?))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        namespace = %cli.namespace,
        "doc-upload boot"
    );

    let index = Arc::new(PineconeStore::new(&PineconeSettings::from_env()?)?);

    match &cli.command {
        Command::Upload { file } => {
            let pipeline = UploadPipeline::new(cli.embedder()?, index, cli.upload_config())?;
            let report = upload_one(&pipeline, file).await?;
            print_report(&report);
        }
        Command::UploadDir { folder } => {
            let files = discover_documents(folder);
            if files.is_empty() {
                anyhow::bail!("no pdf or txt files found in {}", folder.display());
            }

            let pipeline = UploadPipeline::new(cli.embedder()?, index, cli.upload_config())?;
            let mut aborted = 0usize;
            for path in &files {
                match upload_one(&pipeline, path).await {
                    Ok(report) => print_report(&report),
                    Err(error) => {
                        aborted += 1;
                        error!(path = %path.display(), error = %error, "upload aborted");
                        println!("failed: {}: {error:#}", path.display());
                    }
                }
            }

            println!(
                "{} of {} files uploaded at {}",
                files.len() - aborted,
                files.len(),
                Utc::now().to_rfc3339()
            );
            if aborted > 0 {
                anyhow::bail!("{aborted} file(s) failed to upload");
            }
        }
        Command::Stats => {
            let inspector = IndexInspector::new(index, embedding_dimensions_from_env()?);
            let stats = inspector.stats(&cli.namespace).await?;
            println!("namespace: {}", cli.namespace);
            println!("vectors: {}", stats.vector_count);
        }
        Command::List { sample_size } => {
            let inspector = IndexInspector::new(index, embedding_dimensions_from_env()?);
            let stats = inspector.stats(&cli.namespace).await?;
            let documents = inspector.list_documents(&cli.namespace, *sample_size).await?;

            println!("namespace: {} ({} vectors)", cli.namespace, stats.vector_count);
            if documents.is_empty() {
                println!("no documents found");
            }
            for document in documents {
                println!("  {document}");
            }
        }
    }

    Ok(())
}

async fn upload_one<E, V>(
    pipeline: &UploadPipeline<E, V>,
    path: &Path,
) -> anyhow::Result<UploadReport>
where
    E: doc_upload_core::Embedder,
    V: doc_upload_core::VectorIndex,
{
    let document = SourceDocument::from_path(path)?;
    pipeline
        .upload(&document, render_event)
        .await
        .with_context(|| format!("uploading {}", path.display()))
}

fn render_event(event: &UploadEvent) {
    match event {
        UploadEvent::Stage(UploadStage::Idle) => {}
        UploadEvent::Stage(stage) => info!(stage = ?stage, "stage"),
        UploadEvent::Chunked { total_chunks } => println!("split into {total_chunks} chunks"),
        UploadEvent::ChunkEmbedded {
            index,
            total_chunks,
        } => info!(chunk = index, total_chunks, "embedded"),
        UploadEvent::ChunkSkipped { index, reason } => {
            println!("error embedding chunk {index}: {reason}")
        }
        UploadEvent::BatchSplit { first_chunk, len } => {
            warn!(first_chunk, len, "batch too large, retrying in halves")
        }
        UploadEvent::BatchSubmitted {
            first_chunk,
            len,
            sent,
            total,
            progress,
        } => println!(
            "uploaded chunks {}..{} ({sent}/{total}, {:.0}%)",
            first_chunk,
            first_chunk + len,
            progress * 100.0
        ),
        UploadEvent::Failed { message } => println!("upload failed: {message}"),
    }
}

fn print_report(report: &UploadReport) {
    if report.is_empty() {
        println!("'{}': no vectors were created", report.document);
        return;
    }

    println!(
        "'{}' uploaded: {} of {} chunks persisted to namespace {}",
        report.document, report.succeeded_count, report.total_chunks, report.namespace
    );
    if report.is_partial() {
        println!("  {} chunk(s) skipped:", report.failed_chunks);
        for failure in &report.failures {
            println!("    chunk {}: {}", failure.index, failure.reason);
        }
    }
    if report.batch_splits > 0 {
        println!("  {} oversized batch(es) were halved", report.batch_splits);
    }
    let elapsed = report.finished_at - report.started_at;
    println!("  took {:.1}s", elapsed.num_milliseconds() as f64 / 1000.0);
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command};
    use clap::Parser;

    #[test]
    fn list_sample_size_defaults_to_one_hundred() -> Result<(), clap::Error> {
        let cli = Cli::try_parse_from(["doc-upload", "list"])?;
        assert!(matches!(cli.command, Command::List { sample_size: 100 }));
        Ok(())
    }

    #[test]
    fn list_sample_size_above_query_cap_is_rejected() {
        assert!(Cli::try_parse_from(["doc-upload", "list", "--sample-size", "5000"]).is_err());
        assert!(Cli::try_parse_from(["doc-upload", "list", "--sample-size", "0"]).is_err());
    }
}
