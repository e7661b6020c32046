//! Indexing pipeline: discover JSON files, flatten them, embed in batches,
//! and upsert into Qdrant.

mod loader;

pub use loader::{FileSkip, discover_files, load_file};

use crate::{
    config::Config,
    embedding::{EmbeddingClient, EmbeddingClientError, embedding_client_for},
    flatten::FlattenedRecord,
    qdrant::{PointUpsert, QdrantError, QdrantService},
};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort an indexing run before or during startup.
#[derive(Debug, Error)]
pub enum IndexError {
    /// The configured data directory does not exist.
    #[error("Data directory '{}' does not exist", .0.display())]
    DataDirMissing(PathBuf),
    /// Qdrant could not be reached or the collection could not be prepared.
    #[error("Qdrant request failed: {0}")]
    Qdrant(#[from] QdrantError),
}

/// Totals reported after an indexing run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexReport {
    /// JSON files discovered in the data directory.
    pub files_found: usize,
    /// Files skipped because they could not be read, parsed, or flattened.
    pub files_skipped: usize,
    /// Records embedded and upserted into the collection.
    pub records_indexed: usize,
    /// Array elements skipped because they were not JSON objects.
    pub elements_skipped: usize,
    /// Batches that failed to embed or upsert.
    pub batches_failed: usize,
}

/// Orchestrates the discover → flatten → embed → upsert pipeline.
pub struct IndexingPipeline {
    config: Config,
    embedding: Box<dyn EmbeddingClient>,
    qdrant: QdrantService,
}

impl IndexingPipeline {
    /// Build a pipeline with clients derived from configuration.
    pub fn new(config: Config) -> Result<Self, IndexError> {
        let embedding = embedding_client_for(&config);
        let qdrant = QdrantService::new(&config.qdrant_url, config.qdrant_api_key.clone())?;
        Ok(Self {
            config,
            embedding,
            qdrant,
        })
    }

    /// Build a pipeline with explicitly supplied collaborators.
    pub fn with_clients(
        config: Config,
        embedding: Box<dyn EmbeddingClient>,
        qdrant: QdrantService,
    ) -> Self {
        Self {
            config,
            embedding,
            qdrant,
        }
    }

    /// Run the full indexing pass over the configured data directory.
    ///
    /// A malformed file skips only that file; a failed batch skips only that
    /// batch. Both are counted in the report while the run continues.
    pub async fn run(&self) -> Result<IndexReport, IndexError> {
        let files = discover_files(&self.config.data_dir)?;
        let mut report = IndexReport {
            files_found: files.len(),
            ..IndexReport::default()
        };

        if files.is_empty() {
            tracing::warn!(
                data_dir = %self.config.data_dir.display(),
                "No JSON files found to index"
            );
            return Ok(report);
        }

        self.qdrant
            .create_collection_if_not_exists(
                &self.config.collection_name,
                self.config.embedding_dimension as u64,
            )
            .await?;

        let mut records: Vec<FlattenedRecord> = Vec::new();
        for path in &files {
            match load_file(path) {
                Ok(file_records) => {
                    tracing::info!(
                        file = %path.display(),
                        records = file_records.records.len(),
                        "Processed file"
                    );
                    report.elements_skipped += file_records.skipped_elements;
                    records.extend(file_records.records);
                }
                Err(skip) => {
                    tracing::warn!(file = %path.display(), reason = %skip, "Skipping file");
                    report.files_skipped += 1;
                }
            }
        }

        for batch in records.chunks(self.config.batch_size) {
            match self.index_batch(batch).await {
                Ok(count) => report.records_indexed += count,
                Err(err) => {
                    tracing::error!(
                        batch_size = batch.len(),
                        first_entry = %batch[0].entry_id(),
                        error = %err,
                        "Batch failed; continuing with remaining batches"
                    );
                    report.batches_failed += 1;
                }
            }
        }

        tracing::info!(
            files_found = report.files_found,
            files_skipped = report.files_skipped,
            records_indexed = report.records_indexed,
            elements_skipped = report.elements_skipped,
            batches_failed = report.batches_failed,
            "Indexing run complete"
        );
        Ok(report)
    }

    async fn index_batch(&self, batch: &[FlattenedRecord]) -> Result<usize, BatchError> {
        let texts: Vec<String> = batch.iter().map(|record| record.text.clone()).collect();
        let vectors = self.embedding.embed(texts).await?;

        debug_assert_eq!(batch.len(), vectors.len());

        let points: Vec<PointUpsert> = batch
            .iter()
            .zip(vectors)
            .map(|(record, vector)| PointUpsert {
                entry_id: record.entry_id(),
                text: record.text.clone(),
                source_file: record.source_file.clone(),
                record_id: record.record_id,
                vector,
            })
            .collect();

        Ok(self
            .qdrant
            .upsert_points(&self.config.collection_name, points)
            .await?)
    }
}

/// Failure of one embed-and-upsert batch.
#[derive(Debug, Error)]
enum BatchError {
    #[error("Failed to generate embeddings: {0}")]
    Embedding(#[from] EmbeddingClientError),
    #[error("Qdrant request failed: {0}")]
    Qdrant(#[from] QdrantError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmbeddingProvider;
    use crate::embedding::HashEmbeddingClient;
    use httpmock::{Method::GET, Method::PUT, MockServer};
    use serde_json::json;
    use std::fs;

    fn test_config(data_dir: PathBuf, qdrant_url: String) -> Config {
        Config {
            qdrant_url,
            qdrant_api_key: None,
            collection_name: "company_docs".to_string(),
            data_dir,
            embedding_provider: EmbeddingProvider::Hash,
            ollama_url: "http://127.0.0.1:11434".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            generation_provider: crate::config::GenerationProvider::None,
            generation_model: "llama3.2".to_string(),
            embedding_dimension: 8,
            batch_size: 2,
            top_k: 3,
            max_display_chars: 500,
        }
    }

    async fn mock_qdrant(server: &MockServer) {
        server
            .mock_async(|when, then| {
                when.method(GET).path("/collections/company_docs");
                then.status(200).json_body(json!({
                    "status": "ok", "time": 0.0, "result": {}
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(PUT).path("/collections/company_docs/points");
                then.status(200).json_body(json!({
                    "status": "ok",
                    "time": 0.0,
                    "result": { "operation_id": 1, "status": "completed" }
                }));
            })
            .await;
    }

    #[tokio::test]
    async fn run_indexes_valid_files_and_skips_malformed_ones() {
        let server = MockServer::start_async().await;
        mock_qdrant(&server).await;

        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(
            dir.path().join("a.json"),
            r#"[{"name":"Acme","tags":["x","y"]},{"name":"Globex"}]"#,
        )
        .expect("write");
        fs::write(
            dir.path().join("b.json"),
            r#"{"company_name":"Acme","industry":"Tech"}"#,
        )
        .expect("write");
        fs::write(dir.path().join("c.json"), "{ definitely not json").expect("write");

        let config = test_config(dir.path().to_path_buf(), server.base_url());
        let pipeline = IndexingPipeline::with_clients(
            config.clone(),
            Box::new(HashEmbeddingClient::new(config.embedding_dimension)),
            QdrantService::new(&config.qdrant_url, None).expect("qdrant client"),
        );

        let report = pipeline.run().await.expect("indexing run");
        assert_eq!(report.files_found, 3);
        assert_eq!(report.files_skipped, 1);
        assert_eq!(report.records_indexed, 3);
        assert_eq!(report.elements_skipped, 0);
        assert_eq!(report.batches_failed, 0);
    }

    #[tokio::test]
    async fn run_reports_empty_directory_without_touching_storage() {
        let server = MockServer::start_async().await;
        let dir = tempfile::tempdir().expect("tempdir");

        let config = test_config(dir.path().to_path_buf(), server.base_url());
        let pipeline = IndexingPipeline::with_clients(
            config.clone(),
            Box::new(HashEmbeddingClient::new(config.embedding_dimension)),
            QdrantService::new(&config.qdrant_url, None).expect("qdrant client"),
        );

        let report = pipeline.run().await.expect("indexing run");
        assert_eq!(report, IndexReport::default());
    }

    #[tokio::test]
    async fn missing_data_dir_aborts_the_run() {
        let server = MockServer::start_async().await;
        let config = test_config(PathBuf::from("/nonexistent/data"), server.base_url());
        let pipeline = IndexingPipeline::with_clients(
            config.clone(),
            Box::new(HashEmbeddingClient::new(config.embedding_dimension)),
            QdrantService::new(&config.qdrant_url, None).expect("qdrant client"),
        );

        let result = pipeline.run().await;
        assert!(matches!(result, Err(IndexError::DataDirMissing(_))));
    }

    #[tokio::test]
    async fn failed_batches_are_counted_and_do_not_abort() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/collections/company_docs");
                then.status(200).json_body(json!({
                    "status": "ok", "time": 0.0, "result": {}
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(PUT).path("/collections/company_docs/points");
                then.status(500).body("storage error");
            })
            .await;

        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("a.json"), r#"{"name":"Acme"}"#).expect("write");

        let config = test_config(dir.path().to_path_buf(), server.base_url());
        let pipeline = IndexingPipeline::with_clients(
            config.clone(),
            Box::new(HashEmbeddingClient::new(config.embedding_dimension)),
            QdrantService::new(&config.qdrant_url, None).expect("qdrant client"),
        );

        let report = pipeline.run().await.expect("indexing run");
        assert_eq!(report.records_indexed, 0);
        assert_eq!(report.batches_failed, 1);
    }
}
