//! Query pipeline: embed a free-text query, retrieve the top-K nearest
//! records, and format them for display. Includes the interactive loop used
//! by the `query` subcommand.

use crate::{
    config::Config,
    embedding::{EmbeddingClient, EmbeddingClientError, embedding_client_for},
    qdrant::{QdrantError, QdrantService, ScoredPoint},
};
use async_trait::async_trait;
use serde_json::Value;
use std::borrow::Cow;
use std::io::{BufRead, Write};
use thiserror::Error;

/// Errors emitted while orchestrating similarity searches.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Query text was empty or whitespace-only; never reaches storage.
    #[error("Query text must not be empty")]
    EmptyQuery,
    /// Embedding provider failed to return a vector for the query text.
    #[error("Failed to generate embeddings: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// The target collection does not exist; indexing has not run yet.
    #[error("Collection '{collection}' is unavailable; run `jsonrag index` first")]
    CollectionUnavailable {
        /// Name of the unavailable collection.
        collection: String,
    },
    /// The target collection exists but holds no entries.
    #[error("Collection '{collection}' is empty; run `jsonrag index` first")]
    CollectionEmpty {
        /// Name of the empty collection.
        collection: String,
    },
    /// Qdrant search request returned an error response.
    #[error("Qdrant request failed: {0}")]
    Qdrant(QdrantError),
}

/// One retrieved record, ordered by descending similarity.
#[derive(Debug, Clone)]
pub struct QueryHit {
    /// Corpus-wide unique entry identifier.
    pub entry_id: String,
    /// File the record came from.
    pub source_file: String,
    /// Position of the record within its source file.
    pub record_id: usize,
    /// Cosine similarity clamped to `[0, 1]`.
    pub score: f32,
    /// Stored flattened record text.
    pub text: String,
}

/// Search seam consumed by the interactive loop, allowing tests to stub it.
#[async_trait]
pub trait QueryApi: Send + Sync {
    /// Retrieve the top-`k` stored records most similar to `query`.
    async fn search(&self, query: &str, k: usize) -> Result<Vec<QueryHit>, QueryError>;
}

/// Coordinates query embedding and similarity search against Qdrant.
pub struct QueryPipeline {
    config: Config,
    embedding: Box<dyn EmbeddingClient>,
    qdrant: QdrantService,
}

impl QueryPipeline {
    /// Build a pipeline with clients derived from configuration.
    pub fn new(config: Config) -> Result<Self, QueryError> {
        let embedding = embedding_client_for(&config);
        let qdrant = QdrantService::new(&config.qdrant_url, config.qdrant_api_key.clone())
            .map_err(|err| QueryError::from_qdrant(err, &config.collection_name))?;
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

    /// Verify the collection exists and holds entries, returning the count.
    ///
    /// Distinguishes "collection missing" from "collection empty" so neither
    /// is mistaken for a query with no matches.
    pub async fn ensure_ready(&self) -> Result<usize, QueryError> {
        let collection = &self.config.collection_name;
        let count = self
            .qdrant
            .count_points(collection)
            .await
            .map_err(|err| QueryError::from_qdrant(err, collection))?;
        if count == 0 {
            return Err(QueryError::CollectionEmpty {
                collection: collection.clone(),
            });
        }
        Ok(count)
    }

    fn from_qdrant_err(&self, err: QdrantError) -> QueryError {
        QueryError::from_qdrant(err, &self.config.collection_name)
    }
}

impl QueryError {
    fn from_qdrant(err: QdrantError, collection: &str) -> Self {
        match err {
            QdrantError::CollectionMissing { .. } => Self::CollectionUnavailable {
                collection: collection.to_string(),
            },
            other => Self::Qdrant(other),
        }
    }
}

#[async_trait]
impl QueryApi for QueryPipeline {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<QueryHit>, QueryError> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Err(QueryError::EmptyQuery);
        }

        let mut vectors = self.embedding.embed(vec![trimmed.to_string()]).await?;
        let vector = vectors.pop().ok_or_else(|| {
            QueryError::Embedding(EmbeddingClientError::GenerationFailed(
                "provider returned no vectors for the query".to_string(),
            ))
        })?;

        let points = self
            .qdrant
            .search_points(&self.config.collection_name, vector, k)
            .await
            .map_err(|err| self.from_qdrant_err(err))?;

        Ok(points.into_iter().map(map_scored_point).collect())
    }
}

/// Map a Qdrant scored point into a user-facing query hit.
fn map_scored_point(point: ScoredPoint) -> QueryHit {
    let ScoredPoint { id, score, payload } = point;

    let mut text = String::new();
    let mut source_file = String::new();
    let mut record_id = 0;
    let mut entry_id = id;

    if let Some(mut map) = payload {
        if let Some(Value::String(value)) = map.remove("text") {
            text = value;
        }
        if let Some(Value::String(value)) = map.remove("source_file") {
            source_file = value;
        }
        if let Some(Value::Number(value)) = map.remove("record_id") {
            record_id = value.as_u64().unwrap_or(0) as usize;
        }
        if let Some(Value::String(value)) = map.remove("entry_id") {
            entry_id = value;
        }
    }

    QueryHit {
        entry_id,
        source_file,
        record_id,
        score: score.clamp(0.0, 1.0),
        text,
    }
}

/// Truncate text to at most `max_chars` characters, appending a marker when
/// anything was cut. Never splits a multi-byte character.
pub fn truncate_text(text: &str, max_chars: usize) -> Cow<'_, str> {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => Cow::Owned(format!("{}...", &text[..byte_index])),
        None => Cow::Borrowed(text),
    }
}

/// Write formatted query results to the given output.
pub fn write_results(
    output: &mut dyn Write,
    query: &str,
    hits: &[QueryHit],
    max_display_chars: usize,
) -> std::io::Result<()> {
    writeln!(output)?;
    writeln!(output, "{}", "=".repeat(60))?;
    writeln!(output, "QUERY: {query}")?;
    writeln!(output, "{}", "=".repeat(60))?;

    if hits.is_empty() {
        writeln!(output, "No results found.")?;
        return Ok(());
    }

    for (index, hit) in hits.iter().enumerate() {
        writeln!(output)?;
        writeln!(output, "--- RESULT {} ---", index + 1)?;
        writeln!(output, "Source File: {}", hit.source_file)?;
        writeln!(output, "Record ID: {}", hit.record_id)?;
        writeln!(output, "Similarity Score: {:.4}", hit.score)?;
        writeln!(output, "Content:")?;
        let shown = truncate_text(&hit.text, max_display_chars);
        writeln!(output, "{shown}")?;
        if matches!(shown, Cow::Owned(_)) {
            writeln!(
                output,
                "[Content truncated - showing first {max_display_chars} chars of {} total]",
                hit.text.chars().count()
            )?;
        }
        writeln!(output, "{}", "-".repeat(40))?;
    }

    Ok(())
}

/// Interactive read-evaluate-print loop over the supplied reader and writer.
///
/// Terminates cleanly on end-of-input or when the user enters one of the
/// sentinels `quit`, `exit`, or `q`. Empty input lines prompt a retry, and a
/// missing or empty collection prints re-indexing advice without ending the
/// loop.
pub async fn run_repl(
    api: &dyn QueryApi,
    k: usize,
    max_display_chars: usize,
    mut input: impl BufRead,
    mut output: impl Write,
) -> std::io::Result<()> {
    writeln!(output, "Ready for queries! (type 'quit' or 'exit' to stop)")?;

    loop {
        write!(output, "\nEnter your query: ")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            writeln!(output)?;
            break;
        }

        let query = line.trim();
        if query.is_empty() {
            writeln!(output, "Please enter a non-empty query.")?;
            continue;
        }
        if matches!(query.to_lowercase().as_str(), "quit" | "exit" | "q") {
            writeln!(output, "Goodbye!")?;
            break;
        }

        match api.search(query, k).await {
            Ok(hits) => write_results(&mut output, query, &hits, max_display_chars)?,
            Err(
                err @ (QueryError::CollectionUnavailable { .. }
                | QueryError::CollectionEmpty { .. }),
            ) => {
                writeln!(output, "{err}")?;
            }
            Err(err) => {
                tracing::error!(error = %err, "Query failed");
                writeln!(output, "Error processing query: {err}")?;
            }
        }
    }

    Ok(())
}
