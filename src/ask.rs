//! Retrieve-then-generate pipeline: fetch the top-K records for a question
//! and synthesize an answer grounded in them.
//!
//! When no generation provider is configured, or the provider fails, the
//! pipeline falls back to a deterministic extractive answer assembled from
//! the retrieved context instead of failing the question.

use crate::{
    config::Config,
    generation::{GenerationClient, GenerationRequest, generation_client_for},
    query::{QueryApi, QueryError, QueryHit, QueryPipeline, truncate_text},
};

/// Maximum characters of one record's text included in the prompt.
const MAX_CONTEXT_CHARS: usize = 1500;

/// Maximum characters of one record's text quoted in an extractive answer.
const MAX_EXTRACT_CHARS: usize = 200;

/// Answer produced for one question, with the records it was grounded on.
#[derive(Debug, Clone)]
pub struct Answer {
    /// Answer text, either model-generated or extractive.
    pub text: String,
    /// Retrieved records the answer is based on, best match first.
    pub sources: Vec<QueryHit>,
    /// Whether a generation model produced the text (false for fallbacks).
    pub generated: bool,
}

/// Coordinates retrieval and answer generation.
pub struct AskPipeline {
    query: Box<dyn QueryApi>,
    generation: Option<Box<dyn GenerationClient>>,
    model: String,
}

impl AskPipeline {
    /// Build a pipeline with clients derived from configuration.
    pub fn new(config: Config) -> Result<Self, QueryError> {
        let generation = generation_client_for(&config);
        let model = config.generation_model.clone();
        let query = QueryPipeline::new(config)?;
        Ok(Self {
            query: Box::new(query),
            generation,
            model,
        })
    }

    /// Build a pipeline with explicitly supplied collaborators.
    pub fn with_clients(
        query: Box<dyn QueryApi>,
        generation: Option<Box<dyn GenerationClient>>,
        model: String,
    ) -> Self {
        Self {
            query,
            generation,
            model,
        }
    }

    /// Answer a question using the top-`k` most similar stored records.
    pub async fn ask(&self, question: &str, k: usize) -> Result<Answer, QueryError> {
        let hits = self.query.search(question, k).await?;

        if hits.is_empty() {
            return Ok(Answer {
                text: "I couldn't find any relevant information to answer your question."
                    .to_string(),
                sources: hits,
                generated: false,
            });
        }

        if let Some(client) = &self.generation {
            let request = GenerationRequest {
                model: self.model.clone(),
                prompt: build_prompt(question, &hits),
            };
            match client.generate(request).await {
                Ok(text) if !text.is_empty() => {
                    return Ok(Answer {
                        text,
                        sources: hits,
                        generated: true,
                    });
                }
                Ok(_) => {
                    tracing::warn!("Generation returned an empty answer; falling back");
                }
                Err(error) => {
                    tracing::warn!(error = %error, "Generation failed; falling back");
                }
            }
        }

        Ok(Answer {
            text: extractive_answer(&hits),
            sources: hits,
            generated: false,
        })
    }
}

/// Assemble the grounding prompt sent to the generation model.
pub fn build_prompt(question: &str, hits: &[QueryHit]) -> String {
    let mut context = String::new();
    for (index, hit) in hits.iter().enumerate() {
        let content = truncate_text(&hit.text, MAX_CONTEXT_CHARS);
        context.push_str(&format!(
            "Document {} (Source: {}):\n{}\n\n",
            index + 1,
            hit.source_file,
            content
        ));
    }

    format!(
        "You are an assistant answering questions about a collection of indexed records.\n\
         \n\
         Based on the following documents, provide a concise, well-structured answer to the \
         user's question. Cite the source files you rely on. If the documents do not contain \
         the answer, say so.\n\
         \n\
         CONTEXT:\n\
         {context}\
         QUESTION: {question}\n\
         \n\
         ANSWER:"
    )
}

/// Deterministic answer listing the most relevant records.
fn extractive_answer(hits: &[QueryHit]) -> String {
    let mut answer = String::from("Here is the most relevant indexed information:\n");
    for hit in hits {
        answer.push_str(&format!(
            "- {} (record {}, similarity {:.2}): {}\n",
            hit.source_file,
            hit.record_id,
            hit.score,
            truncate_text(&hit.text, MAX_EXTRACT_CHARS)
        ));
    }
    answer
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::GenerationClientError;
    use async_trait::async_trait;

    fn hit(source_file: &str, record_id: usize, score: f32, text: &str) -> QueryHit {
        QueryHit {
            entry_id: format!("{source_file}::{record_id}"),
            source_file: source_file.to_string(),
            record_id,
            score,
            text: text.to_string(),
        }
    }

    struct StubQuery {
        hits: Vec<QueryHit>,
    }

    #[async_trait]
    impl QueryApi for StubQuery {
        async fn search(&self, _query: &str, _k: usize) -> Result<Vec<QueryHit>, QueryError> {
            Ok(self.hits.clone())
        }
    }

    struct StubGenerator {
        response: Result<&'static str, ()>,
    }

    #[async_trait]
    impl GenerationClient for StubGenerator {
        async fn generate(
            &self,
            _request: GenerationRequest,
        ) -> Result<String, GenerationClientError> {
            self.response
                .map(str::to_string)
                .map_err(|()| GenerationClientError::GenerationFailed("boom".into()))
        }
    }

    #[tokio::test]
    async fn ask_returns_generated_answer_with_sources() {
        let pipeline = AskPipeline::with_clients(
            Box::new(StubQuery {
                hits: vec![hit("a.json", 0, 0.93, "name: Acme | industry: Anvils")],
            }),
            Some(Box::new(StubGenerator {
                response: Ok("Acme makes anvils."),
            })),
            "llama3.2".to_string(),
        );

        let answer = pipeline.ask("who makes anvils", 3).await.expect("answer");
        assert!(answer.generated);
        assert_eq!(answer.text, "Acme makes anvils.");
        assert_eq!(answer.sources.len(), 1);
        assert_eq!(answer.sources[0].source_file, "a.json");
    }

    #[tokio::test]
    async fn ask_falls_back_to_extractive_answer_on_generation_failure() {
        let pipeline = AskPipeline::with_clients(
            Box::new(StubQuery {
                hits: vec![hit("a.json", 0, 0.93, "name: Acme | industry: Anvils")],
            }),
            Some(Box::new(StubGenerator { response: Err(()) })),
            "llama3.2".to_string(),
        );

        let answer = pipeline.ask("who makes anvils", 3).await.expect("answer");
        assert!(!answer.generated);
        assert!(answer.text.contains("a.json"));
        assert!(answer.text.contains("name: Acme"));
    }

    #[tokio::test]
    async fn ask_without_provider_uses_extractive_answer() {
        let pipeline = AskPipeline::with_clients(
            Box::new(StubQuery {
                hits: vec![
                    hit("a.json", 0, 0.93, "name: Acme"),
                    hit("b.json", 0, 0.41, "company_name: Globex"),
                ],
            }),
            None,
            "llama3.2".to_string(),
        );

        let answer = pipeline.ask("companies", 3).await.expect("answer");
        assert!(!answer.generated);
        assert!(answer.text.contains("a.json"));
        assert!(answer.text.contains("b.json"));
        assert_eq!(answer.sources.len(), 2);
    }

    #[tokio::test]
    async fn ask_with_no_matches_reports_missing_information() {
        let pipeline = AskPipeline::with_clients(
            Box::new(StubQuery { hits: Vec::new() }),
            Some(Box::new(StubGenerator {
                response: Ok("should never be called"),
            })),
            "llama3.2".to_string(),
        );

        let answer = pipeline.ask("unknown topic", 3).await.expect("answer");
        assert!(!answer.generated);
        assert!(answer.text.contains("couldn't find any relevant information"));
        assert!(answer.sources.is_empty());
    }

    #[test]
    fn prompt_embeds_question_and_truncated_context() {
        let hits = vec![
            hit("a.json", 0, 0.9, &"x".repeat(2000)),
            hit("b.json", 1, 0.5, "company_name: Globex"),
        ];
        let prompt = build_prompt("who makes anvils", &hits);

        assert!(prompt.contains("QUESTION: who makes anvils"));
        assert!(prompt.contains("Document 1 (Source: a.json):"));
        assert!(prompt.contains("Document 2 (Source: b.json):"));
        // Long record text is cut down before entering the prompt.
        assert!(!prompt.contains(&"x".repeat(MAX_CONTEXT_CHARS + 1)));
        assert!(prompt.contains(&format!("{}...", "x".repeat(MAX_CONTEXT_CHARS))));
    }
}
