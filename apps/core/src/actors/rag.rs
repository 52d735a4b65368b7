use crate::actors::messages::{ActorError, AppError, RagMessage};
use crate::actors::traits::{LlmActor, RagActor};
use crate::config::RetrievalConfig;
use async_trait::async_trait;
use lru::LruCache;
use reqwest::Client;
use serde::Deserialize;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

const QA_PROMPT_TEMPLATE: &str = "\
You are a compassionate support assistant for people going through emotional distress, \
sadness, or hard personal moments. Draw on the psychology of human relations to offer \
thoughtful guidance and encouragement.

Be present and empathetic. Listen, notice cues such as sadness, anger or frustration, and \
answer in kind. If the person wants to stop talking, respect that and close gently.

Context: {context} Question: {question}

Helpful answer:
";

/// Fills the answering prompt with retrieved passages and the user's question.
pub fn build_qa_prompt(context: &str, question: &str) -> String {
    QA_PROMPT_TEMPLATE
        .replace("{context}", context)
        .replace("{question}", question)
}

/// A handle to the `RagActor`.
///
/// This provides a public, cloneable interface for sending messages to the running RAG actor,
/// which embeds queries, looks up the vector index and asks the LLM for a grounded answer.
#[derive(Clone)]
pub struct RagActorHandle {
    sender: mpsc::Sender<RagMessage>,
}

impl RagActorHandle {
    /// Creates a new `RagActor` bound to the given LLM and returns a handle to it.
    pub fn new(config: &RetrievalConfig, llm: Arc<dyn LlmActor>) -> Self {
        let (sender, receiver) = mpsc::channel(32);
        let actor = RagActorRunner::new(receiver, config, llm);
        tokio::spawn(async move { actor.run().await });
        Self { sender }
    }
}

#[async_trait]
impl RagActor for RagActorHandle {
    async fn answer(&self, query: String) -> Result<String, AppError> {
        let (send, recv) = oneshot::channel();
        let msg = RagMessage::Answer {
            query,
            responder: send,
        };
        self.sender
            .send(msg)
            .await
            .map_err(|_| AppError::Actor(ActorError::Internal("RAG Actor closed".to_string())))?;
        timeout(Duration::from_secs(180), recv)
            .await?
            .map_err(|_| {
                AppError::Actor(ActorError::Internal("RAG Actor failed to respond".to_string()))
            })?
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Debug, Deserialize)]
struct QueryMatch {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<serde_json::Value>,
}

// --- Actor Runner (Internal Logic) ---
struct RagActorRunner {
    receiver: mpsc::Receiver<RagMessage>,
    client: Client,
    ollama_url: String,
    embedding_model: String,
    index_host: Option<String>,
    index_api_key: Option<String>,
    top_k: usize,
    embedding_cache: LruCache<String, Vec<f32>>,
    llm: Arc<dyn LlmActor>,
}

impl RagActorRunner {
    const CACHE_SIZE: NonZeroUsize = match NonZeroUsize::new(256) {
        Some(size) => size,
        None => panic!("Cache size must be non-zero"),
    };
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    fn new(
        receiver: mpsc::Receiver<RagMessage>,
        config: &RetrievalConfig,
        llm: Arc<dyn LlmActor>,
    ) -> Self {
        Self {
            receiver,
            client: crate::services::http_client(Self::REQUEST_TIMEOUT),
            ollama_url: config.ollama_url.trim_end_matches('/').to_string(),
            embedding_model: config.embedding_model.clone(),
            index_host: config
                .pinecone_index_host
                .as_ref()
                .map(|host| normalize_host(host)),
            index_api_key: config.pinecone_api_key.clone(),
            top_k: config.top_k,
            embedding_cache: LruCache::new(Self::CACHE_SIZE),
            llm,
        }
    }

    async fn run(mut self) {
        info!("RagActor started");
        if self.index_host.is_none() || self.index_api_key.is_none() {
            warn!("Pinecone index is not configured; answers will fail until it is");
        }
        while let Some(msg) = self.receiver.recv().await {
            self.handle_message(msg).await;
        }
        info!("RagActor stopped");
    }

    async fn handle_message(&mut self, msg: RagMessage) {
        match msg {
            RagMessage::Answer { query, responder } => {
                let result = self.answer(query).await;
                if let Err(e) = &result {
                    error!("RAG answer failed: {}", e);
                }
                let _ = responder.send(result);
            }
        }
    }

    #[instrument(skip(self))]
    async fn answer(&mut self, query: String) -> Result<String, AppError> {
        let vector = self.embed(&query).await?;
        let passages = self.query_index(vector).await?;
        info!("Retrieved {} passages", passages.len());

        let prompt = build_qa_prompt(&passages.join("\n\n"), &query);
        self.llm.generate(prompt).await
    }

    async fn embed(&mut self, text: &str) -> Result<Vec<f32>, AppError> {
        if let Some(cached) = self.embedding_cache.get(text) {
            return Ok(cached.clone());
        }

        let response = self
            .client
            .post(format!("{}/api/embeddings", self.ollama_url))
            .json(&serde_json::json!({
                "model": self.embedding_model,
                "prompt": text,
            }))
            .send()
            .await
            .map_err(|e| rag_error(format!("Embedding request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(rag_error(format!(
                "Embedding request failed with status {}: {}",
                status, body
            )));
        }

        let embedding: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| rag_error(format!("Invalid embedding response: {}", e)))?;
        if embedding.embedding.is_empty() {
            return Err(rag_error("Embedding model returned an empty vector".to_string()));
        }

        self.embedding_cache
            .put(text.to_string(), embedding.embedding.clone());
        Ok(embedding.embedding)
    }

    /// Returns the `metadata.text` of the closest matches, best first. Matches without
    /// text are skipped.
    async fn query_index(&self, vector: Vec<f32>) -> Result<Vec<String>, AppError> {
        let (host, api_key) = match (&self.index_host, &self.index_api_key) {
            (Some(host), Some(key)) => (host, key),
            _ => {
                return Err(AppError::Config(
                    "PINECONE_API_KEY and PINECONE_INDEX_HOST must be set".to_string(),
                ))
            }
        };

        let response = self
            .client
            .post(format!("{}/query", host))
            .header("Api-Key", api_key)
            .json(&serde_json::json!({
                "vector": vector,
                "topK": self.top_k,
                "includeMetadata": true,
            }))
            .send()
            .await
            .map_err(|e| rag_error(format!("Index query failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(rag_error(format!(
                "Index query failed with status {}: {}",
                status, body
            )));
        }

        let results: QueryResponse = response
            .json()
            .await
            .map_err(|e| rag_error(format!("Invalid index response: {}", e)))?;

        Ok(results
            .matches
            .into_iter()
            .filter_map(|m| {
                let content = m
                    .metadata
                    .as_ref()
                    .and_then(|meta| meta.get("text"))
                    .and_then(|text| text.as_str())?
                    .to_string();
                debug!(id = ?m.id, score = m.score, "Matched passage");
                Some(content)
            })
            .collect())
    }
}

fn rag_error(message: String) -> AppError {
    AppError::Actor(ActorError::RagError(message))
}

/// Index hosts are often configured without a scheme.
fn normalize_host(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}
