use crate::actors::messages::AppError;
use async_trait::async_trait;

/// Defines the public interface for an LLM (Large Language Model) actor.
///
/// This trait abstracts the specific implementation of the LLM, allowing for different
/// backends (e.g., a hosted chat-completions API or a local server) to be used interchangeably.
#[async_trait]
pub trait LlmActor: Send + Sync + 'static {
    /// Generates a complete text response for a prompt.
    async fn generate(&self, prompt: String) -> Result<String, AppError>;
}

/// Defines the public interface for a RAG (Retrieval-Augmented Generation) actor.
///
/// This is the answering pipeline a session is bound to: a query goes in, a grounded
/// answer comes out.
#[async_trait]
pub trait RagActor: Send + Sync + 'static {
    /// Answers a question using passages retrieved from the knowledge base.
    async fn answer(&self, query: String) -> Result<String, AppError>;
}
