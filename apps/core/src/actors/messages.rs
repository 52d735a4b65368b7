use crate::models::{SessionStarted, TurnOutcome};
use serde::Serialize;
use tokio::sync::oneshot;

/// Defines errors that can occur within the actor system.
#[derive(Debug, thiserror::Error, Serialize, Clone)]
pub enum ActorError {
    /// An error originating from the LLM actor.
    #[error("LLM request failed: {0}")]
    LlmError(String),
    /// An error originating from the RAG actor.
    #[error("RAG request failed: {0}")]
    RagError(String),
    /// A generic internal error within an actor.
    #[error("Internal system error: {0}")]
    Internal(String),
    /// An error indicating that an actor operation timed out.
    #[error("Operation timed out: {0}")]
    Timeout(String),
}

impl From<tokio::time::error::Elapsed> for ActorError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        ActorError::Timeout(format!("Actor operation timed out: {}", err))
    }
}

// Re-export AppError for convenience
pub use crate::error::AppError;

/// Messages that can be sent to the `LlmActor`.
#[derive(Debug)]
pub enum LlmMessage {
    /// A request to generate a complete chat response.
    Generate {
        prompt: String,
        /// A channel to send the final `String` result back.
        responder: oneshot::Sender<Result<String, AppError>>,
    },
}

/// Messages that can be sent to the `RagActor`.
#[derive(Debug)]
pub enum RagMessage {
    /// A request to answer a question grounded in the knowledge base.
    Answer {
        query: String,
        /// A channel to send the generated answer back.
        responder: oneshot::Sender<Result<String, AppError>>,
    },
}

/// Messages that can be sent to the `SupervisorActor`.
#[derive(Debug)]
pub enum SupervisorMessage {
    /// Opens a new conversation.
    StartSession {
        responder: oneshot::Sender<Result<SessionStarted, AppError>>,
    },
    /// A request to process a user's message from a specific session.
    ProcessUserMessage {
        session_id: String,
        content: String,
        /// A channel to send the outcome of the turn back.
        responder: oneshot::Sender<Result<TurnOutcome, AppError>>,
    },
    /// Ends a conversation, dropping its transcript.
    EndSession {
        session_id: String,
        responder: oneshot::Sender<Result<(), AppError>>,
    },
    /// A command to shut down the supervisor.
    Shutdown,
}
