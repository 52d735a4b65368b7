//! # Actors
//!
//! Each actor is a Tokio task owning its state, reached through a cloneable handle that
//! sends messages over `mpsc` and waits on a `oneshot` reply.
//!
//! - `llm`: chat-completion client
//! - `rag`: embedding, vector lookup and grounded answering
//! - `supervisor`: session registry and turn handling

pub mod llm;
pub mod messages;
pub mod rag;
pub mod supervisor;
pub mod traits;
