use crate::actors::messages::{ActorError, AppError, LlmMessage};
use crate::actors::traits::LlmActor;
use crate::config::LlmConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{error, info};

/// A handle to the `LlmActor`.
///
/// This struct provides a public, cloneable interface for sending messages to the
/// running LLM actor. It abstracts away the `mpsc::Sender`.
#[derive(Clone)]
pub struct LlmActorHandle {
    sender: mpsc::Sender<LlmMessage>,
}

impl LlmActorHandle {
    /// Creates a new `LlmActor` and returns a handle to it.
    ///
    /// This will spawn the `LlmActorRunner` in a new Tokio task.
    pub fn new(config: &LlmConfig) -> Self {
        let (sender, receiver) = mpsc::channel(32);
        let actor = LlmActorRunner::new(receiver, config);
        tokio::spawn(async move { actor.run().await });
        Self { sender }
    }
}

#[async_trait]
impl LlmActor for LlmActorHandle {
    async fn generate(&self, prompt: String) -> Result<String, AppError> {
        let (send, recv) = oneshot::channel();
        let msg = LlmMessage::Generate {
            prompt,
            responder: send,
        };

        self.sender
            .send(msg)
            .await
            .map_err(|_| AppError::Actor(ActorError::Internal("LLM Actor closed".to_string())))?;
        timeout(Duration::from_secs(150), recv)
            .await?
            .map_err(|_| {
                AppError::Actor(ActorError::Internal("LLM Actor failed to respond".to_string()))
            })?
    }
}

// --- Constants ---
const COMPLETION_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

// --- Actor Runner (Internal Logic) ---
struct LlmActorRunner {
    receiver: mpsc::Receiver<LlmMessage>,
    base_url: String,
    model: String,
    temperature: f32,
    client: Client,
    api_key: Option<String>,
}

impl LlmActorRunner {
    fn new(receiver: mpsc::Receiver<LlmMessage>, config: &LlmConfig) -> Self {
        Self {
            receiver,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            client: Client::new(),
            api_key: config.api_key.clone(),
        }
    }

    async fn run(mut self) {
        info!("LlmActor started with model {}", self.model);
        if self.api_key.is_none() {
            error!("GROQ_API_KEY is not set; every completion request will fail");
        }

        while let Some(msg) = self.receiver.recv().await {
            self.handle_message(msg).await;
        }

        info!("LlmActor stopped");
    }

    fn build_request(&self, endpoint: &str, payload: &serde_json::Value) -> reqwest::RequestBuilder {
        let request = self
            .client
            .post(format!("{}/{}", self.base_url, endpoint))
            .json(payload);
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn handle_message(&mut self, msg: LlmMessage) {
        match msg {
            LlmMessage::Generate { prompt, responder } => {
                let result = self.generate_completion(prompt).await;
                let _ = responder.send(result);
            }
        }
    }

    async fn generate_completion(&self, prompt: String) -> Result<String, AppError> {
        if self.api_key.is_none() {
            return Err(AppError::Config("GROQ_API_KEY is not set".to_string()));
        }
        info!("LLM generating for prompt of {} chars", prompt.len());

        let payload = serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let request_future = self.build_request("chat/completions", &payload).send();
        let res = timeout(COMPLETION_TIMEOUT, request_future).await??;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(AppError::Actor(ActorError::LlmError(format!(
                "Completion request failed with status {}: {}",
                status, body
            ))));
        }

        let completion: ChatCompletion = res
            .json()
            .await
            .map_err(|e| AppError::Actor(ActorError::LlmError(e.to_string())))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                AppError::Actor(ActorError::LlmError(
                    "Completion response contained no message".to_string(),
                ))
            })
    }
}
