//! Clients for the external collaborators a turn relies on.
//!
//! Each collaborator is consumed through a trait so the turn handler can be exercised
//! with in-process fakes.

pub mod geolocation;
pub mod notifier;
pub mod speech;
pub mod stories;

use crate::brain::Mood;
use crate::error::AppError;
use crate::models::{LocationRecord, Story};
use async_trait::async_trait;
use speech::AudioClip;
use std::time::Duration;

/// Captures a fixed-length audio sample.
#[async_trait]
pub trait AudioRecorder: Send + Sync + 'static {
    async fn record(&self, duration: Duration) -> Result<AudioClip, AppError>;
}

/// Turns recorded speech into text.
#[async_trait]
pub trait Transcriber: Send + Sync + 'static {
    async fn transcribe(&self, clip: &AudioClip) -> Result<String, AppError>;
}

/// Scores text polarity in [-1, 1].
#[async_trait]
pub trait SentimentScorer: Send + Sync + 'static {
    async fn polarity(&self, text: &str) -> Result<f32, AppError>;
}

/// Finds a motivational story for a mood. `Ok(None)` means the search had no results.
#[async_trait]
pub trait StorySource: Send + Sync + 'static {
    async fn find_story(&self, mood: Mood) -> Result<Option<Story>, AppError>;
}

/// Looks up where the current host is.
#[async_trait]
pub trait Geolocator: Send + Sync + 'static {
    async fn locate(&self) -> Result<LocationRecord, AppError>;
}

/// Delivers an escalation notification.
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn notify(&self, recipient: &str, message: &str) -> Result<(), AppError>;
}

/// Shared HTTP client settings for collaborator calls.
pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Turns a non-success response into an `AppError::Http` carrying the status and body.
pub(crate) async fn ensure_success(
    response: reqwest::Response,
    service: &str,
) -> Result<reqwest::Response, AppError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AppError::Http(format!(
        "{} request failed with status {}: {}",
        service, status, body
    )))
}
