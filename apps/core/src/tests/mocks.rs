//! In-process collaborators for turn and supervisor tests.
//!
//! Each mock records what it was asked and can be switched into a failing mode.

use crate::actors::messages::{ActorError, AppError};
use crate::actors::supervisor::{TurnHandler, TurnPolicy, TurnServices};
use crate::actors::traits::RagActor;
use crate::brain::Mood;
use crate::config::AppConfig;
use crate::models::{LocationRecord, Story};
use crate::services::speech::AudioClip;
use crate::services::{
    AudioRecorder, Geolocator, Notifier, SentimentScorer, StorySource, Transcriber,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const TEST_RECIPIENT: &str = "oncall@example.org";

// --- Answering pipeline ---

#[derive(Default)]
pub struct MockRag {
    pub fail: AtomicBool,
    pub queries: Mutex<Vec<String>>,
}

#[async_trait]
impl RagActor for MockRag {
    async fn answer(&self, query: String) -> Result<String, AppError> {
        self.queries.lock().unwrap().push(query.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Actor(ActorError::RagError(
                "index unavailable".to_string(),
            )));
        }
        Ok(format!("answer to: {}", query))
    }
}

/// Holds back the answer to "wait" until `gate` is notified.
#[derive(Default)]
pub struct GatedRag {
    pub gate: tokio::sync::Notify,
}

#[async_trait]
impl RagActor for GatedRag {
    async fn answer(&self, query: String) -> Result<String, AppError> {
        if query == "wait" {
            self.gate.notified().await;
        }
        Ok(format!("answer to: {}", query))
    }
}

// --- Voice ---

#[derive(Default)]
pub struct MockRecorder {
    pub durations: Mutex<Vec<Duration>>,
}

#[async_trait]
impl AudioRecorder for MockRecorder {
    async fn record(&self, duration: Duration) -> Result<AudioClip, AppError> {
        self.durations.lock().unwrap().push(duration);
        Ok(AudioClip::new(vec![0; 1_600], 16_000))
    }
}

pub struct MockTranscriber {
    pub text: Mutex<String>,
    pub calls: AtomicUsize,
}

impl MockTranscriber {
    pub fn new(text: &str) -> Self {
        Self {
            text: Mutex::new(text.to_string()),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Transcriber for MockTranscriber {
    async fn transcribe(&self, _clip: &AudioClip) -> Result<String, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.text.lock().unwrap().clone())
    }
}

// --- Sentiment ---

/// Returns a preset polarity and records the text it scored.
pub struct FixedSentiment {
    pub polarity: Mutex<f32>,
    pub scored: Mutex<Vec<String>>,
}

impl FixedSentiment {
    pub fn new(polarity: f32) -> Self {
        Self {
            polarity: Mutex::new(polarity),
            scored: Mutex::new(Vec::new()),
        }
    }

    pub fn set(&self, polarity: f32) {
        *self.polarity.lock().unwrap() = polarity;
    }
}

#[async_trait]
impl SentimentScorer for FixedSentiment {
    async fn polarity(&self, text: &str) -> Result<f32, AppError> {
        self.scored.lock().unwrap().push(text.to_string());
        Ok(*self.polarity.lock().unwrap())
    }
}

// --- Stories ---

pub enum StoryScript {
    Found(Story),
    NoResults,
    Fails,
}

pub struct MockStories {
    pub script: Mutex<StoryScript>,
    pub requests: Mutex<Vec<Mood>>,
}

impl MockStories {
    pub fn new(script: StoryScript) -> Self {
        Self {
            script: Mutex::new(script),
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl StorySource for MockStories {
    async fn find_story(&self, mood: Mood) -> Result<Option<Story>, AppError> {
        self.requests.lock().unwrap().push(mood);
        match &*self.script.lock().unwrap() {
            StoryScript::Found(story) => Ok(Some(story.clone())),
            StoryScript::NoResults => Ok(None),
            StoryScript::Fails => Err(AppError::Http("search quota exceeded".to_string())),
        }
    }
}

pub fn sample_story() -> Story {
    Story {
        title: "The Long Way Back".to_string(),
        snippet: "After a hard year, a nurse rebuilt her life one small step at a time."
            .to_string(),
        link: "https://stories.example.org/long-way-back".to_string(),
    }
}

// --- Escalation ---

pub struct MockGeolocator {
    pub location: Mutex<Option<LocationRecord>>,
    pub calls: AtomicUsize,
}

impl MockGeolocator {
    pub fn new(location: Option<LocationRecord>) -> Self {
        Self {
            location: Mutex::new(location),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Geolocator for MockGeolocator {
    async fn locate(&self) -> Result<LocationRecord, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.location
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| AppError::Http("connection refused".to_string()))
    }
}

pub fn sample_location() -> LocationRecord {
    LocationRecord {
        ip: "203.0.113.42".to_string(),
        city: Some("Bengaluru".to_string()),
        region_name: Some("Karnataka".to_string()),
        country_name: Some("India".to_string()),
        postal_code: None,
        latitude: Some(12.97),
        longitude: Some(77.59),
    }
}

#[derive(Default)]
pub struct MockNotifier {
    pub fail: AtomicBool,
    pub sent: Mutex<Vec<(String, String)>>,
}

impl MockNotifier {
    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn last_body(&self) -> Option<String> {
        self.sent.lock().unwrap().last().map(|(_, body)| body.clone())
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn notify(&self, recipient: &str, message: &str) -> Result<(), AppError> {
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), message.to_string()));
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Mail("535 authentication failed".to_string()));
        }
        Ok(())
    }
}

// --- Harness ---

/// All mocks wired into one `TurnHandler`, kept reachable for assertions.
pub struct Harness {
    pub recorder: Arc<MockRecorder>,
    pub transcriber: Arc<MockTranscriber>,
    pub sentiment: Arc<FixedSentiment>,
    pub stories: Arc<MockStories>,
    pub geolocator: Arc<MockGeolocator>,
    pub notifier: Arc<MockNotifier>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            recorder: Arc::new(MockRecorder::default()),
            transcriber: Arc::new(MockTranscriber::new("I have been feeling low lately")),
            sentiment: Arc::new(FixedSentiment::new(0.3)),
            stories: Arc::new(MockStories::new(StoryScript::Found(sample_story()))),
            geolocator: Arc::new(MockGeolocator::new(Some(sample_location()))),
            notifier: Arc::new(MockNotifier::default()),
        }
    }

    pub fn policy() -> TurnPolicy {
        let mut config = AppConfig::default();
        config.escalation.recipient = TEST_RECIPIENT.to_string();
        TurnPolicy::from_config(&config)
    }

    pub fn handler(&self) -> TurnHandler {
        self.handler_with(Self::policy())
    }

    pub fn handler_with(&self, policy: TurnPolicy) -> TurnHandler {
        let services = TurnServices {
            recorder: self.recorder.clone(),
            transcriber: self.transcriber.clone(),
            sentiment: self.sentiment.clone(),
            stories: self.stories.clone(),
            geolocator: self.geolocator.clone(),
            notifier: self.notifier.clone(),
        };
        TurnHandler::new(services, policy)
    }
}
