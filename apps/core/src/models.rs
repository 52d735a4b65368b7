use crate::actors::traits::RagActor;
use crate::brain::Mood;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

const UNKNOWN: &str = "Unknown";

/// Represents one conversation.
///
/// Holds the ordered user texts (never deduplicated), the turn counter and the answering
/// pipeline the conversation was opened with. Lives only in memory.
pub struct Session {
    /// The unique identifier for the session (UUID).
    pub id: String,
    /// When the conversation started.
    pub created_at: DateTime<Utc>,
    /// User texts in arrival order.
    pub transcript: Vec<String>,
    /// Number of completed turns.
    pub query_count: u64,
    /// The retrieval/answering pipeline bound at session start.
    pub pipeline: Arc<dyn RagActor>,
}

impl Session {
    pub fn new(id: String, pipeline: Arc<dyn RagActor>) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            transcript: Vec::new(),
            query_count: 0,
            pipeline,
        }
    }

    /// The space-joined transcript of everything the user has said so far.
    pub fn full_conversation(&self) -> String {
        self.transcript.join(" ")
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("created_at", &self.created_at)
            .field("transcript", &self.transcript)
            .field("query_count", &self.query_count)
            .finish_non_exhaustive()
    }
}

/// Result of an IP geolocation lookup. Only `ip` is guaranteed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationRecord {
    pub ip: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub region_name: Option<String>,
    #[serde(default)]
    pub country_name: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

impl LocationRecord {
    /// Formats the block appended to an escalation email.
    pub fn notification_block(&self) -> String {
        fn or_unknown<T: ToString>(value: &Option<T>) -> String {
            value
                .as_ref()
                .map(|v| v.to_string())
                .unwrap_or_else(|| UNKNOWN.to_string())
        }

        format!(
            "\n\n\nLocation Information:\n\
             IP Address: {}\n\
             City: {}\n\
             Region: {}\n\
             Country: {}\n\
             PostalCode: {}\n\
             Latitude: {}\n\
             Longitude: {}\n",
            self.ip,
            or_unknown(&self.city),
            or_unknown(&self.region_name),
            or_unknown(&self.country_name),
            or_unknown(&self.postal_code),
            or_unknown(&self.latitude),
            or_unknown(&self.longitude),
        )
    }
}

/// A motivational story found by web search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    pub title: String,
    pub snippet: String,
    pub link: String,
}

impl fmt::Display for Story {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\n\n{}\n\nRead more: {}", self.title, self.snippet, self.link)
    }
}

/// The kind of message the assistant sends back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Welcome,
    Story,
    Answer,
    Error,
}

/// A single message sent from the assistant to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantMessage {
    pub kind: MessageKind,
    pub content: String,
}

impl AssistantMessage {
    pub fn new(kind: MessageKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
        }
    }
}

/// Returned when a conversation opens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStarted {
    pub session_id: String,
    pub welcome: AssistantMessage,
}

/// What happened to the escalation step of a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EscalationOutcome {
    NotTriggered,
    Sent { keyword: String, with_location: bool },
    /// The relay rejected or never received the notification.
    DeliveryFailed { keyword: String, reason: String },
}

impl EscalationOutcome {
    pub fn triggered(&self) -> bool {
        !matches!(self, EscalationOutcome::NotTriggered)
    }
}

/// Everything a turn produced, in the order it was sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnOutcome {
    pub messages: Vec<AssistantMessage>,
    /// Absent when the turn failed before mood detection.
    pub mood: Option<Mood>,
    pub escalation: EscalationOutcome,
}

impl TurnOutcome {
    pub fn answer(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.kind == MessageKind::Answer)
            .map(|m| m.content.as_str())
    }
}
