use crate::actors::messages::{ActorError, AppError, SupervisorMessage};
use crate::actors::traits::RagActor;
use crate::brain::{EscalationDetector, Mood};
use crate::config::AppConfig;
use crate::models::{
    AssistantMessage, EscalationOutcome, MessageKind, Session, SessionStarted, TurnOutcome,
};
use crate::services::notifier::escalation_message;
use crate::services::stories::STORY_APOLOGY;
use crate::services::{
    AudioRecorder, Geolocator, Notifier, SentimentScorer, StorySource, Transcriber,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{error, info, instrument, warn};

/// A story is offered on every turn whose count is a multiple of this.
pub const STORY_INTERVAL: u64 = 3;

/// Upper bound on a single turn, measured from when the session starts working on it.
pub const TURN_TIMEOUT: Duration = Duration::from_secs(300);

/// The collaborators a turn calls out to.
#[derive(Clone)]
pub struct TurnServices {
    pub recorder: Arc<dyn AudioRecorder>,
    pub transcriber: Arc<dyn Transcriber>,
    pub sentiment: Arc<dyn SentimentScorer>,
    pub stories: Arc<dyn StorySource>,
    pub geolocator: Arc<dyn Geolocator>,
    pub notifier: Arc<dyn Notifier>,
}

/// Fixed per-deployment settings for turn handling.
#[derive(Debug, Clone)]
pub struct TurnPolicy {
    pub voice_trigger: String,
    pub record_duration: Duration,
    pub detector: EscalationDetector,
    pub recipient: String,
    pub turn_timeout: Duration,
}

impl TurnPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            voice_trigger: config.speech.trigger_phrase.clone(),
            record_duration: config.speech.record_duration(),
            detector: EscalationDetector::new(&config.escalation.keywords),
            recipient: config.escalation.recipient.clone(),
            turn_timeout: TURN_TIMEOUT,
        }
    }
}

pub fn welcome_message(voice_trigger: &str) -> AssistantMessage {
    AssistantMessage::new(
        MessageKind::Welcome,
        format!(
            "Welcome. I'm here to listen, support, and guide you through whatever you're feeling. \
             Share what's on your mind, there's no judgment here.\n\
             You can also record a voice message by typing '{}'. Take your time. I'm here when you're ready.",
            voice_trigger
        ),
    )
}

pub fn story_message(mood: Mood, story: &str) -> String {
    format!(
        "I understand that you're in a {} mood. Here's a motivational story for you:\n\n{}",
        mood, story
    )
}

/// Runs one user turn against an explicit session.
pub struct TurnHandler {
    services: TurnServices,
    policy: TurnPolicy,
}

impl TurnHandler {
    pub fn new(services: TurnServices, policy: TurnPolicy) -> Self {
        Self { services, policy }
    }

    pub fn policy(&self) -> &TurnPolicy {
        &self.policy
    }

    /// Processes `content` for `session`. Never fails: any error ends the turn with an
    /// error message appended to whatever was already sent.
    #[instrument(skip(self, session, content), fields(session_id = %session.id))]
    pub async fn handle(&self, session: &mut Session, content: String) -> TurnOutcome {
        let mut outcome = TurnOutcome {
            messages: Vec::new(),
            mood: None,
            escalation: EscalationOutcome::NotTriggered,
        };

        let result = match timeout(
            self.policy.turn_timeout,
            self.run_turn(session, content, &mut outcome),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(AppError::Timeout(format!(
                "turn did not finish within {:?}",
                self.policy.turn_timeout
            ))),
        };
        if let Err(e) = result {
            error!("Error processing user message: {}", e);
            outcome.messages.push(AssistantMessage::new(
                MessageKind::Error,
                format!("An error occurred: {}", e),
            ));
        }
        outcome
    }

    async fn run_turn(
        &self,
        session: &mut Session,
        content: String,
        outcome: &mut TurnOutcome,
    ) -> Result<(), AppError> {
        // --- Input (typed or transcribed) ---
        let message = if content == self.policy.voice_trigger {
            info!("Voice trigger received, recording");
            let clip = self
                .services
                .recorder
                .record(self.policy.record_duration)
                .await?;
            self.services.transcriber.transcribe(&clip).await?
        } else {
            content
        };
        session.transcript.push(message.clone());
        let full_conversation = session.full_conversation();

        // --- Escalation ---
        outcome.escalation = self.escalate(&message, &full_conversation).await;

        // --- Mood ---
        let polarity = self.services.sentiment.polarity(&full_conversation).await?;
        let mood = Mood::from_polarity(polarity);
        outcome.mood = Some(mood);
        info!(polarity, %mood, "Mood detected");

        // --- Motivational story ---
        session.query_count += 1;
        if session.query_count % STORY_INTERVAL == 0 {
            let story = self.fetch_story(mood).await;
            outcome
                .messages
                .push(AssistantMessage::new(MessageKind::Story, story_message(mood, &story)));
        }

        // --- Answer ---
        let answer = session.pipeline.answer(message).await?;
        outcome
            .messages
            .push(AssistantMessage::new(MessageKind::Answer, answer));
        Ok(())
    }

    async fn escalate(&self, message: &str, full_conversation: &str) -> EscalationOutcome {
        let Some(keyword) = self.policy.detector.detect(message) else {
            return EscalationOutcome::NotTriggered;
        };
        let keyword = keyword.to_string();
        warn!(%keyword, "Escalation keyword detected");

        let location = match self.services.geolocator.locate().await {
            Ok(location) => Some(location),
            Err(e) => {
                warn!("Could not fetch geolocation: {}", e);
                None
            }
        };

        let body = escalation_message(full_conversation, location.as_ref());
        match self
            .services
            .notifier
            .notify(&self.policy.recipient, &body)
            .await
        {
            Ok(()) => EscalationOutcome::Sent {
                keyword,
                with_location: location.is_some(),
            },
            Err(e) => {
                // Surfaced on the outcome; the turn itself carries on.
                error!(%keyword, "Escalation notification failed: {}", e);
                EscalationOutcome::DeliveryFailed {
                    keyword,
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn fetch_story(&self, mood: Mood) -> String {
        match self.services.stories.find_story(mood).await {
            Ok(Some(story)) => story.to_string(),
            Ok(None) => STORY_APOLOGY.to_string(),
            Err(e) => {
                warn!("Story search failed: {}", e);
                STORY_APOLOGY.to_string()
            }
        }
    }
}

/// A handle to the `SupervisorActor`.
///
/// This is the primary entry point for all conversation logic. The supervisor owns the
/// session registry; each session runs its turns in order on its own task, so a slow turn
/// only holds up later turns of the same session.
#[derive(Clone)]
pub struct SupervisorHandle {
    sender: mpsc::Sender<SupervisorMessage>,
}

impl SupervisorHandle {
    /// Spawns the supervisor with the answering pipeline new sessions are bound to.
    pub fn new(pipeline: Arc<dyn RagActor>, turns: TurnHandler) -> Self {
        let (sender, receiver) = mpsc::channel(32);
        let actor = SupervisorRunner::new(receiver, pipeline, Arc::new(turns));
        tokio::spawn(async move { actor.run().await });
        Self { sender }
    }

    async fn send(&self, msg: SupervisorMessage) -> Result<(), AppError> {
        self.sender
            .send(msg)
            .await
            .map_err(|_| AppError::Actor(ActorError::Internal("Supervisor closed".to_string())))
    }

    /// Opens a conversation and returns its id and welcome message.
    pub async fn start_session(&self) -> Result<SessionStarted, AppError> {
        let (send, recv) = oneshot::channel();
        self.send(SupervisorMessage::StartSession { responder: send })
            .await?;
        timeout(REGISTRY_TIMEOUT, recv).await?.map_err(|_| no_reply())?
    }

    /// Runs one turn for `session_id`.
    ///
    /// Collaborator failures, including a turn that runs past its deadline, are reported
    /// inside the returned `TurnOutcome`; an `Err` here means the session is unknown or the
    /// supervisor itself is gone.
    #[instrument(skip(self, content))]
    pub async fn process_message(
        &self,
        session_id: String,
        content: String,
    ) -> Result<TurnOutcome, AppError> {
        let (send, recv) = oneshot::channel();
        self.send(SupervisorMessage::ProcessUserMessage {
            session_id,
            content,
            responder: send,
        })
        .await?;
        // Bounded by the turn deadline inside the session task.
        recv.await.map_err(|_| no_reply())?
    }

    /// Ends a conversation and discards its transcript once queued turns have finished.
    pub async fn end_session(&self, session_id: String) -> Result<(), AppError> {
        let (send, recv) = oneshot::channel();
        self.send(SupervisorMessage::EndSession {
            session_id,
            responder: send,
        })
        .await?;
        timeout(REGISTRY_TIMEOUT, recv).await?.map_err(|_| no_reply())?
    }

    pub async fn shutdown(&self) {
        let _ = self.sender.send(SupervisorMessage::Shutdown).await;
    }
}

const REGISTRY_TIMEOUT: Duration = Duration::from_secs(5);

fn no_reply() -> AppError {
    AppError::Actor(ActorError::Internal(
        "Supervisor failed to respond".to_string(),
    ))
}

/// One queued turn for a session task.
struct TurnRequest {
    content: String,
    responder: oneshot::Sender<Result<TurnOutcome, AppError>>,
}

// --- Actor Runner ---
struct SupervisorRunner {
    receiver: mpsc::Receiver<SupervisorMessage>,
    pipeline: Arc<dyn RagActor>,
    turns: Arc<TurnHandler>,
    sessions: HashMap<String, mpsc::UnboundedSender<TurnRequest>>,
}

impl SupervisorRunner {
    fn new(
        receiver: mpsc::Receiver<SupervisorMessage>,
        pipeline: Arc<dyn RagActor>,
        turns: Arc<TurnHandler>,
    ) -> Self {
        Self {
            receiver,
            pipeline,
            turns,
            sessions: HashMap::new(),
        }
    }

    async fn run(mut self) {
        info!(
            escalation_keywords = self.turns.policy().detector.keywords().len(),
            "Supervisor started"
        );
        while let Some(msg) = self.receiver.recv().await {
            if matches!(msg, SupervisorMessage::Shutdown) {
                info!("Supervisor shutting down...");
                break;
            }
            self.handle_message(msg);
        }
        info!("Supervisor stopped with {} open sessions", self.sessions.len());
    }

    fn handle_message(&mut self, msg: SupervisorMessage) {
        match msg {
            SupervisorMessage::StartSession { responder } => {
                let session_id = uuid::Uuid::new_v4().to_string();
                let session = Session::new(session_id.clone(), self.pipeline.clone());
                self.sessions
                    .insert(session_id.clone(), spawn_session(session, self.turns.clone()));
                info!(%session_id, "Session started");
                let _ = responder.send(Ok(SessionStarted {
                    session_id,
                    welcome: welcome_message(&self.turns.policy().voice_trigger),
                }));
            }
            SupervisorMessage::ProcessUserMessage {
                session_id,
                content,
                responder,
            } => {
                let Some(worker) = self.sessions.get(&session_id) else {
                    let _ = responder.send(Err(unknown_session(&session_id)));
                    return;
                };
                if let Err(mpsc::error::SendError(request)) =
                    worker.send(TurnRequest { content, responder })
                {
                    error!(%session_id, "Session task is gone");
                    self.sessions.remove(&session_id);
                    let _ = request.responder.send(Err(AppError::Actor(
                        ActorError::Internal(format!("Session {} stopped", session_id)),
                    )));
                }
            }
            SupervisorMessage::EndSession {
                session_id,
                responder,
            } => {
                let result = match self.sessions.remove(&session_id) {
                    Some(_) => Ok(()),
                    None => Err(unknown_session(&session_id)),
                };
                let _ = responder.send(result);
            }
            SupervisorMessage::Shutdown => {}
        }
    }
}

/// Spawns the task that owns `session` and runs its turns in arrival order. The task ends
/// once the supervisor drops the sender and every queued turn has been answered.
fn spawn_session(
    mut session: Session,
    turns: Arc<TurnHandler>,
) -> mpsc::UnboundedSender<TurnRequest> {
    let (sender, mut receiver) = mpsc::unbounded_channel::<TurnRequest>();
    tokio::spawn(async move {
        while let Some(TurnRequest { content, responder }) = receiver.recv().await {
            let outcome = turns.handle(&mut session, content).await;
            info!(
                session_id = %session.id,
                turn = session.query_count,
                escalated = outcome.escalation.triggered(),
                "Turn completed"
            );
            let _ = responder.send(Ok(outcome));
        }
        info!(
            session_id = %session.id,
            turns = session.query_count,
            "Session ended"
        );
    });
    sender
}

fn unknown_session(session_id: &str) -> AppError {
    AppError::Validation(format!("Unknown session: {}", session_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::VaderSentiment;
    use crate::models::{LocationRecord, Story};
    use crate::services::speech::AudioClip;
    use async_trait::async_trait;
    use std::sync::Mutex;

    // --- Mock Collaborators ---

    struct EchoRag;

    #[async_trait]
    impl RagActor for EchoRag {
        async fn answer(&self, query: String) -> Result<String, AppError> {
            Ok(format!("answer to: {}", query))
        }
    }

    struct SilentRecorder;

    #[async_trait]
    impl AudioRecorder for SilentRecorder {
        async fn record(&self, duration: Duration) -> Result<AudioClip, AppError> {
            let len = (duration.as_secs() * 16_000) as usize;
            Ok(AudioClip::new(vec![0; len], 16_000))
        }
    }

    struct FixedTranscriber(&'static str);

    #[async_trait]
    impl Transcriber for FixedTranscriber {
        async fn transcribe(&self, _clip: &AudioClip) -> Result<String, AppError> {
            Ok(self.0.to_string())
        }
    }

    struct NoStories;

    #[async_trait]
    impl StorySource for NoStories {
        async fn find_story(&self, _mood: Mood) -> Result<Option<Story>, AppError> {
            Ok(None)
        }
    }

    struct NowhereGeolocator;

    #[async_trait]
    impl Geolocator for NowhereGeolocator {
        async fn locate(&self) -> Result<LocationRecord, AppError> {
            Err(AppError::Http("offline".to_string()))
        }
    }

    #[derive(Default)]
    struct CountingNotifier {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Notifier for CountingNotifier {
        async fn notify(&self, recipient: &str, message: &str) -> Result<(), AppError> {
            self.sent
                .lock()
                .unwrap()
                .push((recipient.to_string(), message.to_string()));
            Ok(())
        }
    }

    fn handler(notifier: Arc<CountingNotifier>) -> TurnHandler {
        let services = TurnServices {
            recorder: Arc::new(SilentRecorder),
            transcriber: Arc::new(FixedTranscriber("I cannot stop crying")),
            sentiment: Arc::new(VaderSentiment::new()),
            stories: Arc::new(NoStories),
            geolocator: Arc::new(NowhereGeolocator),
            notifier,
        };
        TurnHandler::new(services, TurnPolicy::from_config(&AppConfig::default()))
    }

    #[tokio::test]
    async fn test_supervisor_session_lifecycle() {
        let notifier = Arc::new(CountingNotifier::default());
        let handle = SupervisorHandle::new(Arc::new(EchoRag), handler(notifier));

        let started = handle.start_session().await.unwrap();
        assert_eq!(started.welcome.kind, MessageKind::Welcome);
        assert!(started.welcome.content.contains("'record voice'"));

        let outcome = handle
            .process_message(started.session_id.clone(), "Hello".to_string())
            .await
            .unwrap();
        assert_eq!(outcome.answer(), Some("answer to: Hello"));

        handle.end_session(started.session_id.clone()).await.unwrap();
        let after_end = handle
            .process_message(started.session_id, "Still there?".to_string())
            .await;
        assert!(matches!(after_end, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_sessions_do_not_share_state() {
        let notifier = Arc::new(CountingNotifier::default());
        let handle = SupervisorHandle::new(Arc::new(EchoRag), handler(notifier));

        let first = handle.start_session().await.unwrap().session_id;
        let second = handle.start_session().await.unwrap().session_id;
        assert_ne!(first, second);

        for _ in 0..2 {
            handle
                .process_message(first.clone(), "hi".to_string())
                .await
                .unwrap();
        }
        // third turn overall, but only the first turn of this session
        let outcome = handle
            .process_message(second.clone(), "hi".to_string())
            .await
            .unwrap();
        assert!(outcome.messages.iter().all(|m| m.kind != MessageKind::Story));

        let outcome = handle.process_message(first, "hi".to_string()).await.unwrap();
        assert_eq!(outcome.messages[0].kind, MessageKind::Story);
    }

    #[tokio::test]
    async fn test_end_unknown_session() {
        let notifier = Arc::new(CountingNotifier::default());
        let handle = SupervisorHandle::new(Arc::new(EchoRag), handler(notifier));
        assert!(matches!(
            handle.end_session("missing".to_string()).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_voice_trigger_is_replaced_by_transcript() {
        let notifier = Arc::new(CountingNotifier::default());
        let turns = handler(notifier);
        let mut session = Session::new("s".to_string(), Arc::new(EchoRag));

        let outcome = turns.handle(&mut session, "record voice".to_string()).await;

        assert_eq!(session.transcript, vec!["I cannot stop crying".to_string()]);
        assert_eq!(outcome.answer(), Some("answer to: I cannot stop crying"));
    }

    #[tokio::test]
    async fn test_escalation_without_location() {
        let notifier = Arc::new(CountingNotifier::default());
        let turns = handler(notifier.clone());
        let mut session = Session::new("s".to_string(), Arc::new(EchoRag));
        session.transcript.push("I feel okay".to_string());

        let outcome = turns
            .handle(&mut session, "I want to end my life".to_string())
            .await;

        assert_eq!(
            outcome.escalation,
            EscalationOutcome::Sent {
                keyword: "end my life".to_string(),
                with_location: false,
            }
        );
        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "escalations@example.com");
        assert_eq!(sent[0].1, "I feel okay I want to end my life");
        assert!(!sent[0].1.contains("Location Information"));
    }
}
