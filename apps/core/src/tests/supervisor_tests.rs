use super::mocks::{GatedRag, Harness, MockRag};
use crate::actors::messages::AppError;
use crate::actors::supervisor::SupervisorHandle;
use crate::models::{EscalationOutcome, MessageKind};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::time::{timeout, Duration};

fn spawn_supervisor(harness: &Harness, rag: &Arc<MockRag>) -> SupervisorHandle {
    SupervisorHandle::new(rag.clone(), harness.handler())
}

#[tokio::test]
async fn test_start_session_returns_welcome() {
    let harness = Harness::new();
    let rag = Arc::new(MockRag::default());
    let supervisor = spawn_supervisor(&harness, &rag);

    let started = supervisor.start_session().await.unwrap();

    assert!(uuid::Uuid::parse_str(&started.session_id).is_ok());
    assert_eq!(started.welcome.kind, MessageKind::Welcome);
    assert!(started.welcome.content.contains("record voice"));
}

#[tokio::test]
async fn test_unknown_session_is_rejected() {
    let harness = Harness::new();
    let rag = Arc::new(MockRag::default());
    let supervisor = spawn_supervisor(&harness, &rag);

    let result = supervisor
        .process_message("no-such-session".to_string(), "Hello".to_string())
        .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
    assert!(rag.queries.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_ended_session_no_longer_accepts_turns() {
    let harness = Harness::new();
    let rag = Arc::new(MockRag::default());
    let supervisor = spawn_supervisor(&harness, &rag);
    let id = supervisor.start_session().await.unwrap().session_id;

    supervisor
        .process_message(id.clone(), "Hello".to_string())
        .await
        .unwrap();
    supervisor.end_session(id.clone()).await.unwrap();

    assert!(matches!(
        supervisor.process_message(id.clone(), "Hello?".to_string()).await,
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        supervisor.end_session(id).await,
        Err(AppError::Validation(_))
    ));
}

#[tokio::test]
async fn test_sessions_keep_separate_counters() {
    let harness = Harness::new();
    let rag = Arc::new(MockRag::default());
    let supervisor = spawn_supervisor(&harness, &rag);
    let a = supervisor.start_session().await.unwrap().session_id;
    let b = supervisor.start_session().await.unwrap().session_id;

    for text in ["one", "two"] {
        supervisor.process_message(a.clone(), text.to_string()).await.unwrap();
    }
    let b_first = supervisor.process_message(b.clone(), "hi".to_string()).await.unwrap();
    let a_third = supervisor.process_message(a.clone(), "three".to_string()).await.unwrap();

    assert!(b_first.messages.iter().all(|m| m.kind != MessageKind::Story));
    assert_eq!(a_third.messages[0].kind, MessageKind::Story);
}

#[tokio::test]
async fn test_escalation_only_sees_own_transcript() {
    let harness = Harness::new();
    let rag = Arc::new(MockRag::default());
    let supervisor = spawn_supervisor(&harness, &rag);
    let calm = supervisor.start_session().await.unwrap().session_id;
    let at_risk = supervisor.start_session().await.unwrap().session_id;

    supervisor
        .process_message(calm.clone(), "The weather is nice".to_string())
        .await
        .unwrap();
    supervisor
        .process_message(at_risk.clone(), "Nobody would notice".to_string())
        .await
        .unwrap();
    let outcome = supervisor
        .process_message(at_risk, "I want to kill myself".to_string())
        .await
        .unwrap();

    assert!(outcome.escalation.triggered());
    let body = harness.notifier.last_body().unwrap();
    assert!(body.starts_with("Nobody would notice I want to kill myself"));
    assert!(!body.contains("weather"));
}

#[tokio::test]
async fn test_turn_failures_do_not_end_session() {
    let harness = Harness::new();
    harness.notifier.fail.store(true, Ordering::SeqCst);
    let rag = Arc::new(MockRag::default());
    rag.fail.store(true, Ordering::SeqCst);
    let supervisor = spawn_supervisor(&harness, &rag);
    let id = supervisor.start_session().await.unwrap().session_id;

    let outcome = supervisor
        .process_message(id.clone(), "I think about suicide".to_string())
        .await
        .unwrap();
    assert!(matches!(
        outcome.escalation,
        EscalationOutcome::DeliveryFailed { .. }
    ));
    assert_eq!(outcome.messages.last().unwrap().kind, MessageKind::Error);

    rag.fail.store(false, Ordering::SeqCst);
    let outcome = supervisor
        .process_message(id, "Thank you".to_string())
        .await
        .unwrap();
    assert_eq!(outcome.answer(), Some("answer to: Thank you"));
}

#[tokio::test]
async fn test_shutdown_closes_handle() {
    let harness = Harness::new();
    let rag = Arc::new(MockRag::default());
    let supervisor = spawn_supervisor(&harness, &rag);

    supervisor.shutdown().await;

    let result = timeout(Duration::from_secs(2), supervisor.start_session())
        .await
        .expect("start_session should fail fast after shutdown");
    assert!(matches!(result, Err(AppError::Actor(_))));
}

#[tokio::test]
async fn test_slow_turn_does_not_hold_up_other_sessions() {
    let harness = Harness::new();
    let rag = Arc::new(GatedRag::default());
    let supervisor = SupervisorHandle::new(rag.clone(), harness.handler());
    let slow = supervisor.start_session().await.unwrap().session_id;
    let fast = supervisor.start_session().await.unwrap().session_id;

    let pending = tokio::spawn({
        let supervisor = supervisor.clone();
        async move { supervisor.process_message(slow, "wait".to_string()).await }
    });

    let outcome = timeout(
        Duration::from_secs(2),
        supervisor.process_message(fast, "hello".to_string()),
    )
    .await
    .expect("other session should not wait for the slow turn")
    .unwrap();
    assert_eq!(outcome.answer(), Some("answer to: hello"));
    assert!(!pending.is_finished());

    rag.gate.notify_one();
    let outcome = timeout(Duration::from_secs(2), pending)
        .await
        .expect("slow turn should finish once released")
        .unwrap()
        .unwrap();
    assert_eq!(outcome.answer(), Some("answer to: wait"));
}

#[tokio::test]
async fn test_turn_past_deadline_reports_error_and_session_continues() {
    let harness = Harness::new();
    let mut policy = Harness::policy();
    policy.turn_timeout = Duration::from_millis(50);
    let rag = Arc::new(GatedRag::default());
    let supervisor = SupervisorHandle::new(rag.clone(), harness.handler_with(policy));
    let id = supervisor.start_session().await.unwrap().session_id;

    let outcome = supervisor
        .process_message(id.clone(), "wait".to_string())
        .await
        .unwrap();
    let last = outcome.messages.last().unwrap();
    assert_eq!(last.kind, MessageKind::Error);
    assert!(last.content.contains("timed out"), "{}", last.content);
    assert_eq!(outcome.answer(), None);

    let outcome = supervisor
        .process_message(id, "hello".to_string())
        .await
        .unwrap();
    assert_eq!(outcome.answer(), Some("answer to: hello"));
}

#[tokio::test]
async fn test_turns_within_a_session_keep_their_order() {
    let harness = Harness::new();
    let rag = Arc::new(GatedRag::default());
    let supervisor = SupervisorHandle::new(rag.clone(), harness.handler());
    let id = supervisor.start_session().await.unwrap().session_id;

    let first = tokio::spawn({
        let supervisor = supervisor.clone();
        let id = id.clone();
        async move { supervisor.process_message(id, "wait".to_string()).await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    let second = tokio::spawn({
        let supervisor = supervisor.clone();
        async move { supervisor.process_message(id, "after".to_string()).await }
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!second.is_finished());

    rag.gate.notify_one();
    let first = first.await.unwrap().unwrap();
    let second = second.await.unwrap().unwrap();
    assert_eq!(first.answer(), Some("answer to: wait"));
    assert_eq!(second.answer(), Some("answer to: after"));
}
