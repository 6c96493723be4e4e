//! Behaviour of the run lifecycle manager against the scripted mock assistant.

use std::sync::Arc;
use std::time::Duration;

use tfox::{
    DomainError, ManualClock, MockAssistantClient, MockOperation, PollPolicy, Role,
    RunLifecycleManager, RunOptions, RunStatus, Session,
};
use tokio_util::sync::CancellationToken;

struct TestEnv {
    client: Arc<MockAssistantClient>,
    clock: Arc<ManualClock>,
    manager: RunLifecycleManager,
}

fn setup(client: MockAssistantClient) -> TestEnv {
    setup_with_policy(client, PollPolicy::default())
}

fn setup_with_policy(client: MockAssistantClient, policy: PollPolicy) -> TestEnv {
    let client = Arc::new(client.with_assistant("asst_1"));
    let clock = Arc::new(ManualClock::new());
    let manager =
        RunLifecycleManager::new(client.clone(), clock.clone()).with_poll_policy(policy);
    TestEnv {
        client,
        clock,
        manager,
    }
}

#[tokio::test]
async fn run_observes_messages_in_call_order() {
    let env = setup(MockAssistantClient::new());
    let session = env.manager.connect_assistant("asst_1").await.unwrap();
    let session = env.manager.create_thread(&session).await.unwrap();

    let mut session = session;
    for text in ["first", "second", "third"] {
        let (next, message) = env
            .manager
            .add_message(&session, text, Role::User)
            .await
            .unwrap();
        assert_eq!(message.content(), text);
        session = next;
    }

    let session = env
        .manager
        .start_run(&session, &RunOptions::default())
        .await
        .unwrap();
    let run_id = session.run().unwrap().id().to_string();

    let observed = env.client.observed_messages(&run_id).await.unwrap();
    assert_eq!(observed, vec!["first", "second", "third"]);
}

#[tokio::test]
async fn add_message_creates_thread_lazily() {
    let env = setup(MockAssistantClient::new());
    let session = env.manager.connect_assistant("asst_1").await.unwrap();
    assert!(session.thread_id().is_none());

    let (session, message) = env
        .manager
        .add_message(&session, "hello", Role::User)
        .await
        .unwrap();

    assert_eq!(session.thread_id(), Some(message.thread_id()));
    assert_eq!(env.client.thread_count().await, 1);
}

#[tokio::test]
async fn create_thread_discards_previous_thread_and_run() {
    let env = setup(MockAssistantClient::new());
    let session = env.manager.connect_assistant("asst_1").await.unwrap();
    let (session, _) = env.manager.process_message(&session, "hi").await.unwrap();
    let old_thread = session.thread_id().unwrap().to_string();

    let fresh = env.manager.create_thread(&session).await.unwrap();

    assert_ne!(fresh.thread_id().unwrap(), old_thread);
    assert!(fresh.run().is_none());
}

#[tokio::test]
async fn await_completion_returns_only_on_terminal_status() {
    let env = setup(MockAssistantClient::new().with_run_statuses(vec![
        RunStatus::Queued,
        RunStatus::InProgress,
        RunStatus::InProgress,
        RunStatus::Completed,
    ]));
    let session = env.manager.connect_assistant("asst_1").await.unwrap();
    let (session, _) = env
        .manager
        .add_message(&session, "ad text", Role::User)
        .await
        .unwrap();
    let session = env
        .manager
        .start_run(&session, &RunOptions::default())
        .await
        .unwrap();
    assert_eq!(session.run().unwrap().status(), &RunStatus::Queued);

    let session = env.manager.await_completion(&session).await.unwrap();

    assert_eq!(session.run().unwrap().status(), &RunStatus::Completed);
    assert_eq!(env.client.retrieve_run_calls().await, 3);
    assert_eq!(env.clock.sleeps(), 2);
    assert_eq!(env.clock.elapsed(), Duration::from_secs(2));
}

#[tokio::test]
async fn failed_run_is_returned_as_is() {
    let env = setup(
        MockAssistantClient::new().with_run_statuses(vec![RunStatus::Queued, RunStatus::Failed]),
    );
    let session = env.manager.connect_assistant("asst_1").await.unwrap();

    let (session, response) = env.manager.process_message(&session, "ad").await.unwrap();

    assert_eq!(session.run().unwrap().status(), &RunStatus::Failed);
    assert!(response.is_none());
}

#[tokio::test]
async fn cancelled_run_is_terminal() {
    let env = setup(MockAssistantClient::new().with_run_statuses(vec![
        RunStatus::InProgress,
        RunStatus::Cancelling,
        RunStatus::Cancelled,
    ]));
    let session = env.manager.connect_assistant("asst_1").await.unwrap();

    let (session, _) = env.manager.process_message(&session, "ad").await.unwrap();

    assert_eq!(session.run().unwrap().status(), &RunStatus::Cancelled);
    assert_eq!(env.client.retrieve_run_calls().await, 2);
}

#[tokio::test]
async fn unbounded_wait_keeps_polling_at_fixed_interval() {
    let mut statuses = vec![RunStatus::Queued; 50];
    statuses.push(RunStatus::Completed);
    let env = setup_with_policy(
        MockAssistantClient::new().with_run_statuses(statuses),
        PollPolicy::new(Duration::from_millis(500)),
    );
    let session = env.manager.connect_assistant("asst_1").await.unwrap();

    let (session, response) = env.manager.process_message(&session, "ad").await.unwrap();

    assert!(session.run().unwrap().status().is_completed());
    assert!(response.is_some());
    assert_eq!(env.client.retrieve_run_calls().await, 50);
    assert_eq!(env.clock.sleeps(), 49);
    assert_eq!(env.clock.elapsed(), Duration::from_millis(24_500));
}

#[tokio::test]
async fn timeout_bounds_the_wait() {
    let env = setup_with_policy(
        MockAssistantClient::new().with_run_statuses(vec![RunStatus::Queued]),
        PollPolicy::new(Duration::from_secs(1)).with_timeout(Duration::from_secs(5)),
    );
    let session = env.manager.connect_assistant("asst_1").await.unwrap();
    let (session, _) = env
        .manager
        .add_message(&session, "ad", Role::User)
        .await
        .unwrap();
    let session = env
        .manager
        .start_run(&session, &RunOptions::default())
        .await
        .unwrap();

    let err = env.manager.await_completion(&session).await.unwrap_err();

    match err {
        DomainError::RunTimeout {
            last_status,
            waited_secs,
            ..
        } => {
            assert_eq!(last_status, "queued");
            assert_eq!(waited_secs, 5);
        }
        other => panic!("expected timeout, got {:?}", other),
    }
    assert_eq!(env.clock.sleeps(), 5);
}

#[tokio::test]
async fn cancelled_token_stops_before_polling() {
    let env = setup(MockAssistantClient::new().with_run_statuses(vec![RunStatus::Queued]));
    let session = env.manager.connect_assistant("asst_1").await.unwrap();
    let (session, _) = env
        .manager
        .add_message(&session, "ad", Role::User)
        .await
        .unwrap();
    let session = env
        .manager
        .start_run(&session, &RunOptions::default())
        .await
        .unwrap();
    let token = CancellationToken::new();
    token.cancel();

    let err = env
        .manager
        .await_completion_with_cancel(&session, &token)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(env.client.retrieve_run_calls().await, 0);
}

#[tokio::test]
async fn cancellation_interrupts_the_poll_sleep() {
    let env = setup(MockAssistantClient::new().with_run_statuses(vec![RunStatus::Queued]));
    let session = env.manager.connect_assistant("asst_1").await.unwrap();
    let (session, _) = env
        .manager
        .add_message(&session, "ad", Role::User)
        .await
        .unwrap();
    let session = env
        .manager
        .start_run(&session, &RunOptions::default())
        .await
        .unwrap();
    let token = CancellationToken::new();
    let canceller = token.clone();
    let handle = tokio::spawn(async move { canceller.cancel() });

    let err = env
        .manager
        .await_completion_with_cancel(&session, &token)
        .await
        .unwrap_err();
    handle.await.unwrap();

    assert!(err.is_cancelled());
    assert_eq!(env.client.retrieve_run_calls().await, 1);
}

#[tokio::test]
async fn last_response_is_absent_while_user_spoke_last() {
    let env = setup(MockAssistantClient::new());
    let session = env.manager.connect_assistant("asst_1").await.unwrap();
    let (session, _) = env
        .manager
        .add_message(&session, "question", Role::User)
        .await
        .unwrap();

    let response = env.manager.get_last_response(&session).await.unwrap();

    assert!(response.is_none());
}

#[tokio::test]
async fn process_message_returns_assistant_reply() {
    let env = setup(MockAssistantClient::new().with_reply("answer"));
    let session = env.manager.connect_assistant("asst_1").await.unwrap();

    let (session, response) = env.manager.process_message(&session, "question").await.unwrap();

    assert_eq!(response.as_deref(), Some("answer"));
    let messages = env.manager.get_messages(&session, 20).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role(), Role::Assistant);
    assert_eq!(messages[1].content(), "question");
}

#[tokio::test]
async fn get_messages_respects_limit_newest_first() {
    let env = setup(MockAssistantClient::new());
    let session = env.manager.connect_assistant("asst_1").await.unwrap();
    let mut session = session;
    for text in ["a", "b", "c"] {
        session = env
            .manager
            .add_message(&session, text, Role::User)
            .await
            .unwrap()
            .0;
    }

    let messages = env.manager.get_messages(&session, 2).await.unwrap();

    let contents: Vec<_> = messages.iter().map(|m| m.content()).collect();
    assert_eq!(contents, vec!["c", "b"]);
}

#[tokio::test]
async fn start_run_requires_thread_and_assistant() {
    let env = setup(MockAssistantClient::new());

    let bound = env.manager.connect_assistant("asst_1").await.unwrap();
    let err = env
        .manager
        .start_run(&bound, &RunOptions::default())
        .await
        .unwrap_err();
    assert!(err.is_precondition());

    let (unbound, _) = env
        .manager
        .add_message(&Session::new(), "hi", Role::User)
        .await
        .unwrap();
    let err = env
        .manager
        .start_run(&unbound, &RunOptions::default())
        .await
        .unwrap_err();
    assert!(err.is_precondition());
}

#[tokio::test]
async fn await_completion_requires_a_run() {
    let env = setup(MockAssistantClient::new());
    let session = env.manager.connect_assistant("asst_1").await.unwrap();
    let session = env.manager.create_thread(&session).await.unwrap();

    let err = env.manager.await_completion(&session).await.unwrap_err();

    assert!(err.is_precondition());
}

#[tokio::test]
async fn unknown_assistant_is_not_found() {
    let env = setup(MockAssistantClient::new());

    let err = env.manager.connect_assistant("asst_missing").await.unwrap_err();

    assert!(err.is_not_found());
}

#[tokio::test]
async fn remote_failure_propagates_from_add_message() {
    let env = setup(MockAssistantClient::new().failing_on(MockOperation::CreateMessage));
    let session = env.manager.connect_assistant("asst_1").await.unwrap();

    let err = env
        .manager
        .add_message(&session, "hi", Role::User)
        .await
        .unwrap_err();

    assert!(err.is_remote());
}

#[tokio::test]
async fn sessions_are_independent() {
    let env = setup(MockAssistantClient::new());
    let base = env.manager.connect_assistant("asst_1").await.unwrap();

    let (first, _) = env.manager.process_message(&base, "one").await.unwrap();
    let (second, _) = env.manager.process_message(&base, "two").await.unwrap();

    assert_ne!(first.thread_id(), second.thread_id());
    assert!(base.thread_id().is_none());
    assert_eq!(env.client.thread_count().await, 2);
}

#[tokio::test]
async fn create_assistant_binds_new_assistant() {
    let env = setup(MockAssistantClient::new());
    let definition = tfox::AssistantDefinition::new("classifier", "Return JSON");

    let session = env.manager.create_assistant(&definition).await.unwrap();

    let assistant = session.assistant().unwrap();
    assert_eq!(assistant.name(), Some("classifier"));
    assert_eq!(assistant.instructions(), Some("Return JSON"));
    let reconnected = env.manager.connect_assistant(assistant.id()).await.unwrap();
    assert_eq!(reconnected.assistant(), session.assistant());
}

#[tokio::test]
async fn upload_file_returns_remote_id() {
    let env = setup(MockAssistantClient::new());
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("examples.txt");
    std::fs::write(&path, "იყიდება").unwrap();

    let file_id = env.manager.upload_file(&path).await.unwrap();

    assert!(file_id.starts_with("file_"));
}
