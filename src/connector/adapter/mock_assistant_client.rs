use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::application::AssistantApi;
use crate::domain::{
    Assistant, AssistantDefinition, DomainError, Message, Role, Run, RunOptions, RunStatus, Thread,
};

/// Produces the assistant's reply from the thread history (oldest first) that
/// the run saw when it was created. `None` means no reply is posted.
pub type Responder = Arc<dyn Fn(&[Message]) -> Option<String> + Send + Sync>;

/// Operations of [`MockAssistantClient`] that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    CreateAssistant,
    RetrieveAssistant,
    CreateThread,
    CreateMessage,
    ListMessages,
    CreateRun,
    RetrieveRun,
    UploadFile,
}

struct MockRun {
    run: Run,
    /// Statuses still to be reported; the last one sticks.
    pending: Vec<RunStatus>,
    observed: Vec<Message>,
    replied: bool,
}

#[derive(Default)]
struct MockState {
    next_id: u64,
    clock: i64,
    assistants: HashMap<String, Assistant>,
    threads: HashMap<String, Vec<Message>>,
    runs: HashMap<String, MockRun>,
    retrieve_calls: usize,
}

impl MockState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}_{}", prefix, self.next_id)
    }

    fn tick(&mut self) -> i64 {
        self.clock += 1;
        self.clock
    }
}

/// In-process stand-in for the hosted assistant service.
///
/// Runs walk through a scripted list of statuses, one per status fetch. When a
/// run reaches `completed` the responder's reply is appended to the thread as
/// an assistant message. The default responder echoes the newest user
/// message back as a classification with status `unknown`.
pub struct MockAssistantClient {
    state: Mutex<MockState>,
    script: Vec<RunStatus>,
    responder: Responder,
    failing: HashSet<MockOperation>,
}

impl MockAssistantClient {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            script: vec![RunStatus::Completed],
            responder: Arc::new(echo_classification),
            failing: HashSet::new(),
        }
    }

    pub fn with_assistant(mut self, assistant_id: impl Into<String>) -> Self {
        let id = assistant_id.into();
        let assistant = Assistant::new(id.clone(), "mock-assistant").with_name("mock");
        self.state.get_mut().assistants.insert(id, assistant);
        self
    }

    /// Statuses reported for every run: the first at creation, then one per
    /// status fetch. The last status repeats forever.
    pub fn with_run_statuses(mut self, statuses: Vec<RunStatus>) -> Self {
        if !statuses.is_empty() {
            self.script = statuses;
        }
        self
    }

    pub fn with_responder(mut self, responder: Responder) -> Self {
        self.responder = responder;
        self
    }

    /// Replies with the same text to every run.
    pub fn with_reply(self, reply: impl Into<String>) -> Self {
        let reply = reply.into();
        self.with_responder(Arc::new(move |_| Some(reply.clone())))
    }

    pub fn failing_on(mut self, operation: MockOperation) -> Self {
        self.failing.insert(operation);
        self
    }

    /// Message contents a run saw when it was created, oldest first.
    pub async fn observed_messages(&self, run_id: &str) -> Option<Vec<String>> {
        let state = self.state.lock().await;
        state.runs.get(run_id).map(|r| {
            r.observed
                .iter()
                .map(|m| m.content().to_string())
                .collect()
        })
    }

    pub async fn retrieve_run_calls(&self) -> usize {
        self.state.lock().await.retrieve_calls
    }

    pub async fn thread_count(&self) -> usize {
        self.state.lock().await.threads.len()
    }

    pub async fn thread_messages(&self, thread_id: &str) -> Vec<Message> {
        let state = self.state.lock().await;
        state.threads.get(thread_id).cloned().unwrap_or_default()
    }

    fn check(&self, operation: MockOperation) -> Result<(), DomainError> {
        if self.failing.contains(&operation) {
            return Err(DomainError::remote(format!(
                "mock: {:?} failed",
                operation
            )));
        }
        Ok(())
    }

    /// Applies the next scripted status and posts the reply on completion.
    fn advance(&self, state: &mut MockState, run_id: &str) -> Option<Run> {
        let now = state.tick();
        let reply_id = state.next_id("msg");

        let mock_run = state.runs.get_mut(run_id)?;
        if mock_run.pending.len() > 1 {
            mock_run.pending.remove(0);
        }
        let status = mock_run.pending[0].clone();
        let run = Run::new(
            mock_run.run.id(),
            mock_run.run.thread_id(),
            mock_run.run.assistant_id(),
            status,
        );
        mock_run.run = run.clone();

        if run.status().is_completed() && !mock_run.replied {
            mock_run.replied = true;
            if let Some(text) = (self.responder)(&mock_run.observed) {
                let message = Message::new(reply_id, run.thread_id(), Role::Assistant, text, now);
                state
                    .threads
                    .entry(run.thread_id().to_string())
                    .or_default()
                    .push(message);
            }
        }

        Some(run)
    }
}

impl Default for MockAssistantClient {
    fn default() -> Self {
        Self::new()
    }
}

fn echo_classification(history: &[Message]) -> Option<String> {
    let text = history
        .iter()
        .rev()
        .find(|m| m.role() == Role::User)
        .map(|m| m.content().trim().to_string())
        .unwrap_or_default();
    Some(
        serde_json::json!({
            "translated_text": text,
            "status": "unknown",
        })
        .to_string(),
    )
}

#[async_trait]
impl AssistantApi for MockAssistantClient {
    async fn create_assistant(
        &self,
        definition: &AssistantDefinition,
    ) -> Result<Assistant, DomainError> {
        self.check(MockOperation::CreateAssistant)?;
        let mut state = self.state.lock().await;
        let id = state.next_id("asst");
        let assistant = Assistant::new(id.clone(), definition.model())
            .with_name(definition.name())
            .with_instructions(definition.instructions())
            .with_tools(definition.tools().to_vec());
        state.assistants.insert(id, assistant.clone());
        Ok(assistant)
    }

    async fn retrieve_assistant(&self, assistant_id: &str) -> Result<Assistant, DomainError> {
        self.check(MockOperation::RetrieveAssistant)?;
        let state = self.state.lock().await;
        state
            .assistants
            .get(assistant_id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("assistant {}", assistant_id)))
    }

    async fn create_thread(&self) -> Result<Thread, DomainError> {
        self.check(MockOperation::CreateThread)?;
        let mut state = self.state.lock().await;
        let id = state.next_id("thread");
        let now = state.tick();
        state.threads.insert(id.clone(), Vec::new());
        Ok(Thread::new(id, now))
    }

    async fn create_message(
        &self,
        thread_id: &str,
        role: Role,
        content: &str,
    ) -> Result<Message, DomainError> {
        self.check(MockOperation::CreateMessage)?;
        let mut state = self.state.lock().await;
        let id = state.next_id("msg");
        let now = state.tick();
        let messages = state
            .threads
            .get_mut(thread_id)
            .ok_or_else(|| DomainError::not_found(format!("thread {}", thread_id)))?;
        let message = Message::new(id, thread_id, role, content, now);
        messages.push(message.clone());
        Ok(message)
    }

    async fn list_messages(
        &self,
        thread_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>, DomainError> {
        self.check(MockOperation::ListMessages)?;
        let state = self.state.lock().await;
        let messages = state
            .threads
            .get(thread_id)
            .ok_or_else(|| DomainError::not_found(format!("thread {}", thread_id)))?;
        Ok(messages.iter().rev().take(limit).cloned().collect())
    }

    async fn create_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
        _options: &RunOptions,
    ) -> Result<Run, DomainError> {
        self.check(MockOperation::CreateRun)?;
        let mut state = self.state.lock().await;
        if !state.assistants.contains_key(assistant_id) {
            return Err(DomainError::not_found(format!("assistant {}", assistant_id)));
        }
        let observed = state
            .threads
            .get(thread_id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("thread {}", thread_id)))?;

        let id = state.next_id("run");
        // `advance` pops the head, so seed with a placeholder in front.
        let mut pending = vec![RunStatus::Queued];
        pending.extend(self.script.iter().cloned());
        state.runs.insert(
            id.clone(),
            MockRun {
                run: Run::new(id.clone(), thread_id, assistant_id, RunStatus::Queued),
                pending,
                observed,
                replied: false,
            },
        );
        debug!("mock: created run {} on {}", id, thread_id);

        self.advance(&mut state, &id)
            .ok_or_else(|| DomainError::internal(format!("mock: run {} vanished", id)))
    }

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run, DomainError> {
        self.check(MockOperation::RetrieveRun)?;
        let mut state = self.state.lock().await;
        state.retrieve_calls += 1;
        let belongs = state
            .runs
            .get(run_id)
            .is_some_and(|r| r.run.thread_id() == thread_id);
        if !belongs {
            return Err(DomainError::not_found(format!(
                "run {} in thread {}",
                run_id, thread_id
            )));
        }
        self.advance(&mut state, run_id)
            .ok_or_else(|| DomainError::not_found(format!("run {}", run_id)))
    }

    async fn upload_file(&self, path: &Path) -> Result<String, DomainError> {
        self.check(MockOperation::UploadFile)?;
        if !path.exists() {
            return Err(DomainError::invalid_input(format!(
                "No such file: {}",
                path.display()
            )));
        }
        let mut state = self.state.lock().await;
        Ok(state.next_id("file"))
    }
}
