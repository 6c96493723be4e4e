use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::application::{AssistantApi, PollClock};
use crate::domain::{AssistantDefinition, DomainError, Message, Role, RunOptions, Session};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_MESSAGE_LIMIT: usize = 20;

/// How often run status is re-fetched and for how long.
///
/// With no timeout the wait is unbounded: a run that never reaches a terminal
/// status blocks its caller until cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    interval: Duration,
    timeout: Option<Duration>,
}

impl PollPolicy {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

/// Drives assistant conversations: threads, messages, runs and the wait for a
/// run to finish.
///
/// The manager itself holds no conversation state. Each operation receives the
/// current [`Session`] and returns the next one, so a single manager can serve
/// any number of independent sessions.
pub struct RunLifecycleManager {
    api: Arc<dyn AssistantApi>,
    clock: Arc<dyn PollClock>,
    poll: PollPolicy,
}

impl RunLifecycleManager {
    pub fn new(api: Arc<dyn AssistantApi>, clock: Arc<dyn PollClock>) -> Self {
        Self {
            api,
            clock,
            poll: PollPolicy::default(),
        }
    }

    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    pub fn poll_policy(&self) -> PollPolicy {
        self.poll
    }

    /// Binds to an existing remote assistant.
    pub async fn connect_assistant(&self, assistant_id: &str) -> Result<Session, DomainError> {
        let assistant = self.api.retrieve_assistant(assistant_id).await?;
        debug!("Connected to assistant {} ({})", assistant.id(), assistant.model());
        Ok(Session::for_assistant(assistant))
    }

    pub async fn create_assistant(
        &self,
        definition: &AssistantDefinition,
    ) -> Result<Session, DomainError> {
        let assistant = self.api.create_assistant(definition).await?;
        info!("Created assistant {} ({})", assistant.id(), definition.name());
        Ok(Session::for_assistant(assistant))
    }

    /// Starts a fresh thread. Any previously active thread is forgotten.
    pub async fn create_thread(&self, session: &Session) -> Result<Session, DomainError> {
        let thread = self.api.create_thread().await?;
        debug!("Created thread {}", thread.id());
        Ok(session.with_thread(thread.id()))
    }

    /// Appends a message to the active thread, creating the thread first when
    /// the session has none.
    pub async fn add_message(
        &self,
        session: &Session,
        content: &str,
        role: Role,
    ) -> Result<(Session, Message), DomainError> {
        let session = if session.has_thread() {
            session.clone()
        } else {
            self.create_thread(session).await?
        };
        let thread_id = session.require_thread()?;

        let message = self.api.create_message(thread_id, role, content).await?;
        debug!("Added {} message {} to thread {}", role, message.id(), thread_id);
        Ok((session, message))
    }

    pub async fn start_run(
        &self,
        session: &Session,
        options: &RunOptions,
    ) -> Result<Session, DomainError> {
        let assistant = session.require_assistant()?;
        let thread_id = session.require_thread()?;

        let run = self
            .api
            .create_run(thread_id, assistant.id(), options)
            .await?;
        debug!("Started run {} on thread {} ({})", run.id(), thread_id, run.status());
        Ok(session.with_run(run))
    }

    /// Polls the tracked run until it reaches a terminal status. A failed or
    /// cancelled run is returned like a completed one.
    pub async fn await_completion(&self, session: &Session) -> Result<Session, DomainError> {
        self.await_completion_with_cancel(session, &CancellationToken::new())
            .await
    }

    /// Same as [`Self::await_completion`], but gives up with
    /// [`DomainError::Cancelled`] once `cancel` fires and with
    /// [`DomainError::RunTimeout`] when the poll policy has a timeout. The
    /// remote run is left alone in both cases.
    pub async fn await_completion_with_cancel(
        &self,
        session: &Session,
        cancel: &CancellationToken,
    ) -> Result<Session, DomainError> {
        let thread_id = session.require_thread()?;
        let run_id = session.require_run()?.id().to_string();
        let started = self.clock.now();

        loop {
            if cancel.is_cancelled() {
                return Err(DomainError::cancelled(format!("wait for run {}", run_id)));
            }

            let run = self.api.retrieve_run(thread_id, &run_id).await?;
            if run.is_terminal() {
                info!("Run {} finished with status {}", run_id, run.status());
                return Ok(session.with_run(run));
            }
            debug!("Run {} is {}", run_id, run.status());

            if let Some(timeout) = self.poll.timeout() {
                let waited = self.clock.now().saturating_duration_since(started);
                if waited >= timeout {
                    return Err(DomainError::RunTimeout {
                        run_id,
                        last_status: run.status().to_string(),
                        waited_secs: waited.as_secs(),
                    });
                }
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(DomainError::cancelled(format!("wait for run {}", run_id)));
                }
                _ = self.clock.sleep(self.poll.interval()) => {}
            }
        }
    }

    /// Up to `limit` messages of the active thread, newest first.
    pub async fn get_messages(
        &self,
        session: &Session,
        limit: usize,
    ) -> Result<Vec<Message>, DomainError> {
        let thread_id = session.require_thread()?;
        self.api.list_messages(thread_id, limit).await
    }

    /// Text of the newest message if the assistant wrote it. `None` means the
    /// assistant has not replied yet.
    pub async fn get_last_response(&self, session: &Session) -> Result<Option<String>, DomainError> {
        let messages = self.get_messages(session, 1).await?;
        Ok(messages
            .into_iter()
            .next()
            .filter(|m| m.is_from_assistant())
            .map(|m| m.content().to_string()))
    }

    /// Sends `text` as a user message, runs the assistant, waits for the run
    /// and returns its reply.
    pub async fn process_message(
        &self,
        session: &Session,
        text: &str,
    ) -> Result<(Session, Option<String>), DomainError> {
        let (session, _) = self.add_message(session, text, Role::User).await?;
        let session = self.start_run(&session, &RunOptions::default()).await?;
        let session = self.await_completion(&session).await?;
        let response = self.get_last_response(&session).await?;
        Ok((session, response))
    }

    pub async fn upload_file(&self, path: &Path) -> Result<String, DomainError> {
        let file_id = self.api.upload_file(path).await?;
        info!("Uploaded {} as {}", path.display(), file_id);
        Ok(file_id)
    }
}
