use std::path::Path;

use async_trait::async_trait;

use crate::domain::{
    Assistant, AssistantDefinition, DomainError, Message, Role, Run, RunOptions, Thread,
};

/// The hosted assistant service: assistants, threads, messages and runs.
///
/// Implementations map transport and API failures to
/// [`DomainError::RemoteService`] and missing remote entities to
/// [`DomainError::NotFound`]. They do not retry.
#[async_trait]
pub trait AssistantApi: Send + Sync {
    async fn create_assistant(
        &self,
        definition: &AssistantDefinition,
    ) -> Result<Assistant, DomainError>;

    async fn retrieve_assistant(&self, assistant_id: &str) -> Result<Assistant, DomainError>;

    async fn create_thread(&self) -> Result<Thread, DomainError>;

    async fn create_message(
        &self,
        thread_id: &str,
        role: Role,
        content: &str,
    ) -> Result<Message, DomainError>;

    /// Lists up to `limit` messages of a thread, newest first.
    async fn list_messages(&self, thread_id: &str, limit: usize)
        -> Result<Vec<Message>, DomainError>;

    async fn create_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
        options: &RunOptions,
    ) -> Result<Run, DomainError>;

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run, DomainError>;

    /// Uploads a local file for use by assistants and returns its remote id.
    async fn upload_file(&self, path: &Path) -> Result<String, DomainError>;
}
