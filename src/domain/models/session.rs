use super::{Assistant, Run};
use crate::domain::DomainError;

/// Snapshot of one assistant conversation: the bound assistant, the active
/// thread and the run currently being tracked.
///
/// Sessions are values. Lifecycle operations take a `&Session` and hand back
/// a new one instead of mutating shared state, so two conversations never
/// race on "current run" bookkeeping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    assistant: Option<Assistant>,
    thread_id: Option<String>,
    run: Option<Run>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_assistant(assistant: Assistant) -> Self {
        Self {
            assistant: Some(assistant),
            thread_id: None,
            run: None,
        }
    }

    /// Binds a new active thread. The previously tracked run belonged to the
    /// old thread and is dropped.
    pub fn with_thread(&self, thread_id: impl Into<String>) -> Self {
        Self {
            assistant: self.assistant.clone(),
            thread_id: Some(thread_id.into()),
            run: None,
        }
    }

    pub fn with_run(&self, run: Run) -> Self {
        Self {
            assistant: self.assistant.clone(),
            thread_id: self.thread_id.clone(),
            run: Some(run),
        }
    }

    pub fn assistant(&self) -> Option<&Assistant> {
        self.assistant.as_ref()
    }

    pub fn thread_id(&self) -> Option<&str> {
        self.thread_id.as_deref()
    }

    pub fn run(&self) -> Option<&Run> {
        self.run.as_ref()
    }

    pub fn has_thread(&self) -> bool {
        self.thread_id.is_some()
    }

    pub fn require_assistant(&self) -> Result<&Assistant, DomainError> {
        self.assistant
            .as_ref()
            .ok_or_else(|| DomainError::precondition("no assistant is bound to the session"))
    }

    pub fn require_thread(&self) -> Result<&str, DomainError> {
        self.thread_id
            .as_deref()
            .ok_or_else(|| DomainError::precondition("no active thread in the session"))
    }

    pub fn require_run(&self) -> Result<&Run, DomainError> {
        self.run
            .as_ref()
            .ok_or_else(|| DomainError::precondition("no run has been started in the session"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RunStatus;

    #[test]
    fn empty_session_fails_preconditions() {
        let session = Session::new();

        assert!(session.require_assistant().unwrap_err().is_precondition());
        assert!(session.require_thread().unwrap_err().is_precondition());
        assert!(session.require_run().unwrap_err().is_precondition());
    }

    #[test]
    fn new_thread_drops_tracked_run() {
        let session = Session::for_assistant(Assistant::new("asst_1", "gpt-4o"))
            .with_thread("thread_1")
            .with_run(Run::new("run_1", "thread_1", "asst_1", RunStatus::Queued));
        assert!(session.run().is_some());

        let next = session.with_thread("thread_2");

        assert_eq!(next.thread_id(), Some("thread_2"));
        assert!(next.run().is_none());
        assert_eq!(next.assistant().map(|a| a.id()), Some("asst_1"));
        // the original value is untouched
        assert_eq!(session.thread_id(), Some("thread_1"));
        assert!(session.run().is_some());
    }
}
