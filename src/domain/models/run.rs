use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle status of a run as reported by the remote service.
///
/// Only `Completed`, `Failed` and `Cancelled` are terminal. Every other status,
/// including ones this crate does not know about, is treated as still moving.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Failed,
    Completed,
    Incomplete,
    Expired,
    Other(String),
}

impl RunStatus {
    pub fn as_str(&self) -> &str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::InProgress => "in_progress",
            RunStatus::RequiresAction => "requires_action",
            RunStatus::Cancelling => "cancelling",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Failed => "failed",
            RunStatus::Completed => "completed",
            RunStatus::Incomplete => "incomplete",
            RunStatus::Expired => "expired",
            RunStatus::Other(s) => s,
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "queued" => RunStatus::Queued,
            "in_progress" => RunStatus::InProgress,
            "requires_action" => RunStatus::RequiresAction,
            "cancelling" => RunStatus::Cancelling,
            "cancelled" => RunStatus::Cancelled,
            "failed" => RunStatus::Failed,
            "completed" => RunStatus::Completed,
            "incomplete" => RunStatus::Incomplete,
            "expired" => RunStatus::Expired,
            other => RunStatus::Other(other.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled
        )
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, RunStatus::Completed)
    }
}

impl From<String> for RunStatus {
    fn from(s: String) -> Self {
        RunStatus::parse(&s)
    }
}

impl From<RunStatus> for String {
    fn from(status: RunStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One execution of an assistant against a thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    id: String,
    thread_id: String,
    assistant_id: String,
    status: RunStatus,
    last_error: Option<String>,
}

impl Run {
    pub fn new(
        id: impl Into<String>,
        thread_id: impl Into<String>,
        assistant_id: impl Into<String>,
        status: RunStatus,
    ) -> Self {
        Self {
            id: id.into(),
            thread_id: thread_id.into(),
            assistant_id: assistant_id.into(),
            status,
            last_error: None,
        }
    }

    pub fn with_last_error(mut self, error: impl Into<String>) -> Self {
        self.last_error = Some(error.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    pub fn assistant_id(&self) -> &str {
        &self.assistant_id
    }

    pub fn status(&self) -> &RunStatus {
        &self.status
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Per-run overrides layered on top of the assistant's own configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunOptions {
    instructions: Option<String>,
    tools: Option<Vec<Value>>,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn with_tools(mut self, tools: Vec<Value>) -> Self {
        self.tools = Some(tools);
        self
    }

    /// Blank instructions and empty tool lists are treated as absent.
    pub fn instructions(&self) -> Option<&str> {
        self.instructions.as_deref().filter(|s| !s.is_empty())
    }

    pub fn tools(&self) -> Option<&[Value]> {
        self.tools.as_deref().filter(|t| !t.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_three_statuses_are_terminal() {
        let terminal: Vec<_> = [
            "queued",
            "in_progress",
            "requires_action",
            "cancelling",
            "cancelled",
            "failed",
            "completed",
            "incomplete",
            "expired",
            "paused",
        ]
        .iter()
        .map(|s| RunStatus::parse(s))
        .filter(|s| s.is_terminal())
        .collect();

        assert_eq!(
            terminal,
            vec![RunStatus::Cancelled, RunStatus::Failed, RunStatus::Completed]
        );
    }

    #[test]
    fn unknown_status_is_preserved() {
        let status = RunStatus::parse("paused");
        assert_eq!(status, RunStatus::Other("paused".to_string()));
        assert_eq!(status.as_str(), "paused");
    }

    #[test]
    fn status_serializes_as_wire_string() {
        let json = serde_json::to_string(&RunStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");

        let back: RunStatus = serde_json::from_str("\"requires_action\"").unwrap();
        assert_eq!(back, RunStatus::RequiresAction);
    }

    #[test]
    fn empty_run_options_are_absent() {
        let options = RunOptions::new().with_instructions("").with_tools(vec![]);
        assert!(options.instructions().is_none());
        assert!(options.tools().is_none());
    }
}
