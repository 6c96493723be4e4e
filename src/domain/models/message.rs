use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Author of a message within a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(DomainError::invalid_input(format!(
                "Unknown message role '{}'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    id: String,
    created_at: i64,
}

impl Thread {
    pub fn new(id: impl Into<String>, created_at: i64) -> Self {
        Self {
            id: id.into(),
            created_at,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }
}

/// A single message in a thread. Messages are append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    id: String,
    thread_id: String,
    role: Role,
    content: String,
    created_at: i64,
}

impl Message {
    pub fn new(
        id: impl Into<String>,
        thread_id: impl Into<String>,
        role: Role,
        content: impl Into<String>,
        created_at: i64,
    ) -> Self {
        Self {
            id: id.into(),
            thread_id: thread_id.into(),
            role,
            content: content.into(),
            created_at,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    pub fn is_from_assistant(&self) -> bool {
        self.role == Role::Assistant
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parse_is_case_insensitive() {
        assert_eq!(Role::parse("User").unwrap(), Role::User);
        assert_eq!(Role::parse("ASSISTANT").unwrap(), Role::Assistant);
    }

    #[test]
    fn role_parse_rejects_unknown() {
        let err = Role::parse("system").unwrap_err();
        assert!(matches!(err, DomainError::InvalidInput(_)));
    }

    #[test]
    fn message_reports_assistant_authorship() {
        let reply = Message::new("msg_1", "thread_1", Role::Assistant, "{}", 1);
        let question = Message::new("msg_2", "thread_1", Role::User, "hi", 2);

        assert!(reply.is_from_assistant());
        assert!(!question.is_from_assistant());
    }
}
