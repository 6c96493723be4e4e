use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_ASSISTANT_MODEL: &str = "gpt-4-turbo-preview";

/// A remote assistant: a model bound to an instruction set and optional tools.
///
/// Assistants are created once and never mutated by this crate, so a single
/// assistant may back any number of threads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assistant {
    id: String,
    name: Option<String>,
    instructions: Option<String>,
    model: String,
    #[serde(default)]
    tools: Vec<Value>,
}

impl Assistant {
    pub fn new(id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            instructions: None,
            model: model.into(),
            tools: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn with_tools(mut self, tools: Vec<Value>) -> Self {
        self.tools = tools;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn instructions(&self) -> Option<&str> {
        self.instructions.as_deref()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn tools(&self) -> &[Value] {
        &self.tools
    }
}

/// Everything needed to create a new remote assistant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantDefinition {
    name: String,
    instructions: String,
    model: String,
    tools: Vec<Value>,
    file_ids: Vec<String>,
}

impl AssistantDefinition {
    pub fn new(name: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
            model: DEFAULT_ASSISTANT_MODEL.to_string(),
            tools: Vec::new(),
            file_ids: Vec::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_tools(mut self, tools: Vec<Value>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_file_ids(mut self, file_ids: Vec<String>) -> Self {
        self.file_ids = file_ids;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn tools(&self) -> &[Value] {
        &self.tools
    }

    pub fn file_ids(&self) -> &[String] {
        &self.file_ids
    }
}
