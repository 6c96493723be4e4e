use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::application::AssistantApi;
use crate::domain::{
    Assistant, AssistantDefinition, DomainError, Message, Role, Run, RunOptions, RunStatus, Thread,
};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const ASSISTANTS_BETA_HEADER: &str = "OpenAI-Beta";
const ASSISTANTS_BETA_VERSION: &str = "assistants=v2";
const FILE_PURPOSE: &str = "assistants";

#[derive(Serialize)]
struct CreateAssistantRequest<'a> {
    name: &'a str,
    instructions: &'a str,
    model: &'a str,
    #[serde(skip_serializing_if = "<[Value]>::is_empty")]
    tools: &'a [Value],
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_resources: Option<ToolResources<'a>>,
}

#[derive(Serialize)]
struct ToolResources<'a> {
    code_interpreter: FileIds<'a>,
}

#[derive(Serialize)]
struct FileIds<'a> {
    file_ids: &'a [String],
}

#[derive(Serialize)]
struct CreateMessageRequest<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct CreateRunRequest<'a> {
    assistant_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [Value]>,
}

#[derive(Deserialize)]
struct ApiAssistant {
    id: String,
    name: Option<String>,
    instructions: Option<String>,
    model: String,
    #[serde(default)]
    tools: Vec<Value>,
}

#[derive(Deserialize)]
struct ApiThread {
    id: String,
    #[serde(default)]
    created_at: i64,
}

#[derive(Deserialize)]
struct ApiMessage {
    id: String,
    thread_id: String,
    role: String,
    #[serde(default)]
    content: Vec<ApiContentBlock>,
    #[serde(default)]
    created_at: i64,
}

#[derive(Deserialize)]
struct ApiContentBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<ApiText>,
}

#[derive(Deserialize)]
struct ApiText {
    value: String,
}

#[derive(Deserialize)]
struct ApiMessageList {
    data: Vec<ApiMessage>,
}

#[derive(Deserialize)]
struct ApiRun {
    id: String,
    thread_id: String,
    assistant_id: String,
    status: String,
    last_error: Option<ApiRunError>,
}

#[derive(Deserialize)]
struct ApiRunError {
    code: Option<String>,
    message: String,
}

#[derive(Deserialize)]
struct ApiFile {
    id: String,
}

impl From<ApiAssistant> for Assistant {
    fn from(api: ApiAssistant) -> Self {
        let mut assistant = Assistant::new(api.id, api.model).with_tools(api.tools);
        if let Some(name) = api.name {
            assistant = assistant.with_name(name);
        }
        if let Some(instructions) = api.instructions {
            assistant = assistant.with_instructions(instructions);
        }
        assistant
    }
}

impl TryFrom<ApiMessage> for Message {
    type Error = DomainError;

    /// Keeps the first text block; image and file blocks carry no text.
    fn try_from(api: ApiMessage) -> Result<Self, Self::Error> {
        let role = Role::parse(&api.role)
            .map_err(|e| DomainError::remote(format!("OpenAI: unexpected message role: {e}")))?;
        let text = api
            .content
            .into_iter()
            .find(|block| block.kind == "text")
            .and_then(|block| block.text)
            .map(|t| t.value)
            .unwrap_or_default();
        Ok(Message::new(api.id, api.thread_id, role, text, api.created_at))
    }
}

impl From<ApiRun> for Run {
    fn from(api: ApiRun) -> Self {
        let run = Run::new(
            api.id,
            api.thread_id,
            api.assistant_id,
            RunStatus::parse(&api.status),
        );
        match api.last_error {
            Some(ApiRunError {
                code: Some(code),
                message,
            }) => run.with_last_error(format!("{code}: {message}")),
            Some(ApiRunError {
                code: None,
                message,
            }) => run.with_last_error(message),
            None => run,
        }
    }
}

/// HTTP client for the OpenAI Assistants API (v2).
///
/// Configuration comes from the environment when built with [`Self::from_env`]:
///
/// ```text
/// OPENAI_API_KEY=sk-...
/// OPENAI_BASE_URL=https://api.openai.com/v1
/// ```
///
/// HTTP 404 maps to [`DomainError::NotFound`]; every other failure, transport
/// or API, maps to [`DomainError::RemoteService`].
pub struct OpenAiAssistantClient {
    client: reqwest::Client,
    api_key: String,
    /// API root without trailing slash.
    base_url: String,
}

impl OpenAiAssistantClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        let base: String = base_url.into();
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            base_url: base.trim_end_matches('/').to_string(),
        }
    }

    /// Reads `OPENAI_API_KEY` (required, `None` when absent) and
    /// `OPENAI_BASE_URL` (optional).
    pub fn from_env() -> Option<Self> {
        let key = std::env::var("OPENAI_API_KEY").ok()?;
        let base =
            std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Some(Self::new(key, base))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.api_key)
            .header(ASSISTANTS_BETA_HEADER, ASSISTANTS_BETA_VERSION)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> Result<T, DomainError> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| DomainError::remote(format!("OpenAI: {what} request failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            let body = response.text().await.unwrap_or_default();
            debug!("OpenAI: {what} returned 404: {body}");
            return Err(DomainError::not_found(format!("OpenAI: {what}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("OpenAI: {what} returned {status}: {body}");
            return Err(DomainError::remote(format!(
                "OpenAI: {what} returned {status}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| DomainError::remote(format!("OpenAI: failed to parse {what} response: {e}")))
    }
}

#[async_trait]
impl AssistantApi for OpenAiAssistantClient {
    async fn create_assistant(
        &self,
        definition: &AssistantDefinition,
    ) -> Result<Assistant, DomainError> {
        let body = CreateAssistantRequest {
            name: definition.name(),
            instructions: definition.instructions(),
            model: definition.model(),
            tools: definition.tools(),
            tool_resources: if definition.file_ids().is_empty() {
                None
            } else {
                Some(ToolResources {
                    code_interpreter: FileIds {
                        file_ids: definition.file_ids(),
                    },
                })
            },
        };
        let request = self.client.post(self.url("/assistants")).json(&body);
        let assistant: ApiAssistant = self.send(request, "create assistant").await?;
        Ok(assistant.into())
    }

    async fn retrieve_assistant(&self, assistant_id: &str) -> Result<Assistant, DomainError> {
        let request = self
            .client
            .get(self.url(&format!("/assistants/{assistant_id}")));
        let assistant: ApiAssistant = self
            .send(request, &format!("assistant {assistant_id}"))
            .await?;
        Ok(assistant.into())
    }

    async fn create_thread(&self) -> Result<Thread, DomainError> {
        let request = self
            .client
            .post(self.url("/threads"))
            .json(&serde_json::json!({}));
        let thread: ApiThread = self.send(request, "create thread").await?;
        Ok(Thread::new(thread.id, thread.created_at))
    }

    async fn create_message(
        &self,
        thread_id: &str,
        role: Role,
        content: &str,
    ) -> Result<Message, DomainError> {
        let body = CreateMessageRequest {
            role: role.as_str(),
            content,
        };
        let request = self
            .client
            .post(self.url(&format!("/threads/{thread_id}/messages")))
            .json(&body);
        let message: ApiMessage = self
            .send(request, &format!("create message in thread {thread_id}"))
            .await?;
        message.try_into()
    }

    async fn list_messages(
        &self,
        thread_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>, DomainError> {
        let request = self
            .client
            .get(self.url(&format!("/threads/{thread_id}/messages")))
            .query(&[("limit", limit.to_string()), ("order", "desc".to_string())]);
        let list: ApiMessageList = self
            .send(request, &format!("messages of thread {thread_id}"))
            .await?;
        list.data.into_iter().map(Message::try_from).collect()
    }

    async fn create_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
        options: &RunOptions,
    ) -> Result<Run, DomainError> {
        let body = CreateRunRequest {
            assistant_id,
            instructions: options.instructions(),
            tools: options.tools(),
        };
        let request = self
            .client
            .post(self.url(&format!("/threads/{thread_id}/runs")))
            .json(&body);
        let run: ApiRun = self
            .send(request, &format!("create run in thread {thread_id}"))
            .await?;
        Ok(run.into())
    }

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run, DomainError> {
        let request = self
            .client
            .get(self.url(&format!("/threads/{thread_id}/runs/{run_id}")));
        let run: ApiRun = self.send(request, &format!("run {run_id}")).await?;
        Ok(run.into())
    }

    async fn upload_file(&self, path: &Path) -> Result<String, DomainError> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| {
                DomainError::invalid_input(format!("Not a file path: {}", path.display()))
            })?;

        let form = reqwest::multipart::Form::new()
            .text("purpose", FILE_PURPOSE)
            .part(
                "file",
                reqwest::multipart::Part::bytes(bytes).file_name(file_name),
            );
        let request = self.client.post(self.url("/files")).multipart(form);
        let file: ApiFile = self.send(request, "upload file").await?;
        Ok(file.id)
    }
}
