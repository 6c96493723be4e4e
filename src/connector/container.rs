use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tracing::{debug, warn};

use crate::application::{
    AnalyzeBatchUseCase, AssistantApi, ClassifyAdUseCase, DocumentStore, PollPolicy,
    RunLifecycleManager,
};
use crate::connector::adapter::{
    DuckdbDocumentStore, InMemoryDocumentStore, MockAssistantClient, OpenAiAssistantClient,
    TokioClock, DEFAULT_BASE_URL,
};

pub const DEFAULT_DATABASE_URL: &str = "~/.tfox/tfox.duckdb";
pub const DEFAULT_DATABASE_NAME: &str = "tfox";

/// Runtime configuration, read from the environment and then overridden by
/// command-line flags.
///
/// | Variable                       | Purpose                      |
/// |--------------------------------|------------------------------|
/// | `OPENAI_API_KEY`               | API credential               |
/// | `OPENAI_BASE_URL`              | API root                     |
/// | `BUYER_OR_SELLER_ASSISTANT_ID` | classifier assistant         |
/// | `ASSISTANT_ID`                 | chat assistant               |
/// | `DATABASE_URL`                 | DuckDB file                  |
/// | `DATABASE_NAME`                | DuckDB schema                |
/// | `TFOX_POLL_INTERVAL_MS`        | run status poll interval     |
/// | `TFOX_RUN_TIMEOUT_SECS`        | give up waiting after this   |
#[derive(Debug, Clone)]
pub struct ContainerConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub classifier_assistant_id: Option<String>,
    pub chat_assistant_id: Option<String>,
    pub database_url: String,
    pub database_name: String,
    pub poll_interval: Duration,
    pub run_timeout: Option<Duration>,
    /// Answer from an in-process scripted assistant instead of the API.
    pub mock_assistant: bool,
    /// Keep documents in memory instead of DuckDB.
    pub memory_storage: bool,
}

impl ContainerConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: env_non_empty("OPENAI_API_KEY"),
            base_url: env_non_empty("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            classifier_assistant_id: env_non_empty("BUYER_OR_SELLER_ASSISTANT_ID"),
            chat_assistant_id: env_non_empty("ASSISTANT_ID"),
            database_url: env_non_empty("DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            database_name: env_non_empty("DATABASE_NAME")
                .unwrap_or_else(|| DEFAULT_DATABASE_NAME.to_string()),
            poll_interval: env_millis("TFOX_POLL_INTERVAL_MS")
                .unwrap_or(crate::application::DEFAULT_POLL_INTERVAL),
            run_timeout: env_secs("TFOX_RUN_TIMEOUT_SECS"),
            mock_assistant: false,
            memory_storage: false,
        }
    }

    pub fn poll_policy(&self) -> PollPolicy {
        let policy = PollPolicy::new(self.poll_interval);
        match self.run_timeout {
            Some(timeout) => policy.with_timeout(timeout),
            None => policy,
        }
    }
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_u64(name: &str) -> Option<u64> {
    let raw = env_non_empty(name)?;
    match raw.parse::<u64>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring {}='{}': not a whole number", name, raw);
            None
        }
    }
}

fn env_millis(name: &str) -> Option<Duration> {
    env_u64(name).map(Duration::from_millis)
}

fn env_secs(name: &str) -> Option<Duration> {
    env_u64(name).map(Duration::from_secs)
}

pub fn expand_tilde(path: &str) -> String {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            if path == "~" {
                return home.to_string_lossy().to_string();
            }
            return path.replacen("~", &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}

/// Wires configuration into adapters and use cases.
pub struct Container {
    lifecycle: Arc<RunLifecycleManager>,
    config: ContainerConfig,
}

impl Container {
    pub fn new(config: ContainerConfig) -> Result<Self> {
        let api: Arc<dyn AssistantApi> = if config.mock_assistant {
            debug!("Using mock assistant client");
            let mut mock = MockAssistantClient::new();
            for id in [&config.classifier_assistant_id, &config.chat_assistant_id]
                .into_iter()
                .flatten()
            {
                mock = mock.with_assistant(id.clone());
            }
            Arc::new(mock)
        } else {
            let key = config
                .api_key
                .clone()
                .ok_or_else(|| anyhow!("OPENAI_API_KEY is not set"))?;
            debug!("Using OpenAI Assistants API at {}", config.base_url);
            Arc::new(OpenAiAssistantClient::new(key, config.base_url.clone()))
        };

        let lifecycle = Arc::new(
            RunLifecycleManager::new(api, Arc::new(TokioClock::new()))
                .with_poll_policy(config.poll_policy()),
        );

        Ok(Self { lifecycle, config })
    }

    pub fn lifecycle(&self) -> Arc<RunLifecycleManager> {
        self.lifecycle.clone()
    }

    pub fn classifier_assistant_id(&self) -> Result<&str> {
        self.config
            .classifier_assistant_id
            .as_deref()
            .ok_or_else(|| anyhow!("BUYER_OR_SELLER_ASSISTANT_ID is not set"))
    }

    /// The chat assistant, falling back to the classifier.
    pub fn chat_assistant_id(&self) -> Result<&str> {
        match self.config.chat_assistant_id.as_deref() {
            Some(id) => Ok(id),
            None => self
                .classifier_assistant_id()
                .context("neither ASSISTANT_ID nor BUYER_OR_SELLER_ASSISTANT_ID is set"),
        }
    }

    pub fn classify_use_case(&self) -> Result<ClassifyAdUseCase> {
        Ok(ClassifyAdUseCase::new(
            self.lifecycle.clone(),
            self.classifier_assistant_id()?,
        ))
    }

    /// Opens the configured document store.
    pub fn document_store(&self) -> Result<Arc<dyn DocumentStore>> {
        if self.config.memory_storage {
            debug!("Using in-memory document storage");
            return Ok(Arc::new(InMemoryDocumentStore::new()));
        }

        let db_path = PathBuf::from(expand_tilde(&self.config.database_url));
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        debug!(
            "Using DuckDB document storage at {:?} database {}",
            db_path, self.config.database_name
        );
        Ok(Arc::new(DuckdbDocumentStore::new(
            &db_path,
            &self.config.database_name,
        )?))
    }

    pub fn analyze_use_case(&self, collection: &str) -> Result<AnalyzeBatchUseCase> {
        let classifier = Arc::new(self.classify_use_case()?);
        Ok(AnalyzeBatchUseCase::new(
            self.document_store()?,
            classifier,
            collection,
        ))
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ContainerConfig {
        ContainerConfig {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            classifier_assistant_id: Some("asst_classifier".to_string()),
            chat_assistant_id: None,
            database_url: ":memory:".to_string(),
            database_name: DEFAULT_DATABASE_NAME.to_string(),
            poll_interval: Duration::from_millis(10),
            run_timeout: Some(Duration::from_secs(5)),
            mock_assistant: true,
            memory_storage: true,
        }
    }

    #[test]
    fn real_client_requires_api_key() {
        let mut cfg = config();
        cfg.mock_assistant = false;
        assert!(Container::new(cfg).is_err());
    }

    #[test]
    fn chat_assistant_falls_back_to_classifier() {
        let container = Container::new(config()).unwrap();
        assert_eq!(container.chat_assistant_id().unwrap(), "asst_classifier");
    }

    #[test]
    fn poll_policy_reflects_config() {
        let container = Container::new(config()).unwrap();
        let policy = container.lifecycle().poll_policy();
        assert_eq!(policy.interval(), Duration::from_millis(10));
        assert_eq!(policy.timeout(), Some(Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn mock_container_classifies_offline() {
        let container = Container::new(config()).unwrap();
        let value = container
            .classify_use_case()
            .unwrap()
            .execute("იყიდება სახურავი")
            .await
            .unwrap();
        assert_eq!(value["translated_text"], "იყიდება სახურავი");
    }

    #[test]
    fn expand_tilde_leaves_plain_paths() {
        assert_eq!(expand_tilde("/tmp/tfox.duckdb"), "/tmp/tfox.duckdb");
    }
}
