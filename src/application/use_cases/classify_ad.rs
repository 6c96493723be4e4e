use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use crate::application::{AdClassifier, RunLifecycleManager};
use crate::domain::{ClassificationOutcome, ClassificationResult, DomainError};

/// One-shot classification of ad text by a pre-configured assistant.
///
/// Every call binds the assistant and opens a fresh thread, so classifications
/// never see each other's messages. There is no retry: a failed run or an
/// unparseable reply is reported to the caller as is.
pub struct ClassifyAdUseCase {
    lifecycle: Arc<RunLifecycleManager>,
    assistant_id: String,
}

impl ClassifyAdUseCase {
    pub fn new(lifecycle: Arc<RunLifecycleManager>, assistant_id: impl Into<String>) -> Self {
        Self {
            lifecycle,
            assistant_id: assistant_id.into(),
        }
    }

    pub fn assistant_id(&self) -> &str {
        &self.assistant_id
    }

    pub async fn execute(&self, ad_text: &str) -> Result<Value, DomainError> {
        let session = self.lifecycle.connect_assistant(&self.assistant_id).await?;
        let session = self.lifecycle.create_thread(&session).await?;
        let (session, response) = self.lifecycle.process_message(&session, ad_text).await?;

        let text = response.ok_or_else(|| {
            let status = session
                .run()
                .map(|run| run.status().to_string())
                .unwrap_or_else(|| "unknown".to_string());
            DomainError::malformed(format!(
                "assistant produced no reply (run status: {})",
                status
            ))
        })?;
        debug!("Classifier raw response: {}", text);

        let value = Self::parse_response(&text)?;
        info!("Classified ad ({} chars)", ad_text.chars().count());
        Ok(value)
    }

    /// Classifies and validates the answer shape in one go.
    pub async fn classify_validated(
        &self,
        ad_text: &str,
    ) -> Result<ClassificationOutcome, DomainError> {
        let value = self.execute(ad_text).await?;
        Ok(ClassificationResult::validate(value))
    }

    /// Strict JSON parse: no fence stripping, no partial extraction.
    fn parse_response(text: &str) -> Result<Value, DomainError> {
        serde_json::from_str(text).map_err(|e| {
            DomainError::malformed(format!("assistant reply is not valid JSON: {}", e))
        })
    }
}

#[async_trait]
impl AdClassifier for ClassifyAdUseCase {
    async fn classify(&self, ad_text: &str) -> Result<Value, DomainError> {
        self.execute(ad_text).await
    }
}
