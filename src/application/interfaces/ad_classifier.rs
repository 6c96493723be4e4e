use async_trait::async_trait;
use serde_json::Value;

use crate::domain::DomainError;

/// Turns free-text ad content into the classifier's raw JSON answer.
#[async_trait]
pub trait AdClassifier: Send + Sync {
    /// Fails with [`DomainError::MalformedResponse`] when the answer is not
    /// valid JSON.
    async fn classify(&self, ad_text: &str) -> Result<Value, DomainError>;
}
