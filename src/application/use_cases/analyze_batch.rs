use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use tracing::{info, warn};

use crate::application::{AdClassifier, DocumentStore};
use crate::domain::{check_required_keys, id_to_string, Document, DomainError, Filter, ID_KEY};

pub const ANALYZED_KEY: &str = "analyzed";
pub const DEFAULT_TEXT_FIELD: &str = "text";
pub const DEFAULT_ANALYSIS_FIELD: &str = "analysis";

/// Counters for one pass of [`AnalyzeBatchUseCase`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub examined: usize,
    pub analyzed: usize,
    pub skipped: usize,
}

/// Classifies every unanalyzed document of a collection, one at a time, and
/// writes the result back.
///
/// The classifier's JSON is stored unchanged once `translated_text` and
/// `status` are present. A document that cannot be classified is skipped, not
/// marked. It keeps
/// `analyzed = false` and is picked up again by the next pass.
pub struct AnalyzeBatchUseCase {
    store: Arc<dyn DocumentStore>,
    classifier: Arc<dyn AdClassifier>,
    collection: String,
    text_field: String,
    analysis_field: String,
    show_progress: bool,
}

impl AnalyzeBatchUseCase {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        classifier: Arc<dyn AdClassifier>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            store,
            classifier,
            collection: collection.into(),
            text_field: DEFAULT_TEXT_FIELD.to_string(),
            analysis_field: DEFAULT_ANALYSIS_FIELD.to_string(),
            show_progress: false,
        }
    }

    pub fn with_text_field(mut self, field: impl Into<String>) -> Self {
        self.text_field = field.into();
        self
    }

    pub fn with_analysis_field(mut self, field: impl Into<String>) -> Self {
        self.analysis_field = field.into();
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub async fn execute(&self) -> Result<BatchReport, DomainError> {
        let pending = self
            .store
            .find_many(&self.collection, &Filter::all().eq(ANALYZED_KEY, false))
            .await?;

        info!(
            "Found {} unanalyzed documents in '{}'",
            pending.len(),
            self.collection
        );

        let progress_bar = if self.show_progress {
            let bar = ProgressBar::new(pending.len() as u64);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                    .map_err(|e| DomainError::internal(format!("Invalid progress bar template: {}", e)))?
                    .progress_chars("#>-"),
            );
            bar
        } else {
            ProgressBar::hidden()
        };

        let mut report = BatchReport::default();

        for document in &pending {
            report.examined += 1;
            progress_bar.inc(1);

            if self.analyze_document(document).await? {
                report.analyzed += 1;
            } else {
                report.skipped += 1;
            }
        }

        progress_bar.finish_with_message("Done");

        info!(
            "Batch complete: {} examined, {} analyzed, {} skipped",
            report.examined, report.analyzed, report.skipped
        );

        Ok(report)
    }

    /// Returns `Ok(false)` when the document was skipped.
    async fn analyze_document(&self, document: &Document) -> Result<bool, DomainError> {
        let id = match document.get(ID_KEY) {
            Some(id) => id.clone(),
            None => {
                warn!("Skipping document without {} in '{}'", ID_KEY, self.collection);
                return Ok(false);
            }
        };

        let text = match document.get(&self.text_field).and_then(Value::as_str) {
            Some(text) => text,
            None => {
                warn!(
                    "Skipping document {}: no string field '{}'",
                    id_to_string(&id),
                    self.text_field
                );
                return Ok(false);
            }
        };

        let raw = match self.classifier.classify(text).await {
            Ok(raw) => raw,
            Err(DomainError::MalformedResponse(reason)) => {
                warn!("Skipping document {}: {}", id_to_string(&id), reason);
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        if let Err(reason) = check_required_keys(&raw) {
            warn!("Skipping document {}: {}", id_to_string(&id), reason);
            return Ok(false);
        }

        let mut fields = Document::new();
        fields.insert(self.analysis_field.clone(), raw);
        fields.insert(ANALYZED_KEY.to_string(), Value::Bool(true));

        self.store
            .update_one(&self.collection, &Filter::by_id(id), &fields)
            .await?;

        Ok(true)
    }
}
