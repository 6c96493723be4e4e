use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::application::DocumentStore;
use crate::domain::{apply_set, id_to_string, Document, DomainError, Filter, ID_KEY};

pub struct InMemoryDocumentStore {
    collections: Arc<Mutex<HashMap<String, Vec<Document>>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            collections: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Returns the document's `_id`, generating one when missing.
    fn ensure_id(document: &mut Document) -> Result<Value, DomainError> {
        match document.get(ID_KEY) {
            Some(Value::Null) => Err(DomainError::invalid_input("document _id must not be null")),
            Some(id) => Ok(id.clone()),
            None => {
                let id = Value::String(Uuid::new_v4().to_string());
                document.insert(ID_KEY.to_string(), id.clone());
                Ok(id)
            }
        }
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn insert_one(
        &self,
        collection: &str,
        mut document: Document,
    ) -> Result<String, DomainError> {
        let id = Self::ensure_id(&mut document)?;
        let mut collections = self.collections.lock().await;
        let documents = collections.entry(collection.to_string()).or_default();

        if documents.iter().any(|d| d.get(ID_KEY) == Some(&id)) {
            return Err(DomainError::invalid_input(format!(
                "duplicate _id {} in '{}'",
                id, collection
            )));
        }

        documents.push(document);
        Ok(id_to_string(&id))
    }

    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> Result<Vec<String>, DomainError> {
        let mut ids = Vec::with_capacity(documents.len());
        for document in documents {
            ids.push(self.insert_one(collection, document).await?);
        }
        debug!("Inserted {} documents into '{}'", ids.len(), collection);
        Ok(ids)
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Document>, DomainError> {
        let collections = self.collections.lock().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| filter.matches(d)).cloned()))
    }

    async fn find_many(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Vec<Document>, DomainError> {
        let collections = self.collections.lock().await;
        Ok(collections
            .get(collection)
            .map(|docs| docs.iter().filter(|d| filter.matches(d)).cloned().collect())
            .unwrap_or_default())
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        fields: &Document,
    ) -> Result<u64, DomainError> {
        let mut collections = self.collections.lock().await;
        let modified = collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|d| filter.matches(d)))
            .map(|doc| apply_set(doc, fields))
            .unwrap_or(false);
        Ok(modified as u64)
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: &Filter,
        fields: &Document,
    ) -> Result<u64, DomainError> {
        let mut collections = self.collections.lock().await;
        let mut modified = 0;
        if let Some(docs) = collections.get_mut(collection) {
            for doc in docs.iter_mut().filter(|d| filter.matches(d)) {
                if apply_set(doc, fields) {
                    modified += 1;
                }
            }
        }
        Ok(modified)
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64, DomainError> {
        let mut collections = self.collections.lock().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(0);
        };
        match docs.iter().position(|d| filter.matches(d)) {
            Some(index) => {
                docs.remove(index);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64, DomainError> {
        let mut collections = self.collections.lock().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let before = docs.len();
        docs.retain(|d| !filter.matches(d));
        Ok((before - docs.len()) as u64)
    }
}
