use async_trait::async_trait;

use crate::domain::{Document, DomainError, Filter};

/// Generic CRUD over named collections of JSON documents.
///
/// Updates use `$set` semantics: the given fields are merged into the matched
/// document. Modified counts only include documents whose content changed.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Inserts a document and returns its id. A missing `_id` is generated.
    async fn insert_one(&self, collection: &str, document: Document)
        -> Result<String, DomainError>;

    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> Result<Vec<String>, DomainError>;

    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Document>, DomainError>;

    /// Returns matching documents in insertion order.
    async fn find_many(&self, collection: &str, filter: &Filter)
        -> Result<Vec<Document>, DomainError>;

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        fields: &Document,
    ) -> Result<u64, DomainError>;

    async fn update_many(
        &self,
        collection: &str,
        filter: &Filter,
        fields: &Document,
    ) -> Result<u64, DomainError>;

    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64, DomainError>;

    async fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64, DomainError>;
}
