use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use duckdb::{params, Connection};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::application::DocumentStore;
use crate::domain::{apply_set, id_to_string, Document, DomainError, Filter, ID_KEY};

/// [`DocumentStore`] on top of DuckDB.
///
/// Documents live as JSON text in a single `documents` table keyed by
/// `(collection, id)`, where `id` is the compact JSON of the `_id` value so
/// `7` and `"7"` stay distinct. The database name selects the DuckDB schema,
/// so several logical databases can share one file. Plain `_id` lookups go
/// through the key; other filters are evaluated in Rust after loading the
/// collection, in insertion order.
pub struct DuckdbDocumentStore {
    conn: Arc<Mutex<Connection>>,
    schema: String,
    /// Schema-qualified, quoted table name.
    table: String,
}

impl DuckdbDocumentStore {
    pub fn new(db_path: &Path, database: &str) -> Result<Self, DomainError> {
        let conn = Connection::open(db_path)
            .map_err(|e| DomainError::storage(format!("Failed to open DuckDB database: {}", e)))?;
        Self::with_connection(conn, database)
    }

    pub fn in_memory(database: &str) -> Result<Self, DomainError> {
        let conn = Connection::open_in_memory().map_err(|e| {
            DomainError::storage(format!("Failed to open DuckDB in-memory DB: {}", e))
        })?;
        Self::with_connection(conn, database)
    }

    fn with_connection(conn: Connection, database: &str) -> Result<Self, DomainError> {
        let database = database.trim();
        let schema = if database.is_empty() { "main" } else { database };
        let quoted_schema = quote_identifier(schema);
        Self::initialize_schema(&conn, &quoted_schema)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            schema: schema.to_string(),
            table: format!("{}.documents", quoted_schema),
        })
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    fn initialize_schema(conn: &Connection, quoted_schema: &str) -> Result<(), DomainError> {
        conn.execute_batch(&format!(
            r#"
            CREATE SCHEMA IF NOT EXISTS {quoted_schema};
            CREATE TABLE IF NOT EXISTS {quoted_schema}.documents (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                seq BIGINT NOT NULL,
                body TEXT NOT NULL,
                PRIMARY KEY (collection, id)
            );
            "#
        ))
        .map_err(|e| DomainError::storage(format!("Failed to initialize schema: {}", e)))?;

        debug!("DuckDB document schema initialized in {}", quoted_schema);
        Ok(())
    }

    fn load(
        &self,
        conn: &Connection,
        collection: &str,
    ) -> Result<Vec<(String, Document)>, DomainError> {
        let mut stmt = conn
            .prepare(&format!(
                "SELECT id, body FROM {} WHERE collection = ?1 ORDER BY seq",
                self.table
            ))
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;

        let rows = stmt
            .query_map(params![collection], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| DomainError::storage(format!("Failed to query documents: {}", e)))?;

        let mut documents = Vec::new();
        for row in rows {
            let (key, body) =
                row.map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?;
            let document = parse_body(collection, &key, &body)?;
            documents.push((key, document));
        }
        Ok(documents)
    }

    fn load_by_key(
        &self,
        conn: &Connection,
        collection: &str,
        key: &str,
    ) -> Result<Option<Document>, DomainError> {
        match conn.query_row(
            &format!(
                "SELECT body FROM {} WHERE collection = ?1 AND id = ?2",
                self.table
            ),
            params![collection, key],
            |row| row.get::<_, String>(0),
        ) {
            Ok(body) => parse_body(collection, key, &body).map(Some),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DomainError::storage(format!(
                "Failed to query document: {}",
                e
            ))),
        }
    }

    /// Documents matching `filter` with their storage keys, in insertion order.
    fn select(
        &self,
        conn: &Connection,
        collection: &str,
        filter: &Filter,
    ) -> Result<Vec<(String, Document)>, DomainError> {
        if let Some(id) = filter.id_only() {
            let key = id.to_string();
            return Ok(self
                .load_by_key(conn, collection, &key)?
                .map(|doc| vec![(key, doc)])
                .unwrap_or_default());
        }

        Ok(self
            .load(conn, collection)?
            .into_iter()
            .filter(|(_, doc)| filter.matches(doc))
            .collect())
    }

    fn insert(
        &self,
        conn: &Connection,
        collection: &str,
        mut document: Document,
    ) -> Result<String, DomainError> {
        let id = match document.get(ID_KEY) {
            Some(Value::Null) => {
                return Err(DomainError::invalid_input("document _id must not be null"))
            }
            Some(id) => id.clone(),
            None => {
                let id = Value::String(Uuid::new_v4().to_string());
                document.insert(ID_KEY.to_string(), id.clone());
                id
            }
        };
        let key = id.to_string();

        if self.load_by_key(conn, collection, &key)?.is_some() {
            return Err(DomainError::invalid_input(format!(
                "duplicate _id {} in '{}'",
                key, collection
            )));
        }

        let seq: i64 = conn
            .query_row(
                &format!(
                    "SELECT COALESCE(MAX(seq), 0) + 1 FROM {} WHERE collection = ?1",
                    self.table
                ),
                params![collection],
                |row| row.get(0),
            )
            .map_err(|e| DomainError::storage(format!("Failed to allocate sequence: {}", e)))?;

        let body = serde_json::to_string(&document)
            .map_err(|e| DomainError::internal(format!("Failed to serialize document: {}", e)))?;

        conn.execute(
            &format!(
                "INSERT INTO {} (collection, id, seq, body) VALUES (?1, ?2, ?3, ?4)",
                self.table
            ),
            params![collection, key, seq, body],
        )
        .map_err(|e| DomainError::storage(format!("Failed to insert document: {}", e)))?;

        Ok(id_to_string(&id))
    }

    fn write_body(
        &self,
        conn: &Connection,
        collection: &str,
        key: &str,
        document: &Document,
    ) -> Result<(), DomainError> {
        let body = serde_json::to_string(document)
            .map_err(|e| DomainError::internal(format!("Failed to serialize document: {}", e)))?;
        conn.execute(
            &format!(
                "UPDATE {} SET body = ?1 WHERE collection = ?2 AND id = ?3",
                self.table
            ),
            params![body, collection, key],
        )
        .map_err(|e| DomainError::storage(format!("Failed to update document: {}", e)))?;
        Ok(())
    }

    fn remove(&self, conn: &Connection, collection: &str, key: &str) -> Result<(), DomainError> {
        conn.execute(
            &format!(
                "DELETE FROM {} WHERE collection = ?1 AND id = ?2",
                self.table
            ),
            params![collection, key],
        )
        .map_err(|e| DomainError::storage(format!("Failed to delete document: {}", e)))?;
        Ok(())
    }
}

/// Double-quotes an SQL identifier, doubling embedded quotes.
fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn parse_body(collection: &str, key: &str, body: &str) -> Result<Document, DomainError> {
    serde_json::from_str(body).map_err(|e| {
        DomainError::storage(format!(
            "Corrupt document {} in '{}': {}",
            key, collection, e
        ))
    })
}

#[async_trait]
impl DocumentStore for DuckdbDocumentStore {
    async fn insert_one(
        &self,
        collection: &str,
        document: Document,
    ) -> Result<String, DomainError> {
        let conn = self.conn.lock().await;
        self.insert(&conn, collection, document)
    }

    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> Result<Vec<String>, DomainError> {
        let conn = self.conn.lock().await;
        let mut ids = Vec::with_capacity(documents.len());
        for document in documents {
            ids.push(self.insert(&conn, collection, document)?);
        }
        debug!("Inserted {} documents into '{}'", ids.len(), collection);
        Ok(ids)
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Document>, DomainError> {
        let conn = self.conn.lock().await;
        Ok(self
            .select(&conn, collection, filter)?
            .into_iter()
            .map(|(_, doc)| doc)
            .next())
    }

    async fn find_many(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Vec<Document>, DomainError> {
        let conn = self.conn.lock().await;
        Ok(self
            .select(&conn, collection, filter)?
            .into_iter()
            .map(|(_, doc)| doc)
            .collect())
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        fields: &Document,
    ) -> Result<u64, DomainError> {
        let conn = self.conn.lock().await;
        let Some((key, mut doc)) = self.select(&conn, collection, filter)?.into_iter().next()
        else {
            return Ok(0);
        };

        if !apply_set(&mut doc, fields) {
            return Ok(0);
        }
        self.write_body(&conn, collection, &key, &doc)?;
        Ok(1)
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: &Filter,
        fields: &Document,
    ) -> Result<u64, DomainError> {
        let conn = self.conn.lock().await;
        let mut modified = 0;
        for (key, mut doc) in self.select(&conn, collection, filter)? {
            if apply_set(&mut doc, fields) {
                self.write_body(&conn, collection, &key, &doc)?;
                modified += 1;
            }
        }
        Ok(modified)
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64, DomainError> {
        let conn = self.conn.lock().await;
        match self.select(&conn, collection, filter)?.into_iter().next() {
            Some((key, _)) => {
                self.remove(&conn, collection, &key)?;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64, DomainError> {
        let conn = self.conn.lock().await;
        let mut deleted = 0;
        for (key, _) in self.select(&conn, collection, filter)? {
            self.remove(&conn, collection, &key)?;
            deleted += 1;
        }
        Ok(deleted)
    }
}
