mod duckdb_document_store;
mod in_memory_document_store;
mod manual_clock;
mod mock_assistant_client;
mod openai_assistant_client;
mod tokio_clock;

pub use duckdb_document_store::*;
pub use in_memory_document_store::*;
pub use manual_clock::*;
pub use mock_assistant_client::*;
pub use openai_assistant_client::*;
pub use tokio_clock::*;
