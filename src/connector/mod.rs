//! # Connector Layer
//!
//! External integrations implementing application interfaces:
//! - Assistant service (OpenAI Assistants API, scripted mock)
//! - Document storage (DuckDB, in-memory)
//! - Poll clocks (tokio, virtual time)

pub mod adapter;
pub mod container;

pub use adapter::*;
pub use container::{Container, ContainerConfig};
