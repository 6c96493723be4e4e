//! # Domain Layer
//!
//! Assistant conversation entities, classification results, documents and the
//! crate-wide error type. Free of transport and storage concerns.

mod error;
pub mod models;

pub use error::*;
pub use models::*;
