mod ad_classifier;
mod assistant_api;
mod document_store;
mod poll_clock;

pub use ad_classifier::*;
pub use assistant_api::*;
pub use document_store::*;
pub use poll_clock::*;
