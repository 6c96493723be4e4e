//! # Application Layer
//!
//! Ports to the outside world and the use cases built on them: the run
//! lifecycle, ad classification and the batch analysis pass.

pub mod interfaces;
pub mod use_cases;

pub use interfaces::*;
pub use use_cases::*;
