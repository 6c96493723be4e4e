mod analyze_batch;
mod classify_ad;
mod run_lifecycle;

pub use analyze_batch::*;
pub use classify_ad::*;
pub use run_lifecycle::*;
