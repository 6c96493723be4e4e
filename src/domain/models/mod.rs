mod assistant;
mod classification;
mod document;
mod message;
mod run;
mod session;

pub use assistant::*;
pub use classification::*;
pub use document::*;
pub use message::*;
pub use run::*;
pub use session::*;
