//! Request handlers.

pub mod health;
pub mod jobs;
pub mod productions;

pub use health::*;
pub use jobs::*;
pub use productions::*;
