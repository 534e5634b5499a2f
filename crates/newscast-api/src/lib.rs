//! Newscast dashboard API and command line.
//!
//! Read-only dashboard over productions and scheduled jobs, plus the
//! actions an operator needs (run a job now, publish, refresh metrics).

pub mod cli;
pub mod commands;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
