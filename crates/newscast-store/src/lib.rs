//! SQLite persistence for the newscast pipeline.
//!
//! This crate provides:
//! - A cloneable [`Store`] handle over one shared connection
//! - Idempotent schema creation
//! - Typed repositories for articles and productions

pub mod articles;
pub mod error;
pub mod productions;
mod schema;
pub mod store;
mod time;

pub use articles::ArticleRepository;
pub use error::{StoreError, StoreResult};
pub use productions::ProductionRepository;
pub use store::Store;
