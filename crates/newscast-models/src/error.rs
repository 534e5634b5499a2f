//! Model error types.

use thiserror::Error;

use crate::production::ProductionStatus;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: ProductionStatus,
        to: ProductionStatus,
    },

    #[error("Unknown production status: {0}")]
    UnknownStatus(String),

    #[error("Unknown stage: {0}")]
    UnknownStage(String),

    #[error("Invalid narration plan: {0}")]
    InvalidPlan(String),
}

impl ModelError {
    pub fn invalid_plan(msg: impl Into<String>) -> Self {
        Self::InvalidPlan(msg.into())
    }
}
