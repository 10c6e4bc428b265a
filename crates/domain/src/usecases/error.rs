//! Errors surfaced by the use cases

use thiserror::Error;

use crate::policy::PolicyViolation;
use crate::ports::{GenerateError, PublishError, StoreError};
use crate::usecases::schedule::ScheduleError;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Missing or invalid input; nothing was persisted
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("No analysis available for account {0}")]
    AnalysisUnavailable(String),
    #[error("Generation failed: {0}")]
    Generation(#[from] GenerateError),
    #[error("Publish failed: {0}")]
    Publish(#[from] PublishError),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Schedule error: {0}")]
    Schedule(#[from] ScheduleError),
    #[error("Timed out: {0}")]
    Timeout(String),
}

impl From<PolicyViolation> for ServiceError {
    fn from(violation: PolicyViolation) -> Self {
        ServiceError::Generation(GenerateError::GenerationParse(violation.to_string()))
    }
}

impl ServiceError {
    /// Whether the failure came from unparseable backend output
    pub fn is_generation_parse(&self) -> bool {
        matches!(self, ServiceError::Generation(e) if e.is_parse_error())
    }

    pub fn not_found(kind: &str, id: impl std::fmt::Display) -> Self {
        ServiceError::NotFound(format!("{} {}", kind, id))
    }
}
