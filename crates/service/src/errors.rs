use thiserror::Error;

use crate::geojson::Violation;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("validation error: {} violation(s)", .0.len())]
    Validation(Vec<Violation>),
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ServiceError {
    pub fn not_found(entity: &str) -> Self { Self::NotFound(format!("{} not found", entity)) }
}
