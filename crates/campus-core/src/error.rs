//! Error types for the campus backend

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CampusError>;

#[derive(Error, Debug)]
pub enum CampusError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    InsufficientBalance(String),

    #[error("Payment gateway error: {0}")]
    Gateway(String),

    #[error("Mail error: {0}")]
    Mail(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CampusError {
    pub fn validation(message: impl Into<String>) -> Self {
        CampusError::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        CampusError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        CampusError::Conflict(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        CampusError::Unauthorized(message.into())
    }
}

impl From<serde_json::Error> for CampusError {
    fn from(e: serde_json::Error) -> Self {
        CampusError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_passed_through() {
        assert_eq!(
            CampusError::not_found("Agent non trouvé").to_string(),
            "Agent non trouvé"
        );
        let internal: CampusError = anyhow::anyhow!("disk full").into();
        assert_eq!(internal.to_string(), "disk full");
    }
}
