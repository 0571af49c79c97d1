//! # Error Types Module
//!
//! Error taxonomy shared by storage, outbound channel and generative backend
//! calls. Validation failures in the conversation flows have their own
//! types in [`crate::dialogue`] since they never leave the gateway.

use teloxide::dispatching::dialogue::InMemStorageError;
use thiserror::Error;

/// Errors surfaced by the bot's collaborators
#[derive(Debug, Error)]
pub enum BotError {
    /// Persistence layer failures
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    /// A referenced row does not exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    /// Outbound transport failures (message or photo send)
    #[error("Send error: {0}")]
    Send(String),
    /// Generative backend failures
    #[error("Backend error: {0}")]
    Backend(String),
    /// Malformed persisted or backend data
    #[error("Invalid data: {0}")]
    InvalidData(String),
    /// Session storage failures
    #[error("Session error: {0}")]
    Session(#[from] InMemStorageError),
    /// Missing or malformed configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl BotError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        BotError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<teloxide::RequestError> for BotError {
    fn from(err: teloxide::RequestError) -> Self {
        BotError::Send(err.to_string())
    }
}

impl From<reqwest::Error> for BotError {
    fn from(err: reqwest::Error) -> Self {
        BotError::Backend(err.without_url().to_string())
    }
}

impl From<serde_json::Error> for BotError {
    fn from(err: serde_json::Error) -> Self {
        BotError::InvalidData(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_formatting() {
        let err = BotError::not_found("Product", 42);
        assert_eq!(err.to_string(), "Product not found: 42");

        let err = BotError::Send("chat not found".to_string());
        assert_eq!(err.to_string(), "Send error: chat not found");
    }
}
