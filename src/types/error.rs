//! Error types for Hearth
//!
//! Pattern follows the gateway error enum: one flat taxonomy with string
//! payloads and `From` conversions for the crates we talk to.

/// Main error type for Hearth operations
#[derive(Debug, thiserror::Error)]
pub enum HearthError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("NATS error: {0}")]
    Nats(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl HearthError {
    /// True when a create collided with an existing document
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }

    /// True when an update targeted a missing document
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<std::io::Error> for HearthError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for HearthError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidDocument(format!("JSON error: {}", err))
    }
}

impl From<mongodb::error::Error> for HearthError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<bson::ser::Error> for HearthError {
    fn from(err: bson::ser::Error) -> Self {
        Self::InvalidDocument(format!("BSON encode error: {}", err))
    }
}

impl From<bson::de::Error> for HearthError {
    fn from(err: bson::de::Error) -> Self {
        Self::InvalidDocument(format!("BSON decode error: {}", err))
    }
}

impl From<reqwest::Error> for HearthError {
    fn from(err: reqwest::Error) -> Self {
        Self::Notification(err.to_string())
    }
}

impl From<async_nats::Error> for HearthError {
    fn from(err: async_nats::Error) -> Self {
        Self::Nats(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for HearthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::Auth(format!("JWT error: {}", err))
    }
}

/// Result type alias for Hearth operations
pub type Result<T> = std::result::Result<T, HearthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HearthError::NotFound("prayerRequests/r1".into());
        assert_eq!(err.to_string(), "Not found: prayerRequests/r1");
        assert!(err.is_not_found());
        assert!(!err.is_already_exists());
    }

    #[test]
    fn test_json_error_maps_to_invalid_document() {
        let err: HearthError = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert!(matches!(err, HearthError::InvalidDocument(_)));
    }
}
