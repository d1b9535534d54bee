use thiserror::Error;

/// Failures of the snapshot layer.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot encoding error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Snapshot database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt snapshot: {0}")]
    Corrupt(String),
}

impl PersistenceError {
    pub fn corrupt<S: Into<String>>(msg: S) -> Self {
        Self::Corrupt(msg.into())
    }
}

/// Application-wide error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Whisper not found")]
    NotFound,

    #[error("Whisper already claimed")]
    AlreadyClaimed,

    #[error("Whisper is addressed to someone else")]
    DeniedNotOwner,

    #[error("Invalid whisper: {0}")]
    InvalidWhisper(String),

    #[error("Could not allocate a unique whisper id")]
    IdentitySpaceExhausted,
}

impl AppError {
    pub fn invalid_whisper<S: Into<String>>(msg: S) -> Self {
        Self::InvalidWhisper(msg.into())
    }

    /// True for outcomes a requester should only ever see as "unavailable".
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::NotFound | Self::AlreadyClaimed | Self::DeniedNotOwner
        )
    }
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_family() {
        assert!(AppError::NotFound.is_unavailable());
        assert!(AppError::AlreadyClaimed.is_unavailable());
        assert!(AppError::DeniedNotOwner.is_unavailable());
        assert!(!AppError::IdentitySpaceExhausted.is_unavailable());
        assert!(!AppError::from(PersistenceError::corrupt("bad")).is_unavailable());
    }
}
