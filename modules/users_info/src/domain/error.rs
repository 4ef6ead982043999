use thiserror::Error;

/// Domain-specific errors using thiserror
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("User not found: {id}")]
    UserNotFound { id: u64 },

    #[error("Display name cannot be empty")]
    EmptyDisplayName,

    #[error("Display name too long: {len} characters (max: {max})")]
    DisplayNameTooLong { len: usize, max: usize },

    #[error("Email cannot be empty")]
    EmptyEmail,

    #[error("Storage error: {message}")]
    Storage { message: String },
}

impl DomainError {
    pub fn user_not_found(id: u64) -> Self {
        Self::UserNotFound { id }
    }

    pub fn empty_display_name() -> Self {
        Self::EmptyDisplayName
    }

    pub fn display_name_too_long(len: usize, max: usize) -> Self {
        Self::DisplayNameTooLong { len, max }
    }

    pub fn empty_email() -> Self {
        Self::EmptyEmail
    }

    /// Wrap an infrastructure failure, keeping the whole cause chain in the message.
    pub fn storage(err: &anyhow::Error) -> Self {
        Self::Storage {
            message: format!("{err:#}"),
        }
    }
}
