use thiserror::Error;

/// Recoverable user-facing failures. Each maps to a stable IPC error code.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Validation(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("no valid data found")]
    NoValidData,

    #[error("select a workspace first")]
    NoWorkspace,

    #[error("no report writing session is open")]
    NoSession,
}

impl StoreError {
    pub fn invalid(message: impl Into<String>) -> Self {
        StoreError::Validation(message.into())
    }

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            StoreError::Validation(_) => "validation_failed",
            StoreError::NotFound { .. } => "not_found",
            StoreError::NoValidData => "no_valid_data",
            StoreError::NoWorkspace => "no_workspace",
            StoreError::NoSession => "no_session",
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
