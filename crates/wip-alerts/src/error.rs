//! Error types for wip-alerts.
//!
//! All errors are strongly typed and propagated without panicking.
//! Key material and raw token strings are never included in error messages.

/// Coarse classification used by the HTTP layer to pick a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Policy violation or unknown reference supplied by the caller.
    BadRequest,
    /// Missing or failed authentication/authorization.
    Unauthorized,
    /// The addressed resource does not exist.
    NotFound,
    /// Storage, codec or key faults inside the service.
    ServerError,
}

/// Error types covering every operation of the core.
#[derive(Debug, thiserror::Error)]
pub enum AlertsError {
    #[error("Storage failure: {0}")]
    StorageFailure(String),

    #[error("Codec failure: {0}")]
    CodecFailure(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Encryption failed: {0}")]
    Crypto(String),

    /// Decryption or parsing of a compact token failed. Carries no detail.
    #[error("Token invalid")]
    TokenInvalid,

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Renewal not found: {0}")]
    RenewalNotFound(String),

    #[error("API key not found: {0}")]
    ApiKeyNotFound(String),

    #[error("Alert not found: {0}")]
    AlertNotFound(String),

    #[error("Account {0} already has a refresh token")]
    RefreshTokenAlreadyIssued(String),

    #[error("Renewal {0} has already been used")]
    RenewalAlreadyUsed(String),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

impl AlertsError {
    /// Classify the error for the outer request layer.
    pub fn class(&self) -> ErrorClass {
        match self {
            AlertsError::StorageFailure(_)
            | AlertsError::CodecFailure(_)
            | AlertsError::Io(_)
            | AlertsError::InvalidKey(_)
            | AlertsError::Crypto(_) => ErrorClass::ServerError,
            AlertsError::TokenInvalid | AlertsError::Unauthorized(_) => ErrorClass::Unauthorized,
            AlertsError::AlertNotFound(_) => ErrorClass::NotFound,
            AlertsError::AccountNotFound(_)
            | AlertsError::RenewalNotFound(_)
            | AlertsError::ApiKeyNotFound(_)
            | AlertsError::RefreshTokenAlreadyIssued(_)
            | AlertsError::RenewalAlreadyUsed(_)
            | AlertsError::InvalidStateTransition { .. } => ErrorClass::BadRequest,
        }
    }

    /// HTTP status code matching [`AlertsError::class`].
    pub fn http_status(&self) -> u16 {
        match self.class() {
            ErrorClass::BadRequest => 400,
            ErrorClass::Unauthorized => 401,
            ErrorClass::NotFound => 404,
            ErrorClass::ServerError => 500,
        }
    }
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, AlertsError>;
