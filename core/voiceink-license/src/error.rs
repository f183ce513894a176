//! Error types for the licensing module.

use thiserror::Error;

/// Licensing-specific errors.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// No license key was supplied.
    #[error("please enter a license key")]
    EmptyKey,

    /// The validator rejected the key.
    #[error("invalid license key")]
    InvalidKey,

    /// The validator answered with something we could not use.
    #[error("license validation failed: {0}")]
    Validator(String),

    /// Network error while talking to the validator.
    #[error("network error: {0}")]
    Network(String),

    /// Activation failed.
    #[error("failed to activate license on this device: {0}")]
    ActivationFailed(String),

    /// Activation was requested for a key that does not need it.
    #[error("this license does not require activation")]
    ActivationNotRequired,

    /// The key is already bound to its maximum number of devices.
    #[error("activation limit reached")]
    ActivationLimitReached,

    /// URL that cannot be handed to the browser.
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for license operations.
pub type LicenseResult<T> = Result<T, LicenseError>;
