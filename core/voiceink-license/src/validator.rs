//! The remote license validator contract.
//!
//! The gate never decides on its own whether a key is genuine; it asks a
//! [`LicenseValidator`]. The Polar-backed implementation lives in
//! [`crate::polar`] behind the `online` feature.

use crate::error::LicenseResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Result of the first validation round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationCheck {
    /// The key exists and is granted.
    pub is_valid: bool,
    /// The key must be bound to this device before use.
    pub requires_activation: bool,
    /// Maximum number of device activations, if limited.
    pub activations_limit: Option<u32>,
}

/// A device activation handed out by the validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activation {
    /// Identifies this device's activation of the key.
    pub activation_id: String,
    /// Maximum number of device activations for the key.
    pub activations_limit: u32,
}

/// Authoritative license key checks, usually over the network.
#[async_trait]
pub trait LicenseValidator: Send + Sync {
    /// Checks whether `key` is valid and whether it needs a device activation.
    async fn check_license_requires_activation(&self, key: &str) -> LicenseResult<ActivationCheck>;

    /// Binds `key` to this device.
    async fn activate_license_key(&self, key: &str) -> LicenseResult<Activation>;

    /// Confirms that an earlier activation of `key` is still valid.
    async fn validate_license_key_with_activation(
        &self,
        key: &str,
        activation_id: &str,
    ) -> LicenseResult<bool>;
}
