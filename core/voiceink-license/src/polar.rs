//! Polar license-key validator.
//!
//! Talks to the Polar customer-portal license-key endpoints:
//! - `POST /v1/customer-portal/license-keys/validate`
//! - `POST /v1/customer-portal/license-keys/activate`
//!
//! A key is valid when Polar reports it as `granted`. Keys with an
//! activation limit must be activated on each device before use.

use crate::device::DeviceInfo;
use crate::error::{LicenseError, LicenseResult};
use crate::validator::{Activation, ActivationCheck, LicenseValidator};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

const GRANTED: &str = "granted";

/// Polar API configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolarConfig {
    /// Base URL for the Polar API (e.g. `https://api.polar.sh`).
    pub base_url: String,
    /// Polar organization that issued the keys.
    pub organization_id: String,
    /// Optional bearer token.
    pub api_token: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for PolarConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.polar.sh".to_string(),
            organization_id: String::new(),
            api_token: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Serialize)]
struct ValidateRequest<'a> {
    key: &'a str,
    organization_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    activation_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ValidateResponse {
    status: String,
    #[allow(dead_code)]
    id: Option<String>,
    limit_activations: Option<u32>,
    activation: Option<ActivationRef>,
}

#[derive(Debug, Deserialize)]
struct ActivationRef {
    id: String,
}

#[derive(Debug, Serialize)]
struct ActivateRequest<'a> {
    key: &'a str,
    organization_id: &'a str,
    label: &'a str,
    meta: HashMap<&'static str, String>,
}

#[derive(Debug, Deserialize)]
struct ActivateResponse {
    id: String,
    license_key: LicenseKeyInfo,
}

#[derive(Debug, Deserialize)]
struct LicenseKeyInfo {
    status: String,
    limit_activations: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<String>,
}

/// [`LicenseValidator`] backed by the Polar API.
pub struct PolarValidator {
    config: PolarConfig,
    client: Client,
    device_id: String,
    device: DeviceInfo,
}

impl PolarValidator {
    /// Creates a validator that activates keys under `device_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: PolarConfig, device_id: String) -> LicenseResult<Self> {
        Self::with_device_info(config, device_id, DeviceInfo::collect())
    }

    /// Like [`PolarValidator::new`] with explicit device details.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_device_info(
        config: PolarConfig,
        device_id: String,
        device: DeviceInfo,
    ) -> LicenseResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LicenseError::Network(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            config,
            client,
            device_id,
            device,
        })
    }

    /// The identifier this validator activates keys under.
    #[must_use]
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    fn post(&self, path: &str) -> RequestBuilder {
        let url = format!(
            "{}/v1/customer-portal/license-keys/{path}",
            self.config.base_url.trim_end_matches('/')
        );
        let request = self.client.post(url);
        match self.config.api_token.as_deref() {
            Some(token) if !token.is_empty() => request.bearer_auth(token),
            _ => request,
        }
    }

    async fn validate(&self, key: &str, activation_id: Option<&str>) -> LicenseResult<Option<ValidateResponse>> {
        let body = ValidateRequest {
            key,
            organization_id: &self.config.organization_id,
            activation_id,
        };

        let response = self
            .post("validate")
            .json(&body)
            .send()
            .await
            .map_err(|e| LicenseError::Network(format!("validate request failed: {e}")))?;

        // Unknown keys and unknown activations come back as 404.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = error_for_status(response, LicenseError::Validator).await?;

        let parsed = response
            .json::<ValidateResponse>()
            .await
            .map_err(|e| LicenseError::Validator(format!("invalid validate response: {e}")))?;
        Ok(Some(parsed))
    }
}

#[async_trait]
impl LicenseValidator for PolarValidator {
    async fn check_license_requires_activation(&self, key: &str) -> LicenseResult<ActivationCheck> {
        let Some(response) = self.validate(key, None).await? else {
            debug!("Polar does not know this key");
            return Ok(ActivationCheck {
                is_valid: false,
                requires_activation: false,
                activations_limit: None,
            });
        };

        let is_valid = response.status == GRANTED;
        debug!(
            status = %response.status,
            limit = ?response.limit_activations,
            "Polar validate response"
        );
        Ok(ActivationCheck {
            is_valid,
            requires_activation: is_valid && response.limit_activations.is_some(),
            activations_limit: response.limit_activations,
        })
    }

    async fn activate_license_key(&self, key: &str) -> LicenseResult<Activation> {
        let mut meta = HashMap::new();
        meta.insert("device_id", self.device_id.clone());
        meta.insert("os", self.device.os_name.clone());
        meta.insert("os_version", self.device.os_version.clone());
        meta.insert("arch", self.device.arch.clone());

        let body = ActivateRequest {
            key,
            organization_id: &self.config.organization_id,
            label: &self.device.hostname,
            meta,
        };

        let response = self
            .post("activate")
            .json(&body)
            .send()
            .await
            .map_err(|e| LicenseError::Network(format!("activate request failed: {e}")))?;

        if response.status() == StatusCode::FORBIDDEN {
            let detail = error_detail(response).await;
            return Err(if detail.to_lowercase().contains("does not require activation") {
                LicenseError::ActivationNotRequired
            } else {
                LicenseError::ActivationLimitReached
            });
        }
        let response = error_for_status(response, LicenseError::ActivationFailed).await?;

        let parsed = response
            .json::<ActivateResponse>()
            .await
            .map_err(|e| LicenseError::ActivationFailed(format!("invalid activate response: {e}")))?;

        if parsed.license_key.status != GRANTED {
            return Err(LicenseError::ActivationFailed(format!(
                "license key status is {}",
                parsed.license_key.status
            )));
        }

        Ok(Activation {
            activation_id: parsed.id,
            activations_limit: parsed.license_key.limit_activations.unwrap_or(0),
        })
    }

    async fn validate_license_key_with_activation(
        &self,
        key: &str,
        activation_id: &str,
    ) -> LicenseResult<bool> {
        let Some(response) = self.validate(key, Some(activation_id)).await? else {
            return Ok(false);
        };

        let activation_matches = response
            .activation
            .as_ref()
            .is_some_and(|a| a.id == activation_id);
        Ok(response.status == GRANTED && activation_matches)
    }
}

async fn error_for_status(
    response: Response,
    wrap: fn(String) -> LicenseError,
) -> LicenseResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let detail = error_detail(response).await;
    Err(wrap(format!("HTTP {status}: {detail}")))
}

async fn error_detail(response: Response) -> String {
    let text = response.text().await.unwrap_or_default();
    serde_json::from_str::<ErrorBody>(&text)
        .ok()
        .and_then(|b| b.detail)
        .unwrap_or(text)
}
