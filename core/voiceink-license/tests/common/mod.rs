//! Shared test helpers for license tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::{Arc, Mutex};
use voiceink_license::{
    Activation, ActivationCheck, Clock, LicenseConfig, LicenseError, LicenseManager,
    LicenseResult, LicenseValidator, MemoryStore, SettingsStore, UrlOpener,
};

pub const GOOD_KEY: &str = "GOODKEY";
pub const BAD_KEY: &str = "BADKEY";

/// A fixed point in time all tests start from.
pub fn day0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 9, 30, 0).unwrap()
}

/// Clock that only moves when told to.
#[derive(Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance_days(&self, days: i64) {
        *self.now.lock().unwrap() += Duration::days(days);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Scripted validator behaviour plus call counters.
#[derive(Debug, Default)]
pub struct MockState {
    pub valid_keys: Vec<String>,
    /// `Some` makes valid keys require activation with this limit.
    pub activations_limit: Option<u32>,
    pub network_error: Option<String>,
    pub activation_limit_reached: bool,
    pub activation_still_valid: bool,
    pub check_calls: usize,
    pub activate_calls: usize,
    pub revalidate_calls: usize,
}

/// In-memory validator. Clones share state, so tests keep a handle.
#[derive(Clone, Default)]
pub struct MockValidator {
    pub state: Arc<Mutex<MockState>>,
}

impl MockValidator {
    /// Accepts [`GOOD_KEY`] without activation.
    pub fn accepting() -> Self {
        let validator = Self::default();
        validator.state.lock().unwrap().valid_keys.push(GOOD_KEY.to_string());
        validator
    }

    /// Accepts [`GOOD_KEY`], requiring an activation limited to `limit` devices.
    pub fn with_activation(limit: u32) -> Self {
        let validator = Self::accepting();
        {
            let mut state = validator.state.lock().unwrap();
            state.activations_limit = Some(limit);
            state.activation_still_valid = true;
        }
        validator
    }

    /// Fails every call with a network error.
    pub fn offline() -> Self {
        let validator = Self::accepting();
        validator.state.lock().unwrap().network_error = Some("connection refused".to_string());
        validator
    }

    pub fn check_calls(&self) -> usize {
        self.state.lock().unwrap().check_calls
    }

    pub fn activate_calls(&self) -> usize {
        self.state.lock().unwrap().activate_calls
    }

    pub fn revalidate_calls(&self) -> usize {
        self.state.lock().unwrap().revalidate_calls
    }
}

#[async_trait]
impl LicenseValidator for MockValidator {
    async fn check_license_requires_activation(&self, key: &str) -> LicenseResult<ActivationCheck> {
        let mut state = self.state.lock().unwrap();
        state.check_calls += 1;
        if let Some(err) = &state.network_error {
            return Err(LicenseError::Network(err.clone()));
        }
        let is_valid = state.valid_keys.iter().any(|k| k == key);
        Ok(ActivationCheck {
            is_valid,
            requires_activation: is_valid && state.activations_limit.is_some(),
            activations_limit: state.activations_limit,
        })
    }

    async fn activate_license_key(&self, _key: &str) -> LicenseResult<Activation> {
        let mut state = self.state.lock().unwrap();
        state.activate_calls += 1;
        if state.activation_limit_reached {
            return Err(LicenseError::ActivationLimitReached);
        }
        let limit = state
            .activations_limit
            .ok_or(LicenseError::ActivationNotRequired)?;
        Ok(Activation {
            activation_id: format!("act-{}", state.activate_calls),
            activations_limit: limit,
        })
    }

    async fn validate_license_key_with_activation(
        &self,
        key: &str,
        _activation_id: &str,
    ) -> LicenseResult<bool> {
        let mut state = self.state.lock().unwrap();
        state.revalidate_calls += 1;
        if let Some(err) = &state.network_error {
            return Err(LicenseError::Network(err.clone()));
        }
        Ok(state.activation_still_valid && state.valid_keys.iter().any(|k| k == key))
    }
}

/// Validator whose calls never complete.
pub struct PendingValidator;

#[async_trait]
impl LicenseValidator for PendingValidator {
    async fn check_license_requires_activation(&self, _key: &str) -> LicenseResult<ActivationCheck> {
        std::future::pending().await
    }

    async fn activate_license_key(&self, _key: &str) -> LicenseResult<Activation> {
        std::future::pending().await
    }

    async fn validate_license_key_with_activation(
        &self,
        _key: &str,
        _activation_id: &str,
    ) -> LicenseResult<bool> {
        std::future::pending().await
    }
}

/// Records every URL it is asked to open.
#[derive(Clone, Default)]
pub struct RecordingOpener {
    pub opened: Arc<Mutex<Vec<String>>>,
}

impl UrlOpener for RecordingOpener {
    fn open(&self, url: &str) -> LicenseResult<()> {
        self.opened.lock().unwrap().push(url.to_string());
        Ok(())
    }
}

/// Manager over `store` with a manual clock at [`day0`].
pub fn manager_with(
    store: Box<dyn SettingsStore>,
    validator: impl LicenseValidator + 'static,
) -> (LicenseManager, ManualClock) {
    let clock = ManualClock::new(day0());
    let manager = LicenseManager::new(LicenseConfig::default(), store, Box::new(validator))
        .with_clock(Arc::new(clock.clone()));
    (manager, clock)
}

/// Manager over a fresh in-memory store.
pub fn fresh_manager(validator: impl LicenseValidator + 'static) -> (LicenseManager, ManualClock) {
    manager_with(Box::new(MemoryStore::new()), validator)
}
