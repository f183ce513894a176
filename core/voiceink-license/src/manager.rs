//! The license manager: trial bookkeeping, key validation and observers.
//!
//! All mutating operations take `&mut self`, so at most one validation can be
//! in flight per manager. Observers never touch the manager directly; they
//! subscribe to a [`LicenseSnapshot`] container and to
//! [`LicenseStatusChanged`] events.

use crate::config::LicenseConfig;
use crate::error::{LicenseError, LicenseResult};
use crate::platform::{Clock, SystemBrowser, SystemClock, UrlOpener};
use crate::state::{derive_state, LicenseState};
use crate::store::{keys, PersistedLicense, SettingsStore};
use crate::validator::LicenseValidator;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

/// Shown when validation is attempted without a key.
pub const EMPTY_KEY_MESSAGE: &str = "Please enter a license key.";
/// Shown when the validator rejects a key.
pub const INVALID_KEY_MESSAGE: &str = "Invalid license key.";
/// Shown after a key has been accepted.
pub const ACTIVATED_MESSAGE: &str = "License activated successfully!";
/// Shown when the key has no activations left.
pub const ACTIVATION_LIMIT_MESSAGE: &str =
    "This license has reached its activation limit. Deactivate another device first.";
/// Shown when a stored activation is no longer accepted.
pub const REVOKED_MESSAGE: &str = "Your license is no longer valid on this device.";

const EVENT_CAPACITY: usize = 16;

/// Settings tied to the key itself. Trial bookkeeping is not among them.
const LICENSE_FIELDS: [&str; 4] = [
    keys::LICENSE_KEY,
    keys::ACTIVATION_ID,
    keys::REQUIRES_ACTIVATION,
    keys::ACTIVATIONS_LIMIT,
];

/// Broadcast whenever the license status changes through
/// [`LicenseManager::start_trial`], [`LicenseManager::validate_license`],
/// [`LicenseManager::remove_license`] or a revoked activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LicenseStatusChanged;

/// Everything a license screen needs to render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseSnapshot {
    pub state: LicenseState,
    pub is_validating: bool,
    pub validation_message: Option<String>,
}

/// How a successful validation bound the key.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ActivationOutcome {
    /// Key works on any number of devices.
    Unlimited,
    /// Key was bound to this device.
    Activated { activation_id: String, limit: u32 },
}

/// Raises the validating flag for as long as it is alive.
///
/// Dropping the guard lowers the flag, including when the validation future
/// itself is dropped mid-flight.
struct ValidatingGuard<'a> {
    snapshot: &'a watch::Sender<LicenseSnapshot>,
}

impl<'a> ValidatingGuard<'a> {
    fn begin(snapshot: &'a watch::Sender<LicenseSnapshot>) -> Self {
        snapshot.send_modify(|s| {
            s.is_validating = true;
            s.validation_message = None;
        });
        Self { snapshot }
    }
}

impl Drop for ValidatingGuard<'_> {
    fn drop(&mut self) {
        self.snapshot.send_modify(|s| s.is_validating = false);
    }
}

/// Owns the license state of the app.
pub struct LicenseManager {
    config: LicenseConfig,
    store: Box<dyn SettingsStore>,
    validator: Box<dyn LicenseValidator>,
    clock: Arc<dyn Clock>,
    opener: Box<dyn UrlOpener>,
    snapshot: watch::Sender<LicenseSnapshot>,
    events: broadcast::Sender<LicenseStatusChanged>,
}

impl LicenseManager {
    /// Creates a manager and loads the persisted state.
    pub fn new(
        config: LicenseConfig,
        store: Box<dyn SettingsStore>,
        validator: Box<dyn LicenseValidator>,
    ) -> Self {
        let (snapshot, _) = watch::channel(LicenseSnapshot {
            state: LicenseState::fresh_trial(config.trial_period_days),
            is_validating: false,
            validation_message: None,
        });
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let mut manager = Self {
            config,
            store,
            validator,
            clock: Arc::new(SystemClock),
            opener: Box::new(SystemBrowser),
            snapshot,
            events,
        };
        manager.load_license_state();
        manager
    }

    /// Replaces the clock and recomputes the state against it.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self.load_license_state();
        self
    }

    /// Replaces the URL opener used by [`LicenseManager::open_purchase_link`].
    #[must_use]
    pub fn with_opener(mut self, opener: Box<dyn UrlOpener>) -> Self {
        self.opener = opener;
        self
    }

    // ── Queries ──────────────────────────────────────────────────

    /// Current license state.
    #[must_use]
    pub fn state(&self) -> LicenseState {
        self.snapshot.borrow().state
    }

    /// True while a validator round trip is in flight.
    #[must_use]
    pub fn is_validating(&self) -> bool {
        self.snapshot.borrow().is_validating
    }

    /// Message from the last validation attempt, if any.
    #[must_use]
    pub fn validation_message(&self) -> Option<String> {
        self.snapshot.borrow().validation_message.clone()
    }

    /// Copy of the observable state.
    #[must_use]
    pub fn snapshot(&self) -> LicenseSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Whether the app may be used right now.
    #[must_use]
    pub fn can_use_app(&self) -> bool {
        self.config.bypass_gate || self.state().is_usable()
    }

    /// The stored license key, if any.
    #[must_use]
    pub fn license_key(&self) -> Option<String> {
        self.store.get_string(keys::LICENSE_KEY)
    }

    /// Activation limit recorded for the stored key, if it has one.
    #[must_use]
    pub fn activations_limit(&self) -> Option<u32> {
        self.store.get_u32(keys::ACTIVATIONS_LIMIT)
    }

    /// When the trial was started, if it has been.
    #[must_use]
    pub fn trial_start_date(&self) -> Option<DateTime<Utc>> {
        self.store.get_timestamp(keys::TRIAL_START_DATE)
    }

    /// The manager's configuration.
    #[must_use]
    pub fn config(&self) -> &LicenseConfig {
        &self.config
    }

    /// The backing settings store.
    #[must_use]
    pub fn store(&self) -> &dyn SettingsStore {
        self.store.as_ref()
    }

    /// Consumes the manager, returning its settings store.
    #[must_use]
    pub fn into_store(self) -> Box<dyn SettingsStore> {
        self.store
    }

    // ── Observers ────────────────────────────────────────────────

    /// Subscribes to the observable state container.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<LicenseSnapshot> {
        self.snapshot.subscribe()
    }

    /// Subscribes to status-changed events.
    #[must_use]
    pub fn subscribe_events(&self) -> broadcast::Receiver<LicenseStatusChanged> {
        self.events.subscribe()
    }

    // ── Operations ───────────────────────────────────────────────

    /// Recomputes the state from the persisted fields.
    pub fn load_license_state(&mut self) -> LicenseState {
        let persisted = PersistedLicense::load(self.store.as_ref());
        let state = derive_state(&persisted, self.clock.now(), self.config.trial_period_days);
        self.snapshot.send_if_modified(|s| {
            let changed = s.state != state;
            s.state = state;
            changed
        });
        debug!(?state, "Loaded license state");
        state
    }

    /// Starts the trial unless one was already started.
    ///
    /// Returns true if this call started it.
    pub fn start_trial(&mut self) -> bool {
        if self.store.get_timestamp(keys::TRIAL_START_DATE).is_some() {
            debug!("Trial already started");
            return false;
        }

        let now = self.clock.now();
        if let Err(e) = self.store.set_timestamp(keys::TRIAL_START_DATE, now) {
            warn!(error = %e, "Failed to persist trial start date");
        }

        // A stored key still wins over the new trial.
        let state = if PersistedLicense::load(self.store.as_ref()).has_license_key() {
            LicenseState::Licensed
        } else {
            LicenseState::fresh_trial(self.config.trial_period_days)
        };
        self.set_state(state);
        info!(trial_days = self.config.trial_period_days, "Trial started");
        self.notify();
        true
    }

    /// Records an app launch, starting the trial on the very first one.
    ///
    /// Returns true on the first launch.
    pub fn record_launch(&mut self) -> bool {
        if self.store.get_bool(keys::HAS_LAUNCHED_BEFORE) {
            self.load_license_state();
            return false;
        }

        if let Err(e) = self.store.set_bool(keys::HAS_LAUNCHED_BEFORE, true) {
            warn!(error = %e, "Failed to persist first-launch flag");
        }
        self.start_trial();
        true
    }

    /// Checks `key` with the validator and, if accepted, licenses the app.
    ///
    /// Errors never escape; they end up in the validation message. Returns
    /// true if the app is now licensed with `key`.
    pub async fn validate_license(&mut self, key: &str) -> bool {
        let key = key.trim();
        if key.is_empty() {
            self.set_message(Some(EMPTY_KEY_MESSAGE.to_string()));
            return false;
        }

        let outcome = {
            let _validating = ValidatingGuard::begin(&self.snapshot);
            check_and_activate(self.validator.as_ref(), key).await
        };

        let result = match outcome {
            Ok(activation) => self.persist_license(key, &activation),
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                info!("License key accepted");
                self.snapshot.send_modify(|s| {
                    s.state = LicenseState::Licensed;
                    s.validation_message = Some(ACTIVATED_MESSAGE.to_string());
                });
                self.notify();
                true
            }
            Err(e) => {
                warn!(error = %e, "License validation failed");
                self.set_message(Some(message_for(&e)));
                false
            }
        }
    }

    /// Re-checks a stored device activation with the validator.
    ///
    /// A definite rejection clears the key and its activation but keeps the
    /// trial dates, so an expired trial stays expired. Network failures keep
    /// the license, so the app keeps working offline. Returns true if the app is still
    /// licensed afterwards.
    pub async fn revalidate_stored_license(&mut self) -> bool {
        let persisted = PersistedLicense::load(self.store.as_ref());
        let (Some(key), Some(activation_id)) = (persisted.license_key, persisted.activation_id)
        else {
            return self.state().is_licensed();
        };

        let result = {
            let _validating = ValidatingGuard::begin(&self.snapshot);
            self.validator
                .validate_license_key_with_activation(&key, &activation_id)
                .await
        };

        match result {
            Ok(true) => {
                debug!("Stored activation still valid");
                true
            }
            Ok(false) => {
                info!("Stored activation rejected, removing license");
                self.clear_settings(&LICENSE_FIELDS);
                self.set_message(Some(REVOKED_MESSAGE.to_string()));
                self.load_license_state();
                self.notify();
                false
            }
            Err(e) => {
                warn!(error = %e, "Could not revalidate stored license");
                self.set_message(Some(message_for(&e)));
                self.state().is_licensed()
            }
        }
    }

    /// Forgets the license and the trial, so a fresh trial can start.
    pub fn remove_license(&mut self) {
        self.clear_settings(&LICENSE_FIELDS);
        self.clear_settings(&[keys::TRIAL_START_DATE, keys::HAS_LAUNCHED_BEFORE]);

        let fresh = LicenseState::fresh_trial(self.config.trial_period_days);
        self.snapshot.send_modify(|s| {
            s.state = fresh;
            s.validation_message = None;
        });
        info!("License removed");
        self.notify();
        self.load_license_state();
    }

    /// Opens the purchase page. Failures are only logged.
    pub fn open_purchase_link(&self) {
        let url = &self.config.purchase_url;
        if let Err(e) = self.opener.open(url) {
            warn!(url = %url, error = %e, "Failed to open purchase link");
        }
    }

    // ── Internals ────────────────────────────────────────────────

    fn persist_license(&mut self, key: &str, activation: &ActivationOutcome) -> LicenseResult<()> {
        self.store.set_string(keys::LICENSE_KEY, key)?;
        if let Err(e) = persist_activation(self.store.as_mut(), activation) {
            warn!(error = %e, "Failed to persist activation details");
        }
        Ok(())
    }

    fn clear_settings(&mut self, settings: &[&str]) {
        for &key in settings {
            if let Err(e) = self.store.remove(key) {
                warn!(key, error = %e, "Failed to clear license setting");
            }
        }
    }

    fn set_state(&self, state: LicenseState) {
        self.snapshot.send_modify(|s| s.state = state);
    }

    fn set_message(&self, message: Option<String>) {
        self.snapshot.send_modify(|s| s.validation_message = message);
    }

    fn notify(&self) {
        // No subscribers is fine.
        let _ = self.events.send(LicenseStatusChanged);
    }
}

async fn check_and_activate(
    validator: &dyn LicenseValidator,
    key: &str,
) -> LicenseResult<ActivationOutcome> {
    let check = validator.check_license_requires_activation(key).await?;
    if !check.is_valid {
        return Err(LicenseError::InvalidKey);
    }
    if !check.requires_activation {
        return Ok(ActivationOutcome::Unlimited);
    }

    let activation = validator.activate_license_key(key).await?;
    debug!(
        activation_id = %activation.activation_id,
        limit = activation.activations_limit,
        "License activated on this device"
    );
    Ok(ActivationOutcome::Activated {
        activation_id: activation.activation_id,
        limit: activation.activations_limit,
    })
}

fn persist_activation(
    store: &mut dyn SettingsStore,
    activation: &ActivationOutcome,
) -> LicenseResult<()> {
    match activation {
        ActivationOutcome::Activated {
            activation_id,
            limit,
        } => {
            store.set_string(keys::ACTIVATION_ID, activation_id)?;
            store.set_bool(keys::REQUIRES_ACTIVATION, true)?;
            store.set_u32(keys::ACTIVATIONS_LIMIT, *limit)
        }
        ActivationOutcome::Unlimited => {
            store.remove(keys::ACTIVATION_ID)?;
            store.set_bool(keys::REQUIRES_ACTIVATION, false)?;
            store.remove(keys::ACTIVATIONS_LIMIT)
        }
    }
}

fn message_for(error: &LicenseError) -> String {
    match error {
        LicenseError::EmptyKey => EMPTY_KEY_MESSAGE.to_string(),
        LicenseError::InvalidKey => INVALID_KEY_MESSAGE.to_string(),
        LicenseError::ActivationLimitReached => ACTIVATION_LIMIT_MESSAGE.to_string(),
        other => format!("Error: {other}"),
    }
}
