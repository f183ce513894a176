//! Trial and license gate for VoiceInk.
//!
//! This crate handles:
//! - A fixed-length free trial that starts once per install
//! - License key validation against a remote validator
//! - Optional per-device activation of license keys
//! - Persisting the result in a local settings store
//!
//! # Design Principles
//!
//! - **Derived state**: the license state is never stored; it is recomputed
//!   from the persisted fields and the clock by [`derive_state`]
//! - **Errors stay inside**: validation failures become a user-facing
//!   message on the manager, never a crash
//! - **Observers subscribe**: UIs watch a [`LicenseSnapshot`] container and
//!   receive [`LicenseStatusChanged`] events instead of a global bus
//! - **Platform at the edges**: clock, browser and device identification sit
//!   behind traits so the state machine has no platform dependency
//!
//! The Polar-backed validator is behind the `online` feature.

mod config;
mod device;
mod error;
mod manager;
mod platform;
mod state;
mod store;
mod validator;

#[cfg(feature = "online")]
pub mod polar;

pub use config::{LicenseConfig, DEFAULT_PURCHASE_URL};
pub use device::{DeviceIdProvider, DeviceInfo, HardwareDeviceId, RandomDeviceId, StaticDeviceId};
pub use error::{LicenseError, LicenseResult};
pub use manager::{
    LicenseManager, LicenseSnapshot, LicenseStatusChanged, ACTIVATED_MESSAGE,
    ACTIVATION_LIMIT_MESSAGE, EMPTY_KEY_MESSAGE, INVALID_KEY_MESSAGE, REVOKED_MESSAGE,
};
pub use platform::{Clock, SystemBrowser, SystemClock, UrlOpener};
pub use state::{derive_state, elapsed_days, LicenseState, TRIAL_PERIOD_DAYS};
pub use store::{keys, JsonFileStore, MemoryStore, PersistedLicense, SettingsStore};
pub use validator::{Activation, ActivationCheck, LicenseValidator};

#[cfg(feature = "online")]
pub use polar::{PolarConfig, PolarValidator};
