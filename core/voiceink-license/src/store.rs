//! Persisted license settings.
//!
//! License data lives in a small string-keyed settings store, one value per
//! key. [`MemoryStore`] backs tests and ephemeral sessions; [`JsonFileStore`]
//! keeps everything in a single JSON object on disk.

use crate::error::{LicenseError, LicenseResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Setting keys used by the license gate.
pub mod keys {
    /// When the trial started (RFC 3339).
    pub const TRIAL_START_DATE: &str = "VoiceInkTrialStartDate";
    /// The accepted license key.
    pub const LICENSE_KEY: &str = "VoiceInkLicense";
    /// Activation id returned by the validator for this device.
    pub const ACTIVATION_ID: &str = "VoiceInkActivationId";
    /// Whether the stored key is bound to a device activation.
    pub const REQUIRES_ACTIVATION: &str = "VoiceInkLicenseRequiresActivation";
    /// Maximum number of device activations for the stored key.
    pub const ACTIVATIONS_LIMIT: &str = "VoiceInkActivationsLimit";
    /// Set after the first launch.
    pub const HAS_LAUNCHED_BEFORE: &str = "VoiceInkHasLaunchedBefore";
    /// Fallback device identifier when no hardware serial is available.
    pub const DEVICE_IDENTIFIER: &str = "VoiceInkDeviceIdentifier";
}

/// A string-keyed settings store.
///
/// Typed accessors are provided on top of the three raw operations. A value
/// of the wrong type reads as absent.
pub trait SettingsStore: Send + Sync {
    /// Returns the raw value stored under `key`.
    fn get(&self, key: &str) -> Option<Value>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&mut self, key: &str, value: Value) -> LicenseResult<()>;

    /// Removes `key`. Removing a missing key is not an error.
    fn remove(&mut self, key: &str) -> LicenseResult<()>;

    fn get_string(&self, key: &str) -> Option<String> {
        match self.get(key) {
            Some(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    fn set_string(&mut self, key: &str, value: &str) -> LicenseResult<()> {
        self.set(key, Value::String(value.to_string()))
    }

    fn get_bool(&self, key: &str) -> bool {
        matches!(self.get(key), Some(Value::Bool(true)))
    }

    fn set_bool(&mut self, key: &str, value: bool) -> LicenseResult<()> {
        self.set(key, Value::Bool(value))
    }

    fn get_u32(&self, key: &str) -> Option<u32> {
        self.get(key)
            .and_then(|v| v.as_u64())
            .and_then(|n| u32::try_from(n).ok())
    }

    fn set_u32(&mut self, key: &str, value: u32) -> LicenseResult<()> {
        self.set(key, Value::from(value))
    }

    fn get_timestamp(&self, key: &str) -> Option<DateTime<Utc>> {
        self.get_string(key)
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    fn set_timestamp(&mut self, key: &str, value: DateTime<Utc>) -> LicenseResult<()> {
        self.set_string(key, &value.to_rfc3339())
    }
}

/// Snapshot of every persisted license field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedLicense {
    pub trial_start_date: Option<DateTime<Utc>>,
    pub license_key: Option<String>,
    pub activation_id: Option<String>,
    pub requires_activation: bool,
    pub activations_limit: Option<u32>,
    pub has_launched_before: bool,
}

impl PersistedLicense {
    /// Reads all license fields from `store`.
    #[must_use]
    pub fn load(store: &dyn SettingsStore) -> Self {
        Self {
            trial_start_date: store.get_timestamp(keys::TRIAL_START_DATE),
            license_key: store.get_string(keys::LICENSE_KEY),
            activation_id: store.get_string(keys::ACTIVATION_ID),
            requires_activation: store.get_bool(keys::REQUIRES_ACTIVATION),
            activations_limit: store.get_u32(keys::ACTIVATIONS_LIMIT),
            has_launched_before: store.get_bool(keys::HAS_LAUNCHED_BEFORE),
        }
    }

    /// Returns true if a non-blank license key is stored.
    #[must_use]
    pub fn has_license_key(&self) -> bool {
        self.license_key
            .as_deref()
            .is_some_and(|k| !k.trim().is_empty())
    }
}

/// In-memory settings store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: HashMap<String, Value>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl SettingsStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) -> LicenseResult<()> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> LicenseResult<()> {
        self.values.remove(key);
        Ok(())
    }
}

/// Settings store backed by a single JSON object file.
///
/// Every write rewrites the whole file through a temporary sibling and a
/// rename, so readers never observe a half-written file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: Map<String, Value>,
}

impl JsonFileStore {
    /// Opens the store at `path`. A missing file is an empty store.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or is not a
    /// JSON object.
    pub fn open(path: impl Into<PathBuf>) -> LicenseResult<Self> {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => Map::new(),
            Ok(contents) => match serde_json::from_str::<Value>(&contents)? {
                Value::Object(map) => map,
                _ => {
                    return Err(LicenseError::Storage(format!(
                        "{} does not contain a JSON object",
                        path.display()
                    )));
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => return Err(e.into()),
        };

        debug!(path = %path.display(), keys = values.len(), "Opened license store");
        Ok(Self { path, values })
    }

    /// Opens the store at [`JsonFileStore::default_path`].
    pub fn open_default() -> LicenseResult<Self> {
        Self::open(Self::default_path()?)
    }

    /// `<config dir>/VoiceInk/license.json`.
    pub fn default_path() -> LicenseResult<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("VoiceInk").join("license.json"))
            .ok_or_else(|| LicenseError::Storage("no configuration directory available".into()))
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Puts back the in-memory value a failed write replaced, so memory never
    /// runs ahead of the file.
    fn restore(&mut self, key: &str, previous: Option<Value>) {
        match previous {
            Some(value) => self.values.insert(key.to_string(), value),
            None => self.values.remove(key),
        };
    }

    fn flush(&self) -> LicenseResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(&self.values)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl SettingsStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) -> LicenseResult<()> {
        let previous = self.values.insert(key.to_string(), value);
        if let Err(e) = self.flush() {
            self.restore(key, previous);
            return Err(e);
        }
        Ok(())
    }

    fn remove(&mut self, key: &str) -> LicenseResult<()> {
        let Some(previous) = self.values.remove(key) else {
            return Ok(());
        };
        if let Err(e) = self.flush() {
            self.restore(key, Some(previous));
            return Err(e);
        }
        Ok(())
    }
}
