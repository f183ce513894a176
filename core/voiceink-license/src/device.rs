//! Device identification for license activations.
//!
//! The validator labels each activation with a device identifier. The
//! identifier is derived from the hardware serial number when the platform
//! exposes one; otherwise a random identifier is generated once and kept in
//! the settings store.

use crate::error::LicenseResult;
use crate::store::{keys, SettingsStore};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::env;
use tracing::debug;
use uuid::Uuid;

/// Information about the current device, sent along with activations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Operating system name.
    pub os_name: String,
    /// Operating system version.
    pub os_version: String,
    /// Hostname.
    pub hostname: String,
    /// CPU architecture.
    pub arch: String,
}

impl DeviceInfo {
    /// Collects information about the current device.
    #[must_use]
    pub fn collect() -> Self {
        Self {
            os_name: env::consts::OS.to_string(),
            os_version: get_os_version(),
            hostname: get_hostname(),
            arch: env::consts::ARCH.to_string(),
        }
    }
}

/// Supplies the identifier this device presents to the validator.
pub trait DeviceIdProvider: Send + Sync {
    /// Returns a stable identifier for this device, persisting anything it
    /// generates in `store`.
    fn device_id(&self, store: &mut dyn SettingsStore) -> LicenseResult<String>;
}

/// Hardware serial when available, else a persisted random identifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct HardwareDeviceId;

impl HardwareDeviceId {
    /// Hashes a hardware serial into an identifier.
    ///
    /// The raw serial never leaves the machine.
    #[must_use]
    pub fn from_serial(serial: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(serial.trim().as_bytes());
        let hash = hasher.finalize();
        BASE64.encode(&hash[..16])
    }
}

impl DeviceIdProvider for HardwareDeviceId {
    fn device_id(&self, store: &mut dyn SettingsStore) -> LicenseResult<String> {
        if let Some(serial) = get_hardware_serial() {
            return Ok(Self::from_serial(&serial));
        }
        persisted_random_id(store)
    }
}

/// Always the persisted random identifier, ignoring hardware.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomDeviceId;

impl DeviceIdProvider for RandomDeviceId {
    fn device_id(&self, store: &mut dyn SettingsStore) -> LicenseResult<String> {
        persisted_random_id(store)
    }
}

/// A fixed identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticDeviceId(pub String);

impl DeviceIdProvider for StaticDeviceId {
    fn device_id(&self, _store: &mut dyn SettingsStore) -> LicenseResult<String> {
        Ok(self.0.clone())
    }
}

fn persisted_random_id(store: &mut dyn SettingsStore) -> LicenseResult<String> {
    if let Some(existing) = store.get_string(keys::DEVICE_IDENTIFIER) {
        return Ok(existing);
    }
    let id = Uuid::new_v4().to_string().to_uppercase();
    store.set_string(keys::DEVICE_IDENTIFIER, &id)?;
    debug!(device_id = %id, "Generated device identifier");
    Ok(id)
}

/// Gets the machine hostname.
fn get_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Gets the OS version string.
fn get_os_version() -> String {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("sw_vers")
            .arg("-productVersion")
            .output()
            .ok()
            .and_then(|o| String::from_utf8(o.stdout).ok())
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }

    #[cfg(target_os = "linux")]
    {
        std::fs::read_to_string("/etc/os-release")
            .ok()
            .and_then(|content| {
                content
                    .lines()
                    .find(|l| l.starts_with("VERSION_ID="))
                    .map(|l| {
                        l.trim_start_matches("VERSION_ID=")
                            .trim_matches('"')
                            .to_string()
                    })
            })
            .unwrap_or_else(|| "unknown".to_string())
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        "unknown".to_string()
    }
}

/// Gets the hardware serial number, if the platform exposes one.
fn get_hardware_serial() -> Option<String> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("ioreg")
            .args(["-rd1", "-c", "IOPlatformExpertDevice"])
            .output()
            .ok()
            .and_then(|o| String::from_utf8(o.stdout).ok())
            .and_then(|output| {
                output
                    .lines()
                    .find(|l| l.contains("IOPlatformSerialNumber"))
                    .and_then(|l| l.split('"').nth(3))
                    .map(|s| s.trim().to_string())
            })
            .filter(|s| !s.is_empty())
    }

    #[cfg(target_os = "linux")]
    {
        std::fs::read_to_string("/etc/machine-id")
            .or_else(|_| std::fs::read_to_string("/var/lib/dbus/machine-id"))
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        None
    }
}
