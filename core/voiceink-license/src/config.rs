//! License gate configuration.

use crate::state::TRIAL_PERIOD_DAYS;
use serde::{Deserialize, Serialize};

/// Where the "buy a license" button leads.
pub const DEFAULT_PURCHASE_URL: &str = "https://tryvoiceink.com/buy";

/// Configuration for [`crate::LicenseManager`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LicenseConfig {
    /// Length of the free trial in days.
    pub trial_period_days: u32,
    /// URL opened by [`crate::LicenseManager::open_purchase_link`].
    pub purchase_url: String,
    /// Let the app run regardless of license state.
    ///
    /// Only meant for development builds. The state machine still runs and
    /// reports its real state; only `can_use_app` is affected.
    pub bypass_gate: bool,
}

impl Default for LicenseConfig {
    fn default() -> Self {
        Self {
            trial_period_days: TRIAL_PERIOD_DAYS,
            purchase_url: DEFAULT_PURCHASE_URL.to_string(),
            bypass_gate: false,
        }
    }
}
