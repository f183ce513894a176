//! The trial/license state machine.
//!
//! [`LicenseState`] is never persisted. It is derived from the stored
//! [`PersistedLicense`] fields and the current time by [`derive_state`],
//! so a reload can never disagree with what is on disk.

use crate::store::PersistedLicense;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Length of the free trial in days.
pub const TRIAL_PERIOD_DAYS: u32 = 7;

/// The current licensing state of the app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LicenseState {
    /// Trial is running.
    Trial {
        /// Whole days left before the trial expires.
        days_remaining: u32,
    },
    /// Trial ran out and no key has been accepted.
    TrialExpired,
    /// A license key has been accepted.
    Licensed,
}

impl LicenseState {
    /// A trial that has not consumed any days.
    #[must_use]
    pub const fn fresh_trial(trial_period_days: u32) -> Self {
        Self::Trial {
            days_remaining: trial_period_days,
        }
    }

    /// Returns true if the app may be used in this state.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        matches!(self, Self::Trial { .. } | Self::Licensed)
    }

    /// Returns true for [`LicenseState::Licensed`].
    #[must_use]
    pub fn is_licensed(&self) -> bool {
        matches!(self, Self::Licensed)
    }

    /// Days left in the trial, or None outside of a trial.
    #[must_use]
    pub fn trial_days_remaining(&self) -> Option<u32> {
        match self {
            Self::Trial { days_remaining } => Some(*days_remaining),
            _ => None,
        }
    }
}

/// Whole days elapsed since `start`. A start date in the future counts as zero.
#[must_use]
pub fn elapsed_days(start: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
    let days = now.signed_duration_since(start).num_days().max(0);
    u32::try_from(days).unwrap_or(u32::MAX)
}

/// Computes the license state from persisted fields.
///
/// A stored license key wins. Otherwise the trial start date decides between
/// a running trial and an expired one; with no start date the trial is fresh.
#[must_use]
pub fn derive_state(
    persisted: &PersistedLicense,
    now: DateTime<Utc>,
    trial_period_days: u32,
) -> LicenseState {
    if persisted.has_license_key() {
        return LicenseState::Licensed;
    }

    match persisted.trial_start_date {
        Some(start) => {
            let days_remaining = trial_period_days.saturating_sub(elapsed_days(start, now));
            if days_remaining == 0 {
                LicenseState::TrialExpired
            } else {
                LicenseState::Trial { days_remaining }
            }
        }
        None => LicenseState::fresh_trial(trial_period_days),
    }
}
