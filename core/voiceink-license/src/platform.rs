//! Platform seams: wall clock and the system browser.

use crate::error::{LicenseError, LicenseResult};
use chrono::{DateTime, Utc};
use std::process::{Command, Stdio};
use tracing::debug;

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Opens URLs outside the app.
pub trait UrlOpener: Send + Sync {
    /// Starts opening `url` and returns without waiting for it.
    fn open(&self, url: &str) -> LicenseResult<()>;
}

/// Opens URLs in the user's default browser.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBrowser;

impl UrlOpener for SystemBrowser {
    fn open(&self, url: &str) -> LicenseResult<()> {
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(LicenseError::InvalidUrl(url.to_string()));
        }

        let mut command = browser_command(url);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        // The child is not awaited; the browser outlives us.
        let child = command.spawn()?;
        debug!(url, pid = child.id(), "Opened URL in system browser");
        Ok(())
    }
}

fn browser_command(url: &str) -> Command {
    #[cfg(target_os = "macos")]
    {
        let mut cmd = Command::new("open");
        cmd.arg(url);
        cmd
    }

    #[cfg(target_os = "windows")]
    {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", "start", "", url]);
        cmd
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        let mut cmd = Command::new("xdg-open");
        cmd.arg(url);
        cmd
    }
}
