//! Opening the authorization URL in the user's browser

use crate::{AuthError, AuthResult};
use std::process::{Command, Stdio};
use tracing::debug;

/// Starts an external user agent at a URL
pub trait BrowserLauncher: Send + Sync {
    /// Start the browser without waiting for it to exit
    fn launch(&self, url: &str) -> AuthResult<()>;
}

/// Launcher picked from the running platform
#[derive(Debug, Clone)]
pub struct SystemBrowser {
    command: &'static str,
}

impl SystemBrowser {
    pub fn detect() -> Self {
        let release = kernel_release();
        let command = select_launcher(std::env::consts::OS, release.as_deref());
        debug!(
            "Browser launcher {} (os={}, kernel={:?})",
            command,
            std::env::consts::OS,
            release
        );
        Self { command }
    }

    pub fn command(&self) -> &str {
        self.command
    }
}

impl Default for SystemBrowser {
    fn default() -> Self {
        Self::detect()
    }
}

impl BrowserLauncher for SystemBrowser {
    fn launch(&self, url: &str) -> AuthResult<()> {
        Command::new(self.command)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| AuthError::BrowserLaunchFailed {
                launcher: self.command.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }
}

/// Launcher command for a target OS and kernel release
///
/// WSL kernels report "WSL" in their release string.
pub fn select_launcher(os: &str, kernel_release: Option<&str>) -> &'static str {
    if kernel_release.is_some_and(|r| r.contains("WSL")) {
        return "wsl-open";
    }
    match os {
        "macos" => "open",
        _ => "xdg-open",
    }
}

/// Kernel release string, when the platform exposes one
fn kernel_release() -> Option<String> {
    if cfg!(target_os = "linux") {
        std::fs::read_to_string("/proc/sys/kernel/osrelease")
            .ok()
            .map(|r| r.trim().to_string())
    } else {
        None
    }
}
