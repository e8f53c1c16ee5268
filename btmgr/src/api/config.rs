//! Timeouts and external commands used by a [`BluetoothSession`](crate::BluetoothSession).

use std::time::Duration;

use crate::api::collaborators::CommandSpec;
use crate::types::constants::{radio, timeouts};

/// Per-operation deadlines and timer lengths.
///
/// # Example
///
/// ```rust
/// use btmgr::TimeoutConfig;
/// use std::time::Duration;
///
/// let config = TimeoutConfig::new()
///     .with_device_timeout(Duration::from_secs(45))
///     .with_settle_delay(Duration::from_secs(1));
///
/// assert_eq!(config.device_timeout, Duration::from_secs(45));
/// assert_eq!(config.power_timeout, Duration::from_secs(5));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutConfig {
    /// Deadline for setting the adapter's `Powered` property.
    pub power_timeout: Duration,
    /// Deadline for a device `Connect`/`Disconnect`.
    pub device_timeout: Duration,
    /// Deadline for enumerating the BlueZ object tree.
    pub enumerate_timeout: Duration,
    /// Deadline for starting or stopping discovery.
    pub discovery_timeout: Duration,
    /// Wait after a successful command before re-reading state.
    pub settle_delay: Duration,
    /// Wait between adapter resolution attempts while BlueZ is absent.
    pub resolve_backoff: Duration,
    /// How long a settings launcher must survive to count as started.
    pub launch_grace: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            power_timeout: timeouts::power_timeout(),
            device_timeout: timeouts::device_timeout(),
            enumerate_timeout: timeouts::enumerate_timeout(),
            discovery_timeout: timeouts::discovery_timeout(),
            settle_delay: timeouts::settle_delay(),
            resolve_backoff: timeouts::resolve_backoff(),
            launch_grace: timeouts::launch_grace(),
        }
    }
}

impl TimeoutConfig {
    /// Creates a configuration with the default timings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_power_timeout(mut self, timeout: Duration) -> Self {
        self.power_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_device_timeout(mut self, timeout: Duration) -> Self {
        self.device_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_enumerate_timeout(mut self, timeout: Duration) -> Self {
        self.enumerate_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    #[must_use]
    pub fn with_resolve_backoff(mut self, backoff: Duration) -> Self {
        self.resolve_backoff = backoff;
        self
    }

    #[must_use]
    pub fn with_launch_grace(mut self, grace: Duration) -> Self {
        self.launch_grace = grace;
        self
    }
}

/// Full session configuration.
///
/// Defaults match a stock GNOME desktop: `rfkill` as the radio fallback and
/// GNOME Settings or Blueman as the settings application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub timeouts: TimeoutConfig,
    /// Command the radio verb (`block`/`unblock`) and target are appended to.
    pub radio_command: CommandSpec,
    /// Settings launchers, tried in order.
    pub settings_launchers: Vec<CommandSpec>,
    /// Cap on adapter resolution attempts. `None` retries until shutdown.
    pub max_resolve_attempts: Option<u32>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeouts: TimeoutConfig::default(),
            radio_command: CommandSpec::new(radio::PROGRAM),
            settings_launchers: default_settings_launchers(),
            max_resolve_attempts: None,
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Replaces the radio control command, e.g. `pkexec rfkill`.
    #[must_use]
    pub fn with_radio_command(mut self, cmd: CommandSpec) -> Self {
        self.radio_command = cmd;
        self
    }

    #[must_use]
    pub fn with_settings_launchers(mut self, launchers: Vec<CommandSpec>) -> Self {
        self.settings_launchers = launchers;
        self
    }

    #[must_use]
    pub fn with_max_resolve_attempts(mut self, attempts: u32) -> Self {
        self.max_resolve_attempts = Some(attempts);
        self
    }

    /// Full radio control invocation for the requested power state.
    pub(crate) fn radio_invocation(&self, powered: bool) -> CommandSpec {
        let verb = if powered { radio::UNBLOCK } else { radio::BLOCK };
        self.radio_command.clone().args([verb, radio::TARGET])
    }
}

fn default_settings_launchers() -> Vec<CommandSpec> {
    vec![
        CommandSpec::new("gnome-control-center").arg("bluetooth"),
        CommandSpec::new("gnome-control-center")
            .arg("bluetooth")
            .env("XDG_CURRENT_DESKTOP", "GNOME"),
        CommandSpec::new("blueman-manager"),
        CommandSpec::new("gnome-control-center"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timeouts() {
        let t = TimeoutConfig::default();
        assert_eq!(t.power_timeout, Duration::from_secs(5));
        assert_eq!(t.device_timeout, Duration::from_secs(30));
        assert_eq!(t.settle_delay, Duration::from_millis(500));
        assert_eq!(t.resolve_backoff, Duration::from_millis(500));
    }

    #[test]
    fn test_radio_invocation() {
        let config = SessionConfig::default();
        assert_eq!(config.radio_invocation(true).to_string(), "rfkill unblock bluetooth");
        assert_eq!(config.radio_invocation(false).to_string(), "rfkill block bluetooth");

        let config = config.with_radio_command(CommandSpec::new("pkexec").arg("rfkill"));
        assert_eq!(
            config.radio_invocation(true).to_string(),
            "pkexec rfkill unblock bluetooth"
        );
    }

    #[test]
    fn test_default_launchers_order() {
        let launchers = SessionConfig::default().settings_launchers;
        assert_eq!(launchers.len(), 4);
        assert_eq!(launchers[0].to_string(), "gnome-control-center bluetooth");
        assert_eq!(launchers[2].program, "blueman-manager");
        assert!(SessionConfig::default().max_resolve_attempts.is_none());
    }
}
