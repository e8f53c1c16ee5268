//! Constants for the BlueZ D-Bus interface and session defaults.
//!
//! These names correspond to the object tree exported by `bluetoothd` on the
//! system bus. They are a fixed external contract.

/// BlueZ bus name and interface names.
pub mod bluez {
    pub const SERVICE: &str = "org.bluez";
    pub const ADAPTER_INTERFACE: &str = "org.bluez.Adapter1";
    pub const DEVICE_INTERFACE: &str = "org.bluez.Device1";
    pub const OBJECT_MANAGER_INTERFACE: &str = "org.freedesktop.DBus.ObjectManager";
    pub const PROPERTIES_INTERFACE: &str = "org.freedesktop.DBus.Properties";
}

/// BlueZ method names consumed by the controllers.
pub mod methods {
    pub const CONNECT: &str = "Connect";
    pub const DISCONNECT: &str = "Disconnect";
    pub const START_DISCOVERY: &str = "StartDiscovery";
    pub const STOP_DISCOVERY: &str = "StopDiscovery";
    pub const SET: &str = "Set";
}

/// Adapter and device property names.
pub mod properties {
    pub const POWERED: &str = "Powered";
    pub const NAME: &str = "Name";
    pub const ADDRESS: &str = "Address";
    pub const CONNECTED: &str = "Connected";
    pub const PAIRED: &str = "Paired";
    pub const TRUSTED: &str = "Trusted";
    pub const RSSI: &str = "RSSI";
}

/// Signal names watched by the change monitor.
pub mod signals {
    pub const INTERFACES_ADDED: &str = "InterfacesAdded";
    pub const INTERFACES_REMOVED: &str = "InterfacesRemoved";
    pub const PROPERTIES_CHANGED: &str = "PropertiesChanged";
}

/// D-Bus error names that BlueZ and the bus daemon reply with.
pub mod error_names {
    pub const SERVICE_UNKNOWN: &str = "org.freedesktop.DBus.Error.ServiceUnknown";
    pub const NAME_HAS_NO_OWNER: &str = "org.freedesktop.DBus.Error.NameHasNoOwner";
    pub const NO_REPLY: &str = "org.freedesktop.DBus.Error.NoReply";
    pub const TIMEOUT: &str = "org.freedesktop.DBus.Error.Timeout";
    pub const TIMED_OUT: &str = "org.freedesktop.DBus.Error.TimedOut";
    pub const IN_PROGRESS: &str = "org.bluez.Error.InProgress";
}

/// User-facing strings.
pub mod display {
    pub const UNKNOWN_DEVICE: &str = "Unknown Device";
    pub const NOTIFY_TITLE: &str = "Bluetooth Manager";
    pub const SETTINGS_FAILED: &str =
        "Cannot open Bluetooth settings.\nPlease open Settings manually.";
}

/// Privileged radio control fallback.
pub mod radio {
    pub const PROGRAM: &str = "rfkill";
    pub const TARGET: &str = "bluetooth";
    pub const BLOCK: &str = "block";
    pub const UNBLOCK: &str = "unblock";
}

/// Timeout constants for bus calls and timers.
///
/// These define how long a single call may take, and how long to wait for
/// the daemon to settle after a command before re-reading its state.
pub mod timeouts {
    use std::time::Duration;

    /// Deadline for the `Powered` property-set call (5 seconds).
    const POWER_TIMEOUT_SECS: u64 = 5;

    /// Deadline for `Connect`/`Disconnect` (30 seconds).
    ///
    /// Radio negotiation with slow peripherals routinely takes 10-20 seconds.
    const DEVICE_TIMEOUT_SECS: u64 = 30;

    /// Deadline for `GetManagedObjects`, the default D-Bus reply timeout.
    const ENUMERATE_TIMEOUT_SECS: u64 = 25;

    /// Deadline for `StartDiscovery`/`StopDiscovery`.
    const DISCOVERY_TIMEOUT_SECS: u64 = 5;

    /// Delay before re-reading state after a successful command.
    const SETTLE_DELAY_MS: u64 = 500;

    /// Backoff between adapter resolution attempts while the daemon is absent.
    const RESOLVE_BACKOFF_MS: u64 = 500;

    /// How long a settings launcher must survive to count as started.
    const LAUNCH_GRACE_SECS: u64 = 2;

    pub fn power_timeout() -> Duration {
        Duration::from_secs(POWER_TIMEOUT_SECS)
    }

    pub fn device_timeout() -> Duration {
        Duration::from_secs(DEVICE_TIMEOUT_SECS)
    }

    pub fn enumerate_timeout() -> Duration {
        Duration::from_secs(ENUMERATE_TIMEOUT_SECS)
    }

    pub fn discovery_timeout() -> Duration {
        Duration::from_secs(DISCOVERY_TIMEOUT_SECS)
    }

    pub fn settle_delay() -> Duration {
        Duration::from_millis(SETTLE_DELAY_MS)
    }

    pub fn resolve_backoff() -> Duration {
        Duration::from_millis(RESOLVE_BACKOFF_MS)
    }

    pub fn launch_grace() -> Duration {
        Duration::from_secs(LAUNCH_GRACE_SECS)
    }
}
