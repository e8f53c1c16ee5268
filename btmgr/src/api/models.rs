use serde::Serialize;
use std::fmt::{Display, Formatter};
use std::time::Instant;
use thiserror::Error;

use crate::types::constants::{display, error_names};

/// Last-known state of the local Bluetooth adapter.
///
/// `path` is `None` when BlueZ reports no object implementing
/// `org.bluez.Adapter1`. That is a steady condition, not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AdapterState {
    /// D-Bus object path of the adapter (e.g. `/org/bluez/hci0`).
    pub path: Option<String>,
    /// Whether the adapter is powered on.
    pub powered: bool,
}

impl AdapterState {
    /// Returns `true` if an adapter was found.
    #[must_use]
    pub fn is_present(&self) -> bool {
        self.path.is_some()
    }
}

/// A remote Bluetooth peer known to BlueZ.
///
/// Devices are identified by their object path. They are rebuilt from each
/// enumeration and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Device {
    /// D-Bus object path (e.g. `/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF`).
    pub path: String,
    /// Display name. Falls back to the address, then to `"Unknown Device"`.
    pub name: String,
    /// Bluetooth address, empty if BlueZ did not report one.
    pub address: String,
    /// Whether the device is currently connected.
    pub connected: bool,
    /// Whether the device is paired with this adapter.
    pub paired: bool,
    /// Whether the device is trusted.
    pub trusted: bool,
    /// RSSI in dBm. Only reported while discovery is active.
    pub signal_strength: Option<i16>,
}

impl Device {
    /// Builds a device, applying the name fallback chain.
    ///
    /// An absent or empty `name` falls back to `address`; an absent or empty
    /// address falls back to `"Unknown Device"`.
    pub fn new(path: impl Into<String>, name: Option<String>, address: Option<String>) -> Self {
        let address = address.unwrap_or_default();
        let name = name
            .filter(|n| !n.is_empty())
            .or_else(|| (!address.is_empty()).then(|| address.clone()))
            .unwrap_or_else(|| display::UNKNOWN_DEVICE.to_string());

        Self {
            path: path.into(),
            name,
            address,
            connected: false,
            paired: false,
            trusted: false,
            signal_strength: None,
        }
    }

    /// Returns `true` if the display name carries no information beyond an
    /// address, see [`is_junk_name`].
    #[must_use]
    pub fn has_junk_name(&self) -> bool {
        is_junk_name(&self.name)
    }
}

impl Display for Device {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let state = if self.connected {
            "connected"
        } else {
            "disconnected"
        };
        write!(f, "{} [{}] ({state})", self.name, self.address)
    }
}

/// Returns `true` if `name` is exactly a MAC address such as
/// `AA:BB:CC:DD:EE:FF`.
///
/// BlueZ falls back to the address when a peer never sent a name, so such
/// entries are not meaningful to show as a device name.
#[must_use]
pub fn is_junk_name(name: &str) -> bool {
    let octets: Vec<&str> = name.split(':').collect();
    octets.len() == 6
        && octets
            .iter()
            .all(|o| o.len() == 2 && o.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Read model handed to the UI collaborator after every refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    /// Adapter path and power state.
    pub adapter: AdapterState,
    /// Paired devices, connected first, then by case-insensitive name.
    pub paired_devices: Vec<Device>,
    /// Whether discovery is running.
    pub scanning: bool,
    /// Unpaired devices first seen by this refresh during the current scan.
    ///
    /// Each path is reported at most once per scan session, and devices whose
    /// name is only an address are left out.
    pub newly_discovered: Vec<Device>,
}

impl SessionSnapshot {
    /// Looks up a paired device by path.
    #[must_use]
    pub fn device(&self, path: &str) -> Option<&Device> {
        self.paired_devices.iter().find(|d| d.path == path)
    }
}

/// Kind of an outstanding device operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OperationKind {
    /// `org.bluez.Device1.Connect`
    Connect,
    /// `org.bluez.Device1.Disconnect`
    Disconnect,
}

impl OperationKind {
    /// Operation needed to reach the requested connection state.
    #[must_use]
    pub fn for_target(connected: bool) -> Self {
        if connected {
            Self::Connect
        } else {
            Self::Disconnect
        }
    }
}

impl Display for OperationKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connect => write!(f, "connect"),
            Self::Disconnect => write!(f, "disconnect"),
        }
    }
}

/// An in-flight connect or disconnect for one device path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingOperation {
    pub kind: OperationKind,
    pub started_at: Instant,
}

/// Coarse classification of a [`BluetoothError`].
///
/// Callers decide whether to revert optimistic UI state or to notify the user
/// based on the kind, not on the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The bus or the Bluetooth daemon is unreachable.
    Unavailable,
    /// A call exceeded its deadline.
    Timeout,
    /// The adapter or device is not present.
    NotFound,
    /// An operation for the same device is already running.
    OperationInFlight,
    /// The daemon or the radio control command reported a failure.
    RemoteFailure,
    /// No external settings application could be started.
    NoSettingsAvailable,
    /// A property had an unexpected type.
    Decode,
    /// Any other bus-level failure.
    Other,
}

/// Errors that can occur during Bluetooth operations.
///
/// Every error is recoverable: the session stays usable after any failure.
///
/// # Example
///
/// ```no_run
/// use btmgr::{BluetoothSession, ErrorKind};
///
/// # async fn example() -> btmgr::Result<()> {
/// let session = BluetoothSession::new();
/// session.start().await?;
///
/// match session.on_user_toggle_device("/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF", true).await {
///     Ok(_) => println!("Connected"),
///     Err(e) if e.kind() == ErrorKind::OperationInFlight => {
///         println!("Still working on the previous request");
///     }
///     Err(e) => eprintln!("Connection failed: {e}"),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Error)]
pub enum BluetoothError {
    /// The system bus or `org.bluez` is not reachable.
    #[error("Bluetooth service unavailable: {0}")]
    Unavailable(String),

    /// A call did not complete before its deadline.
    #[error("operation timed out: {0}")]
    Timeout(String),

    /// No adapter is present.
    #[error("no Bluetooth adapter found")]
    NoAdapter,

    /// No known device matches the request.
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// A connect or disconnect for this device is already running.
    #[error("an operation is already in progress for {0}")]
    OperationInFlight(String),

    /// BlueZ replied with an error.
    #[error("{message} ({name})")]
    RemoteFailure {
        /// D-Bus error name, e.g. `org.bluez.Error.Failed`.
        name: String,
        /// Human-readable detail from the daemon.
        message: String,
    },

    /// The privileged radio control command failed.
    #[error("radio control failed: {0}")]
    RadioControl(String),

    /// None of the configured settings launchers started.
    #[error("cannot open Bluetooth settings, please open Settings manually")]
    NoSettingsAvailable,

    /// A property was present with an unexpected type.
    #[error("invalid {property} on {path}: expected {expected}")]
    Decode {
        path: String,
        property: String,
        expected: &'static str,
    },

    /// Any other D-Bus failure.
    #[error("D-Bus error: {0}")]
    Dbus(zbus::Error),
}

impl BluetoothError {
    /// Returns the coarse kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unavailable(_) => ErrorKind::Unavailable,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::NoAdapter | Self::DeviceNotFound(_) => ErrorKind::NotFound,
            Self::OperationInFlight(_) => ErrorKind::OperationInFlight,
            Self::RemoteFailure { .. } | Self::RadioControl(_) => ErrorKind::RemoteFailure,
            Self::NoSettingsAvailable => ErrorKind::NoSettingsAvailable,
            Self::Decode { .. } => ErrorKind::Decode,
            Self::Dbus(_) => ErrorKind::Other,
        }
    }

    /// Classifies a D-Bus error reply by its error name.
    pub(crate) fn from_error_reply(name: &str, message: Option<&str>) -> Self {
        let message = message.unwrap_or(name).to_string();
        match name {
            error_names::SERVICE_UNKNOWN | error_names::NAME_HAS_NO_OWNER => {
                Self::Unavailable(message)
            }
            error_names::NO_REPLY | error_names::TIMEOUT | error_names::TIMED_OUT => {
                Self::Timeout(message)
            }
            _ => Self::RemoteFailure {
                name: name.to_string(),
                message,
            },
        }
    }

    /// Returns `true` if this is the daemon's "already in progress" reply.
    pub(crate) fn is_in_progress(&self) -> bool {
        matches!(self, Self::RemoteFailure { name, .. } if name == error_names::IN_PROGRESS)
    }
}

impl From<zbus::Error> for BluetoothError {
    fn from(e: zbus::Error) -> Self {
        match e {
            zbus::Error::MethodError(name, detail, _) => {
                Self::from_error_reply(name.as_str(), detail.as_deref())
            }
            zbus::Error::FDO(fdo) => match *fdo {
                zbus::fdo::Error::ServiceUnknown(m) | zbus::fdo::Error::NameHasNoOwner(m) => {
                    Self::Unavailable(m)
                }
                zbus::fdo::Error::NoReply(m)
                | zbus::fdo::Error::Timeout(m)
                | zbus::fdo::Error::TimedOut(m) => Self::Timeout(m),
                other => Self::Dbus(zbus::Error::FDO(Box::new(other))),
            },
            zbus::Error::InputOutput(io) => Self::Unavailable(io.to_string()),
            zbus::Error::Address(a) => Self::Unavailable(a),
            other => Self::Dbus(other),
        }
    }
}
