//! A Rust library for controlling Bluetooth through BlueZ.
//!
//! This crate provides the logic behind a panel-menu style Bluetooth
//! controller:
//!
//! - Finding the adapter and switching it on or off
//! - Listing paired devices and connecting or disconnecting them
//! - Running discovery while a menu is open and reporting new devices
//! - Launching an external Bluetooth settings application
//!
//! # Example
//!
//! ```no_run
//! use btmgr::BluetoothSession;
//!
//! # async fn example() -> btmgr::Result<()> {
//! let session = BluetoothSession::new();
//! let snapshot = session.start().await?;
//!
//! if let Some(device) = snapshot.paired_devices.first() {
//!     session.on_user_toggle_device(&device.path, !device.connected).await?;
//! }
//!
//! session.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! All operations return `Result<T, BluetoothError>`. Use
//! [`BluetoothError::kind`] to decide whether to revert optimistic UI state.
//! No error leaves the session unusable.
//!
//! # State Model
//!
//! The session never patches its cache from signal payloads. Every action is
//! followed by a full `GetManagedObjects` enumeration, and
//! [`BluetoothSession::monitor_changes`] only uses BlueZ signals as a trigger
//! for the same re-enumeration.
//!
//! # Testing
//!
//! The bus, the process runner and the notifier are traits
//! ([`BusClient`], [`ProcessRunner`], [`Notifier`]). Build a session over
//! in-memory fakes with [`BluetoothSession::from_parts`].
//!
//! # Logging
//!
//! This crate uses the [`log`](https://docs.rs/log) facade for logging. To see
//! log output, add a logging implementation like `env_logger`. For example:
//!
//! ```no_run,ignore
//! env_logger::init();
//! // ...
//! ```

// Internal implementation modules
mod core;
mod dbus;
mod monitoring;
mod types;
mod util;

// Public API module
pub mod api;

// Re-exported public API
pub use api::bus::{BusClient, Interfaces, ObjectTree, PropValue, Properties};
pub use api::collaborators::{CommandSpec, LaunchOutcome, LogNotifier, Notifier, ProcessRunner};
pub use api::config::{SessionConfig, TimeoutConfig};
pub use api::models::{
    AdapterState, BluetoothError, Device, ErrorKind, OperationKind, PendingOperation,
    SessionSnapshot, is_junk_name,
};
pub use api::session::BluetoothSession;
pub use crate::core::system::SystemRunner;
pub use crate::dbus::ZbusClient;

/// A specialized `Result` type for Bluetooth operations.
pub type Result<T> = std::result::Result<T, BluetoothError>;
