//! Public API module.
//!
//! This module contains the high-level user-facing API for the `btmgr` crate:
//! the [`BluetoothSession`](session::BluetoothSession) facade, its models and
//! configuration, and the collaborator traits it is built on.

pub mod bus;
pub mod collaborators;
pub mod config;
pub mod models;
pub mod session;
