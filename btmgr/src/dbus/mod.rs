//! D-Bus access to BlueZ.
//!
//! This module contains the low-level proxy definitions and the zbus-backed
//! [`BusClient`](crate::BusClient) used on a real system bus.

mod client;
mod object_manager;

pub use client::ZbusClient;
pub(crate) use object_manager::BluezObjectManagerProxy;
