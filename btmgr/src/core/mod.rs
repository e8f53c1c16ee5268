//! Core Bluetooth session logic.
//!
//! Each controller owns one piece of mutable state behind a short-lived lock
//! and talks to BlueZ only through the [`BusClient`](crate::BusClient) seam.
//! The session in [`crate::api`] sequences them.

pub(crate) mod adapter;
pub(crate) mod cache;
pub(crate) mod device;
pub(crate) mod scan;
pub(crate) mod system;
