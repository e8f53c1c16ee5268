//! Type definitions and constants.
//!
//! This module contains BlueZ interface names and default timings.

pub(crate) mod constants;
