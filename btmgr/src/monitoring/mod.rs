//! Real-time monitoring of BlueZ object changes.
//!
//! Change signals are only used as a trigger: the handler re-enumerates the
//! whole object tree rather than applying signal payloads.

pub(crate) mod objects;
