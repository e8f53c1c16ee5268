//! The bus client seam.
//!
//! Controllers talk to BlueZ only through [`BusClient`]. Property values are
//! already decoded into [`PropValue`] when they cross this boundary, so the
//! rest of the crate never touches a raw D-Bus variant.

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use crate::Result;

/// A decoded D-Bus property value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropValue {
    Bool(bool),
    /// Strings and object paths.
    Str(String),
    /// Any integer type that fits in `i64`.
    Int(i64),
    /// Containers and other types this crate does not read.
    Unsupported,
}

impl PropValue {
    /// Human-readable type name, for decode errors.
    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "boolean",
            Self::Str(_) => "string",
            Self::Int(_) => "integer",
            Self::Unsupported => "unsupported",
        }
    }
}

impl From<bool> for PropValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for PropValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for PropValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<i16> for PropValue {
    fn from(v: i16) -> Self {
        Self::Int(i64::from(v))
    }
}

/// Property name to value for one interface.
pub type Properties = HashMap<String, PropValue>;

/// Interface name to properties for one object.
pub type Interfaces = HashMap<String, Properties>;

/// The full managed-object tree, keyed by object path.
///
/// Ordered by path so "the first adapter" is deterministic.
pub type ObjectTree = BTreeMap<String, Interfaces>;

/// Asynchronous access to the Bluetooth daemon's object tree.
///
/// Every call takes a deadline; exceeding it yields
/// [`ErrorKind::Timeout`](crate::ErrorKind::Timeout). When the bus or daemon
/// is absent, calls fail with [`ErrorKind::Unavailable`](crate::ErrorKind::Unavailable)
/// instead of panicking.
#[async_trait]
pub trait BusClient: Send + Sync {
    /// Returns every managed object with its interfaces and properties.
    async fn enumerate_objects(&self, timeout: Duration) -> Result<ObjectTree>;

    /// Invokes an argument-less method on `path`.
    async fn call_method(
        &self,
        path: &str,
        interface: &str,
        method: &str,
        timeout: Duration,
    ) -> Result<()>;

    /// Sets a property on `path` through `org.freedesktop.DBus.Properties`.
    async fn set_property(
        &self,
        path: &str,
        interface: &str,
        property: &str,
        value: PropValue,
        timeout: Duration,
    ) -> Result<()>;

    /// Returns a stream that yields whenever the object tree may have changed.
    async fn watch_changes(&self) -> Result<BoxStream<'static, ()>>;
}
