//! zbus-backed [`BusClient`].

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use log::debug;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::OnceCell;
use zbus::{Connection, MatchRule, MessageStream};
use zvariant::{OwnedObjectPath, OwnedValue, Value};

use crate::Result;
use crate::api::bus::{BusClient, ObjectTree, PropValue};
use crate::api::models::BluetoothError;
use crate::dbus::BluezObjectManagerProxy;
use crate::types::constants::{bluez, methods, signals};
use crate::util::utils::with_timeout;

/// Maximum number of queued signals per subscription.
const SIGNAL_QUEUE: usize = 64;

/// Talks to BlueZ on the system bus.
///
/// The bus connection is opened on first use, not at construction, so a
/// client can be built before `dbus-daemon` or `bluetoothd` are up. Until the
/// connection succeeds every call fails with
/// [`ErrorKind::Unavailable`](crate::ErrorKind::Unavailable) and the next call
/// tries again.
#[derive(Debug, Default)]
pub struct ZbusClient {
    conn: OnceCell<Connection>,
}

impl ZbusClient {
    /// Creates a client that connects to the system bus lazily.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a client over an existing connection.
    #[must_use]
    pub fn with_connection(conn: Connection) -> Self {
        Self {
            conn: OnceCell::from(conn),
        }
    }

    async fn connection(&self) -> Result<&Connection> {
        self.conn
            .get_or_try_init(|| async {
                Connection::system()
                    .await
                    .map_err(|e| BluetoothError::Unavailable(format!("system bus: {e}")))
            })
            .await
    }
}

#[async_trait]
impl BusClient for ZbusClient {
    async fn enumerate_objects(&self, timeout: Duration) -> Result<ObjectTree> {
        let conn = self.connection().await?;
        let raw = with_timeout("GetManagedObjects", timeout, async {
            let om = BluezObjectManagerProxy::new(conn).await?;
            Ok::<_, BluetoothError>(om.get_managed_objects().await?)
        })
        .await?;

        let tree = decode_object_tree(raw);
        debug!("Enumerated {} BlueZ objects", tree.len());
        Ok(tree)
    }

    async fn call_method(
        &self,
        path: &str,
        interface: &str,
        method: &str,
        timeout: Duration,
    ) -> Result<()> {
        let conn = self.connection().await?;
        debug!("Calling {interface}.{method} on {path}");

        with_timeout(&format!("{interface}.{method}"), timeout, async {
            conn.call_method(Some(bluez::SERVICE), path, Some(interface), method, &())
                .await?;
            Ok::<_, BluetoothError>(())
        })
        .await
    }

    async fn set_property(
        &self,
        path: &str,
        interface: &str,
        property: &str,
        value: PropValue,
        timeout: Duration,
    ) -> Result<()> {
        let conn = self.connection().await?;
        let encoded = encode_value(&value).ok_or_else(|| BluetoothError::Decode {
            path: path.to_string(),
            property: property.to_string(),
            expected: "a boolean, string or integer",
        })?;
        debug!("Setting {interface}.{property} = {value:?} on {path}");

        with_timeout(&format!("set {interface}.{property}"), timeout, async {
            conn.call_method(
                Some(bluez::SERVICE),
                path,
                Some(bluez::PROPERTIES_INTERFACE),
                methods::SET,
                &(interface, property, encoded),
            )
            .await?;
            Ok::<_, BluetoothError>(())
        })
        .await
    }

    async fn watch_changes(&self) -> Result<BoxStream<'static, ()>> {
        let conn = self.connection().await?;

        // BlueZ emits ObjectManager signals from "/" and property changes
        // from objects under /org/bluez. Rules match on path rather than
        // sender because the sender on the wire is BlueZ's unique name.
        let rules = [
            MatchRule::builder()
                .msg_type(zbus::message::Type::Signal)
                .interface(bluez::OBJECT_MANAGER_INTERFACE)?
                .member(signals::INTERFACES_ADDED)?
                .path("/")?
                .build(),
            MatchRule::builder()
                .msg_type(zbus::message::Type::Signal)
                .interface(bluez::OBJECT_MANAGER_INTERFACE)?
                .member(signals::INTERFACES_REMOVED)?
                .path("/")?
                .build(),
            MatchRule::builder()
                .msg_type(zbus::message::Type::Signal)
                .interface(bluez::PROPERTIES_INTERFACE)?
                .member(signals::PROPERTIES_CHANGED)?
                .path_namespace("/org/bluez")?
                .build(),
        ];

        let mut streams = Vec::with_capacity(rules.len());
        for rule in rules {
            let stream = MessageStream::for_match_rule(rule, conn, Some(SIGNAL_QUEUE)).await?;
            streams.push(stream.map(|_| ()).boxed());
        }

        debug!("Subscribed to {} BlueZ signal streams", streams.len());
        Ok(futures::stream::select_all(streams).boxed())
    }
}

/// Decodes the raw `GetManagedObjects` reply into an [`ObjectTree`].
pub(crate) fn decode_object_tree(
    raw: HashMap<OwnedObjectPath, HashMap<String, HashMap<String, OwnedValue>>>,
) -> ObjectTree {
    raw.into_iter()
        .map(|(path, ifaces)| {
            let ifaces = ifaces
                .into_iter()
                .map(|(name, props)| {
                    let props = props
                        .into_iter()
                        .map(|(key, value)| (key, decode_value(&value)))
                        .collect();
                    (name, props)
                })
                .collect();
            (path.as_str().to_owned(), ifaces)
        })
        .collect()
}

/// Decodes a single variant into a [`PropValue`].
pub(crate) fn decode_value(value: &Value<'_>) -> PropValue {
    match value {
        Value::Bool(b) => PropValue::Bool(*b),
        Value::Str(s) => PropValue::Str(s.as_str().to_owned()),
        Value::ObjectPath(p) => PropValue::Str(p.as_str().to_owned()),
        Value::U8(n) => PropValue::Int(i64::from(*n)),
        Value::I16(n) => PropValue::Int(i64::from(*n)),
        Value::U16(n) => PropValue::Int(i64::from(*n)),
        Value::I32(n) => PropValue::Int(i64::from(*n)),
        Value::U32(n) => PropValue::Int(i64::from(*n)),
        Value::I64(n) => PropValue::Int(*n),
        Value::U64(n) => i64::try_from(*n).map_or(PropValue::Unsupported, PropValue::Int),
        Value::Value(inner) => decode_value(inner),
        _ => PropValue::Unsupported,
    }
}

fn encode_value(value: &PropValue) -> Option<Value<'_>> {
    match value {
        PropValue::Bool(b) => Some(Value::from(*b)),
        PropValue::Str(s) => Some(Value::from(s.as_str())),
        PropValue::Int(n) => Some(Value::from(*n)),
        PropValue::Unsupported => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zvariant::ObjectPath;

    #[test]
    fn test_decode_basic_values() {
        assert_eq!(decode_value(&Value::from(true)), PropValue::Bool(true));
        assert_eq!(
            decode_value(&Value::from("Sony Buds")),
            PropValue::Str("Sony Buds".into())
        );
        assert_eq!(decode_value(&Value::from(-62i16)), PropValue::Int(-62));
        assert_eq!(decode_value(&Value::from(7u32)), PropValue::Int(7));
    }

    #[test]
    fn test_decode_object_path_as_string() {
        let path = ObjectPath::try_from("/org/bluez/hci0").unwrap();
        assert_eq!(
            decode_value(&Value::from(path)),
            PropValue::Str("/org/bluez/hci0".into())
        );
    }

    #[test]
    fn test_decode_unsupported() {
        assert_eq!(decode_value(&Value::from(1.5f64)), PropValue::Unsupported);
        assert_eq!(decode_value(&Value::from(u64::MAX)), PropValue::Unsupported);
    }

    #[test]
    fn test_encode_value() {
        assert_eq!(encode_value(&PropValue::Bool(true)), Some(Value::from(true)));
        assert_eq!(encode_value(&PropValue::Unsupported), None);
    }

    #[tokio::test]
    async fn test_client_construction_does_not_connect() {
        let client = ZbusClient::new();
        assert!(client.conn.get().is_none());
    }
}
