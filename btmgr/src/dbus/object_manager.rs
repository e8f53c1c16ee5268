//! BlueZ ObjectManager proxy.

use std::collections::HashMap;
use zbus::proxy;
use zvariant::{OwnedObjectPath, OwnedValue};

/// Proxy for `org.freedesktop.DBus.ObjectManager` on the BlueZ service.
///
/// BlueZ exports its whole tree (adapters under `/org/bluez/hciN`, devices
/// under `/org/bluez/hciN/dev_XX_XX_XX_XX_XX_XX`) through this interface
/// at the root path.
///
/// # Example
///
/// ```ignore
/// let conn = Connection::system().await?;
/// let om = BluezObjectManagerProxy::new(&conn).await?;
/// for (path, ifaces) in om.get_managed_objects().await? {
///     println!("{path}: {:?}", ifaces.keys());
/// }
/// ```
#[proxy(
    interface = "org.freedesktop.DBus.ObjectManager",
    default_service = "org.bluez",
    default_path = "/"
)]
pub(crate) trait BluezObjectManager {
    /// Returns `{ object_path: { interface_name: { property: value } } }`.
    fn get_managed_objects(
        &self,
    ) -> zbus::Result<HashMap<OwnedObjectPath, HashMap<String, HashMap<String, OwnedValue>>>>;
}
