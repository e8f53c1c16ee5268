//! Object cache: typed view models built from one enumeration.
//!
//! The cache is rebuilt wholesale from every `GetManagedObjects` snapshot.
//! Nothing is patched incrementally, so partial or interleaved change
//! signals can never leave it out of sync with the daemon.

use log::debug;
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::Result;
use crate::api::bus::{ObjectTree, PropValue, Properties};
use crate::api::models::{AdapterState, BluetoothError, Device};
use crate::types::constants::{bluez, properties};

/// Adapter state and every device from one enumeration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ObjectCache {
    adapter: AdapterState,
    devices: BTreeMap<String, Device>,
}

impl ObjectCache {
    /// Decodes an object tree.
    ///
    /// Fails with a decode error if a property this crate reads is present
    /// with the wrong type.
    pub(crate) fn from_tree(tree: &ObjectTree) -> Result<Self> {
        let adapter = adapter_from_tree(tree)?;

        let mut devices = BTreeMap::new();
        for (path, ifaces) in tree {
            if let Some(props) = ifaces.get(bluez::DEVICE_INTERFACE) {
                devices.insert(path.clone(), decode_device(path, props)?);
            }
        }

        Ok(Self { adapter, devices })
    }

    pub(crate) fn adapter(&self) -> &AdapterState {
        &self.adapter
    }

    /// All devices, paired or not, in path order.
    pub(crate) fn devices(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    /// Paired devices in display order.
    pub(crate) fn paired_sorted(&self) -> Vec<Device> {
        let mut paired: Vec<Device> = self.devices.values().filter(|d| d.paired).cloned().collect();
        sort_for_display(&mut paired);
        paired
    }
}

/// Finds the first object (in path order) that exposes `org.bluez.Adapter1`.
///
/// Returns an absent path when there is none.
pub(crate) fn adapter_from_tree(tree: &ObjectTree) -> Result<AdapterState> {
    let Some((path, props)) = tree
        .iter()
        .find_map(|(path, ifaces)| ifaces.get(bluez::ADAPTER_INTERFACE).map(|p| (path, p)))
    else {
        return Ok(AdapterState::default());
    };

    let reader = PropReader::new(path, props);
    Ok(AdapterState {
        path: Some(path.clone()),
        powered: reader.flag(properties::POWERED)?,
    })
}

/// Sorts connected devices first, then by case-insensitive name.
///
/// Equal names fall back to the object path so the order is stable across
/// refreshes.
pub(crate) fn sort_for_display(devices: &mut [Device]) {
    devices.sort_by(|a, b| {
        b.connected
            .cmp(&a.connected)
            .then_with(|| compare_names(&a.name, &b.name))
            .then_with(|| a.path.cmp(&b.path))
    });
}

fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

fn decode_device(path: &str, props: &Properties) -> Result<Device> {
    let reader = PropReader::new(path, props);

    let mut device = Device::new(
        path,
        reader.string(properties::NAME)?,
        reader.string(properties::ADDRESS)?,
    );
    device.connected = reader.flag(properties::CONNECTED)?;
    device.paired = reader.flag(properties::PAIRED)?;
    device.trusted = reader.flag(properties::TRUSTED)?;
    device.signal_strength = reader.rssi(properties::RSSI)?;
    Ok(device)
}

/// Typed access to one interface's properties.
///
/// A missing property takes the documented fallback. A property present with
/// the wrong type is a decode error.
struct PropReader<'a> {
    path: &'a str,
    props: &'a Properties,
}

impl<'a> PropReader<'a> {
    fn new(path: &'a str, props: &'a Properties) -> Self {
        Self { path, props }
    }

    fn mismatch(&self, property: &str, found: &PropValue, expected: &'static str) -> BluetoothError {
        debug!("{}: {property} is {}, expected {expected}", self.path, found.type_name());
        BluetoothError::Decode {
            path: self.path.to_string(),
            property: property.to_string(),
            expected,
        }
    }

    /// Missing flags read as `false`.
    fn flag(&self, name: &str) -> Result<bool> {
        match self.props.get(name) {
            None => Ok(false),
            Some(PropValue::Bool(b)) => Ok(*b),
            Some(other) => Err(self.mismatch(name, other, "boolean")),
        }
    }

    fn string(&self, name: &str) -> Result<Option<String>> {
        match self.props.get(name) {
            None => Ok(None),
            Some(PropValue::Str(s)) => Ok(Some(s.clone())),
            Some(other) => Err(self.mismatch(name, other, "string")),
        }
    }

    fn rssi(&self, name: &str) -> Result<Option<i16>> {
        match self.props.get(name) {
            None => Ok(None),
            Some(value @ PropValue::Int(n)) => i16::try_from(*n)
                .map(Some)
                .map_err(|_| self.mismatch(name, value, "16-bit integer")),
            Some(other) => Err(self.mismatch(name, other, "16-bit integer")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::bus::Interfaces;
    use crate::api::models::ErrorKind;

    fn device_props(name: Option<&str>, paired: bool, connected: bool) -> Interfaces {
        let mut props = Properties::new();
        if let Some(name) = name {
            props.insert("Name".into(), PropValue::from(name));
        }
        props.insert("Address".into(), "00:11:22:33:44:55".into());
        props.insert("Paired".into(), paired.into());
        props.insert("Connected".into(), connected.into());
        Interfaces::from([(bluez::DEVICE_INTERFACE.to_string(), props)])
    }

    fn adapter_props(powered: bool) -> Interfaces {
        let props = Properties::from([("Powered".to_string(), PropValue::Bool(powered))]);
        Interfaces::from([(bluez::ADAPTER_INTERFACE.to_string(), props)])
    }

    #[test]
    fn test_no_adapter_is_not_an_error() {
        let tree = ObjectTree::from([("/org/bluez".to_string(), Interfaces::new())]);
        let adapter = adapter_from_tree(&tree).unwrap();
        assert_eq!(adapter, AdapterState::default());
        assert!(!adapter.is_present());
    }

    #[test]
    fn test_first_adapter_wins() {
        let tree = ObjectTree::from([
            ("/org/bluez/hci1".to_string(), adapter_props(false)),
            ("/org/bluez/hci0".to_string(), adapter_props(true)),
        ]);
        let adapter = adapter_from_tree(&tree).unwrap();
        assert_eq!(adapter.path.as_deref(), Some("/org/bluez/hci0"));
        assert!(adapter.powered);
    }

    #[test]
    fn test_only_paired_devices_listed() {
        let tree = ObjectTree::from([
            ("/org/bluez/hci0".to_string(), adapter_props(true)),
            ("/org/bluez/hci0/dev_1".to_string(), device_props(Some("Mouse"), true, false)),
            ("/org/bluez/hci0/dev_2".to_string(), device_props(Some("TV"), false, false)),
        ]);
        let cache = ObjectCache::from_tree(&tree).unwrap();
        assert_eq!(cache.devices().count(), 2);

        let paired = cache.paired_sorted();
        assert_eq!(paired.len(), 1);
        assert_eq!(paired[0].name, "Mouse");
    }

    #[test]
    fn test_sort_connected_first_then_name() {
        let tree = ObjectTree::from([
            ("/d/1".to_string(), device_props(Some("zebra speaker"), true, false)),
            ("/d/2".to_string(), device_props(Some("Apple Keyboard"), true, false)),
            ("/d/3".to_string(), device_props(Some("watch"), true, true)),
            ("/d/4".to_string(), device_props(Some("Buds"), true, true)),
        ]);
        let names: Vec<String> = ObjectCache::from_tree(&tree)
            .unwrap()
            .paired_sorted()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, ["Buds", "watch", "Apple Keyboard", "zebra speaker"]);
    }

    #[test]
    fn test_missing_name_falls_back_to_address() {
        let tree = ObjectTree::from([("/d/1".to_string(), device_props(None, true, false))]);
        let cache = ObjectCache::from_tree(&tree).unwrap();
        assert_eq!(cache.paired_sorted()[0].name, "00:11:22:33:44:55");
    }

    #[test]
    fn test_missing_flags_default_to_false() {
        let props = Properties::from([("Name".to_string(), PropValue::from("Bare"))]);
        let tree = ObjectTree::from([(
            "/d/1".to_string(),
            Interfaces::from([(bluez::DEVICE_INTERFACE.to_string(), props)]),
        )]);
        let cache = ObjectCache::from_tree(&tree).unwrap();
        let device = cache.devices().next().unwrap();
        assert!(!device.connected && !device.paired && !device.trusted);
        assert_eq!(device.signal_strength, None);
    }

    #[test]
    fn test_wrong_type_is_decode_error() {
        let mut ifaces = device_props(Some("Mouse"), true, false);
        ifaces
            .get_mut(bluez::DEVICE_INTERFACE)
            .unwrap()
            .insert("Connected".into(), PropValue::from("yes"));
        let tree = ObjectTree::from([("/d/1".to_string(), ifaces)]);

        let err = ObjectCache::from_tree(&tree).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
        assert!(err.to_string().contains("Connected"));
    }

    #[test]
    fn test_rssi_decoded() {
        let mut ifaces = device_props(Some("Mouse"), false, false);
        ifaces
            .get_mut(bluez::DEVICE_INTERFACE)
            .unwrap()
            .insert("RSSI".into(), PropValue::from(-71i16));
        let tree = ObjectTree::from([("/d/1".to_string(), ifaces)]);
        let cache = ObjectCache::from_tree(&tree).unwrap();
        assert_eq!(cache.devices().next().unwrap().signal_strength, Some(-71));
    }
}
