//! Plain-text and JSON rendering of session snapshots.

use btmgr::{Device, SessionSnapshot};

pub fn status_text(snapshot: &SessionSnapshot) -> String {
    let mut out = String::new();

    match &snapshot.adapter.path {
        Some(path) => {
            let power = if snapshot.adapter.powered { "on" } else { "off" };
            out.push_str(&format!("Adapter: {path} ({power})\n"));
        }
        None => out.push_str("Adapter: none\n"),
    }
    if snapshot.scanning {
        out.push_str("Scanning: yes\n");
    }

    if snapshot.paired_devices.is_empty() {
        out.push_str("No paired devices\n");
    } else {
        out.push_str("Paired devices:\n");
        for device in &snapshot.paired_devices {
            out.push_str(&format!("  {}\n", device_line(device)));
        }
    }
    out
}

/// One line per device: marker, name, address and state.
pub fn device_line(device: &Device) -> String {
    let marker = if device.connected { '*' } else { ' ' };
    let state = if device.connected {
        "connected"
    } else {
        "disconnected"
    };
    let address = if device.address.is_empty() {
        "-"
    } else {
        device.address.as_str()
    };
    format!("{marker} {:<24} {address:<17}  {state}", device.name)
}

pub fn discovered_line(device: &Device) -> String {
    match device.signal_strength {
        Some(rssi) => format!("+ {} [{}] {rssi} dBm", device.name, device.address),
        None => format!("+ {} [{}]", device.name, device.address),
    }
}

pub fn status_json(snapshot: &SessionSnapshot) -> serde_json::Result<String> {
    serde_json::to_string_pretty(snapshot)
}
