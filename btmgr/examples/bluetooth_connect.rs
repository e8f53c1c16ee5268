use btmgr::{BluetoothSession, Result};

#[tokio::main]
async fn main() -> Result<()> {
    let session = BluetoothSession::new();

    println!("Looking for the Bluetooth adapter...");
    let snapshot = session.start().await?;

    if !snapshot.adapter.is_present() {
        println!("No Bluetooth adapter found.");
        return Ok(());
    }

    if snapshot.paired_devices.is_empty() {
        println!("No paired devices.");
        println!("\nMake sure:");
        println!("  1. Bluetooth is enabled");
        println!("  2. Device is paired (use 'bluetoothctl')");
        return Ok(());
    }

    println!("\nPaired devices:");
    for (i, device) in snapshot.paired_devices.iter().enumerate() {
        println!("  {}. {}", i + 1, device);
    }

    // Toggle the first device
    if let Some(device) = snapshot.paired_devices.first() {
        let connect = !device.connected;
        println!(
            "\n{} {}",
            if connect { "Connecting to" } else { "Disconnecting" },
            device.name
        );

        match session.on_user_toggle_device(&device.path, connect).await {
            Ok(after) => {
                if let Some(d) = after.device(&device.path) {
                    println!("✓ {d}");
                }
            }
            Err(e) => eprintln!("✗ Failed: {e}"),
        }
    }

    session.shutdown().await;
    Ok(())
}
