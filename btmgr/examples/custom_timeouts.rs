/// Example demonstrating custom timeout configuration for a Bluetooth session.
///
/// Some headsets take longer than the default 30 seconds to finish a connect,
/// and a slow polkit agent can delay the radio fallback.
use btmgr::{BluetoothSession, CommandSpec, SessionConfig, TimeoutConfig};
use std::time::Duration;

#[tokio::main]
async fn main() -> btmgr::Result<()> {
    let timeouts = TimeoutConfig::new()
        .with_device_timeout(Duration::from_secs(45)) // Wait up to 45s for connect/disconnect
        .with_settle_delay(Duration::from_secs(1)); // Give BlueZ longer to update properties

    let config = SessionConfig::new()
        .with_timeouts(timeouts)
        .with_radio_command(CommandSpec::new("pkexec").arg("rfkill"))
        .with_max_resolve_attempts(10);

    let session = BluetoothSession::with_config(config);

    println!("Session configured with custom timeouts:");
    println!("  Device timeout: {:?}", session.config().timeouts.device_timeout);
    println!("  Settle delay: {:?}", session.config().timeouts.settle_delay);

    let snapshot = session.start().await?;
    println!("\nAdapter: {:?}", snapshot.adapter.path);
    println!("Powered: {}", snapshot.adapter.powered);

    // You can also use the defaults
    let default_session = BluetoothSession::new();
    println!("\nDefault timeouts:");
    println!(
        "  Device timeout: {:?}",
        default_session.config().timeouts.device_timeout
    );

    session.shutdown().await;
    Ok(())
}
