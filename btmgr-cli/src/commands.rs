use anyhow::{Context, anyhow, bail};
use log::{info, warn};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

use btmgr::{BluetoothSession, SessionSnapshot};

use crate::file_lock::acquire_discovery_lock;
use crate::output::{device_line, discovered_line, status_json, status_text};
use crate::{Command, PowerState};

/// How often a running scan re-enumerates to pick up new devices.
const SCAN_POLL: Duration = Duration::from_secs(1);

pub async fn execute(session: &BluetoothSession, command: Command) -> anyhow::Result<()> {
    if command == Command::Settings {
        let launcher = session.open_external_settings().await?;
        info!("Settings opened with `{launcher}`");
        return Ok(());
    }

    let _lock = if command.drives_discovery() {
        Some(acquire_discovery_lock().map_err(|e| anyhow!(e))?)
    } else {
        None
    };

    let snapshot = session
        .start()
        .await
        .context("Bluetooth service is not available")?;

    match command {
        Command::Status { json } => print_status(&snapshot, json),
        Command::Power { state } => power(session, state).await,
        Command::Connect { device } => toggle(session, &device, true).await,
        Command::Disconnect { device } => toggle(session, &device, false).await,
        Command::Scan { seconds } => scan(session, Duration::from_secs(seconds)).await,
        Command::Watch { json } => watch_changes(session, &snapshot, json).await,
        Command::Settings => Ok(()),
    }
}

fn print_status(snapshot: &SessionSnapshot, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", status_json(snapshot)?);
    } else {
        print!("{}", status_text(snapshot));
    }
    Ok(())
}

async fn power(session: &BluetoothSession, state: PowerState) -> anyhow::Result<()> {
    let after = session
        .on_user_toggle_power(state.powered())
        .await
        .with_context(|| format!("failed to switch Bluetooth {state}"))?;

    if after.adapter.is_present() && after.adapter.powered != state.powered() {
        // The radio switch can succeed before BlueZ catches up.
        warn!("Adapter still reports powered={}", after.adapter.powered);
    }
    println!("Bluetooth {state}");
    Ok(())
}

async fn toggle(session: &BluetoothSession, query: &str, connect: bool) -> anyhow::Result<()> {
    let device = session.find_device(query)?;

    if device.connected == connect {
        println!("{} is already {}", device.name, connection_word(connect));
        return Ok(());
    }

    let after = session.on_user_toggle_device(&device.path, connect).await?;
    match after.device(&device.path) {
        Some(d) => println!("{}", device_line(d)),
        None => println!("{} {}", device.name, connection_word(connect)),
    }
    Ok(())
}

fn connection_word(connected: bool) -> &'static str {
    if connected { "connected" } else { "disconnected" }
}

async fn scan(session: &BluetoothSession, duration: Duration) -> anyhow::Result<()> {
    session.adapter_path().context("cannot scan")?;
    if !session.start_scan().await? {
        bail!("discovery is already running");
    }
    println!("Scanning for {}s, press Ctrl-C to stop", duration.as_secs());

    let deadline = Instant::now() + duration;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let interrupted = tokio::select! {
            _ = tokio::time::sleep(SCAN_POLL) => false,
            _ = &mut ctrl_c => true,
        };
        if interrupted {
            break;
        }

        match session.refresh().await {
            Ok(snapshot) => {
                for device in &snapshot.newly_discovered {
                    println!("{}", discovered_line(device));
                }
            }
            Err(e) => warn!("Refresh during scan failed: {e}"),
        }

        if Instant::now() >= deadline {
            break;
        }
    }

    session.stop_scan().await?;
    Ok(())
}

async fn watch_changes(
    session: &BluetoothSession,
    initial: &SessionSnapshot,
    json: bool,
) -> anyhow::Result<()> {
    print_status(initial, json)?;

    let (stop_tx, stop_rx) = watch::channel(());
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stop_tx.send_replace(());
        }
    });

    session
        .monitor_changes(stop_rx, |snapshot| {
            if !json {
                println!();
            }
            if let Err(e) = print_status(&snapshot, json) {
                warn!("Failed to print status: {e}");
            }
        })
        .await?;
    Ok(())
}
