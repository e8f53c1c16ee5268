//! Per-device connect and disconnect.
//!
//! At most one operation runs per device path. The bus call runs in its own
//! task which owns the pending entry, so dropping the caller's future neither
//! aborts the call nor frees the device for a second operation.

use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::Result;
use crate::api::bus::BusClient;
use crate::api::collaborators::Notifier;
use crate::api::models::{BluetoothError, OperationKind, PendingOperation};
use crate::types::constants::{bluez, display, methods};
use crate::util::utils::lock;

#[derive(Debug, Default)]
pub(crate) struct DeviceController {
    pending: Arc<Mutex<HashMap<String, PendingOperation>>>,
}

impl DeviceController {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// The operation currently running for `path`, if any.
    pub(crate) fn pending(&self, path: &str) -> Option<PendingOperation> {
        lock(&self.pending).get(path).copied()
    }

    fn begin(&self, path: &str, kind: OperationKind) -> Result<PendingGuard> {
        let mut pending = lock(&self.pending);
        if let Some(op) = pending.get(path) {
            debug!(
                "Rejecting {kind} for {path}: {} running for {:?}",
                op.kind,
                op.started_at.elapsed()
            );
            return Err(BluetoothError::OperationInFlight(path.to_string()));
        }
        pending.insert(
            path.to_string(),
            PendingOperation {
                kind,
                started_at: Instant::now(),
            },
        );
        Ok(PendingGuard {
            table: Arc::clone(&self.pending),
            path: path.to_string(),
        })
    }

    /// Connects or disconnects `path`.
    ///
    /// Fails with `OperationInFlight` without touching the bus if an
    /// operation for the same path is running. On any bus failure the user is
    /// notified once and the error is returned. The call keeps running to
    /// completion or timeout if this future is dropped.
    pub(crate) async fn toggle_connection(
        &self,
        bus: Arc<dyn BusClient>,
        notifier: Arc<dyn Notifier>,
        path: &str,
        connected: bool,
        timeout: Duration,
    ) -> Result<()> {
        let kind = OperationKind::for_target(connected);
        let guard = self.begin(path, kind)?;

        let method = match kind {
            OperationKind::Connect => methods::CONNECT,
            OperationKind::Disconnect => methods::DISCONNECT,
        };

        debug!("Starting {kind} for {path}");
        let target = path.to_string();
        let flight = tokio::spawn(async move {
            let _guard = guard;
            match bus
                .call_method(&target, bluez::DEVICE_INTERFACE, method, timeout)
                .await
            {
                Ok(()) => {
                    info!("Device {target}: {kind} succeeded");
                    Ok(())
                }
                Err(e) => {
                    warn!("Device {target}: {kind} failed: {e}");
                    notifier.notify(display::NOTIFY_TITLE, &format!("Connection failed: {e}"));
                    Err(e)
                }
            }
        });

        match flight.await {
            Ok(res) => res,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(BluetoothError::Unavailable(format!(
                "{kind} for {path} was cancelled: {e}"
            ))),
        }
    }
}

/// Removes a pending entry when dropped.
#[derive(Debug)]
struct PendingGuard {
    table: Arc<Mutex<HashMap<String, PendingOperation>>>,
    path: String,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        lock(&self.table).remove(&self.path);
    }
}
