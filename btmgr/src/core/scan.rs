//! Discovery state machine.
//!
//! ```text
//!   Idle --start--> Scanning --stop--> Idle
//! ```
//!
//! The discovered set lives only while scanning. It is cleared on every
//! transition so the same device is reported again in the next scan session.

use log::{debug, info, warn};
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use crate::Result;
use crate::api::bus::BusClient;
use crate::api::models::{Device, ErrorKind};
use crate::types::constants::{bluez, methods};
use crate::util::utils::lock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum ScanPhase {
    #[default]
    Idle,
    Scanning,
}

#[derive(Debug, Default)]
struct ScanState {
    phase: ScanPhase,
    discovered: HashSet<String>,
}

impl ScanState {
    fn enter(&mut self, phase: ScanPhase) {
        self.phase = phase;
        self.discovered.clear();
    }
}

#[derive(Debug, Default)]
pub(crate) struct ScanController {
    state: Mutex<ScanState>,
}

impl ScanController {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn phase(&self) -> ScanPhase {
        lock(&self.state).phase
    }

    pub(crate) fn is_scanning(&self) -> bool {
        self.phase() == ScanPhase::Scanning
    }

    /// Starts discovery on `adapter`.
    ///
    /// Returns `Ok(false)` without any bus call when already scanning or when
    /// no adapter is known. The daemon's `InProgress` reply counts as success.
    /// A timeout leaves the controller scanning, since the daemon may have
    /// started discovery anyway and only `stop` ends it. Any other failure
    /// returns the controller to idle.
    pub(crate) async fn start(
        &self,
        bus: &dyn BusClient,
        adapter: Option<&str>,
        timeout: Duration,
    ) -> Result<bool> {
        let Some(adapter) = adapter else {
            debug!("No adapter, not starting discovery");
            return Ok(false);
        };

        {
            let mut state = lock(&self.state);
            if state.phase == ScanPhase::Scanning {
                return Ok(false);
            }
            state.enter(ScanPhase::Scanning);
        }

        match bus
            .call_method(adapter, bluez::ADAPTER_INTERFACE, methods::START_DISCOVERY, timeout)
            .await
        {
            Ok(()) => {
                info!("Discovery started on {adapter}");
                Ok(true)
            }
            Err(e) if e.is_in_progress() => {
                debug!("Discovery already running on {adapter}");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::Timeout => {
                warn!("StartDiscovery on {adapter} timed out, treating discovery as running: {e}");
                Err(e)
            }
            Err(e) => {
                warn!("StartDiscovery on {adapter} failed: {e}");
                lock(&self.state).enter(ScanPhase::Idle);
                Err(e)
            }
        }
    }

    /// Stops discovery.
    ///
    /// Returns `Ok(false)` without any bus call when idle. Otherwise the
    /// controller is idle afterwards even if `StopDiscovery` fails; the
    /// failure is still returned.
    pub(crate) async fn stop(
        &self,
        bus: &dyn BusClient,
        adapter: Option<&str>,
        timeout: Duration,
    ) -> Result<bool> {
        {
            let mut state = lock(&self.state);
            if state.phase == ScanPhase::Idle {
                return Ok(false);
            }
            state.enter(ScanPhase::Idle);
        }

        let Some(adapter) = adapter else {
            debug!("Adapter gone, discovery already over");
            return Ok(true);
        };

        bus.call_method(adapter, bluez::ADAPTER_INTERFACE, methods::STOP_DISCOVERY, timeout)
            .await
            .inspect_err(|e| warn!("StopDiscovery on {adapter} failed: {e}"))?;
        info!("Discovery stopped on {adapter}");
        Ok(true)
    }

    /// Records the unpaired devices of one refresh.
    ///
    /// Returns the devices seen for the first time in this scan session,
    /// leaving out those whose name is only an address. Always empty when
    /// idle.
    pub(crate) fn observe<'a>(&self, devices: impl IntoIterator<Item = &'a Device>) -> Vec<Device> {
        let mut state = lock(&self.state);
        if state.phase != ScanPhase::Scanning {
            return Vec::new();
        }

        let mut fresh = Vec::new();
        for device in devices.into_iter().filter(|d| !d.paired) {
            if state.discovered.insert(device.path.clone()) && !device.has_junk_name() {
                fresh.push(device.clone());
            }
        }
        if !fresh.is_empty() {
            debug!(
                "{} new device(s), {} seen this scan",
                fresh.len(),
                state.discovered.len()
            );
        }
        fresh
    }
}
