//! Adapter resolution and power control.
//!
//! The adapter path is resolved from the BlueZ object tree and cached here.
//! Power changes go through the `Powered` property first and fall back to
//! the OS-level radio switch when the bus route is refused or unavailable.

use futures::{FutureExt, select};
use futures_timer::Delay;
use log::{debug, info, warn};
use std::pin::pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::watch;

use crate::Result;
use crate::api::bus::{BusClient, PropValue};
use crate::api::collaborators::ProcessRunner;
use crate::api::config::SessionConfig;
use crate::api::models::{AdapterState, BluetoothError, ErrorKind};
use crate::core::cache::adapter_from_tree;
use crate::types::constants::{bluez, properties};
use crate::util::utils::lock;

/// Which route applied a power change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PowerRoute {
    /// `org.bluez.Adapter1.Powered` was set over D-Bus.
    Bus,
    /// The radio control command succeeded.
    RadioControl,
}

/// Owns the cached [`AdapterState`].
#[derive(Debug)]
pub(crate) struct AdapterController {
    state: Mutex<AdapterState>,
    resolving: AtomicBool,
    /// Outcome of the last finished resolution, `Some(true)` on success.
    resolved: watch::Sender<Option<bool>>,
}

impl Default for AdapterController {
    fn default() -> Self {
        let (resolved, _) = watch::channel(None);
        Self {
            state: Mutex::default(),
            resolving: AtomicBool::new(false),
            resolved,
        }
    }
}

impl AdapterController {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn state(&self) -> AdapterState {
        lock(&self.state).clone()
    }

    pub(crate) fn path(&self) -> Option<String> {
        lock(&self.state).path.clone()
    }

    /// Replaces the cached state with a freshly enumerated one.
    pub(crate) fn update(&self, state: AdapterState) {
        let mut current = lock(&self.state);
        if current.path != state.path {
            match &state.path {
                Some(p) => info!("Bluetooth adapter: {p}"),
                None => info!("No Bluetooth adapter found"),
            }
        }
        *current = state;
    }

    /// Resolves the adapter, retrying while BlueZ is unavailable.
    ///
    /// `Unavailable` is retried every `resolve_backoff` until it clears,
    /// `max_resolve_attempts` is reached, or `shutdown` fires. Any other
    /// error is returned at once. A missing adapter resolves to an absent
    /// path.
    ///
    /// Only one retry loop runs at a time. A caller arriving while another
    /// resolution is running waits for it and shares its result; if that
    /// resolution fails or is dropped, the waiting caller runs its own loop.
    pub(crate) async fn resolve(
        &self,
        bus: &dyn BusClient,
        config: &SessionConfig,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<AdapterState> {
        let mut finished = self.resolved.subscribe();
        while self.resolving.swap(true, Ordering::AcqRel) {
            debug!("Adapter resolution already in progress, waiting for it");
            if wait_or_shutdown(&mut finished, &mut shutdown).await {
                return Err(BluetoothError::Unavailable(
                    "adapter resolution cancelled by shutdown".into(),
                ));
            }
            let leader_succeeded = *finished.borrow_and_update() == Some(true);
            if leader_succeeded {
                return Ok(self.state());
            }
        }
        let mut resolving = ResolvingFlag {
            owner: self,
            succeeded: false,
        };

        let mut attempts = 0u32;
        loop {
            let attempt = bus
                .enumerate_objects(config.timeouts.enumerate_timeout)
                .await
                .and_then(|tree| adapter_from_tree(&tree));

            match attempt {
                Ok(state) => {
                    self.update(state.clone());
                    resolving.succeeded = true;
                    return Ok(state);
                }
                Err(e) if e.kind() == ErrorKind::Unavailable => {
                    attempts += 1;
                    if config.max_resolve_attempts.is_some_and(|max| attempts >= max) {
                        warn!("BlueZ still unavailable after {attempts} attempts: {e}");
                        return Err(e);
                    }
                    debug!(
                        "BlueZ not ready ({e}), retrying in {:?}",
                        config.timeouts.resolve_backoff
                    );
                    if backoff_or_shutdown(config.timeouts.resolve_backoff, &mut shutdown).await {
                        debug!("Adapter resolution cancelled by shutdown");
                        return Err(e);
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Switches the radio on or off.
    ///
    /// With a known adapter path the `Powered` property is set first. If that
    /// fails for any reason, or no adapter is known, the radio control
    /// command is run once. Exit code 0 counts as success.
    pub(crate) async fn set_power(
        &self,
        bus: &dyn BusClient,
        runner: &dyn ProcessRunner,
        config: &SessionConfig,
        powered: bool,
    ) -> Result<PowerRoute> {
        if let Some(path) = self.path() {
            let res = bus
                .set_property(
                    &path,
                    bluez::ADAPTER_INTERFACE,
                    properties::POWERED,
                    PropValue::Bool(powered),
                    config.timeouts.power_timeout,
                )
                .await;

            match res {
                Ok(()) => {
                    info!("Adapter {path} powered {}", on_off(powered));
                    lock(&self.state).powered = powered;
                    return Ok(PowerRoute::Bus);
                }
                Err(e) => warn!("Setting Powered on {path} failed ({e}), falling back to radio control"),
            }
        } else {
            debug!("No adapter path known, using radio control");
        }

        let cmd = config.radio_invocation(powered);
        match runner.run(&cmd).await {
            Ok(Some(0)) => {
                info!("Radio switched {} via `{cmd}`", on_off(powered));
                Ok(PowerRoute::RadioControl)
            }
            Ok(Some(code)) => Err(BluetoothError::RadioControl(format!(
                "`{cmd}` exited with status {code}"
            ))),
            Ok(None) => Err(BluetoothError::RadioControl(format!(
                "`{cmd}` was terminated by a signal"
            ))),
            Err(e) => Err(BluetoothError::RadioControl(format!(
                "failed to run `{cmd}`: {e}"
            ))),
        }
    }
}

fn on_off(powered: bool) -> &'static str {
    if powered { "on" } else { "off" }
}

/// Clears the resolving flag and wakes waiting callers when resolution ends
/// or is dropped.
struct ResolvingFlag<'a> {
    owner: &'a AdapterController,
    succeeded: bool,
}

impl Drop for ResolvingFlag<'_> {
    fn drop(&mut self) {
        self.owner.resolving.store(false, Ordering::Release);
        self.owner.resolved.send_replace(Some(self.succeeded));
    }
}

/// Waits for the running resolution to finish. Returns `true` if shutdown
/// fired first.
async fn wait_or_shutdown(
    finished: &mut watch::Receiver<Option<bool>>,
    shutdown: &mut watch::Receiver<bool>,
) -> bool {
    if *shutdown.borrow() {
        return true;
    }

    let mut done = pin!(finished.changed().fuse());
    let mut changed = pin!(shutdown.changed().fuse());

    select! {
        _ = done => false,
        _ = changed => true,
    }
}

/// Waits out one backoff period. Returns `true` if shutdown fired first.
async fn backoff_or_shutdown(backoff: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    if *shutdown.borrow() {
        return true;
    }

    let mut delay = pin!(Delay::new(backoff).fuse());
    let mut changed = pin!(shutdown.changed().fuse());

    select! {
        _ = delay => false,
        _ = changed => true,
    }
}
