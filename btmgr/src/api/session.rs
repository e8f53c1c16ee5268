use log::{debug, info, warn};
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

use crate::Result;
use crate::api::bus::BusClient;
use crate::api::collaborators::{CommandSpec, LogNotifier, Notifier, ProcessRunner};
use crate::api::config::SessionConfig;
use crate::api::models::{BluetoothError, Device, PendingOperation, SessionSnapshot};
use crate::core::adapter::AdapterController;
use crate::core::cache::ObjectCache;
use crate::core::device::DeviceController;
use crate::core::scan::ScanController;
use crate::core::system::SystemRunner;
use crate::dbus::ZbusClient;
use crate::monitoring::objects::monitor_object_changes;
use crate::try_log;
use crate::types::constants::display;
use crate::util::utils::{lock, pause};

/// High-level Bluetooth session over BlueZ.
///
/// This is the main entry point. A session owns the cached adapter state, the
/// device list and the discovery state, and sequences every user action as
/// "bus call, settle, re-enumerate".
///
/// # Creating a Session
///
/// ```no_run
/// use btmgr::BluetoothSession;
///
/// # async fn example() -> btmgr::Result<()> {
/// let session = BluetoothSession::new();
/// let snapshot = session.start().await?;
///
/// for device in &snapshot.paired_devices {
///     println!("{device}");
/// }
/// # Ok(())
/// # }
/// ```
///
/// # Menu Lifecycle
///
/// ```no_run
/// use btmgr::BluetoothSession;
///
/// # async fn example() -> btmgr::Result<()> {
/// let session = BluetoothSession::new();
/// session.start().await?;
///
/// // Refreshes and starts discovery
/// let snapshot = session.on_menu_opened().await?;
/// assert!(snapshot.scanning || !snapshot.adapter.is_present());
///
/// // Stops discovery again
/// session.on_menu_closed().await?;
/// session.shutdown().await;
/// # Ok(())
/// # }
/// ```
///
/// # Thread Safety
///
/// `BluetoothSession` is `Clone` and can be shared across tasks. Every clone
/// shares the same state and collaborators.
#[derive(Clone)]
pub struct BluetoothSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    bus: Arc<dyn BusClient>,
    runner: Arc<dyn ProcessRunner>,
    notifier: Arc<dyn Notifier>,
    config: SessionConfig,
    adapter: AdapterController,
    devices: DeviceController,
    scan: ScanController,
    last: Mutex<SessionSnapshot>,
    closed: watch::Sender<bool>,
}

impl fmt::Debug for BluetoothSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BluetoothSession")
            .field("adapter", &self.inner.adapter.state())
            .field("scan", &self.inner.scan.phase())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl Default for BluetoothSession {
    fn default() -> Self {
        Self::new()
    }
}

impl BluetoothSession {
    /// Creates a session on the system bus with the default configuration.
    ///
    /// Construction never fails and does not touch the bus. Call
    /// [`start`](Self::start) to resolve the adapter.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    /// Creates a session on the system bus with a custom configuration.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use btmgr::{BluetoothSession, SessionConfig, TimeoutConfig};
    /// use std::time::Duration;
    ///
    /// let config = SessionConfig::new().with_timeouts(
    ///     TimeoutConfig::new().with_device_timeout(Duration::from_secs(10)),
    /// );
    /// let session = BluetoothSession::with_config(config);
    /// ```
    #[must_use]
    pub fn with_config(config: SessionConfig) -> Self {
        Self::from_parts(
            Arc::new(ZbusClient::new()),
            Arc::new(SystemRunner::new()),
            Arc::new(LogNotifier),
            config,
        )
    }

    /// Creates a session from explicit collaborators.
    ///
    /// Front ends use this to plug in their own [`Notifier`]; tests use it to
    /// substitute the bus and the process runner.
    #[must_use]
    pub fn from_parts(
        bus: Arc<dyn BusClient>,
        runner: Arc<dyn ProcessRunner>,
        notifier: Arc<dyn Notifier>,
        config: SessionConfig,
    ) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            inner: Arc::new(SessionInner {
                bus,
                runner,
                notifier,
                config,
                adapter: AdapterController::new(),
                devices: DeviceController::new(),
                scan: ScanController::new(),
                last: Mutex::new(SessionSnapshot::default()),
                closed,
            }),
        }
    }

    /// Returns the configuration this session was built with.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Resolves the adapter and takes the first snapshot.
    ///
    /// While BlueZ is not reachable the adapter lookup is retried every
    /// `resolve_backoff`, so this only returns once the daemon answers, the
    /// optional attempt cap is hit, or [`shutdown`](Self::shutdown) is called.
    /// A machine without an adapter is not an error.
    pub async fn start(&self) -> Result<SessionSnapshot> {
        let inner = &self.inner;
        inner
            .adapter
            .resolve(inner.bus.as_ref(), &inner.config, inner.closed.subscribe())
            .await?;
        self.refresh().await
    }

    /// Re-enumerates BlueZ and rebuilds the snapshot.
    ///
    /// During a scan, unpaired devices seen for the first time are reported
    /// in [`SessionSnapshot::newly_discovered`].
    pub async fn refresh(&self) -> Result<SessionSnapshot> {
        let inner = &self.inner;
        let tree = inner
            .bus
            .enumerate_objects(inner.config.timeouts.enumerate_timeout)
            .await?;
        let cache = ObjectCache::from_tree(&tree)?;

        inner.adapter.update(cache.adapter().clone());
        if !cache.adapter().is_present() && inner.scan.is_scanning() {
            // Adapter vanished mid-scan; there is nothing left to stop.
            inner.scan.stop(inner.bus.as_ref(), None, inner.config.timeouts.discovery_timeout).await?;
        }

        let snapshot = SessionSnapshot {
            adapter: cache.adapter().clone(),
            paired_devices: cache.paired_sorted(),
            scanning: inner.scan.is_scanning(),
            newly_discovered: inner.scan.observe(cache.devices()),
        };
        debug!(
            "Refreshed: adapter={:?} powered={} paired={} new={}",
            snapshot.adapter.path,
            snapshot.adapter.powered,
            snapshot.paired_devices.len(),
            snapshot.newly_discovered.len()
        );

        *lock(&inner.last) = snapshot.clone();
        Ok(snapshot)
    }

    /// Returns the most recent snapshot without touching the bus.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        lock(&self.inner.last).clone()
    }

    /// Returns `true` while discovery is running.
    #[must_use]
    pub fn is_scanning(&self) -> bool {
        self.inner.scan.is_scanning()
    }

    /// Returns the connect or disconnect currently running for `path`.
    #[must_use]
    pub fn pending_operation(&self, path: &str) -> Option<PendingOperation> {
        self.inner.devices.pending(path)
    }

    /// Returns the adapter's object path.
    ///
    /// Fails with `NotFound` when no adapter is present.
    pub fn adapter_path(&self) -> Result<String> {
        self.inner.adapter.path().ok_or(BluetoothError::NoAdapter)
    }

    /// Looks up a paired device from the last snapshot.
    ///
    /// `query` may be an object path, an address or a name. Addresses and
    /// names match case-insensitively.
    pub fn find_device(&self, query: &str) -> Result<Device> {
        let last = lock(&self.inner.last);
        let wanted = query.to_lowercase();

        last.paired_devices
            .iter()
            .find(|d| d.path == query)
            .or_else(|| {
                last.paired_devices
                    .iter()
                    .find(|d| !d.address.is_empty() && d.address.eq_ignore_ascii_case(query))
            })
            .or_else(|| {
                last.paired_devices
                    .iter()
                    .find(|d| d.name.to_lowercase() == wanted)
            })
            .cloned()
            .ok_or_else(|| BluetoothError::DeviceNotFound(query.to_string()))
    }

    /// Switches the adapter on or off.
    ///
    /// Sets `Powered` over D-Bus and falls back to the radio control command
    /// if that fails or no adapter is known. On success the session waits the
    /// settle delay and returns a fresh snapshot. On failure the caller should
    /// revert its switch.
    pub async fn on_user_toggle_power(&self, powered: bool) -> Result<SessionSnapshot> {
        let inner = &self.inner;
        let route = inner
            .adapter
            .set_power(inner.bus.as_ref(), inner.runner.as_ref(), &inner.config, powered)
            .await?;
        debug!("Power change applied via {route:?}");
        Ok(self.settle_and_refresh().await)
    }

    /// Connects (`connected == true`) or disconnects the device at `path`.
    ///
    /// Fails with `OperationInFlight` if an operation for the same device is
    /// still running. Any bus failure is also reported to the notifier as
    /// "Connection failed: ...". On failure the caller should revert its
    /// switch.
    pub async fn on_user_toggle_device(&self, path: &str, connected: bool) -> Result<SessionSnapshot> {
        let inner = &self.inner;
        inner
            .devices
            .toggle_connection(
                Arc::clone(&inner.bus),
                Arc::clone(&inner.notifier),
                path,
                connected,
                inner.config.timeouts.device_timeout,
            )
            .await?;
        Ok(self.settle_and_refresh().await)
    }

    /// Refreshes and starts discovery if an adapter is known.
    ///
    /// A discovery start failure is logged and does not fail the call. The
    /// returned snapshot reports whether discovery is running afterwards.
    pub async fn on_menu_opened(&self) -> Result<SessionSnapshot> {
        let mut snapshot = self.refresh().await?;
        if snapshot.adapter.is_present() && !snapshot.scanning {
            if let Err(e) = self.start_scan().await {
                warn!("Could not start discovery: {e}");
            }
            snapshot.scanning = self.is_scanning();
            lock(&self.inner.last).scanning = snapshot.scanning;
        }
        Ok(snapshot)
    }

    /// Stops discovery if it is running.
    pub async fn on_menu_closed(&self) -> Result<()> {
        self.stop_scan().await.map(|_| ())
    }

    /// Starts discovery.
    ///
    /// Returns `false` if a scan was already running or there is no adapter.
    pub async fn start_scan(&self) -> Result<bool> {
        let inner = &self.inner;
        let adapter = inner.adapter.path();
        inner
            .scan
            .start(inner.bus.as_ref(), adapter.as_deref(), inner.config.timeouts.discovery_timeout)
            .await
    }

    /// Stops discovery.
    ///
    /// Returns `false` without any bus call if no scan was running.
    pub async fn stop_scan(&self) -> Result<bool> {
        let inner = &self.inner;
        let adapter = inner.adapter.path();
        let stopped = inner
            .scan
            .stop(inner.bus.as_ref(), adapter.as_deref(), inner.config.timeouts.discovery_timeout)
            .await;
        lock(&inner.last).scanning = false;
        stopped
    }

    /// Opens a Bluetooth settings application.
    ///
    /// Tries each configured launcher in order. The first one that is still
    /// running after the launch grace period, or that exits with status 0,
    /// wins and is returned. When none does, the user is notified and
    /// `NoSettingsAvailable` is returned.
    pub async fn open_external_settings(&self) -> Result<CommandSpec> {
        let inner = &self.inner;
        let grace = inner.config.timeouts.launch_grace;

        for launcher in &inner.config.settings_launchers {
            match inner.runner.launch(launcher, grace).await {
                Ok(outcome) if outcome.started() => {
                    info!("Opened Bluetooth settings with `{launcher}`");
                    return Ok(launcher.clone());
                }
                Ok(outcome) => debug!("`{launcher}` did not start: {outcome:?}"),
                Err(e) => debug!("`{launcher}` failed to launch: {e}"),
            }
        }

        warn!("No Bluetooth settings application could be started");
        inner
            .notifier
            .notify(display::NOTIFY_TITLE, display::SETTINGS_FAILED);
        Err(BluetoothError::NoSettingsAvailable)
    }

    /// Hands a fresh snapshot to `callback` whenever BlueZ objects change.
    ///
    /// Subscribes to `InterfacesAdded`, `InterfacesRemoved` and
    /// `PropertiesChanged`. Bursts of signals produce one refresh. Runs until
    /// `shutdown` fires or the session is shut down. Fails with `Unavailable`
    /// if the signal stream ends.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use btmgr::BluetoothSession;
    /// use tokio::sync::watch;
    ///
    /// # async fn example() -> btmgr::Result<()> {
    /// let session = BluetoothSession::new();
    /// session.start().await?;
    ///
    /// let (_stop, shutdown) = watch::channel(());
    /// session
    ///     .monitor_changes(shutdown, |snapshot| {
    ///         println!("{} paired device(s)", snapshot.paired_devices.len());
    ///     })
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn monitor_changes<F>(&self, shutdown: watch::Receiver<()>, callback: F) -> Result<()>
    where
        F: Fn(SessionSnapshot),
    {
        let signals = self.inner.bus.watch_changes().await?;
        let callback = &callback;

        monitor_object_changes(signals, shutdown, self.inner.closed.subscribe(), move || async move {
            if let Some(snapshot) = self.refresh_logged().await {
                callback(snapshot);
            }
        })
        .await
    }

    /// Stops discovery and cancels adapter resolution and change monitors.
    ///
    /// Safe to call more than once. A failing `StopDiscovery` is logged.
    pub async fn shutdown(&self) {
        if self.inner.closed.send_replace(true) {
            return;
        }
        debug!("Shutting down Bluetooth session");
        if let Err(e) = self.stop_scan().await {
            warn!("Failed to stop discovery during shutdown: {e}");
        }
    }

    async fn settle_and_refresh(&self) -> SessionSnapshot {
        pause(self.inner.config.timeouts.settle_delay).await;
        match self.refresh().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Refresh after a successful action failed: {e}");
                self.snapshot()
            }
        }
    }

    async fn refresh_logged(&self) -> Option<SessionSnapshot> {
        Some(try_log!(self.refresh().await, "Refresh after BlueZ change failed"))
    }
}
