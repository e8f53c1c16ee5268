//! In-memory collaborators for driving `BluetoothSession` in tests.

#![allow(dead_code)]

use async_trait::async_trait;
use btmgr::{
    BluetoothError, BluetoothSession, BusClient, CommandSpec, Interfaces, LaunchOutcome, Notifier,
    ObjectTree, ProcessRunner, PropValue, Properties, SessionConfig, TimeoutConfig,
};
use futures::StreamExt;
use futures::channel::mpsc;
use futures::stream::BoxStream;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

pub const ADAPTER: &str = "/org/bluez/hci0";
pub const ADAPTER_IFACE: &str = "org.bluez.Adapter1";
pub const DEVICE_IFACE: &str = "org.bluez.Device1";

pub fn dev_path(n: u8) -> String {
    format!("{ADAPTER}/dev_00_11_22_33_44_{n:02X}")
}

/// Scripted failure for a fake bus call.
#[derive(Debug, Clone)]
pub enum Failure {
    Unavailable,
    Timeout,
    Remote(&'static str, &'static str),
}

impl Failure {
    fn to_error(&self) -> BluetoothError {
        match self {
            Self::Unavailable => BluetoothError::Unavailable("org.bluez is not running".into()),
            Self::Timeout => BluetoothError::Timeout("call timed out".into()),
            Self::Remote(name, message) => BluetoothError::RemoteFailure {
                name: (*name).into(),
                message: (*message).into(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Method {
        path: String,
        interface: String,
        method: String,
        timeout: Duration,
    },
    SetProperty {
        path: String,
        property: String,
        value: PropValue,
        timeout: Duration,
    },
}

/// A BlueZ stand-in holding an object tree.
///
/// Successful `Connect`/`Disconnect` and `Powered` writes are applied to the
/// tree so that the following enumeration reflects them.
pub struct FakeBus {
    tree: Mutex<ObjectTree>,
    calls: Mutex<Vec<Call>>,
    enumerations: AtomicUsize,
    unavailable_enumerations: Mutex<Option<usize>>,
    method_failures: Mutex<HashMap<String, Failure>>,
    set_failure: Mutex<Option<Failure>>,
    gate: Mutex<Option<Arc<Notify>>>,
    signal_tx: Mutex<Option<mpsc::UnboundedSender<()>>>,
    signal_rx: Mutex<Option<mpsc::UnboundedReceiver<()>>>,
}

impl FakeBus {
    pub fn new(tree: ObjectTree) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded();
        Arc::new(Self {
            tree: Mutex::new(tree),
            calls: Mutex::new(Vec::new()),
            enumerations: AtomicUsize::new(0),
            unavailable_enumerations: Mutex::new(Some(0)),
            method_failures: Mutex::new(HashMap::new()),
            set_failure: Mutex::new(None),
            gate: Mutex::new(None),
            signal_tx: Mutex::new(Some(tx)),
            signal_rx: Mutex::new(Some(rx)),
        })
    }

    /// The next `n` enumerations fail with `Unavailable`.
    pub fn unavailable_for(&self, n: usize) {
        *self.unavailable_enumerations.lock().unwrap() = Some(n);
    }

    /// Every enumeration fails with `Unavailable`.
    pub fn always_unavailable(&self) {
        *self.unavailable_enumerations.lock().unwrap() = None;
    }

    pub fn fail_method(&self, method: &str, failure: Failure) {
        self.method_failures
            .lock()
            .unwrap()
            .insert(method.to_string(), failure);
    }

    pub fn fail_set_property(&self, failure: Failure) {
        *self.set_failure.lock().unwrap() = Some(failure);
    }

    /// Method calls block until the returned handle is notified.
    pub fn gate_methods(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(notify.clone());
        notify
    }

    pub fn set_tree(&self, tree: ObjectTree) {
        *self.tree.lock().unwrap() = tree;
    }

    pub fn with_tree(&self, f: impl FnOnce(&mut ObjectTree)) {
        f(&mut self.tree.lock().unwrap());
    }

    pub fn emit_signal(&self) {
        if let Some(tx) = self.signal_tx.lock().unwrap().as_ref() {
            let _ = tx.unbounded_send(());
        }
    }

    pub fn close_signals(&self) {
        self.signal_tx.lock().unwrap().take();
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn method_calls(&self, method: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Method { method: m, .. } if m == method))
            .collect()
    }

    pub fn set_property_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::SetProperty { .. }))
            .collect()
    }

    pub fn enumerations(&self) -> usize {
        self.enumerations.load(Ordering::SeqCst)
    }

    fn apply(&self, path: &str, interface: &str, property: &str, value: PropValue) {
        let mut tree = self.tree.lock().unwrap();
        if let Some(props) = tree.get_mut(path).and_then(|i| i.get_mut(interface)) {
            props.insert(property.to_string(), value);
        }
    }
}

#[async_trait]
impl BusClient for FakeBus {
    async fn enumerate_objects(&self, _timeout: Duration) -> btmgr::Result<ObjectTree> {
        self.enumerations.fetch_add(1, Ordering::SeqCst);
        {
            let mut remaining = self.unavailable_enumerations.lock().unwrap();
            match remaining.as_mut() {
                None => return Err(Failure::Unavailable.to_error()),
                Some(n) if *n > 0 => {
                    *n -= 1;
                    return Err(Failure::Unavailable.to_error());
                }
                Some(_) => {}
            }
        }
        Ok(self.tree.lock().unwrap().clone())
    }

    async fn call_method(
        &self,
        path: &str,
        interface: &str,
        method: &str,
        timeout: Duration,
    ) -> btmgr::Result<()> {
        self.calls.lock().unwrap().push(Call::Method {
            path: path.to_string(),
            interface: interface.to_string(),
            method: method.to_string(),
            timeout,
        });

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let failure = self.method_failures.lock().unwrap().get(method).cloned();
        if let Some(failure) = failure {
            return Err(failure.to_error());
        }

        match method {
            "Connect" => self.apply(path, DEVICE_IFACE, "Connected", PropValue::Bool(true)),
            "Disconnect" => self.apply(path, DEVICE_IFACE, "Connected", PropValue::Bool(false)),
            _ => {}
        }
        Ok(())
    }

    async fn set_property(
        &self,
        path: &str,
        interface: &str,
        property: &str,
        value: PropValue,
        timeout: Duration,
    ) -> btmgr::Result<()> {
        self.calls.lock().unwrap().push(Call::SetProperty {
            path: path.to_string(),
            property: property.to_string(),
            value: value.clone(),
            timeout,
        });

        let failure = self.set_failure.lock().unwrap().clone();
        if let Some(failure) = failure {
            return Err(failure.to_error());
        }
        self.apply(path, interface, property, value);
        Ok(())
    }

    async fn watch_changes(&self) -> btmgr::Result<BoxStream<'static, ()>> {
        let rx = self.signal_rx.lock().unwrap().take();
        rx.map(|rx| rx.boxed())
            .ok_or_else(|| BluetoothError::Unavailable("already subscribed".into()))
    }
}

/// Scripted result of one launch attempt.
#[derive(Debug, Clone, Copy)]
pub enum Launch {
    Running,
    Exit(i32),
    SpawnError,
}

pub struct FakeRunner {
    run_exit: Mutex<Option<i32>>,
    runs: Mutex<Vec<CommandSpec>>,
    launch_script: Mutex<VecDeque<Launch>>,
    launches: Mutex<Vec<CommandSpec>>,
}

impl FakeRunner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            run_exit: Mutex::new(Some(0)),
            runs: Mutex::new(Vec::new()),
            launch_script: Mutex::new(VecDeque::new()),
            launches: Mutex::new(Vec::new()),
        })
    }

    pub fn exit_with(&self, code: Option<i32>) {
        *self.run_exit.lock().unwrap() = code;
    }

    pub fn script_launches(&self, script: impl IntoIterator<Item = Launch>) {
        self.launch_script.lock().unwrap().extend(script);
    }

    pub fn runs(&self) -> Vec<CommandSpec> {
        self.runs.lock().unwrap().clone()
    }

    pub fn launches(&self) -> Vec<CommandSpec> {
        self.launches.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessRunner for FakeRunner {
    async fn run(&self, cmd: &CommandSpec) -> std::io::Result<Option<i32>> {
        self.runs.lock().unwrap().push(cmd.clone());
        Ok(*self.run_exit.lock().unwrap())
    }

    async fn launch(&self, cmd: &CommandSpec, _grace: Duration) -> std::io::Result<LaunchOutcome> {
        self.launches.lock().unwrap().push(cmd.clone());
        let next = self
            .launch_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Launch::SpawnError);
        match next {
            Launch::Running => Ok(LaunchOutcome::Running),
            Launch::Exit(code) => Ok(LaunchOutcome::Exited(Some(code))),
            Launch::SpawnError => Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no such program",
            )),
        }
    }
}

#[derive(Default)]
pub struct FakeNotifier {
    messages: Mutex<Vec<(String, String)>>,
}

impl FakeNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn messages(&self) -> Vec<(String, String)> {
        self.messages.lock().unwrap().clone()
    }
}

impl Notifier for FakeNotifier {
    fn notify(&self, title: &str, body: &str) {
        self.messages
            .lock()
            .unwrap()
            .push((title.to_string(), body.to_string()));
    }
}

pub fn adapter(powered: bool) -> (String, Interfaces) {
    let props = Properties::from([("Powered".to_string(), PropValue::Bool(powered))]);
    (
        ADAPTER.to_string(),
        Interfaces::from([(ADAPTER_IFACE.to_string(), props)]),
    )
}

pub fn device(path: &str, name: Option<&str>, paired: bool, connected: bool) -> (String, Interfaces) {
    let mut props = Properties::new();
    if let Some(name) = name {
        props.insert("Name".into(), PropValue::from(name));
    }
    let address = path.rsplit("dev_").next().unwrap_or_default().replace('_', ":");
    props.insert("Address".into(), PropValue::from(address));
    props.insert("Paired".into(), PropValue::Bool(paired));
    props.insert("Connected".into(), PropValue::Bool(connected));
    props.insert("Trusted".into(), PropValue::Bool(paired));
    (
        path.to_string(),
        Interfaces::from([(DEVICE_IFACE.to_string(), props)]),
    )
}

pub fn tree(entries: impl IntoIterator<Item = (String, Interfaces)>) -> ObjectTree {
    entries.into_iter().collect()
}

/// Default timeouts with the timers shortened.
pub fn fast_config() -> SessionConfig {
    SessionConfig::new().with_timeouts(
        TimeoutConfig::new()
            .with_settle_delay(Duration::ZERO)
            .with_resolve_backoff(Duration::from_millis(5)),
    )
}

pub struct Harness {
    pub bus: Arc<FakeBus>,
    pub runner: Arc<FakeRunner>,
    pub notifier: Arc<FakeNotifier>,
    pub session: BluetoothSession,
}

impl Harness {
    pub fn new(tree: ObjectTree) -> Self {
        Self::with_config(tree, fast_config())
    }

    pub fn with_config(tree: ObjectTree, config: SessionConfig) -> Self {
        let bus = FakeBus::new(tree);
        let runner = FakeRunner::new();
        let notifier = FakeNotifier::new();
        let session =
            BluetoothSession::from_parts(bus.clone(), runner.clone(), notifier.clone(), config);
        Self {
            bus,
            runner,
            notifier,
            session,
        }
    }
}
