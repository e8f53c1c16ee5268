//! Seams to the world outside the bus: subprocesses and user notifications.
//!
//! The session never spawns a process or shows a message directly. It goes
//! through these traits so a shell integration (or a test) can supply its own.

use async_trait::async_trait;
use log::warn;
use std::fmt::{Display, Formatter};
use std::time::Duration;

/// A subprocess invocation: program, arguments and extra environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    /// Creates a command with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    /// Appends an argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets an environment variable for the child.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

impl Display for CommandSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (k, v) in &self.env {
            write!(f, "{k}={v} ")?;
        }
        write!(f, "{}", self.program)?;
        for a in &self.args {
            write!(f, " {a}")?;
        }
        Ok(())
    }
}

/// What happened to a launched process within its grace period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchOutcome {
    /// Still running when the grace period ended.
    Running,
    /// Exited early. `None` means it was killed by a signal.
    Exited(Option<i32>),
}

impl LaunchOutcome {
    /// A launch counts as started if it is still running or exited cleanly.
    #[must_use]
    pub fn started(self) -> bool {
        matches!(self, Self::Running | Self::Exited(Some(0)))
    }
}

/// Runs external commands on behalf of the session.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Runs `cmd` to completion and returns its exit code.
    ///
    /// `None` means the process was terminated by a signal. An `Err` means it
    /// could not be started at all.
    async fn run(&self, cmd: &CommandSpec) -> std::io::Result<Option<i32>>;

    /// Starts a long-lived `cmd` and watches it for `grace`.
    async fn launch(&self, cmd: &CommandSpec, grace: Duration) -> std::io::Result<LaunchOutcome>;
}

/// Receives user-facing failure messages.
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, body: &str);
}

/// A [`Notifier`] that only writes to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, body: &str) {
        warn!("{title}: {body}");
    }
}
