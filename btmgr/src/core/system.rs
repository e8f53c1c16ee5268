//! Process runner backed by `tokio::process`.

use async_trait::async_trait;
use log::debug;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::api::collaborators::{CommandSpec, LaunchOutcome, ProcessRunner};

/// Runs commands on the host.
///
/// Child output is discarded. Launched programs that are still running after
/// the grace period are left running and detached.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl SystemRunner {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn command(spec: &CommandSpec) -> Command {
    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .envs(spec.env.iter().map(|(k, v)| (k, v)))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    cmd
}

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn run(&self, spec: &CommandSpec) -> std::io::Result<Option<i32>> {
        debug!("Running `{spec}`");
        let status = command(spec).status().await?;
        debug!("`{spec}` finished: {status}");
        Ok(status.code())
    }

    async fn launch(&self, spec: &CommandSpec, grace: Duration) -> std::io::Result<LaunchOutcome> {
        debug!("Launching `{spec}`");
        let mut child = command(spec).spawn()?;

        match tokio::time::timeout(grace, child.wait()).await {
            Ok(status) => {
                let status = status?;
                debug!("`{spec}` exited early: {status}");
                Ok(LaunchOutcome::Exited(status.code()))
            }
            Err(_) => {
                debug!("`{spec}` still running after {grace:?}");
                Ok(LaunchOutcome::Running)
            }
        }
    }
}
