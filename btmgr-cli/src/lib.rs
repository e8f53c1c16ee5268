pub mod commands;
pub mod file_lock;
pub mod notifier;
pub mod output;

use anyhow::bail;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use btmgr::{BluetoothSession, CommandSpec, SessionConfig, SystemRunner, TimeoutConfig, ZbusClient};

use crate::notifier::StderrNotifier;

#[derive(Parser, Debug)]
#[command(name = "btmgr")]
#[command(about = "Control Bluetooth through BlueZ")]
#[command(disable_version_flag = true)]
pub struct Args {
    #[arg(short = 'V', long = "version", action = ArgAction::SetTrue)]
    pub version: bool,

    /// Increase log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Seconds to wait for a connect or disconnect
    #[arg(long, value_name = "SECS", global = true)]
    pub device_timeout: Option<u64>,

    /// Seconds to wait for the adapter to change power state
    #[arg(long, value_name = "SECS", global = true)]
    pub power_timeout: Option<u64>,

    /// Give up after this many attempts while BlueZ is not running
    #[arg(long, value_name = "N", default_value_t = 10, global = true)]
    pub resolve_attempts: u32,

    /// Radio control command used when BlueZ refuses a power change,
    /// e.g. "pkexec rfkill"
    #[arg(long, value_name = "CMD", global = true)]
    pub radio_command: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Show the adapter and paired devices (default)
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Switch the adapter on or off
    Power { state: PowerState },
    /// Connect a paired device by path, address or name
    Connect { device: String },
    /// Disconnect a paired device by path, address or name
    Disconnect { device: String },
    /// Discover nearby devices
    Scan {
        #[arg(long, default_value_t = 10)]
        seconds: u64,
    },
    /// Print the status again whenever BlueZ reports a change
    Watch {
        #[arg(long)]
        json: bool,
    },
    /// Open the desktop's Bluetooth settings
    Settings,
}

impl Command {
    /// Whether the command runs discovery and needs the discovery lock.
    pub fn drives_discovery(&self) -> bool {
        matches!(self, Self::Scan { .. })
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    On,
    Off,
}

impl PowerState {
    pub fn powered(self) -> bool {
        self == Self::On
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::On => write!(f, "on"),
            Self::Off => write!(f, "off"),
        }
    }
}

impl Args {
    /// Maps the command-line flags onto a session configuration.
    pub fn session_config(&self) -> anyhow::Result<SessionConfig> {
        let mut timeouts = TimeoutConfig::new();
        if let Some(secs) = self.device_timeout {
            timeouts = timeouts.with_device_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = self.power_timeout {
            timeouts = timeouts.with_power_timeout(Duration::from_secs(secs));
        }

        let mut config = SessionConfig::new().with_timeouts(timeouts);
        if self.resolve_attempts > 0 {
            config = config.with_max_resolve_attempts(self.resolve_attempts);
        }
        if let Some(cmd) = &self.radio_command {
            config = config.with_radio_command(parse_command(cmd)?);
        }
        Ok(config)
    }
}

fn parse_command(cmd: &str) -> anyhow::Result<CommandSpec> {
    let mut words = cmd.split_whitespace();
    let Some(program) = words.next() else {
        bail!("radio command must not be empty");
    };
    Ok(CommandSpec::new(program).args(words))
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

pub async fn run() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.version {
        println!(
            "btmgr {} ({})",
            env!("CARGO_PKG_VERSION"),
            env!("BTMGR_GIT_HASH")
        );
        return Ok(());
    }

    init_logging(args.verbose);
    let config = args.session_config()?;
    let session = BluetoothSession::from_parts(
        Arc::new(ZbusClient::new()),
        Arc::new(SystemRunner::new()),
        Arc::new(StderrNotifier),
        config,
    );

    let command = args.command.unwrap_or(Command::Status { json: false });
    let result = commands::execute(&session, command).await;
    session.shutdown().await;
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_the_default_command() {
        let args = Args::try_parse_from(["btmgr"]).unwrap();
        assert!(args.command.is_none());
        assert_eq!(args.resolve_attempts, 10);
    }

    #[test]
    fn parses_subcommands_and_global_flags() {
        let args = Args::try_parse_from(["btmgr", "power", "off", "-vv", "--power-timeout", "8"])
            .unwrap();
        assert_eq!(args.command, Some(Command::Power { state: PowerState::Off }));
        assert_eq!(args.verbose, 2);

        let config = args.session_config().unwrap();
        assert_eq!(config.timeouts.power_timeout, Duration::from_secs(8));
        assert_eq!(config.timeouts.device_timeout, Duration::from_secs(30));
        assert_eq!(config.max_resolve_attempts, Some(10));

        let args = Args::try_parse_from(["btmgr", "scan", "--seconds", "3"]).unwrap();
        assert_eq!(args.command, Some(Command::Scan { seconds: 3 }));
    }

    #[test]
    fn zero_resolve_attempts_means_unbounded() {
        let args = Args::try_parse_from(["btmgr", "--resolve-attempts", "0"]).unwrap();
        assert_eq!(args.session_config().unwrap().max_resolve_attempts, None);
    }

    #[test]
    fn radio_command_is_split_into_words() {
        let args = Args::try_parse_from(["btmgr", "--radio-command", "pkexec rfkill", "status"])
            .unwrap();
        let config = args.session_config().unwrap();
        assert_eq!(config.radio_command.program, "pkexec");
        assert_eq!(config.radio_command.args, ["rfkill"]);

        assert!(parse_command("   ").is_err());
    }

    #[test]
    fn only_scan_takes_the_discovery_lock() {
        assert!(Command::Scan { seconds: 5 }.drives_discovery());
        assert!(!Command::Watch { json: false }.drives_discovery());
        assert!(!Command::Status { json: true }.drives_discovery());
        assert!(!Command::Settings.drives_discovery());
    }

    #[test]
    fn invalid_power_state_is_rejected() {
        assert!(Args::try_parse_from(["btmgr", "power", "maybe"]).is_err());
    }
}
