//! `cloudctl daemon` - supervisor control.

use anyhow::Result;
use clap::Subcommand;
use cloudctl_core::daemon::{
    self, Supervisor, DEFAULT_INTERVAL_MINUTES,
};

use super::{engine, paths};

#[derive(Subcommand, Debug)]
pub enum DaemonCommand {
    /// Start the auto-refresh daemon
    Start {
        /// Run in the foreground instead of forking
        #[arg(short, long)]
        foreground: bool,

        /// Check interval in minutes
        #[arg(short, long, default_value_t = DEFAULT_INTERVAL_MINUTES)]
        interval: u64,
    },

    /// Stop the background daemon
    Stop,

    /// Check daemon status
    Status,

    /// Show daemon logs
    Logs,

    /// Register the daemon for autostart at login (macOS)
    Setup,
}

pub async fn run(command: DaemonCommand) -> Result<()> {
    let paths = paths()?;

    match command {
        DaemonCommand::Start {
            foreground,
            interval,
        } => {
            if daemon::read_pid(&paths)?.is_some() {
                anyhow::bail!(
                    "daemon is already running (or a stale PID file exists)\n   \
                     use 'cloudctl daemon stop' first to restart"
                );
            }

            if foreground {
                eprintln!("Starting CloudCtl daemon in foreground (interval: {interval} min)...");
                let supervisor = Supervisor::new(engine(&paths), paths.clone(), interval);
                supervisor.run().await?;
                return Ok(());
            }

            let pid = daemon::spawn_background(&paths, interval)?;
            eprintln!("CloudCtl daemon started in background (PID: {pid})");
            eprintln!("Logs: {}", paths.daemon_log().display());
        }
        DaemonCommand::Stop => match daemon::stop(&paths)? {
            Some(pid) => eprintln!("Daemon stopped (PID: {pid})."),
            None => eprintln!("Daemon is not running."),
        },
        DaemonCommand::Status => match daemon::read_pid(&paths)? {
            Some(pid) => println!("Daemon is running (PID: {pid})"),
            None => println!("Daemon is NOT running."),
        },
        DaemonCommand::Logs => {
            let log = std::fs::read_to_string(paths.daemon_log())
                .map_err(|_| anyhow::anyhow!("no logs found"))?;
            print!("{log}");
        }
        DaemonCommand::Setup => {
            let plist = daemon::install_launch_agent(&paths)?;
            eprintln!("LaunchAgent plist created.");
            eprintln!("To enable, run:\n   launchctl load {}", plist.display());
        }
    }
    Ok(())
}
