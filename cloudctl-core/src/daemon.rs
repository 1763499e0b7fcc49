//! Auto-refresh daemon supervisor.
//!
//! A long-lived loop that wakes on a fixed interval and silently refreshes
//! role sessions approaching expiry. State on disk:
//!
//! - `daemon.pid` - created exclusively; a present file means a supervisor
//!   is already running
//! - `daemon.log` - append-only, truncated when the day of year changes
//! - `daemon.stdout.log` / `daemon.stderr.log` - standard streams of a
//!   background-mode daemon
//!
//! Background launch re-executes the current binary with the foreground
//! flag and its streams redirected; the supervisor itself always runs in
//! the foreground of whichever process hosts it.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;

use chrono::{Datelike, Local, Utc};
use tracing::debug;

use crate::config::Paths;
use crate::engine::SessionEngine;
use crate::error::CloudCtlError;
use crate::model::{Session, SessionKind, EXPIRING_WINDOW_MINUTES};
use crate::secret::SecretProvider;
use crate::sts::StsClient;

/// Default wake interval in minutes.
pub const DEFAULT_INTERVAL_MINUTES: u64 = 5;

/// launchd label used for macOS autostart registration.
pub const LAUNCH_AGENT_LABEL: &str = "com.chukul.cloudctl";

/// The periodic silent-refresh supervisor.
pub struct Supervisor<C: StsClient> {
    engine: SessionEngine<C>,
    paths: Paths,
    interval_minutes: u64,
}

impl<C: StsClient> Supervisor<C> {
    pub fn new(engine: SessionEngine<C>, paths: Paths, interval_minutes: u64) -> Self {
        Self {
            engine,
            paths,
            interval_minutes: interval_minutes.max(1),
        }
    }

    /// Run the refresh loop until interrupted.
    ///
    /// Creates the PID file exclusively and removes it on the way out; a
    /// pre-existing file means another supervisor owns this store.
    pub async fn run(&self) -> Result<(), CloudCtlError> {
        fs::create_dir_all(self.paths.root())?;

        let pid_path = self.paths.daemon_pid();
        let mut options = fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut pid_file = match options.open(&pid_path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(CloudCtlError::DaemonAlreadyRunning { path: pid_path });
            }
            Err(e) => return Err(e.into()),
        };
        write!(pid_file, "{}", std::process::id())?;
        drop(pid_file);

        let result = self.run_loop().await;
        let _ = fs::remove_file(&pid_path);
        result
    }

    async fn run_loop(&self) -> Result<(), CloudCtlError> {
        let mut log = append_log(&self.paths.daemon_log())?;
        let mut current_day = Local::now().ordinal();
        let _ = writeln!(
            log,
            "[{}] [daemon] started (interval: {} min)",
            Local::now().format("%H:%M:%S"),
            self.interval_minutes
        );

        let mut ticker =
            tokio::time::interval(std::time::Duration::from_secs(self.interval_minutes * 60));

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // Day-of-year rollover truncates yesterday's log. This
                    // also rolls at year boundaries; accepted simplification.
                    let today = Local::now().ordinal();
                    if today != current_day {
                        log = truncate_log(&self.paths.daemon_log())?;
                        current_day = today;
                        let _ = writeln!(
                            log,
                            "[{}] [daemon] log rotated (new day)",
                            Local::now().format("%H:%M:%S")
                        );
                    }
                    self.run_tick(&mut log).await;
                }
                _ = tokio::signal::ctrl_c() => {
                    let _ = writeln!(
                        log,
                        "[{}] [daemon] stopping",
                        Local::now().format("%H:%M:%S")
                    );
                    return Ok(());
                }
            }
        }
    }

    /// One sweep: refresh every role session inside the expiring window.
    async fn run_tick(&self, log: &mut fs::File) {
        let ts = || Local::now().format("%H:%M:%S");

        let secret = match SecretProvider::resolve(None) {
            Ok(secret) => secret,
            Err(e) => {
                let _ = writeln!(log, "[{}] [daemon] error: {e}", ts());
                return;
            }
        };

        let sessions = match self.engine.store().list_all(&secret) {
            Ok(sessions) => sessions,
            Err(e) => {
                let _ = writeln!(log, "[{}] [daemon] error: failed to list sessions: {e}", ts());
                return;
            }
        };

        let _ = writeln!(log, "[{}] [daemon] checking {} sessions", ts(), sessions.len());

        let now = Utc::now();
        let mut action_taken = false;
        for session in &sessions {
            if !self.needs_refresh(session, now) {
                continue;
            }

            let remaining = session.remaining(now).num_seconds();
            let _ = writeln!(
                log,
                "[{}] [{}] expiring in {}s, starting silent refresh",
                ts(),
                session.profile,
                remaining
            );

            let started = Instant::now();
            let result = self.engine.silent_refresh(session, &secret).await;
            let took = started.elapsed();

            match result {
                Ok(_) => {
                    let _ = writeln!(
                        log,
                        "[{}] [{}] refreshed (took {took:.2?})",
                        ts(),
                        session.profile
                    );
                }
                Err(e) => {
                    let _ = writeln!(log, "[{}] [{}] refresh failed: {e}", ts(), session.profile);
                }
            }
            action_taken = true;
        }

        if !action_taken {
            let _ = writeln!(log, "[{}] [daemon] all sessions healthy", ts());
            debug!("daemon tick found nothing to refresh");
        }
    }

    fn needs_refresh(&self, session: &Session, now: chrono::DateTime<Utc>) -> bool {
        needs_refresh(session, now)
    }
}

/// A session is picked up only when it is still alive, inside the expiring
/// window, silently refreshable, and has a source. Expired sessions need a
/// manual restore.
fn needs_refresh(session: &Session, now: chrono::DateTime<Utc>) -> bool {
    let remaining = session.remaining(now);
    remaining < chrono::Duration::minutes(EXPIRING_WINDOW_MINUTES)
        && !session.is_expired(now)
        && session.kind != SessionKind::MfaBase
        && !session.source_profile.is_empty()
}

/// Read the supervisor PID, if a PID file exists.
pub fn read_pid(paths: &Paths) -> Result<Option<i32>, CloudCtlError> {
    let raw = match fs::read_to_string(paths.daemon_pid()) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(raw.trim().parse().ok())
}

/// Signal the running supervisor and remove its PID file.
///
/// Returns the PID that was signalled, or `None` when no PID file exists.
pub fn stop(paths: &Paths) -> Result<Option<i32>, CloudCtlError> {
    let Some(pid) = read_pid(paths)? else {
        return Ok(None);
    };

    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;
        // A dead process just means a stale PID file; clean up either way.
        let _ = kill(Pid::from_raw(pid), Signal::SIGINT);
    }

    let _ = fs::remove_file(paths.daemon_pid());
    Ok(Some(pid))
}

/// Re-execute the current binary as a detached foreground daemon with its
/// standard streams redirected to the log files.
pub fn spawn_background(paths: &Paths, interval_minutes: u64) -> Result<u32, CloudCtlError> {
    let exe = std::env::current_exe()?;
    fs::create_dir_all(paths.root())?;

    let stdout = append_log(&paths.daemon_stdout())?;
    let stderr = append_log(&paths.daemon_stderr())?;

    let child = std::process::Command::new(exe)
        .args([
            "daemon",
            "start",
            "--foreground",
            "--interval",
            &interval_minutes.to_string(),
        ])
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr))
        .spawn()?;

    Ok(child.id())
}

/// Write the launchd plist registering the daemon for login autostart.
///
/// macOS only; other platforms get [`CloudCtlError::Unsupported`].
pub fn install_launch_agent(paths: &Paths) -> Result<PathBuf, CloudCtlError> {
    if !cfg!(target_os = "macos") {
        return Err(CloudCtlError::Unsupported {
            message: "autostart registration is only supported on macOS".to_string(),
        });
    }

    let home = dirs::home_dir().ok_or_else(|| CloudCtlError::Unsupported {
        message: "could not determine home directory".to_string(),
    })?;
    let exe = std::env::current_exe()?;
    let plist_path = home
        .join("Library/LaunchAgents")
        .join(format!("{LAUNCH_AGENT_LABEL}.plist"));

    let plist = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>Label</key>
    <string>{LAUNCH_AGENT_LABEL}</string>
    <key>ProgramArguments</key>
    <array>
        <string>{exe}</string>
        <string>daemon</string>
        <string>start</string>
        <string>--foreground</string>
    </array>
    <key>RunAtLoad</key>
    <true/>
    <key>KeepAlive</key>
    <true/>
    <key>StandardOutPath</key>
    <string>{stdout}</string>
    <key>StandardErrorPath</key>
    <string>{stderr}</string>
</dict>
</plist>
"#,
        exe = exe.display(),
        stdout = paths.daemon_stdout().display(),
        stderr = paths.daemon_stderr().display(),
    );

    if let Some(parent) = plist_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&plist_path, plist)?;
    Ok(plist_path)
}

#[cfg(unix)]
fn append_log(path: &std::path::Path) -> Result<fs::File, CloudCtlError> {
    use std::os::unix::fs::OpenOptionsExt;
    Ok(fs::OpenOptions::new()
        .append(true)
        .create(true)
        .mode(0o600)
        .open(path)?)
}

#[cfg(not(unix))]
fn append_log(path: &std::path::Path) -> Result<fs::File, CloudCtlError> {
    Ok(fs::OpenOptions::new().append(true).create(true).open(path)?)
}

#[cfg(unix)]
fn truncate_log(path: &std::path::Path) -> Result<fs::File, CloudCtlError> {
    use std::os::unix::fs::OpenOptionsExt;
    Ok(fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?)
}

#[cfg(not(unix))]
fn truncate_log(path: &std::path::Path) -> Result<fs::File, CloudCtlError> {
    Ok(fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?)
}
